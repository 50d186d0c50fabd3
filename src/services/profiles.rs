use sqlx::Row;
use std::sync::Arc;

use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::{NamedRef, Teacher};
use crate::storage::FileStore;

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub username: String,
    pub full_name: String,
    pub about: Option<String>,
    pub institution_id: Option<i64>,
    pub subject_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<Database>,
    store: Arc<FileStore>,
}

impl ProfileService {
    pub fn new(db: Arc<Database>, store: Arc<FileStore>) -> Self {
        Self { db, store }
    }

    pub async fn edit_profile(&self, teacher_id: i64, update: ProfileUpdate) -> AppResult<Teacher> {
        let row = sqlx::query("SELECT username FROM teachers WHERE id = ?")
            .bind(teacher_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("teacher {} not found", teacher_id)))?;
        let current_username: String = row.get("username");

        if update.username != current_username {
            let taken = sqlx::query("SELECT id FROM teachers WHERE username = ? AND id != ?")
                .bind(&update.username)
                .bind(teacher_id)
                .fetch_optional(&self.db.pool)
                .await?;
            if taken.is_some() {
                return Err(AppError::Validation(
                    "please use a different username".to_string(),
                ));
            }
        }

        let mut tx = self.db.begin_transaction().await?;
        sqlx::query(
            "UPDATE teachers SET username = ?, full_name = ?, about = ?, institution_id = ?
             WHERE id = ?",
        )
        .bind(&update.username)
        .bind(&update.full_name)
        .bind(&update.about)
        .bind(update.institution_id)
        .bind(teacher_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM teacher_subjects WHERE teacher_id = ?")
            .bind(teacher_id)
            .execute(&mut *tx)
            .await?;
        for subject_id in &update.subject_ids {
            sqlx::query("INSERT INTO teacher_subjects (teacher_id, subject_id) VALUES (?, ?)")
                .bind(teacher_id)
                .bind(subject_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        if update.username != current_username {
            // stored avatars are keyed by username
            self.store.rename_avatar(&current_username, &update.username);
        }

        let row = sqlx::query(
            "SELECT id, username, email, password_hash, full_name, about, institution_id
             FROM teachers WHERE id = ?",
        )
        .bind(teacher_id)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(Teacher::from_row(&row))
    }

    pub fn store_avatar(&self, username: &str, filename: &str, bytes: &[u8]) -> AppResult<()> {
        self.store.store_avatar(username, filename, bytes)
    }

    pub fn avatar_url(&self, teacher: &Teacher) -> String {
        self.store.avatar_url(&teacher.username, &teacher.email)
    }

    /// Subjects the teacher teaches, id order.
    pub async fn subjects_of(&self, teacher_id: i64) -> AppResult<Vec<NamedRef>> {
        let rows = sqlx::query(
            "SELECT s.id, s.name FROM subjects s
             JOIN teacher_subjects ts ON ts.subject_id = s.id
             WHERE ts.teacher_id = ? ORDER BY s.id",
        )
        .bind(teacher_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().map(NamedRef::from_row).collect())
    }
}
