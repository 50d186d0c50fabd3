use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use crate::auth;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::Teacher;

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub about: Option<String>,
    pub institution_id: Option<i64>,
    pub subject_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct AccountService {
    db: Arc<Database>,
    secret_key: String,
    reset_token_ttl: i64,
    session_ttl: i64,
}

impl AccountService {
    pub fn new(db: Arc<Database>, secret_key: String, reset_token_ttl: i64, session_ttl: i64) -> Self {
        Self {
            db,
            secret_key,
            reset_token_ttl,
            session_ttl,
        }
    }

    pub async fn register(&self, new: NewTeacher) -> AppResult<Teacher> {
        let existing = sqlx::query("SELECT id FROM teachers WHERE username = ?")
            .bind(&new.username)
            .fetch_optional(&self.db.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Validation(
                "please use a different username".to_string(),
            ));
        }

        let existing = sqlx::query("SELECT id FROM teachers WHERE email = ?")
            .bind(&new.email)
            .fetch_optional(&self.db.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Validation(
                "please use a different email address".to_string(),
            ));
        }

        let password_hash = auth::hash_password(&new.password)?;

        let mut tx = self.db.begin_transaction().await?;
        let result = sqlx::query(
            "INSERT INTO teachers (username, email, password_hash, full_name, about, institution_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&password_hash)
        .bind(&new.full_name)
        .bind(&new.about)
        .bind(new.institution_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            // a racing registration hits the unique constraint instead of
            // the prechecks above
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Validation("please use a different username or email".to_string())
            }
            other => AppError::Database(other),
        })?;
        let id = result.last_insert_rowid();

        for subject_id in &new.subject_ids {
            sqlx::query("INSERT INTO teacher_subjects (teacher_id, subject_id) VALUES (?, ?)")
                .bind(id)
                .bind(subject_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!("registered teacher {} (id {})", new.username, id);

        Ok(Teacher {
            id,
            username: new.username,
            email: new.email,
            password_hash,
            full_name: new.full_name,
            about: new.about,
            institution_id: new.institution_id,
        })
    }

    /// Checks credentials and opens a session. The same error covers
    /// unknown usernames and wrong passwords.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<(Teacher, String)> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, full_name, about, institution_id
             FROM teachers WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.db.pool)
        .await?;

        let teacher = match row {
            Some(row) => Teacher::from_row(&row),
            None => return Err(AppError::Authentication),
        };

        if !auth::verify_password(password, &teacher.password_hash) {
            return Err(AppError::Authentication);
        }

        let token = auth::generate_session_token();
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO sessions (teacher_id, token, created, expires) VALUES (?, ?, ?, ?)",
        )
        .bind(teacher.id)
        .bind(&token)
        .bind(now)
        .bind(now + self.session_ttl)
        .execute(&self.db.pool)
        .await?;

        tracing::info!("teacher {} logged in", teacher.username);
        Ok((teacher, token))
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    /// Resolves an unexpired session token to its teacher.
    pub async fn session_teacher(&self, token: &str) -> AppResult<Teacher> {
        let now = Utc::now().timestamp();
        let row = sqlx::query(
            "SELECT t.id, t.username, t.email, t.password_hash, t.full_name, t.about, t.institution_id
             FROM sessions s JOIN teachers t ON t.id = s.teacher_id
             WHERE s.token = ? AND s.expires > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db.pool)
        .await?;

        match row {
            Some(row) => Ok(Teacher::from_row(&row)),
            None => Err(AppError::Authentication),
        }
    }

    /// Issues a signed reset token when the email matches an account.
    /// Returns None otherwise; callers must respond identically either way
    /// so the endpoint never confirms whether an address is registered.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<Option<String>> {
        let row = sqlx::query("SELECT id, username FROM teachers WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.db.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.get("id");
        let username: String = row.get("username");

        let token = auth::issue_reset_token(id, &self.secret_key, self.reset_token_ttl)?;
        tracing::info!("issued password reset token for {}", username);
        Ok(Some(token))
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let teacher_id = auth::verify_reset_token(token, &self.secret_key)?;
        let password_hash = auth::hash_password(new_password)?;

        let result = sqlx::query("UPDATE teachers SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(teacher_id)
            .execute(&self.db.pool)
            .await?;
        if result.rows_affected() == 0 {
            // token was valid but the account is gone
            return Err(AppError::InvalidToken);
        }

        tracing::info!("password reset for teacher id {}", teacher_id);
        Ok(())
    }

    pub async fn teacher_by_id(&self, id: i64) -> AppResult<Teacher> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, full_name, about, institution_id
             FROM teachers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;

        match row {
            Some(row) => Ok(Teacher::from_row(&row)),
            None => Err(AppError::NotFound(format!("teacher {} not found", id))),
        }
    }

    pub async fn teacher_by_username(&self, username: &str) -> AppResult<Teacher> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, full_name, about, institution_id
             FROM teachers WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.db.pool)
        .await?;

        match row {
            Some(row) => Ok(Teacher::from_row(&row)),
            None => Err(AppError::NotFound(format!(
                "teacher '{}' not found",
                username
            ))),
        }
    }
}
