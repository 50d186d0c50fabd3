use sqlx::Row;
use std::sync::Arc;

use crate::database::Database;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct FollowService {
    db: Arc<Database>,
}

impl FollowService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn target_id(&self, username: &str) -> AppResult<i64> {
        let row = sqlx::query("SELECT id FROM teachers WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("teacher '{}' not found", username)))?;
        Ok(row.get("id"))
    }

    /// Idempotent: following an already-followed teacher changes nothing.
    pub async fn follow(&self, follower_id: i64, target_username: &str) -> AppResult<()> {
        let target_id = self.target_id(target_username).await?;
        if target_id == follower_id {
            return Err(AppError::Validation(
                "you cannot follow yourself".to_string(),
            ));
        }

        sqlx::query("INSERT OR IGNORE INTO followers (follower_id, followed_id) VALUES (?, ?)")
            .bind(follower_id)
            .bind(target_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    pub async fn unfollow(&self, follower_id: i64, target_username: &str) -> AppResult<()> {
        let target_id = self.target_id(target_username).await?;
        if target_id == follower_id {
            return Err(AppError::Validation(
                "you cannot unfollow yourself".to_string(),
            ));
        }

        sqlx::query("DELETE FROM followers WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(target_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM followers WHERE follower_id = ? AND followed_id = ?",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn follower_count(&self, teacher_id: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM followers WHERE followed_id = ?")
            .bind(teacher_id)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(row.get("n"))
    }

    pub async fn following_count(&self, teacher_id: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM followers WHERE follower_id = ?")
            .bind(teacher_id)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Ids of everyone following the given teacher (notification fan-out).
    pub async fn follower_ids(&self, teacher_id: i64) -> AppResult<Vec<i64>> {
        let rows = sqlx::query("SELECT follower_id FROM followers WHERE followed_id = ?")
            .bind(teacher_id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("follower_id")).collect())
    }
}
