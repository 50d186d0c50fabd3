use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::Notification;

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// One unread notification per follower of the author. Called at page
    /// publish time; only the edges that exist at that moment are notified.
    pub async fn notify_followers(
        &self,
        author_full_name: &str,
        page_id: i64,
        page_name: &str,
        follower_ids: &[i64],
    ) -> AppResult<()> {
        let message = format!("{} published a new page: {}", author_full_name, page_name);
        let link = format!("/page/{}", page_id);
        let now = Utc::now().timestamp();

        let mut tx = self.db.begin_transaction().await?;
        for follower_id in follower_ids {
            sqlx::query(
                "INSERT INTO notifications (teacher_id, message, link, is_read, created)
                 VALUES (?, ?, ?, 0, ?)",
            )
            .bind(follower_id)
            .bind(&message)
            .bind(&link)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            "notified {} followers about page {}",
            follower_ids.len(),
            page_id
        );
        Ok(())
    }

    /// Unread only, newest first.
    pub async fn unread_for(&self, teacher_id: i64) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, teacher_id, message, link, is_read, created FROM notifications
             WHERE teacher_id = ? AND is_read = 0 ORDER BY created DESC, id DESC",
        )
        .bind(teacher_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().map(Notification::from_row).collect())
    }

    /// Scoped to the addressee: a teacher can only mark their own
    /// notifications.
    pub async fn mark_read(&self, notification_id: i64, teacher_id: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND teacher_id = ?",
        )
        .bind(notification_id)
        .bind(teacher_id)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "notification {} not found",
                notification_id
            )));
        }
        Ok(())
    }

    pub async fn unread_count(&self, teacher_id: i64) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM notifications WHERE teacher_id = ? AND is_read = 0",
        )
        .bind(teacher_id)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(row.get("n"))
    }
}
