use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::Review;

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<Database>,
}

/// A review together with its author's display names.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub author_username: String,
    pub author_full_name: String,
}

impl ReviewService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Self-reviews and second reviews are rejected outright; the
    /// UNIQUE(author_id, page_id) constraint backs the latter against
    /// concurrent inserts. The average is recomputed with an aggregate
    /// update inside the same transaction as the insert.
    pub async fn add_review(
        &self,
        page_id: i64,
        actor_id: i64,
        rate: i64,
        comment: String,
    ) -> AppResult<Review> {
        if !(1..=5).contains(&rate) {
            return Err(AppError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let page_row = sqlx::query("SELECT teacher_id FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("page {} not found", page_id)))?;
        let author_id: i64 = page_row.get("teacher_id");
        if author_id == actor_id {
            return Err(AppError::Validation(
                "you cannot review your own page".to_string(),
            ));
        }

        let existing = sqlx::query("SELECT id FROM reviews WHERE author_id = ? AND page_id = ?")
            .bind(actor_id)
            .bind(page_id)
            .fetch_optional(&self.db.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Validation(
                "you have already reviewed this page".to_string(),
            ));
        }

        let created = Utc::now().timestamp();
        let mut tx = self.db.begin_transaction().await?;
        let result = sqlx::query(
            "INSERT INTO reviews (rate, comment, created, author_id, page_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(rate)
        .bind(&comment)
        .bind(created)
        .bind(actor_id)
        .bind(page_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            // racing duplicate hits the unique constraint instead of the
            // precheck above
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Validation("you have already reviewed this page".to_string())
            }
            other => AppError::Database(other),
        })?;
        let review_id = result.last_insert_rowid();

        Self::recompute_average(&mut tx, page_id).await?;
        tx.commit().await?;

        Ok(Review {
            id: review_id,
            rate,
            comment,
            created,
            author_id: actor_id,
            page_id,
        })
    }

    /// Only the review's author may remove it; the average is recomputed in
    /// the same transaction as the delete.
    pub async fn delete_review(&self, review_id: i64, actor_id: i64) -> AppResult<()> {
        let row = sqlx::query("SELECT author_id, page_id FROM reviews WHERE id = ?")
            .bind(review_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("review {} not found", review_id)))?;
        let author_id: i64 = row.get("author_id");
        let page_id: i64 = row.get("page_id");

        if author_id != actor_id {
            return Err(AppError::Forbidden(
                "only the author can delete this review".to_string(),
            ));
        }

        let mut tx = self.db.begin_transaction().await?;
        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;
        Self::recompute_average(&mut tx, page_id).await?;
        tx.commit().await?;

        Ok(())
    }

    // Single aggregate statement: average_rating is the arithmetic mean of
    // the page's review rates, 0 when none remain.
    async fn recompute_average(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        page_id: i64,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE pages SET average_rating =
                 COALESCE((SELECT AVG(rate) FROM reviews WHERE page_id = ?), 0)
             WHERE id = ?",
        )
        .bind(page_id)
        .bind(page_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Newest first, with author names for display.
    pub async fn reviews_for_page(&self, page_id: i64) -> AppResult<Vec<ReviewWithAuthor>> {
        let rows = sqlx::query(
            "SELECT r.id, r.rate, r.comment, r.created, r.author_id, r.page_id,
                    t.username, t.full_name
             FROM reviews r JOIN teachers t ON t.id = r.author_id
             WHERE r.page_id = ? ORDER BY r.created DESC, r.id DESC",
        )
        .bind(page_id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ReviewWithAuthor {
                review: Review::from_row(row),
                author_username: row.get("username"),
                author_full_name: row.get("full_name"),
            })
            .collect())
    }

    pub async fn has_reviewed(&self, page_id: i64, teacher_id: i64) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM reviews WHERE author_id = ? AND page_id = ?")
            .bind(teacher_id)
            .bind(page_id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.is_some())
    }
}
