use chrono::Utc;
use sqlx::Row;
use std::path::PathBuf;
use std::sync::Arc;

use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::Page;
use crate::services::{FollowService, NotificationService};
use crate::storage::FileStore;

#[derive(Debug, Clone)]
pub struct NewPage {
    pub name: String,
    pub description: Option<String>,
    pub grade_id: i64,
    pub type_of_work_id: i64,
    pub subject_id: i64,
}

#[derive(Debug, Clone)]
pub struct PageUpdate {
    pub name: String,
    pub description: Option<String>,
    pub grade_id: i64,
    pub type_of_work_id: i64,
    pub subject_id: i64,
}

/// A file received from the client, still in memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct PageService {
    db: Arc<Database>,
    store: Arc<FileStore>,
    follows: FollowService,
    notifications: NotificationService,
}

impl PageService {
    pub fn new(
        db: Arc<Database>,
        store: Arc<FileStore>,
        follows: FollowService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            db,
            store,
            follows,
            notifications,
        }
    }

    /// Publish a page. The attachment, when present, is written to disk
    /// before the row is inserted, so an I/O failure leaves no record
    /// behind. Followers of the author are notified once the row exists.
    pub async fn create_page(
        &self,
        author_id: i64,
        new: NewPage,
        upload: Option<Upload>,
    ) -> AppResult<Page> {
        let stored = match upload {
            Some(upload) => Some(
                self.store
                    .store_attachment(&upload.filename, &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        let created = Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO pages (name, description, teacher_id, created, stored_name,
                                original_name, average_rating, grade_id, type_of_work_id, subject_id)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(author_id)
        .bind(created)
        .bind(stored.as_ref().map(|s| s.stored_name.clone()))
        .bind(stored.as_ref().map(|s| s.original_name.clone()))
        .bind(new.grade_id)
        .bind(new.type_of_work_id)
        .bind(new.subject_id)
        .execute(&self.db.pool)
        .await?;
        let page_id = result.last_insert_rowid();

        let author_row = sqlx::query("SELECT full_name FROM teachers WHERE id = ?")
            .bind(author_id)
            .fetch_one(&self.db.pool)
            .await?;
        let author_full_name: String = author_row.get("full_name");

        let follower_ids = self.follows.follower_ids(author_id).await?;
        self.notifications
            .notify_followers(&author_full_name, page_id, &new.name, &follower_ids)
            .await?;

        tracing::info!("teacher {} published page {} ({})", author_id, page_id, new.name);
        self.get_page(page_id).await
    }

    /// Only the author may edit. A replacement file is saved before the row
    /// update; the old stored file is removed last, after the new reference
    /// is committed.
    pub async fn edit_page(
        &self,
        page_id: i64,
        actor_id: i64,
        update: PageUpdate,
        upload: Option<Upload>,
    ) -> AppResult<Page> {
        let page = self.get_page(page_id).await?;
        if page.teacher_id != actor_id {
            return Err(AppError::Forbidden(
                "only the author can edit this page".to_string(),
            ));
        }

        let stored = match upload {
            Some(upload) => Some(
                self.store
                    .store_attachment(&upload.filename, &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        match &stored {
            Some(stored_file) => {
                sqlx::query(
                    "UPDATE pages SET name = ?, description = ?, grade_id = ?, type_of_work_id = ?,
                                      subject_id = ?, stored_name = ?, original_name = ?
                     WHERE id = ?",
                )
                .bind(&update.name)
                .bind(&update.description)
                .bind(update.grade_id)
                .bind(update.type_of_work_id)
                .bind(update.subject_id)
                .bind(&stored_file.stored_name)
                .bind(&stored_file.original_name)
                .bind(page_id)
                .execute(&self.db.pool)
                .await?;

                if let Some(old_name) = &page.stored_name {
                    self.store.remove_attachment(old_name).await;
                }
            }
            None => {
                sqlx::query(
                    "UPDATE pages SET name = ?, description = ?, grade_id = ?, type_of_work_id = ?,
                                      subject_id = ?
                     WHERE id = ?",
                )
                .bind(&update.name)
                .bind(&update.description)
                .bind(update.grade_id)
                .bind(update.type_of_work_id)
                .bind(update.subject_id)
                .bind(page_id)
                .execute(&self.db.pool)
                .await?;
            }
        }

        self.get_page(page_id).await
    }

    /// Only the author may delete. Reviews go with the page in one
    /// transaction; the stored file is removed after the commit.
    pub async fn delete_page(&self, page_id: i64, actor_id: i64) -> AppResult<()> {
        let page = self.get_page(page_id).await?;
        if page.teacher_id != actor_id {
            return Err(AppError::Forbidden(
                "only the author can delete this page".to_string(),
            ));
        }

        let mut tx = self.db.begin_transaction().await?;
        sqlx::query("DELETE FROM reviews WHERE page_id = ?")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if let Some(stored_name) = &page.stored_name {
            self.store.remove_attachment(stored_name).await;
        }

        tracing::info!("teacher {} deleted page {}", actor_id, page_id);
        Ok(())
    }

    pub async fn get_page(&self, page_id: i64) -> AppResult<Page> {
        let row = sqlx::query(
            "SELECT id, name, description, teacher_id, created, stored_name, original_name,
                    average_rating, grade_id, type_of_work_id, subject_id
             FROM pages WHERE id = ?",
        )
        .bind(page_id)
        .fetch_optional(&self.db.pool)
        .await?;

        match row {
            Some(row) => Ok(Page::from_row(&row)),
            None => Err(AppError::NotFound(format!("page {} not found", page_id))),
        }
    }

    /// Newest first.
    pub async fn pages_by_author(&self, author_id: i64) -> AppResult<Vec<Page>> {
        let rows = sqlx::query(
            "SELECT id, name, description, teacher_id, created, stored_name, original_name,
                    average_rating, grade_id, type_of_work_id, subject_id
             FROM pages WHERE teacher_id = ? ORDER BY created DESC, id DESC",
        )
        .bind(author_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().map(Page::from_row).collect())
    }

    /// Downloads resolve only names recorded in the pages table, so a stale
    /// or guessed name cannot reach the filesystem.
    pub async fn resolve_download(&self, stored_name: &str) -> AppResult<(PathBuf, String)> {
        let row = sqlx::query("SELECT original_name FROM pages WHERE stored_name = ?")
            .bind(stored_name)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file '{}' not found", stored_name)))?;

        let original_name: Option<String> = row.get("original_name");
        let path = self.store.attachment_path(stored_name)?;
        Ok((path, original_name.unwrap_or_else(|| stored_name.to_string())))
    }
}
