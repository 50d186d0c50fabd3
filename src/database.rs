use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

// Async database handle with SQLx connection pool. Holds the full relational
// schema; domain logic lives in the service layer.
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // foreign_keys is per-connection in SQLite, so it has to be part of
        // the connect options rather than a one-off PRAGMA
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(Database { pool })
    }

    pub async fn init(&self) -> Result<()> {
        // Reference tables, seeded out-of-band and read-only at runtime
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS subjects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS grades (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS types_of_work (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS regions (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settlements (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                region_id INTEGER NOT NULL REFERENCES regions(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS educational_institutions (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                settlement_id INTEGER NOT NULL REFERENCES settlements(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Accounts
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS teachers (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                full_name TEXT NOT NULL,
                about TEXT,
                institution_id INTEGER REFERENCES educational_institutions(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS teacher_subjects (
                teacher_id INTEGER NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
                subject_id INTEGER NOT NULL REFERENCES subjects(id),
                PRIMARY KEY(teacher_id, subject_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Directed follow edges; self-edges are rejected at the service layer
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS followers (
                follower_id INTEGER NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
                followed_id INTEGER NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
                PRIMARY KEY(follower_id, followed_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY,
                teacher_id INTEGER NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
                token TEXT NOT NULL UNIQUE,
                created INTEGER NOT NULL,
                expires INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Published materials
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                teacher_id INTEGER NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
                created INTEGER NOT NULL,
                stored_name TEXT,
                original_name TEXT,
                average_rating REAL NOT NULL DEFAULT 0,
                grade_id INTEGER NOT NULL REFERENCES grades(id),
                type_of_work_id INTEGER NOT NULL REFERENCES types_of_work(id),
                subject_id INTEGER NOT NULL REFERENCES subjects(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // One review per (author, page) is a hard invariant
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY,
                rate INTEGER NOT NULL,
                comment TEXT NOT NULL,
                created INTEGER NOT NULL,
                author_id INTEGER NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
                page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
                UNIQUE(author_id, page_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY,
                teacher_id INTEGER NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
                message TEXT NOT NULL,
                link TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Performance indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_settlements_region ON settlements(region_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_institutions_settlement
             ON educational_institutions(settlement_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_teacher ON pages(teacher_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_created ON pages(created)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_stored_name ON pages(stored_name)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_page ON reviews(page_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_teacher_unread
             ON notifications(teacher_id, is_read)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_followers_followed ON followers(followed_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_token ON sessions(token)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Begin a transaction - caller is responsible for commit/rollback
    pub async fn begin_transaction(&self) -> Result<sqlx::Transaction<'_, sqlx::Sqlite>> {
        Ok(self.pool.begin().await?)
    }
}
