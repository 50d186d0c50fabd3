// Row types for the relational schema. Relations are carried as integer
// foreign keys, never as embedded object references.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub about: Option<String>,
    pub institution_id: Option<i64>,
}

impl Teacher {
    pub fn from_row(row: &SqliteRow) -> Self {
        Teacher {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            full_name: row.get("full_name"),
            about: row.get("about"),
            institution_id: row.get("institution_id"),
        }
    }
}

/// Lookup row shared by subjects, grades, work types, regions, settlements
/// and institutions wherever only `{id, name}` is needed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

impl NamedRef {
    pub fn from_row(row: &SqliteRow) -> Self {
        NamedRef {
            id: row.get("id"),
            name: row.get("name"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub teacher_id: i64,
    /// Creation time, unix seconds. Set once, never updated.
    pub created: i64,
    pub stored_name: Option<String>,
    pub original_name: Option<String>,
    pub average_rating: f64,
    pub grade_id: i64,
    pub type_of_work_id: i64,
    pub subject_id: i64,
}

impl Page {
    pub fn from_row(row: &SqliteRow) -> Self {
        Page {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            teacher_id: row.get("teacher_id"),
            created: row.get("created"),
            stored_name: row.get("stored_name"),
            original_name: row.get("original_name"),
            average_rating: row.get("average_rating"),
            grade_id: row.get("grade_id"),
            type_of_work_id: row.get("type_of_work_id"),
            subject_id: row.get("subject_id"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub rate: i64,
    pub comment: String,
    pub created: i64,
    pub author_id: i64,
    pub page_id: i64,
}

impl Review {
    pub fn from_row(row: &SqliteRow) -> Self {
        Review {
            id: row.get("id"),
            rate: row.get("rate"),
            comment: row.get("comment"),
            created: row.get("created"),
            author_id: row.get("author_id"),
            page_id: row.get("page_id"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub teacher_id: i64,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created: i64,
}

impl Notification {
    pub fn from_row(row: &SqliteRow) -> Self {
        Notification {
            id: row.get("id"),
            teacher_id: row.get("teacher_id"),
            message: row.get("message"),
            link: row.get("link"),
            is_read: row.get("is_read"),
            created: row.get("created"),
        }
    }
}
