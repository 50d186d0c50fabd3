use sqlx::{QueryBuilder, Row, Sqlite};
use std::sync::Arc;

use crate::database::Database;
use crate::error::AppResult;
use crate::models::Page;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Case-insensitive substring over page name, description and author
    /// full name.
    pub term: Option<String>,
    /// Empty list means no restriction for that dimension.
    pub subject_ids: Vec<i64>,
    pub grade_ids: Vec<i64>,
    pub work_type_ids: Vec<i64>,
    /// 1-indexed.
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PageSummary {
    #[serde(flatten)]
    pub page: Page,
    pub author_username: String,
    pub author_full_name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResult {
    pub items: Vec<PageSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Clone)]
pub struct SearchService {
    db: Arc<Database>,
}

impl SearchService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Newest-first filtered listing with 1-indexed pagination. The total
    /// is counted over the same filter so has_next/has_prev stay honest.
    pub async fn search_pages(&self, query: &SearchQuery) -> AppResult<SearchResult> {
        let page = query.page.max(1);
        let per_page = query.per_page.max(1);

        let mut count_qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM pages p JOIN teachers t ON t.id = p.teacher_id",
        );
        Self::push_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.db.pool)
            .await?
            .get(0);

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT p.id, p.name, p.description, p.teacher_id, p.created, p.stored_name,
                    p.original_name, p.average_rating, p.grade_id, p.type_of_work_id, p.subject_id,
                    t.username, t.full_name
             FROM pages p JOIN teachers t ON t.id = p.teacher_id",
        );
        Self::push_filters(&mut qb, query);
        qb.push(" ORDER BY p.created DESC, p.id DESC LIMIT ");
        qb.push_bind(per_page);
        qb.push(" OFFSET ");
        qb.push_bind((page - 1) * per_page);

        let rows = qb.build().fetch_all(&self.db.pool).await?;
        let items = rows
            .iter()
            .map(|row| PageSummary {
                page: Page::from_row(row),
                author_username: row.get("username"),
                author_full_name: row.get("full_name"),
            })
            .collect();

        Ok(SearchResult {
            items,
            total,
            page,
            per_page,
            has_next: page * per_page < total,
            has_prev: page > 1,
        })
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &SearchQuery) {
        qb.push(" WHERE 1 = 1");

        if let Some(term) = query.term.as_deref().filter(|t| !t.is_empty()) {
            qb.push(
                " AND (lower(p.name) LIKE '%' || lower(",
            );
            qb.push_bind(term.to_string());
            qb.push(
                ") || '%' OR lower(coalesce(p.description, '')) LIKE '%' || lower(",
            );
            qb.push_bind(term.to_string());
            qb.push(") || '%' OR lower(t.full_name) LIKE '%' || lower(");
            qb.push_bind(term.to_string());
            qb.push(") || '%')");
        }

        Self::push_id_filter(qb, "p.subject_id", &query.subject_ids);
        Self::push_id_filter(qb, "p.grade_id", &query.grade_ids);
        Self::push_id_filter(qb, "p.type_of_work_id", &query.work_type_ids);
    }

    fn push_id_filter(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: &[i64]) {
        if ids.is_empty() {
            return;
        }
        qb.push(format!(" AND {} IN (", column));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");
    }
}
