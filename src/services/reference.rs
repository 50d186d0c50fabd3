// Read-only lookup data: subjects, grades, work types and the
// region -> settlement -> institution hierarchy. Seeded out-of-band; the
// request path only ever reads it. Handlers fetch these lists to validate
// submitted option ids before calling into the other services.

use std::sync::Arc;

use crate::database::Database;
use crate::error::AppResult;
use crate::models::NamedRef;

#[derive(Clone)]
pub struct ReferenceService {
    db: Arc<Database>,
}

impl ReferenceService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn named_list(&self, sql: &str) -> AppResult<Vec<NamedRef>> {
        let rows = sqlx::query(sql).fetch_all(&self.db.pool).await?;
        Ok(rows.iter().map(NamedRef::from_row).collect())
    }

    pub async fn subjects(&self) -> AppResult<Vec<NamedRef>> {
        self.named_list("SELECT id, name FROM subjects ORDER BY id")
            .await
    }

    pub async fn grades(&self) -> AppResult<Vec<NamedRef>> {
        self.named_list("SELECT id, name FROM grades ORDER BY id")
            .await
    }

    pub async fn types_of_work(&self) -> AppResult<Vec<NamedRef>> {
        self.named_list("SELECT id, name FROM types_of_work ORDER BY id")
            .await
    }

    pub async fn regions(&self) -> AppResult<Vec<NamedRef>> {
        self.named_list("SELECT id, name FROM regions ORDER BY id")
            .await
    }

    pub async fn institutions(&self) -> AppResult<Vec<NamedRef>> {
        self.named_list("SELECT id, name FROM educational_institutions ORDER BY id")
            .await
    }

    pub async fn settlements_by_region(&self, region_id: i64) -> AppResult<Vec<NamedRef>> {
        let rows = sqlx::query(
            "SELECT id, name FROM settlements WHERE region_id = ? ORDER BY name",
        )
        .bind(region_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().map(NamedRef::from_row).collect())
    }

    pub async fn institutions_by_settlement(&self, settlement_id: i64) -> AppResult<Vec<NamedRef>> {
        let rows = sqlx::query(
            "SELECT id, name FROM educational_institutions WHERE settlement_id = ? ORDER BY name",
        )
        .bind(settlement_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().map(NamedRef::from_row).collect())
    }
}

/// True when every submitted id appears in the allowed option set.
pub fn all_known(ids: &[i64], options: &[NamedRef]) -> bool {
    ids.iter().all(|id| options.iter().any(|o| o.id == *id))
}
