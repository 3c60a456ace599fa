use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{ClothingCandidate, ClothingCategory},
};

/// Read-only view of the clothing catalog
///
/// The catalog itself is maintained elsewhere; this only lists candidates
/// for a recommendation run, most frequently selected first.
#[async_trait]
pub trait ClothingCatalog: Send + Sync {
    async fn list_candidates(
        &self,
        category: Option<ClothingCategory>,
        limit: i64,
    ) -> AppResult<Vec<ClothingCandidate>>;
}

#[derive(Clone)]
pub struct PgClothingCatalog {
    pool: PgPool,
}

impl PgClothingCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClothingCatalog for PgClothingCatalog {
    async fn list_candidates(
        &self,
        category: Option<ClothingCategory>,
        limit: i64,
    ) -> AppResult<Vec<ClothingCandidate>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT id, name, category
            FROM clothing_item
            WHERE ($1::text IS NULL OR category = $1)
            ORDER BY selected_count DESC, id ASC
            LIMIT $2
            "#,
        )
        .bind(category.map(|c| c.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .into_iter()
            .filter_map(|(clothing_id, name, category)| match category.parse() {
                Ok(category) => Some(ClothingCandidate {
                    clothing_id,
                    name,
                    category,
                }),
                Err(e) => {
                    tracing::warn!(clothing_id, error = %e, "Skipping catalog row");
                    None
                }
            })
            .collect();

        Ok(candidates)
    }
}
