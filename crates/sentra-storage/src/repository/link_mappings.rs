//! Link mapping repository: click tokens to destination URLs

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateLinkMapping, LinkMapping};

/// Link mapping repository
#[derive(Clone)]
pub struct LinkMappingRepository {
    pool: PgPool,
}

impl LinkMappingRepository {
    /// Create a new link mapping repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store mappings for all rewritten links of one rendered email
    pub async fn create_batch(&self, mappings: &[CreateLinkMapping]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for mapping in mappings {
            sqlx::query(
                r#"
                INSERT INTO link_mappings (
                    id, tracking_id, campaign_id, email, link_index, original_url, expires_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(mapping.id)
            .bind(mapping.tracking_id)
            .bind(mapping.campaign_id)
            .bind(&mapping.email)
            .bind(mapping.link_index)
            .bind(&mapping.original_url)
            .bind(mapping.expires_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Resolve an unexpired click token
    pub async fn get_alive(&self, id: Uuid) -> Result<Option<LinkMapping>, sqlx::Error> {
        sqlx::query_as::<_, LinkMapping>(
            "SELECT * FROM link_mappings WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete expired mappings, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM link_mappings WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
