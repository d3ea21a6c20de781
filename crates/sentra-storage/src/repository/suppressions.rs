//! Suppression repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateSuppression, Suppression};

/// Suppression repository
#[derive(Clone)]
pub struct SuppressionRepository {
    pool: PgPool,
}

impl SuppressionRepository {
    /// Create a new suppression repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Suppress an address for an owner. Re-suppression refreshes the
    /// source and campaign attribution.
    pub async fn create(&self, input: CreateSuppression) -> Result<Suppression, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Suppression>(
            r#"
            INSERT INTO suppressions (id, owner_id, email, source, campaign_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id, email) DO UPDATE SET
                source = EXCLUDED.source,
                campaign_id = COALESCE(EXCLUDED.campaign_id, suppressions.campaign_id),
                created_at = NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.owner_id)
        .bind(&input.email)
        .bind(input.source.to_string())
        .bind(input.campaign_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Check if an address is suppressed for an owner
    pub async fn is_suppressed(&self, owner_id: Uuid, email: &str) -> Result<bool, sqlx::Error> {
        let result: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM suppressions WHERE owner_id = $1 AND email = $2)",
        )
        .bind(owner_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.0)
    }

    /// Of the given addresses, return the ones that ARE suppressed
    pub async fn filter_suppressed(
        &self,
        owner_id: Uuid,
        emails: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        let result: Vec<(String,)> = sqlx::query_as(
            "SELECT email FROM suppressions WHERE owner_id = $1 AND email = ANY($2)",
        )
        .bind(owner_id)
        .bind(emails)
        .fetch_all(&self.pool)
        .await?;

        Ok(result.into_iter().map(|(email,)| email).collect())
    }

    /// List suppressions for an owner
    pub async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Suppression>, sqlx::Error> {
        sqlx::query_as::<_, Suppression>(
            r#"
            SELECT * FROM suppressions
            WHERE owner_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Remove a suppression (re-subscribe)
    pub async fn delete(&self, owner_id: Uuid, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM suppressions WHERE owner_id = $1 AND email = $2")
            .bind(owner_id)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
