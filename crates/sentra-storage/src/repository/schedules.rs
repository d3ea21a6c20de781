//! Campaign schedule repository: one-shot dispatch triggers
//!
//! `campaign_id` is the primary key, so a campaign can carry at most one
//! trigger and re-registering after a partial failure is a no-op upsert.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CampaignSchedule;

/// Schedule repository
#[derive(Clone)]
pub struct ScheduleRepository {
    pool: PgPool,
}

impl ScheduleRepository {
    /// Create a new schedule repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register (or move) the trigger for a campaign
    pub async fn register(
        &self,
        campaign_id: Uuid,
        fire_at: DateTime<Utc>,
    ) -> Result<CampaignSchedule, sqlx::Error> {
        sqlx::query_as::<_, CampaignSchedule>(
            r#"
            INSERT INTO campaign_schedules (campaign_id, fire_at)
            VALUES ($1, $2)
            ON CONFLICT (campaign_id) DO UPDATE SET fire_at = EXCLUDED.fire_at
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(fire_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Claim due triggers. Claimed rows are deleted in the same statement;
    /// `SKIP LOCKED` keeps concurrent pollers from firing the same
    /// campaign twice.
    pub async fn claim_due(&self, limit: i64) -> Result<Vec<CampaignSchedule>, sqlx::Error> {
        sqlx::query_as::<_, CampaignSchedule>(
            r#"
            DELETE FROM campaign_schedules
            WHERE campaign_id IN (
                SELECT campaign_id FROM campaign_schedules
                WHERE fire_at <= NOW()
                ORDER BY fire_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Drop the trigger for a campaign, e.g. when it is trashed
    pub async fn remove(&self, campaign_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM campaign_schedules WHERE campaign_id = $1")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Look up the trigger for a campaign
    pub async fn get(&self, campaign_id: Uuid) -> Result<Option<CampaignSchedule>, sqlx::Error> {
        sqlx::query_as::<_, CampaignSchedule>(
            "SELECT * FROM campaign_schedules WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
    }
}
