//! Send job repository: the per-recipient delivery queue

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{SendJob, SendJobStats};

/// Send job repository
#[derive(Clone)]
pub struct SendJobRepository {
    pool: PgPool,
}

impl SendJobRepository {
    /// Create a new send job repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fan a campaign out into one pending job per recipient.
    ///
    /// `(campaign_id, email)` is unique, so replaying fan-out never
    /// duplicates a recipient; returns the number of rows actually added.
    pub async fn create_batch(
        &self,
        campaign_id: Uuid,
        emails: &[String],
        max_attempts: i32,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut created = 0u64;

        for email in emails {
            let result = sqlx::query(
                r#"
                INSERT INTO send_jobs (id, campaign_id, email, tracking_id, max_attempts)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (campaign_id, email) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(campaign_id)
            .bind(email)
            .bind(Uuid::new_v4())
            .bind(max_attempts)
            .execute(&mut *tx)
            .await?;

            created += result.rows_affected();
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Claim a batch of due jobs. `FOR UPDATE SKIP LOCKED` lets concurrent
    /// workers drain the queue without stepping on each other; claimed jobs
    /// have their attempt counter bumped up front so a crash mid-send still
    /// burns an attempt.
    pub async fn claim_due(&self, limit: i64) -> Result<Vec<SendJob>, sqlx::Error> {
        sqlx::query_as::<_, SendJob>(
            r#"
            UPDATE send_jobs
            SET attempts = attempts + 1, updated_at = NOW()
            WHERE id IN (
                SELECT id FROM send_jobs
                WHERE status IN ('pending', 'failed')
                  AND scheduled_at <= NOW()
                ORDER BY scheduled_at
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

    /// Get a job by its tracking id
    pub async fn get_by_tracking_id(
        &self,
        tracking_id: Uuid,
    ) -> Result<Option<SendJob>, sqlx::Error> {
        sqlx::query_as::<_, SendJob>("SELECT * FROM send_jobs WHERE tracking_id = $1")
            .bind(tracking_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a job by the provider message id recorded at delivery
    pub async fn get_by_provider_msg_id(
        &self,
        provider_msg_id: &str,
    ) -> Result<Option<SendJob>, sqlx::Error> {
        sqlx::query_as::<_, SendJob>("SELECT * FROM send_jobs WHERE provider_msg_id = $1")
            .bind(provider_msg_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Mark a job delivered
    pub async fn mark_sent(
        &self,
        id: Uuid,
        provider_msg_id: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE send_jobs
            SET status = 'sent', provider_msg_id = $2, last_error = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(provider_msg_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Schedule a retry after a transient failure
    pub async fn schedule_retry(
        &self,
        id: Uuid,
        retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE send_jobs
            SET status = 'failed', scheduled_at = $2, last_error = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(retry_at)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Dead-letter a job: permanent failure or attempts exhausted
    pub async fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE send_jobs
            SET status = 'dead', last_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Job counts per status for a campaign
    pub async fn stats(&self, campaign_id: Uuid) -> Result<SendJobStats, sqlx::Error> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM send_jobs WHERE campaign_id = $1 GROUP BY status",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = SendJobStats::default();
        for (status, count) in rows {
            match status.as_str() {
                "pending" => stats.pending = count,
                "sent" => stats.sent = count,
                "failed" => stats.failed = count,
                "dead" => stats.dead = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// List dead-lettered jobs for a campaign
    pub async fn list_dead(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<SendJob>, sqlx::Error> {
        sqlx::query_as::<_, SendJob>(
            r#"
            SELECT * FROM send_jobs
            WHERE campaign_id = $1 AND status = 'dead'
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
