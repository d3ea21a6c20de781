//! Campaign repository

use sentra_common::types::CampaignStatus;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Campaign, CreateCampaign, UpdateCampaign};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new campaign in draft
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, owner_id, name, subject, html_body, text_body,
                from_address, from_name, segment_id, recipient_emails,
                kind, schedule_at, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'draft')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.owner_id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.html_body)
        .bind(&input.text_body)
        .bind(&input.from_address)
        .bind(&input.from_name)
        .bind(input.segment_id)
        .bind(&input.recipient_emails)
        .bind(input.kind.to_string())
        .bind(input.schedule_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a campaign by id
    pub async fn get(&self, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a campaign by id, scoped to its owner
    pub async fn get_owned(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns for an owner, optionally filtered by status.
    /// Trashed and deleted campaigns are excluded unless asked for.
    pub async fn list_by_owner(
        &self,
        owner_id: Uuid,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        match status {
            Some(status) => {
                sqlx::query_as::<_, Campaign>(
                    r#"
                    SELECT * FROM campaigns
                    WHERE owner_id = $1 AND status = $2
                    ORDER BY created_at DESC
                    LIMIT $3 OFFSET $4
                    "#,
                )
                .bind(owner_id)
                .bind(status.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Campaign>(
                    r#"
                    SELECT * FROM campaigns
                    WHERE owner_id = $1 AND status NOT IN ('trashed', 'deleted')
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
        }
    }

    /// Update a campaign; only drafts are editable. An audience change
    /// replaces both columns, so switching from a segment to an inline
    /// list (or back) clears the other side.
    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns
            SET name = COALESCE($3, name),
                subject = COALESCE($4, subject),
                html_body = COALESCE($5, html_body),
                text_body = COALESCE($6, text_body),
                from_address = COALESCE($7, from_address),
                from_name = COALESCE($8, from_name),
                segment_id = CASE WHEN $9::BOOL THEN $10 ELSE segment_id END,
                recipient_emails = CASE WHEN $9::BOOL THEN $11 ELSE recipient_emails END,
                schedule_at = COALESCE($12, schedule_at),
                updated_at = NOW()
            WHERE id = $1 AND owner_id = $2 AND status = 'draft'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.html_body)
        .bind(&input.text_body)
        .bind(&input.from_address)
        .bind(&input.from_name)
        .bind(input.set_audience)
        .bind(input.segment_id)
        .bind(&input.recipient_emails)
        .bind(input.schedule_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Compare-and-swap status transition. Returns the updated campaign
    /// only when the current status was one of `from`; a `None` means
    /// another path won the transition.
    pub async fn transition(
        &self,
        id: Uuid,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns
            SET status = $3,
                started_at = CASE WHEN $3 = 'sending' THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $3 IN ('sent', 'failed') THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&from)
        .bind(to.to_string())
        .fetch_optional(&self.pool)
        .await
    }

    /// Record the resolved audience size
    pub async fn set_total_recipients(&self, id: Uuid, total: i32) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET total_recipients = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Campaigns currently sending; used by completion sweeps
    pub async fn list_sending(&self, limit: i64) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE status = 'sending' ORDER BY started_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Count campaigns per status for an owner
    pub async fn count_by_status(&self, owner_id: Uuid) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT status, COUNT(*) FROM campaigns WHERE owner_id = $1 GROUP BY status",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }
}
