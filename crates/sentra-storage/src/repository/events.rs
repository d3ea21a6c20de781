//! Event repository: append-only log every analytics answer derives from

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateEvent, Event};

/// Filters applied when reading a campaign's event slice
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub country: Option<String>,
}

/// Event repository
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Create a new event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an event. Partial unique indexes make `sent` events (per
    /// tracking id) and provider webhook events (per provider message id)
    /// idempotent; a suppressed duplicate returns `None`.
    pub async fn append(&self, input: CreateEvent) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, campaign_id, tracking_id, email, event_type, provider_msg_id,
                user_agent, ip_address, country, referrer, link_url, raw
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(input.tracking_id)
        .bind(&input.email)
        .bind(input.event_type.to_string())
        .bind(&input.provider_msg_id)
        .bind(&input.user_agent)
        .bind(&input.ip_address)
        .bind(&input.country)
        .bind(&input.referrer)
        .bind(&input.link_url)
        .bind(&input.raw)
        .fetch_optional(&self.pool)
        .await
    }

    /// Read a campaign's event slice, oldest first
    pub async fn list_by_campaign(
        &self,
        campaign_id: Uuid,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events
            WHERE campaign_id = $1
              AND ($2::TIMESTAMPTZ IS NULL OR occurred_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR occurred_at <= $3)
              AND ($4::TEXT IS NULL OR country = $4)
            ORDER BY occurred_at
            "#,
        )
        .bind(campaign_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(&filter.country)
        .fetch_all(&self.pool)
        .await
    }

    /// Count events per type for a campaign
    pub async fn count_by_type(&self, campaign_id: Uuid) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT event_type, COUNT(*) FROM events WHERE campaign_id = $1 GROUP BY event_type",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }
}
