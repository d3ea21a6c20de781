//! Database models

use chrono::{DateTime, Utc};
use sentra_common::types::{
    CampaignKind, CampaignStatus, EventType, SegmentStatus, SendJobStatus, SuppressionSource,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform user (campaign owner)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub api_key_prefix: String,
    pub api_key_hash: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub api_key_prefix: String,
    pub api_key_hash: String,
}

/// Audience segment: a deduplicated, case-normalized set of addresses
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub emails: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    pub fn status_enum(&self) -> Option<SegmentStatus> {
        self.status.parse().ok()
    }

    /// Derived contact count; never stored
    pub fn contact_count(&self) -> usize {
        self.emails.len()
    }
}

/// Input for creating a segment
#[derive(Debug, Clone)]
pub struct CreateSegment {
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub emails: Vec<String>,
}

/// Input for updating a segment
#[derive(Debug, Clone, Default)]
pub struct UpdateSegment {
    pub name: Option<String>,
    pub description: Option<String>,
    pub emails: Option<Vec<String>>,
}

/// Email campaign
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    pub segment_id: Option<Uuid>,
    pub recipient_emails: Option<Vec<String>>,
    pub kind: String,
    pub schedule_at: Option<DateTime<Utc>>,
    pub status: String,
    pub total_recipients: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    pub fn kind_enum(&self) -> Option<CampaignKind> {
        self.kind.parse().ok()
    }
}

/// Input for creating a campaign
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub owner_id: Uuid,
    pub name: String,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    pub segment_id: Option<Uuid>,
    pub recipient_emails: Option<Vec<String>>,
    pub kind: CampaignKind,
    pub schedule_at: Option<DateTime<Utc>>,
}

/// Input for updating a draft campaign
#[derive(Debug, Clone, Default)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    /// When true, both audience columns are written as given; a campaign
    /// references a segment or carries an inline list, never both.
    pub set_audience: bool,
    pub segment_id: Option<Uuid>,
    pub recipient_emails: Option<Vec<String>>,
    pub schedule_at: Option<DateTime<Utc>>,
}

/// One-shot dispatch trigger, keyed by campaign
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignSchedule {
    pub campaign_id: Uuid,
    pub fire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Per-recipient delivery job
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SendJob {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub email: String,
    pub tracking_id: Uuid,
    pub status: String,
    pub provider_msg_id: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SendJob {
    pub fn status_enum(&self) -> Option<SendJobStatus> {
        self.status.parse().ok()
    }

    /// Whether another delivery attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Per-campaign job counts by status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendJobStats {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub dead: i64,
}

impl SendJobStats {
    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.failed + self.dead
    }

    /// No job can make further progress
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.failed == 0
    }
}

/// Append-only event log entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub tracking_id: Option<Uuid>,
    pub email: Option<String>,
    pub event_type: String,
    pub provider_msg_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub referrer: Option<String>,
    pub link_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}

impl Event {
    pub fn event_type_enum(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }
}

/// Input for appending an event
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub campaign_id: Uuid,
    pub tracking_id: Option<Uuid>,
    pub email: Option<String>,
    pub event_type: EventType,
    pub provider_msg_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub referrer: Option<String>,
    pub link_url: Option<String>,
    pub raw: serde_json::Value,
}

impl CreateEvent {
    /// Minimal event carrying only identity fields
    pub fn bare(campaign_id: Uuid, tracking_id: Uuid, email: &str, event_type: EventType) -> Self {
        Self {
            campaign_id,
            tracking_id: Some(tracking_id),
            email: Some(email.to_string()),
            event_type,
            provider_msg_id: None,
            user_agent: None,
            ip_address: None,
            country: None,
            referrer: None,
            link_url: None,
            raw: serde_json::Value::Object(Default::default()),
        }
    }
}

/// Click token mapping
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LinkMapping {
    pub id: Uuid,
    pub tracking_id: Uuid,
    pub campaign_id: Uuid,
    pub email: String,
    pub link_index: i32,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Input for creating a link mapping
#[derive(Debug, Clone)]
pub struct CreateLinkMapping {
    pub id: Uuid,
    pub tracking_id: Uuid,
    pub campaign_id: Uuid,
    pub email: String,
    pub link_index: i32,
    pub original_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Suppressed address, scoped to an owner
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Suppression {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub email: String,
    pub source: String,
    pub campaign_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Suppression {
    pub fn source_enum(&self) -> Option<SuppressionSource> {
        self.source.parse().ok()
    }
}

/// Input for creating a suppression
#[derive(Debug, Clone)]
pub struct CreateSuppression {
    pub owner_id: Uuid,
    pub email: String,
    pub source: SuppressionSource,
    pub campaign_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_job_stats_drained() {
        let stats = SendJobStats {
            pending: 0,
            sent: 4,
            failed: 0,
            dead: 1,
        };
        assert!(stats.is_drained());
        assert_eq!(stats.total(), 5);

        let busy = SendJobStats {
            pending: 1,
            ..Default::default()
        };
        assert!(!busy.is_drained());

        // Jobs awaiting retry still count as in flight
        let retrying = SendJobStats {
            failed: 2,
            ..Default::default()
        };
        assert!(!retrying.is_drained());
    }
}
