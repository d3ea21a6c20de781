//! Common types for Sentra

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for segments
pub type SegmentId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for send jobs
pub type SendJobId = Uuid;

/// Unique identifier for events
pub type EventId = Uuid;

/// Per-recipient tracking identifier (unguessable, UUIDv4)
pub type TrackingId = Uuid;

/// Unique identifier for suppressions
pub type SuppressionId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse and validate an email address from a string.
    ///
    /// Accepts `local@domain.tld` where the local part uses
    /// `[A-Za-z0-9._%+-]`, the domain uses `[A-Za-z0-9.-]`, and the
    /// final label is at least two ASCII letters.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (local, domain) = s.split_once('@')?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }
        if !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'))
        {
            return None;
        }
        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        {
            return None;
        }
        let tld = domain.rsplit('.').next()?;
        if tld.len() < 2 || domain == tld || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self::new(local, domain))
    }

    /// Lowercased canonical form used for deduplication and suppression.
    pub fn normalized(&self) -> String {
        format!("{}@{}", self.local, self.domain).to_lowercase()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::Validation("Invalid email address".to_string()))
    }
}

/// Validate and canonicalize a single address: trim, validate, lowercase.
pub fn normalize_email(s: &str) -> Option<String> {
    EmailAddress::parse(s).map(|e| e.normalized())
}

/// Campaign lifecycle. The one place these states are defined; storage,
/// workers, and the API all speak this enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
    Trashed,
    Deleted,
}

impl CampaignStatus {
    /// Whether the campaign can still be edited
    pub fn is_editable(&self) -> bool {
        matches!(self, CampaignStatus::Draft)
    }

    /// Whether the campaign reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Sent
                | CampaignStatus::Failed
                | CampaignStatus::Trashed
                | CampaignStatus::Deleted
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Scheduled => write!(f, "scheduled"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Sent => write!(f, "sent"),
            CampaignStatus::Failed => write!(f, "failed"),
            CampaignStatus::Trashed => write!(f, "trashed"),
            CampaignStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "sent" => Ok(CampaignStatus::Sent),
            "failed" => Ok(CampaignStatus::Failed),
            "trashed" => Ok(CampaignStatus::Trashed),
            "deleted" => Ok(CampaignStatus::Deleted),
            other => Err(crate::Error::Validation(format!(
                "Unknown campaign status: {other}"
            ))),
        }
    }
}

/// How a campaign was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    Immediate,
    Scheduled,
}

impl std::fmt::Display for CampaignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignKind::Immediate => write!(f, "immediate"),
            CampaignKind::Scheduled => write!(f, "scheduled"),
        }
    }
}

impl std::str::FromStr for CampaignKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(CampaignKind::Immediate),
            "scheduled" => Ok(CampaignKind::Scheduled),
            other => Err(crate::Error::Validation(format!(
                "Unknown campaign kind: {other}"
            ))),
        }
    }
}

/// Segment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Active,
    Trashed,
    Deleted,
}

impl std::fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentStatus::Active => write!(f, "active"),
            SegmentStatus::Trashed => write!(f, "trashed"),
            SegmentStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for SegmentStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SegmentStatus::Active),
            "trashed" => Ok(SegmentStatus::Trashed),
            "deleted" => Ok(SegmentStatus::Deleted),
            other => Err(crate::Error::Validation(format!(
                "Unknown segment status: {other}"
            ))),
        }
    }
}

/// Send job lifecycle. `Failed` jobs await a retry; `Dead` jobs exhausted
/// their attempts or failed permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendJobStatus {
    Pending,
    Sent,
    Failed,
    Dead,
}

impl std::fmt::Display for SendJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendJobStatus::Pending => write!(f, "pending"),
            SendJobStatus::Sent => write!(f, "sent"),
            SendJobStatus::Failed => write!(f, "failed"),
            SendJobStatus::Dead => write!(f, "dead"),
        }
    }
}

impl std::str::FromStr for SendJobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SendJobStatus::Pending),
            "sent" => Ok(SendJobStatus::Sent),
            "failed" => Ok(SendJobStatus::Failed),
            "dead" => Ok(SendJobStatus::Dead),
            other => Err(crate::Error::Validation(format!(
                "Unknown send job status: {other}"
            ))),
        }
    }
}

/// Event log entry types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Sent,
    Open,
    Click,
    Bounce,
    Complaint,
    Unsubscribe,
    Failed,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Sent => write!(f, "sent"),
            EventType::Open => write!(f, "open"),
            EventType::Click => write!(f, "click"),
            EventType::Bounce => write!(f, "bounce"),
            EventType::Complaint => write!(f, "complaint"),
            EventType::Unsubscribe => write!(f, "unsubscribe"),
            EventType::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(EventType::Sent),
            "open" => Ok(EventType::Open),
            "click" => Ok(EventType::Click),
            "bounce" => Ok(EventType::Bounce),
            "complaint" => Ok(EventType::Complaint),
            "unsubscribe" => Ok(EventType::Unsubscribe),
            "failed" => Ok(EventType::Failed),
            other => Err(crate::Error::Validation(format!(
                "Unknown event type: {other}"
            ))),
        }
    }
}

/// Where a suppression came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionSource {
    Unsubscribe,
    Bounce,
    Complaint,
    Manual,
}

impl std::fmt::Display for SuppressionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuppressionSource::Unsubscribe => write!(f, "unsubscribe"),
            SuppressionSource::Bounce => write!(f, "bounce"),
            SuppressionSource::Complaint => write!(f, "complaint"),
            SuppressionSource::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for SuppressionSource {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsubscribe" => Ok(SuppressionSource::Unsubscribe),
            "bounce" => Ok(SuppressionSource::Bounce),
            "complaint" => Ok(SuppressionSource::Complaint),
            "manual" => Ok(SuppressionSource::Manual),
            other => Err(crate::Error::Validation(format!(
                "Unknown suppression source: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_email_address_parse() {
        let email = EmailAddress::parse("User.Name+tag@Example.com").unwrap();
        assert_eq!(email.local, "User.Name+tag");
        assert_eq!(email.domain, "Example.com");
        assert_eq!(email.normalized(), "user.name+tag@example.com");
    }

    #[test]
    fn test_email_address_invalid() {
        assert!(EmailAddress::parse("invalid").is_none());
        assert!(EmailAddress::parse("@example.com").is_none());
        assert!(EmailAddress::parse("user@").is_none());
        assert!(EmailAddress::parse("user@example").is_none());
        assert!(EmailAddress::parse("user@example.c").is_none());
        assert!(EmailAddress::parse("user@example.c0m").is_none());
        assert!(EmailAddress::parse("us er@example.com").is_none());
        assert!(EmailAddress::parse("a@b@example.com").is_none());
    }

    #[test]
    fn test_normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Alice@Example.COM "),
            Some("alice@example.com".to_string())
        );
        assert_eq!(normalize_email("not-an-email"), None);
    }

    #[test]
    fn test_campaign_status_round_trip() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Sending,
            CampaignStatus::Sent,
            CampaignStatus::Failed,
            CampaignStatus::Trashed,
            CampaignStatus::Deleted,
        ] {
            assert_eq!(
                CampaignStatus::from_str(&status.to_string()).unwrap(),
                status
            );
        }
        assert!(CampaignStatus::from_str("SC").is_err());
    }

    #[test]
    fn test_campaign_status_editable() {
        assert!(CampaignStatus::Draft.is_editable());
        assert!(!CampaignStatus::Scheduled.is_editable());
        assert!(!CampaignStatus::Sending.is_editable());
        assert!(CampaignStatus::Sent.is_terminal());
        assert!(!CampaignStatus::Scheduled.is_terminal());
    }

    #[test]
    fn test_campaign_kind_round_trip() {
        for kind in [CampaignKind::Immediate, CampaignKind::Scheduled] {
            assert_eq!(CampaignKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert!(CampaignKind::from_str("ab_test").is_err());
    }

    #[test]
    fn test_event_type_round_trip() {
        for ty in [
            EventType::Sent,
            EventType::Open,
            EventType::Click,
            EventType::Bounce,
            EventType::Complaint,
            EventType::Unsubscribe,
            EventType::Failed,
        ] {
            assert_eq!(EventType::from_str(&ty.to_string()).unwrap(), ty);
        }
    }
}
