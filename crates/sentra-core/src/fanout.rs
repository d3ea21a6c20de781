//! Audience fan-out: resolve, normalize, suppress, enqueue

use sentra_common::types::{normalize_email, CampaignStatus};
use sentra_common::{Error, Result};
use sentra_storage::models::Campaign;
use sentra_storage::repository::{
    CampaignRepository, SegmentRepository, SendJobRepository, SuppressionRepository,
};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::worker::MAX_SEND_ATTEMPTS;

/// Canonicalize a recipient list: trim, validate, lowercase, and drop
/// duplicates while preserving first occurrence. Unparseable entries are
/// dropped.
pub fn normalize_recipients<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for entry in raw {
        let Some(email) = normalize_email(entry) else {
            continue;
        };
        if seen.insert(email.clone()) {
            out.push(email);
        }
    }

    out
}

/// What fan-out did for one campaign
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutSummary {
    /// Audience size after normalization and dedup
    pub resolved: usize,
    /// Addresses removed by the owner's suppression list
    pub suppressed: usize,
    /// Jobs actually inserted (idempotent replays insert fewer)
    pub jobs_created: u64,
}

/// Fans a sending campaign out into per-recipient send jobs
#[derive(Clone)]
pub struct FanOut {
    campaigns: CampaignRepository,
    segments: SegmentRepository,
    send_jobs: SendJobRepository,
    suppressions: SuppressionRepository,
}

impl FanOut {
    /// Create a new fan-out
    pub fn new(
        campaigns: CampaignRepository,
        segments: SegmentRepository,
        send_jobs: SendJobRepository,
        suppressions: SuppressionRepository,
    ) -> Self {
        Self {
            campaigns,
            segments,
            send_jobs,
            suppressions,
        }
    }

    /// Resolve the campaign audience: segment reference or inline list
    async fn resolve_audience(&self, campaign: &Campaign) -> Result<Vec<String>> {
        if let Some(segment_id) = campaign.segment_id {
            let segment = self
                .segments
                .get(campaign.owner_id, segment_id)
                .await
                .map_err(|e| Error::Database(e.to_string()))?
                .ok_or_else(|| Error::NotFound(format!("Segment {} not found", segment_id)))?;

            Ok(normalize_recipients(segment.emails.iter().map(String::as_str)))
        } else if let Some(emails) = &campaign.recipient_emails {
            Ok(normalize_recipients(emails.iter().map(String::as_str)))
        } else {
            Err(Error::Validation(
                "Campaign has neither a segment nor inline recipients".to_string(),
            ))
        }
    }

    /// Create one pending send job per eligible recipient.
    ///
    /// Jobs are keyed by `(campaign_id, email)`, so replaying fan-out after
    /// a crash never duplicates a recipient. An empty audience completes
    /// the campaign on the spot.
    pub async fn run(&self, campaign: &Campaign) -> Result<FanOutSummary> {
        let audience = self.resolve_audience(campaign).await?;
        let resolved = audience.len();

        let suppressed: HashSet<String> = self
            .suppressions
            .filter_suppressed(campaign.owner_id, &audience)
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .into_iter()
            .collect();

        let eligible: Vec<String> = audience
            .into_iter()
            .filter(|email| !suppressed.contains(email))
            .collect();

        let jobs_created = if eligible.is_empty() {
            0
        } else {
            self.send_jobs
                .create_batch(campaign.id, &eligible, MAX_SEND_ATTEMPTS)
                .await
                .map_err(|e| Error::Database(e.to_string()))?
        };

        self.campaigns
            .set_total_recipients(campaign.id, eligible.len() as i32)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        if eligible.is_empty() {
            warn!(campaign_id = %campaign.id, "Campaign has no eligible recipients");
            self.campaigns
                .transition(campaign.id, &[CampaignStatus::Sending], CampaignStatus::Sent)
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        }

        info!(
            campaign_id = %campaign.id,
            resolved,
            suppressed = suppressed.len(),
            jobs_created,
            "Fan-out resolved audience"
        );

        Ok(FanOutSummary {
            resolved,
            suppressed: suppressed.len(),
            jobs_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_dedups_case_insensitively() {
        let out = normalize_recipients(["a@x.com", "A@x.com", "b@x.com"]);
        assert_eq!(out, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
    }

    #[test]
    fn test_normalize_preserves_first_occurrence_order() {
        let out = normalize_recipients(["z@x.com", "a@x.com", "Z@X.COM"]);
        assert_eq!(out, vec!["z@x.com".to_string(), "a@x.com".to_string()]);
    }

    #[test]
    fn test_normalize_drops_invalid_and_trims() {
        let out = normalize_recipients(["  Ok@Example.org ", "not-an-email", "@nope.com"]);
        assert_eq!(out, vec!["ok@example.org".to_string()]);
    }
}
