//! Campaign dispatch: the immediate/scheduled decision and both paths

use chrono::{DateTime, Utc};
use sentra_common::types::CampaignStatus;
use sentra_common::{Error, Result};
use sentra_storage::models::Campaign;
use sentra_storage::repository::{CampaignRepository, ScheduleRepository};
use tracing::{error, info, warn};

use crate::fanout::FanOut;

/// Campaigns whose target time is at most this far away dispatch
/// immediately; anything further registers a one-shot trigger.
pub const IMMEDIATE_THRESHOLD_SECS: i64 = 60;

/// Which path a campaign takes at dispatch time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    Immediate,
    Scheduled,
}

/// Decide the dispatch path from the target timestamp.
///
/// A missing timestamp means "now". The threshold is inclusive, and past
/// timestamps always dispatch immediately.
pub fn decide(now: DateTime<Utc>, schedule_at: Option<DateTime<Utc>>) -> DispatchPath {
    let delta = schedule_at
        .map(|at| (at - now).num_seconds())
        .unwrap_or(0);

    if delta <= IMMEDIATE_THRESHOLD_SECS {
        DispatchPath::Immediate
    } else {
        DispatchPath::Scheduled
    }
}

/// Result of dispatching a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Fan-out started; the campaign is sending
    Started,
    /// A trigger was registered; the campaign is scheduled
    Scheduled(DateTime<Utc>),
}

/// Runs the dispatch decision against the database
#[derive(Clone)]
pub struct CampaignDispatcher {
    campaigns: CampaignRepository,
    schedules: ScheduleRepository,
    fanout: FanOut,
}

impl CampaignDispatcher {
    /// Create a new dispatcher
    pub fn new(
        campaigns: CampaignRepository,
        schedules: ScheduleRepository,
        fanout: FanOut,
    ) -> Self {
        Self {
            campaigns,
            schedules,
            fanout,
        }
    }

    /// Dispatch a draft campaign down the immediate or scheduled path.
    ///
    /// Scheduled-path ordering matters: the trigger is registered before
    /// the status moves, so a failure anywhere leaves the campaign in
    /// draft and the caller sees the error. Trigger registration is keyed
    /// by campaign id, so retrying after a partial failure is idempotent.
    pub async fn dispatch(&self, campaign: &Campaign) -> Result<DispatchOutcome> {
        let now = Utc::now();

        match decide(now, campaign.schedule_at) {
            DispatchPath::Immediate => self.start_now(campaign.id).await,
            DispatchPath::Scheduled => {
                // decide() only picks this path when schedule_at is set
                let fire_at = campaign.schedule_at.ok_or_else(|| {
                    Error::Internal("scheduled path without schedule_at".to_string())
                })?;

                self.schedules
                    .register(campaign.id, fire_at)
                    .await
                    .map_err(|e| Error::Database(format!("Trigger registration failed: {}", e)))?;

                let updated = self
                    .campaigns
                    .transition(campaign.id, &[CampaignStatus::Draft], CampaignStatus::Scheduled)
                    .await
                    .map_err(|e| Error::Database(e.to_string()))?;

                if updated.is_none() {
                    // Lost the race; drop the trigger we just registered
                    let _ = self.schedules.remove(campaign.id).await;
                    return Err(Error::Conflict(
                        "Campaign is no longer a draft".to_string(),
                    ));
                }

                info!(campaign_id = %campaign.id, %fire_at, "Campaign scheduled");
                Ok(DispatchOutcome::Scheduled(fire_at))
            }
        }
    }

    /// Move a campaign into sending and fan it out in the background
    pub async fn start_now(&self, campaign_id: uuid::Uuid) -> Result<DispatchOutcome> {
        let updated = self
            .campaigns
            .transition(
                campaign_id,
                &[CampaignStatus::Draft, CampaignStatus::Scheduled],
                CampaignStatus::Sending,
            )
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let Some(campaign) = updated else {
            return Err(Error::Conflict(
                "Campaign cannot start from its current status".to_string(),
            ));
        };

        info!(campaign_id = %campaign.id, "Campaign dispatch started");

        let fanout = self.fanout.clone();
        let campaigns = self.campaigns.clone();
        tokio::spawn(async move {
            match fanout.run(&campaign).await {
                Ok(summary) => {
                    info!(
                        campaign_id = %campaign.id,
                        created = summary.jobs_created,
                        suppressed = summary.suppressed,
                        "Fan-out complete"
                    );
                }
                Err(e) => {
                    error!(campaign_id = %campaign.id, "Fan-out failed: {}", e);
                    if let Err(e) = campaigns
                        .transition(campaign.id, &[CampaignStatus::Sending], CampaignStatus::Failed)
                        .await
                    {
                        warn!(campaign_id = %campaign.id, "Failed to mark campaign failed: {}", e);
                    }
                }
            }
        });

        Ok(DispatchOutcome::Started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_timestamp_is_immediate() {
        assert_eq!(decide(Utc::now(), None), DispatchPath::Immediate);
    }

    #[test]
    fn test_past_timestamp_is_immediate() {
        let now = Utc::now();
        assert_eq!(
            decide(now, Some(now - Duration::hours(2))),
            DispatchPath::Immediate
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let now = Utc::now();
        assert_eq!(
            decide(now, Some(now + Duration::seconds(IMMEDIATE_THRESHOLD_SECS))),
            DispatchPath::Immediate
        );
        assert_eq!(
            decide(
                now,
                Some(now + Duration::seconds(IMMEDIATE_THRESHOLD_SECS + 1))
            ),
            DispatchPath::Scheduled
        );
    }

    #[test]
    fn test_far_future_is_scheduled() {
        let now = Utc::now();
        assert_eq!(
            decide(now, Some(now + Duration::days(3))),
            DispatchPath::Scheduled
        );
    }
}
