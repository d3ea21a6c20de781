//! Schedule poller: fires due triggers, sweeps completions, purges expiry

use sentra_common::types::CampaignStatus;
use sentra_storage::repository::{
    CampaignRepository, LinkMappingRepository, ScheduleRepository, SendJobRepository,
};
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};

use crate::fanout::FanOut;

/// Background poller for scheduled dispatch and campaign housekeeping
pub struct SchedulePoller {
    schedules: ScheduleRepository,
    campaigns: CampaignRepository,
    jobs: SendJobRepository,
    links: LinkMappingRepository,
    fanout: FanOut,
    poll_interval_secs: u64,
    batch_size: i64,
}

impl SchedulePoller {
    /// Create a new poller
    pub fn new(
        schedules: ScheduleRepository,
        campaigns: CampaignRepository,
        jobs: SendJobRepository,
        links: LinkMappingRepository,
        fanout: FanOut,
    ) -> Self {
        Self {
            schedules,
            campaigns,
            jobs,
            links,
            fanout,
            poll_interval_secs: 5,
            batch_size: 20,
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Run the poller loop
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.poll_interval_secs));

        info!(
            "Schedule poller started (interval: {}s)",
            self.poll_interval_secs
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.fire_due_triggers().await {
                error!("Error firing due triggers: {}", e);
            }

            if let Err(e) = self.sweep_completions().await {
                error!("Error sweeping campaign completions: {}", e);
            }

            match self.links.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!("Purged {} expired link mappings", purged),
                Err(e) => warn!("Error purging link mappings: {}", e),
            }
        }
    }

    /// Start campaigns whose trigger time arrived. The claim deletes the
    /// trigger row and the status CAS guards against a concurrent
    /// immediate dispatch, so a campaign can never be both scheduled and
    /// sending.
    async fn fire_due_triggers(&self) -> anyhow::Result<()> {
        let due = self.schedules.claim_due(self.batch_size).await?;

        for trigger in due {
            let updated = self
                .campaigns
                .transition(
                    trigger.campaign_id,
                    &[CampaignStatus::Scheduled],
                    CampaignStatus::Sending,
                )
                .await?;

            let Some(campaign) = updated else {
                // Trashed, or another path already started it
                debug!(
                    campaign_id = %trigger.campaign_id,
                    "Trigger fired but campaign was not scheduled; skipping"
                );
                continue;
            };

            info!(campaign_id = %campaign.id, "Scheduled campaign starting");

            if let Err(e) = self.fanout.run(&campaign).await {
                error!(campaign_id = %campaign.id, "Fan-out failed: {}", e);
                self.campaigns
                    .transition(campaign.id, &[CampaignStatus::Sending], CampaignStatus::Failed)
                    .await?;
            }
        }

        Ok(())
    }

    /// Close out sending campaigns whose queue drained. All jobs
    /// dead-lettered means the campaign failed; any delivery means it
    /// sent.
    async fn sweep_completions(&self) -> anyhow::Result<()> {
        let sending = self.campaigns.list_sending(self.batch_size).await?;

        for campaign in sending {
            let stats = self.jobs.stats(campaign.id).await?;

            // Fan-out may not have created jobs yet
            if stats.total() == 0 || !stats.is_drained() {
                continue;
            }

            let outcome = if stats.sent == 0 && stats.dead == stats.total() {
                CampaignStatus::Failed
            } else {
                CampaignStatus::Sent
            };

            info!(
                campaign_id = %campaign.id,
                sent = stats.sent,
                dead = stats.dead,
                "Campaign complete: {}",
                outcome
            );

            self.campaigns
                .transition(campaign.id, &[CampaignStatus::Sending], outcome)
                .await?;
        }

        Ok(())
    }
}
