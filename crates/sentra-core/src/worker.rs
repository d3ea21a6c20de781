//! Send worker: drains the per-recipient delivery queue

use chrono::{Duration, Utc};
use sentra_common::config::{QueueConfig, TrackingConfig};
use sentra_common::types::{CampaignStatus, EventType};
use sentra_common::Result;
use sentra_storage::models::{CreateEvent, SendJob};
use sentra_storage::repository::{
    CampaignRepository, EventRepository, LinkMappingRepository, SendJobRepository,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};

use crate::mailer::{MailError, MailProvider, OutboundEmail};
use crate::render::EmailRenderer;

/// Delivery attempts before a job is dead-lettered
pub const MAX_SEND_ATTEMPTS: i32 = 5;

/// Exponential backoff, capped at four hours
pub fn calculate_backoff(attempts: i32) -> Duration {
    let minutes = 2i64.saturating_pow(attempts.max(0) as u32).min(240);
    Duration::minutes(minutes)
}

/// Background worker draining the send queue
#[derive(Clone)]
pub struct SendWorker {
    jobs: SendJobRepository,
    campaigns: CampaignRepository,
    events: EventRepository,
    links: LinkMappingRepository,
    provider: Arc<dyn MailProvider>,
    renderer: Arc<EmailRenderer>,
    poll_interval_secs: u64,
    batch_size: i64,
    concurrency: usize,
}

impl SendWorker {
    /// Create a new send worker
    pub fn new(
        jobs: SendJobRepository,
        campaigns: CampaignRepository,
        events: EventRepository,
        links: LinkMappingRepository,
        provider: Arc<dyn MailProvider>,
        tracking: &TrackingConfig,
        queue: &QueueConfig,
    ) -> Result<Self> {
        let renderer = EmailRenderer::new(
            &tracking.base_url,
            &tracking.secret,
            tracking.link_ttl_days,
        )?;

        Ok(Self {
            jobs,
            campaigns,
            events,
            links,
            provider,
            renderer: Arc::new(renderer),
            poll_interval_secs: queue.poll_interval_secs,
            batch_size: queue.batch_size,
            concurrency: queue.concurrency,
        })
    }

    /// Set concurrency limit
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit;
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = size;
        self
    }

    /// Run the worker loop
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.poll_interval_secs));
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        info!(
            "Send worker started (concurrency: {}, batch: {}, interval: {}s)",
            self.concurrency, self.batch_size, self.poll_interval_secs
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.process_due_jobs(&semaphore).await {
                error!("Error processing send queue: {}", e);
            }
        }
    }

    /// Claim and deliver one batch
    async fn process_due_jobs(&self, semaphore: &Arc<Semaphore>) -> anyhow::Result<()> {
        let jobs = self.jobs.claim_due(self.batch_size).await?;
        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Claimed {} due send jobs", jobs.len());

        let mut handles = Vec::new();
        for job in jobs {
            let permit = semaphore.clone().acquire_owned().await?;
            let worker = self.clone();

            handles.push(tokio::spawn(async move {
                worker.process_job(job).await;
                drop(permit);
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Send task panicked: {}", e);
            }
        }

        Ok(())
    }

    /// Deliver a single job end to end. The attempt counter was already
    /// bumped at claim time.
    async fn process_job(&self, job: SendJob) {
        let campaign = match self.campaigns.get(job.campaign_id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                error!(job_id = %job.id, "Campaign {} vanished", job.campaign_id);
                let _ = self.jobs.mark_dead(job.id, "campaign not found").await;
                return;
            }
            Err(e) => {
                error!(job_id = %job.id, "Failed to load campaign: {}", e);
                return;
            }
        };

        // Trashed or completed campaigns stop delivering
        if campaign.status_enum() != Some(CampaignStatus::Sending) {
            warn!(
                job_id = %job.id,
                status = %campaign.status,
                "Campaign no longer sending; dead-lettering job"
            );
            let _ = self.jobs.mark_dead(job.id, "campaign no longer sending").await;
            return;
        }

        let html = campaign
            .html_body
            .as_deref()
            .map(|body| self.renderer.render(body, &job, Utc::now()));

        if let Some(rendered) = &html {
            if !rendered.link_mappings.is_empty() {
                if let Err(e) = self.links.create_batch(&rendered.link_mappings).await {
                    error!(job_id = %job.id, "Failed to store link mappings: {}", e);
                    self.handle_failure(&job, &format!("link mappings: {}", e), true)
                        .await;
                    return;
                }
            }
        }

        let email = OutboundEmail {
            to: job.email.clone(),
            from_address: campaign.from_address.clone(),
            from_name: campaign.from_name.clone(),
            subject: campaign.subject.clone(),
            html_body: html.as_ref().map(|r| r.html.clone()),
            text_body: campaign.text_body.clone(),
        };

        match self.provider.send(&email).await {
            Ok(provider_msg_id) => {
                debug!(job_id = %job.id, %provider_msg_id, "Delivered");

                // Idempotent: a replayed job cannot double-count
                let mut event = CreateEvent::bare(
                    job.campaign_id,
                    job.tracking_id,
                    &job.email,
                    EventType::Sent,
                );
                event.provider_msg_id = Some(provider_msg_id.clone());
                if let Err(e) = self.events.append(event).await {
                    error!(job_id = %job.id, "Failed to record sent event: {}", e);
                }

                if let Err(e) = self.jobs.mark_sent(job.id, Some(&provider_msg_id)).await {
                    error!(job_id = %job.id, "Failed to mark job sent: {}", e);
                }
            }
            Err(MailError::Transient(error)) => {
                warn!(job_id = %job.id, "Transient delivery failure: {}", error);
                self.handle_failure(&job, &error, true).await;
            }
            Err(MailError::Permanent(error)) => {
                error!(job_id = %job.id, "Permanent delivery failure: {}", error);
                self.handle_failure(&job, &error, false).await;
            }
        }
    }

    /// Retry transient failures until attempts run out; everything else is
    /// dead-lettered with a failed event so the loss is visible downstream
    async fn handle_failure(&self, job: &SendJob, error: &str, retryable: bool) {
        if retryable && job.can_retry() {
            let retry_at = Utc::now() + calculate_backoff(job.attempts);
            if let Err(e) = self.jobs.schedule_retry(job.id, retry_at, error).await {
                error!(job_id = %job.id, "Failed to schedule retry: {}", e);
            }
            return;
        }

        if let Err(e) = self.jobs.mark_dead(job.id, error).await {
            error!(job_id = %job.id, "Failed to dead-letter job: {}", e);
        }

        let mut event = CreateEvent::bare(
            job.campaign_id,
            job.tracking_id,
            &job.email,
            EventType::Failed,
        );
        event.raw = serde_json::json!({ "error": error, "attempts": job.attempts });
        if let Err(e) = self.events.append(event).await {
            error!(job_id = %job.id, "Failed to record failed event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_grows_exponentially() {
        assert_eq!(calculate_backoff(0), Duration::minutes(1));
        assert_eq!(calculate_backoff(1), Duration::minutes(2));
        assert_eq!(calculate_backoff(3), Duration::minutes(8));
        assert_eq!(calculate_backoff(5), Duration::minutes(32));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(calculate_backoff(8), Duration::minutes(240));
        assert_eq!(calculate_backoff(30), Duration::minutes(240));
    }

    #[test]
    fn test_backoff_handles_negative_attempts() {
        assert_eq!(calculate_backoff(-1), Duration::minutes(1));
    }
}
