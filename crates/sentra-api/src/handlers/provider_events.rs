//! Provider webhook: bounce and complaint ingestion
//!
//! The upstream mail provider posts delivery events here, signed with a
//! shared secret over the raw body. Events are keyed by provider message
//! id, so a replayed webhook never double-counts, and bounced or
//! complaining addresses land on the owner's suppression list.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use sentra_common::token::verify_payload_signature;
use sentra_common::types::{EventType, SuppressionSource};
use sentra_storage::models::{CreateEvent, CreateSuppression};
use sentra_storage::repository::{
    CampaignRepository, EventRepository, SendJobRepository, SuppressionRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::AppState;
use crate::handlers::{ApiError, ErrorResponse};

/// Signature header set by the provider
pub const SIGNATURE_HEADER: &str = "x-sentra-signature";

/// One provider delivery event
#[derive(Debug, Deserialize)]
pub struct ProviderEvent {
    pub provider_msg_id: String,
    /// "bounce" or "complaint"
    pub event_type: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Webhook payload
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub events: Vec<ProviderEvent>,
}

/// Ingestion outcome
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub accepted: usize,
    pub skipped: usize,
}

/// Ingest provider delivery events
///
/// POST /hooks/email-events
pub async fn email_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook without signature header");
            unauthorized()
        })?;

    if !verify_payload_signature(&body, signature, &state.config.tracking.secret) {
        warn!("Webhook signature mismatch");
        return Err(unauthorized());
    }

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!("Webhook body unparseable: {}", e);
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "validation_error".to_string(),
                message: "Malformed webhook payload".to_string(),
            }),
        )
    })?;

    let jobs = SendJobRepository::new(state.db_pool.pool().clone());
    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());
    let events = EventRepository::new(state.db_pool.pool().clone());
    let suppressions = SuppressionRepository::new(state.db_pool.pool().clone());

    let mut accepted = 0;
    let mut skipped = 0;

    for incoming in payload.events {
        let (event_type, source) = match incoming.event_type.as_str() {
            "bounce" => (EventType::Bounce, SuppressionSource::Bounce),
            "complaint" => (EventType::Complaint, SuppressionSource::Complaint),
            other => {
                debug!("Ignoring provider event type: {}", other);
                skipped += 1;
                continue;
            }
        };

        let job = match jobs.get_by_provider_msg_id(&incoming.provider_msg_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(
                    provider_msg_id = %incoming.provider_msg_id,
                    "Provider event for unknown message"
                );
                skipped += 1;
                continue;
            }
            Err(e) => {
                warn!("Failed to resolve provider message: {}", e);
                skipped += 1;
                continue;
            }
        };

        let mut event =
            CreateEvent::bare(job.campaign_id, job.tracking_id, &job.email, event_type);
        event.provider_msg_id = Some(incoming.provider_msg_id.clone());
        event.raw = json!({ "reason": incoming.reason });

        match events.append(event).await {
            // None means this (provider_msg_id, event_type) was already seen
            Ok(None) => {
                skipped += 1;
                continue;
            }
            Ok(Some(_)) => accepted += 1,
            Err(e) => {
                warn!("Failed to record provider event: {}", e);
                skipped += 1;
                continue;
            }
        }

        let owner_id = match campaigns.get(job.campaign_id).await {
            Ok(Some(campaign)) => campaign.owner_id,
            _ => continue,
        };

        if let Err(e) = suppressions
            .create(CreateSuppression {
                owner_id,
                email: job.email.clone(),
                source,
                campaign_id: Some(job.campaign_id),
            })
            .await
        {
            warn!("Failed to suppress {}: {}", job.email, e);
        }
    }

    info!(accepted, skipped, "Provider webhook processed");

    Ok(Json(WebhookResponse { accepted, skipped }))
}

fn unauthorized() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "unauthorized".to_string(),
            message: "Invalid webhook signature".to_string(),
        }),
    )
}
