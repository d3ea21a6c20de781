//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, TimeZone, Utc};
use sentra_common::types::{normalize_email, CampaignKind, CampaignStatus};
use sentra_core::analytics::{compute_report, CampaignReport};
use sentra_core::{normalize_recipients, DispatchOutcome};
use sentra_storage::models::{Campaign, CreateCampaign, UpdateCampaign};
use sentra_storage::repository::{
    CampaignRepository, EventFilter, EventRepository, ScheduleRepository,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};
use crate::handlers::{
    db_error, error_response, not_found, validation_error, ApiError, ErrorResponse,
};

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Query parameters for deletion
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub permanent: bool,
}

/// Query parameters for the analytics report
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Inclusive lower bound, Unix seconds
    pub from_epoch: Option<i64>,
    /// Inclusive upper bound, Unix seconds
    pub to_epoch: Option<i64>,
    pub country: Option<String>,
}

/// Campaign response
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: Uuid,
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

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name,
            subject: c.subject,
            html_body: c.html_body,
            text_body: c.text_body,
            from_address: c.from_address,
            from_name: c.from_name,
            segment_id: c.segment_id,
            recipient_emails: c.recipient_emails,
            kind: c.kind,
            schedule_at: c.schedule_at,
            status: c.status,
            total_recipients: c.total_recipients,
            created_at: c.created_at,
            updated_at: c.updated_at,
            started_at: c.started_at,
            completed_at: c.completed_at,
        }
    }
}

/// Request body for creating a campaign
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    pub segment_id: Option<Uuid>,
    pub recipient_emails: Option<Vec<String>>,
    pub schedule_at: Option<DateTime<Utc>>,
    /// Dispatch immediately after creation instead of leaving a draft
    #[serde(default)]
    pub send_now: bool,
}

/// Request body for updating a draft campaign
#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub segment_id: Option<Uuid>,
    pub recipient_emails: Option<Vec<String>>,
    pub schedule_at: Option<DateTime<Utc>>,
}

/// Response for a dispatch request
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub campaign: CampaignResponse,
    /// "sending" or "scheduled"
    pub dispatch: String,
    pub fire_at: Option<DateTime<Utc>>,
}

/// Per-status campaign counts
#[derive(Debug, Serialize)]
pub struct CampaignStats {
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Analytics report response
#[derive(Debug, Serialize)]
pub struct CampaignEventsResponse {
    pub campaign_id: Uuid,
    pub status: String,
    pub report: CampaignReport,
}

fn validate_create(input: &CreateCampaignRequest) -> Result<(), ApiError> {
    if input.name.trim().is_empty() {
        return Err(validation_error("Campaign name is required"));
    }
    if input.subject.trim().is_empty() {
        return Err(validation_error("Subject is required"));
    }
    if normalize_email(&input.from_address).is_none() {
        return Err(validation_error("A valid from address is required"));
    }
    if input.html_body.is_none() && input.text_body.is_none() {
        return Err(validation_error(
            "Either html_body or text_body is required",
        ));
    }

    // Audience is a segment reference or an inline list, never both
    match (&input.segment_id, &input.recipient_emails) {
        (Some(_), Some(_)) => Err(validation_error(
            "Provide segment_id or recipient_emails, not both",
        )),
        (None, None) => Err(validation_error(
            "Provide segment_id or recipient_emails",
        )),
        (None, Some(emails)) if emails.is_empty() => {
            Err(validation_error("recipient_emails must not be empty"))
        }
        _ => Ok(()),
    }
}

/// Create a campaign, optionally dispatching it in the same request
///
/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<DispatchResponse>), ApiError> {
    validate_create(&input)?;

    let recipient_emails = input
        .recipient_emails
        .map(|raw| normalize_recipients(raw.iter().map(String::as_str)));

    let kind = if input.schedule_at.is_some() {
        CampaignKind::Scheduled
    } else {
        CampaignKind::Immediate
    };

    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let campaign = repo
        .create(CreateCampaign {
            owner_id: auth.user_id,
            name: input.name.trim().to_string(),
            subject: input.subject,
            html_body: input.html_body,
            text_body: input.text_body,
            from_address: input.from_address,
            from_name: input.from_name,
            segment_id: input.segment_id,
            recipient_emails,
            kind,
            schedule_at: input.schedule_at,
        })
        .await
        .map_err(|e| db_error("Failed to create campaign", e))?;

    info!(campaign_id = %campaign.id, "Campaign created");

    if !input.send_now {
        return Ok((
            StatusCode::CREATED,
            Json(DispatchResponse {
                campaign: campaign.into(),
                dispatch: "draft".to_string(),
                fire_at: None,
            }),
        ));
    }

    let outcome = state
        .dispatcher
        .dispatch(&campaign)
        .await
        .map_err(error_response)?;

    let campaign = repo
        .get_owned(auth.user_id, campaign.id)
        .await
        .map_err(|e| db_error("Failed to reload campaign", e))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    Ok((StatusCode::CREATED, Json(dispatch_response(campaign, outcome))))
}

fn dispatch_response(campaign: Campaign, outcome: DispatchOutcome) -> DispatchResponse {
    match outcome {
        DispatchOutcome::Started => DispatchResponse {
            campaign: campaign.into(),
            dispatch: "sending".to_string(),
            fire_at: None,
        },
        DispatchOutcome::Scheduled(fire_at) => DispatchResponse {
            campaign: campaign.into(),
            dispatch: "scheduled".to_string(),
            fire_at: Some(fire_at),
        },
    }
}

/// List campaigns, optionally filtered by status
///
/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<Vec<CampaignResponse>>, ApiError> {
    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<CampaignStatus>()
                .map_err(|_| validation_error(format!("Unknown status: {}", raw)))?,
        ),
        None => None,
    };

    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let campaigns = repo
        .list_by_owner(auth.user_id, status, query.limit, query.offset)
        .await
        .map_err(|e| db_error("Failed to list campaigns", e))?;

    Ok(Json(campaigns.into_iter().map(Into::into).collect()))
}

/// Per-status campaign counts
///
/// GET /api/v1/campaigns/stats
pub async fn campaign_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<CampaignStats>, ApiError> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let by_status = repo
        .count_by_status(auth.user_id)
        .await
        .map_err(|e| db_error("Failed to count campaigns", e))?
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();

    Ok(Json(CampaignStats { by_status }))
}

/// Get a campaign
///
/// GET /api/v1/campaigns/:id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, ApiError> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let campaign = repo
        .get_owned(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    Ok(Json(campaign.into()))
}

/// Resolve an audience change on update. A draft references a segment or
/// carries an inline list, never both; switching sides clears the other.
fn audience_update(
    segment_id: Option<Uuid>,
    recipient_emails: Option<Vec<String>>,
) -> Result<Option<(Option<Uuid>, Option<Vec<String>>)>, ApiError> {
    match (segment_id, recipient_emails) {
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Err(validation_error(
            "Provide segment_id or recipient_emails, not both",
        )),
        (Some(id), None) => Ok(Some((Some(id), None))),
        (None, Some(emails)) => {
            let emails = normalize_recipients(emails.iter().map(String::as_str));
            if emails.is_empty() {
                return Err(validation_error("recipient_emails must not be empty"));
            }
            Ok(Some((None, Some(emails))))
        }
    }
}

/// Update a campaign; only drafts are editable
///
/// PUT /api/v1/campaigns/:id
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, ApiError> {
    if let Some(from_address) = &input.from_address {
        if normalize_email(from_address).is_none() {
            return Err(validation_error("A valid from address is required"));
        }
    }

    let audience = audience_update(input.segment_id, input.recipient_emails)?;
    let set_audience = audience.is_some();
    let (segment_id, recipient_emails) = audience.unwrap_or((None, None));

    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let updated = repo
        .update(
            auth.user_id,
            id,
            UpdateCampaign {
                name: input.name,
                subject: input.subject,
                html_body: input.html_body,
                text_body: input.text_body,
                from_address: input.from_address,
                from_name: input.from_name,
                set_audience,
                segment_id,
                recipient_emails,
                schedule_at: input.schedule_at,
            },
        )
        .await
        .map_err(|e| db_error("Failed to update campaign", e))?;

    match updated {
        Some(campaign) => Ok(Json(campaign.into())),
        None => {
            // Distinguish "not yours" from "not editable"
            let existing = repo
                .get_owned(auth.user_id, id)
                .await
                .map_err(|e| db_error("Failed to load campaign", e))?;

            match existing {
                Some(_) => Err((
                    StatusCode::CONFLICT,
                    Json(ErrorResponse {
                        error: "conflict".to_string(),
                        message: "Only draft campaigns can be edited".to_string(),
                    }),
                )),
                None => Err(not_found("Campaign not found")),
            }
        }
    }
}

/// Delete a campaign. Soft by default; `?permanent=true` removes it from
/// every listing. A scheduled campaign's trigger is dropped so it can
/// never fire.
///
/// DELETE /api/v1/campaigns/:id
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let campaign = repo
        .get_owned(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    let (from, to): (&[CampaignStatus], CampaignStatus) = if query.permanent {
        (
            &[
                CampaignStatus::Draft,
                CampaignStatus::Scheduled,
                CampaignStatus::Sending,
                CampaignStatus::Sent,
                CampaignStatus::Failed,
                CampaignStatus::Trashed,
            ],
            CampaignStatus::Deleted,
        )
    } else {
        (
            &[
                CampaignStatus::Draft,
                CampaignStatus::Scheduled,
                CampaignStatus::Sending,
                CampaignStatus::Sent,
                CampaignStatus::Failed,
            ],
            CampaignStatus::Trashed,
        )
    };

    let updated = repo
        .transition(id, from, to)
        .await
        .map_err(|e| db_error("Failed to delete campaign", e))?;

    if updated.is_none() {
        return Err(not_found("Campaign not found"));
    }

    if campaign.status_enum() == Some(CampaignStatus::Scheduled) {
        let schedules = ScheduleRepository::new(state.db_pool.pool().clone());
        if let Err(e) = schedules.remove(id).await {
            error!(campaign_id = %id, "Failed to remove schedule trigger: {}", e);
        }
    }

    info!(campaign_id = %id, permanent = query.permanent, "Campaign deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Explicitly dispatch a draft campaign
///
/// POST /api/v1/campaigns/:id/send
pub async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let campaign = repo
        .get_owned(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    if campaign.status_enum() != Some(CampaignStatus::Draft) {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "conflict".to_string(),
                message: format!("Campaign is {}, only drafts can be sent", campaign.status),
            }),
        ));
    }

    if campaign.html_body.is_none() && campaign.text_body.is_none() {
        return Err(validation_error("Campaign has no body"));
    }

    let outcome = state
        .dispatcher
        .dispatch(&campaign)
        .await
        .map_err(error_response)?;

    let campaign = repo
        .get_owned(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to reload campaign", e))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    Ok(Json(dispatch_response(campaign, outcome)))
}

/// Server-computed analytics report over the campaign's event log
///
/// GET /api/v1/campaigns/:id/events
pub async fn campaign_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<CampaignEventsResponse>, ApiError> {
    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());

    let campaign = campaigns
        .get_owned(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    let parse_epoch = |secs: Option<i64>| -> Result<Option<DateTime<Utc>>, ApiError> {
        secs.map(|s| {
            Utc.timestamp_opt(s, 0)
                .single()
                .ok_or_else(|| validation_error("Invalid epoch timestamp"))
        })
        .transpose()
    };

    let filter = EventFilter {
        from: parse_epoch(query.from_epoch)?,
        to: parse_epoch(query.to_epoch)?,
        country: query.country,
    };

    let events = EventRepository::new(state.db_pool.pool().clone())
        .list_by_campaign(id, &filter)
        .await
        .map_err(|e| db_error("Failed to load events", e))?;

    Ok(Json(CampaignEventsResponse {
        campaign_id: campaign.id,
        status: campaign.status,
        report: compute_report(&events),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request() -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: "Launch".to_string(),
            subject: "We launched".to_string(),
            html_body: Some("<p>hello</p>".to_string()),
            text_body: None,
            from_address: "news@example.com".to_string(),
            from_name: None,
            segment_id: None,
            recipient_emails: Some(vec!["a@x.com".to_string()]),
            schedule_at: None,
            send_now: false,
        }
    }

    #[test]
    fn test_validate_accepts_inline_audience() {
        assert!(validate_create(&request()).is_ok());
    }

    #[test]
    fn test_validate_rejects_both_audiences() {
        let mut input = request();
        input.segment_id = Some(Uuid::new_v4());
        let err = validate_create(&input).unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_validate_rejects_missing_audience() {
        let mut input = request();
        input.recipient_emails = None;
        assert!(validate_create(&input).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_body() {
        let mut input = request();
        input.html_body = None;
        assert!(validate_create(&input).is_err());
    }

    #[test]
    fn test_audience_update_untouched_when_absent() {
        assert_eq!(audience_update(None, None).unwrap(), None);
    }

    #[test]
    fn test_audience_update_switch_to_inline_clears_segment() {
        let resolved = audience_update(
            None,
            Some(vec!["A@x.com".to_string(), "a@x.com".to_string()]),
        )
        .unwrap();
        assert_eq!(resolved, Some((None, Some(vec!["a@x.com".to_string()]))));
    }

    #[test]
    fn test_audience_update_switch_to_segment_clears_inline() {
        let segment_id = Uuid::new_v4();
        let resolved = audience_update(Some(segment_id), None).unwrap();
        assert_eq!(resolved, Some((Some(segment_id), None)));
    }

    #[test]
    fn test_audience_update_rejects_both_sides() {
        let err = audience_update(Some(Uuid::new_v4()), Some(vec!["a@x.com".to_string()]))
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_audience_update_rejects_empty_inline_list() {
        assert!(audience_update(None, Some(vec![])).is_err());
        assert!(audience_update(None, Some(vec!["garbage".to_string()])).is_err());
    }
}
