//! Content assist handlers

use axum::{extract::State, http::StatusCode, Extension, Json};
use sentra_core::analytics::compute_report;
use sentra_core::{GeneratedEmail, InsightsReport};
use sentra_storage::repository::{CampaignRepository, EventFilter, EventRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};
use crate::handlers::{
    db_error, error_response, not_found, validation_error, ApiError, ErrorResponse,
};

/// Request body for email generation
#[derive(Debug, Deserialize)]
pub struct GenerateEmailRequest {
    pub brief: String,
    pub tone: Option<String>,
    pub audience: Option<String>,
}

/// Request body for subject line generation
#[derive(Debug, Deserialize)]
pub struct SubjectLinesRequest {
    pub topic: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    5
}

/// Subject line candidates
#[derive(Debug, Serialize)]
pub struct SubjectLinesResponse {
    pub subject_lines: Vec<String>,
}

/// Request body for campaign insights
#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
    pub campaign_id: Uuid,
}

fn require_enabled(state: &AppState) -> Result<(), ApiError> {
    if state.ai.is_enabled() {
        return Ok(());
    }
    Err((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "not_configured".to_string(),
            message: "AI content assist is not configured".to_string(),
        }),
    ))
}

/// Generate an email draft from a brief
///
/// POST /api/v1/ai/generate-email
pub async fn generate_email(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
    Json(input): Json<GenerateEmailRequest>,
) -> Result<Json<GeneratedEmail>, ApiError> {
    require_enabled(&state)?;

    if input.brief.trim().is_empty() {
        return Err(validation_error("A brief is required"));
    }

    let email = state
        .ai
        .generate_email(&input.brief, input.tone.as_deref(), input.audience.as_deref())
        .await
        .map_err(error_response)?;

    Ok(Json(email))
}

/// Generate candidate subject lines
///
/// POST /api/v1/ai/subject-lines
pub async fn subject_lines(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
    Json(input): Json<SubjectLinesRequest>,
) -> Result<Json<SubjectLinesResponse>, ApiError> {
    require_enabled(&state)?;

    if input.topic.trim().is_empty() {
        return Err(validation_error("A topic is required"));
    }

    let subject_lines = state
        .ai
        .subject_lines(&input.topic, input.count)
        .await
        .map_err(error_response)?;

    Ok(Json(SubjectLinesResponse { subject_lines }))
}

/// Narrate a campaign's analytics
///
/// POST /api/v1/ai/insights
pub async fn campaign_insights(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<InsightsRequest>,
) -> Result<Json<InsightsReport>, ApiError> {
    require_enabled(&state)?;

    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());
    let campaign = campaigns
        .get_owned(auth.user_id, input.campaign_id)
        .await
        .map_err(|e| db_error("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    let events = EventRepository::new(state.db_pool.pool().clone())
        .list_by_campaign(campaign.id, &EventFilter::default())
        .await
        .map_err(|e| db_error("Failed to load events", e))?;

    let report = compute_report(&events);

    // The model sees aggregates, never recipient addresses
    let summary = json!({
        "name": campaign.name,
        "subject": campaign.subject,
        "status": campaign.status,
        "total_recipients": campaign.total_recipients,
        "started_at": campaign.started_at,
        "completed_at": campaign.completed_at,
    });
    let mut report_json = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
    if let Some(obj) = report_json.as_object_mut() {
        obj.remove("recipients");
    }

    let insights = state
        .ai
        .campaign_insights(&summary, &report_json)
        .await
        .map_err(error_response)?;

    Ok(Json(insights))
}
