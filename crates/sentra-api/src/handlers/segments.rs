//! Segment handlers
//!
//! Segments store a deduplicated, case-normalized address set. Every write
//! path funnels through the same normalization, so the stored list never
//! contains duplicates or unparseable addresses.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use sentra_common::types::{normalize_email, SegmentStatus};
use sentra_core::normalize_recipients;
use sentra_storage::models::{CreateSegment, Segment, UpdateSegment};
use sentra_storage::repository::SegmentRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};
use crate::handlers::{db_error, not_found, validation_error, ApiError};

/// Longest accepted segment name
pub const MAX_NAME_LEN: usize = 100;

/// Longest accepted segment description
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Most addresses a single segment may hold
pub const MAX_SEGMENT_EMAILS: usize = 10_000;

/// Most offending addresses named in a validation error
const MAX_NAMED_INVALID: usize = 5;

/// Query parameters for listing segments
#[derive(Debug, Deserialize)]
pub struct ListSegmentsQuery {
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

/// Segment response
#[derive(Debug, Serialize)]
pub struct SegmentResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub emails: Vec<String>,
    pub contact_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Segment> for SegmentResponse {
    fn from(s: Segment) -> Self {
        let contact_count = s.contact_count();
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            emails: s.emails,
            contact_count,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Request body for creating a segment
#[derive(Debug, Deserialize)]
pub struct CreateSegmentRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

/// Request body for updating a segment
#[derive(Debug, Deserialize)]
pub struct UpdateSegmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub emails: Option<Vec<String>>,
}

/// Request body for adding or removing addresses
#[derive(Debug, Deserialize)]
pub struct SegmentEmailsRequest {
    pub emails: Vec<String>,
}

/// Per-segment derived contact count
#[derive(Debug, Serialize)]
pub struct SegmentCount {
    pub segment_id: Uuid,
    pub contact_count: i64,
}

fn validate_metadata(name: Option<&str>, description: Option<&str>) -> Result<(), ApiError> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(validation_error("Segment name is required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(validation_error(format!(
                "Segment name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
    }

    if let Some(description) = description {
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(validation_error(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }

    Ok(())
}

/// Normalize an incoming address list, rejecting the request when any
/// entry fails to parse. The error names up to [`MAX_NAMED_INVALID`]
/// offenders.
fn normalize_or_reject(raw: &[String]) -> Result<Vec<String>, ApiError> {
    let invalid: Vec<&str> = raw
        .iter()
        .map(String::as_str)
        .filter(|entry| normalize_email(entry).is_none())
        .collect();

    if !invalid.is_empty() {
        let named = invalid
            .iter()
            .take(MAX_NAMED_INVALID)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        let message = if invalid.len() > MAX_NAMED_INVALID {
            format!(
                "Invalid email addresses: {} (and {} more)",
                named,
                invalid.len() - MAX_NAMED_INVALID
            )
        } else {
            format!("Invalid email addresses: {}", named)
        };
        return Err(validation_error(message));
    }

    Ok(normalize_recipients(raw.iter().map(String::as_str)))
}

fn check_size(emails: &[String]) -> Result<(), ApiError> {
    if emails.len() > MAX_SEGMENT_EMAILS {
        return Err(validation_error(format!(
            "A segment can hold at most {} addresses",
            MAX_SEGMENT_EMAILS
        )));
    }
    Ok(())
}

/// Create a segment
///
/// POST /api/v1/segments
pub async fn create_segment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateSegmentRequest>,
) -> Result<(StatusCode, Json<SegmentResponse>), ApiError> {
    validate_metadata(Some(&input.name), input.description.as_deref())?;

    let emails = normalize_or_reject(&input.emails)?;
    check_size(&emails)?;

    let repo = SegmentRepository::new(state.db_pool.pool().clone());
    let segment = repo
        .create(CreateSegment {
            owner_id: auth.user_id,
            name: input.name.trim().to_string(),
            description: input.description,
            emails,
        })
        .await
        .map_err(|e| db_error("Failed to create segment", e))?;

    info!(segment_id = %segment.id, "Segment created");

    Ok((StatusCode::CREATED, Json(segment.into())))
}

/// List active segments
///
/// GET /api/v1/segments
pub async fn list_segments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListSegmentsQuery>,
) -> Result<Json<Vec<SegmentResponse>>, ApiError> {
    let repo = SegmentRepository::new(state.db_pool.pool().clone());

    let segments = repo
        .list_by_owner(auth.user_id, query.limit, query.offset)
        .await
        .map_err(|e| db_error("Failed to list segments", e))?;

    Ok(Json(segments.into_iter().map(Into::into).collect()))
}

/// Get a segment
///
/// GET /api/v1/segments/:id
pub async fn get_segment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let repo = SegmentRepository::new(state.db_pool.pool().clone());

    let segment = repo
        .get(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to load segment", e))?
        .ok_or_else(|| not_found("Segment not found"))?;

    Ok(Json(segment.into()))
}

/// Update a segment's metadata or replace its address list
///
/// PUT /api/v1/segments/:id
pub async fn update_segment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSegmentRequest>,
) -> Result<Json<SegmentResponse>, ApiError> {
    validate_metadata(input.name.as_deref(), input.description.as_deref())?;

    let emails = input.emails.as_deref().map(normalize_or_reject).transpose()?;
    if let Some(emails) = &emails {
        check_size(emails)?;
    }

    let repo = SegmentRepository::new(state.db_pool.pool().clone());
    let segment = repo
        .update(
            auth.user_id,
            id,
            UpdateSegment {
                name: input.name.map(|n| n.trim().to_string()),
                description: input.description,
                emails,
            },
        )
        .await
        .map_err(|e| db_error("Failed to update segment", e))?
        .ok_or_else(|| not_found("Segment not found"))?;

    Ok(Json(segment.into()))
}

/// Delete a segment. Soft by default; `?permanent=true` removes it for
/// good.
///
/// DELETE /api/v1/segments/:id
pub async fn delete_segment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    let target = if query.permanent {
        SegmentStatus::Deleted
    } else {
        SegmentStatus::Trashed
    };

    let repo = SegmentRepository::new(state.db_pool.pool().clone());
    let removed = repo
        .set_status(auth.user_id, id, target)
        .await
        .map_err(|e| db_error("Failed to delete segment", e))?;

    if !removed {
        return Err(not_found("Segment not found"));
    }

    info!(segment_id = %id, permanent = query.permanent, "Segment deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Add addresses to a segment
///
/// POST /api/v1/segments/:id/emails
pub async fn add_segment_emails(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<SegmentEmailsRequest>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let repo = SegmentRepository::new(state.db_pool.pool().clone());

    let segment = repo
        .get(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to load segment", e))?
        .ok_or_else(|| not_found("Segment not found"))?;

    let added = normalize_or_reject(&input.emails)?;

    // Re-normalize the merged list; existing entries keep their position
    let merged: Vec<&str> = segment
        .emails
        .iter()
        .map(String::as_str)
        .chain(added.iter().map(String::as_str))
        .collect();
    let emails = normalize_recipients(merged);
    check_size(&emails)?;

    let segment = repo
        .set_emails(auth.user_id, id, &emails)
        .await
        .map_err(|e| db_error("Failed to update segment", e))?
        .ok_or_else(|| not_found("Segment not found"))?;

    Ok(Json(segment.into()))
}

/// Remove addresses from a segment
///
/// DELETE /api/v1/segments/:id/emails
pub async fn remove_segment_emails(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<SegmentEmailsRequest>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let repo = SegmentRepository::new(state.db_pool.pool().clone());

    let segment = repo
        .get(auth.user_id, id)
        .await
        .map_err(|e| db_error("Failed to load segment", e))?
        .ok_or_else(|| not_found("Segment not found"))?;

    let to_remove: HashSet<String> = normalize_or_reject(&input.emails)?.into_iter().collect();

    let emails: Vec<String> = segment
        .emails
        .into_iter()
        .filter(|email| !to_remove.contains(email))
        .collect();

    let segment = repo
        .set_emails(auth.user_id, id, &emails)
        .await
        .map_err(|e| db_error("Failed to update segment", e))?
        .ok_or_else(|| not_found("Segment not found"))?;

    Ok(Json(segment.into()))
}

/// Recompute contact counts for all active segments
///
/// POST /api/v1/segments/refresh-counts
pub async fn refresh_counts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<SegmentCount>>, ApiError> {
    let repo = SegmentRepository::new(state.db_pool.pool().clone());

    let counts = repo
        .contact_counts(auth.user_id)
        .await
        .map_err(|e| db_error("Failed to compute contact counts", e))?;

    Ok(Json(
        counts
            .into_iter()
            .map(|(segment_id, contact_count)| SegmentCount {
                segment_id,
                contact_count,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_or_reject_accepts_and_dedups() {
        let emails = vec![
            "A@x.com".to_string(),
            "a@x.com".to_string(),
            "b@x.com".to_string(),
        ];
        assert_eq!(
            normalize_or_reject(&emails).unwrap(),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
    }

    #[test]
    fn test_normalize_or_reject_names_offenders() {
        let emails = vec![
            "ok@x.com".to_string(),
            "not-an-email".to_string(),
            "@nope.com".to_string(),
        ];
        let err = normalize_or_reject(&emails).unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.1.message.contains("not-an-email"));
        assert!(err.1.message.contains("@nope.com"));
        assert!(!err.1.message.contains("ok@x.com"));
    }

    #[test]
    fn test_normalize_or_reject_caps_named_offenders() {
        let emails: Vec<String> = (0..8).map(|i| format!("bad{}", i)).collect();
        let err = normalize_or_reject(&emails).unwrap_err();
        assert!(err.1.message.contains("bad4"));
        assert!(!err.1.message.contains("bad5"));
        assert!(err.1.message.contains("(and 3 more)"));
    }
}
