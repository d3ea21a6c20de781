//! Public tracking handlers
//!
//! These endpoints face email clients, not API users, and they degrade
//! silently: an unknown or malformed identifier still gets the pixel, the
//! safe redirect, or the confirmation page. Nothing here leaks whether a
//! tracking id exists.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use sentra_common::token::verify_tracking_token;
use sentra_common::types::{EventType, SuppressionSource};
use sentra_core::render::TRACKING_PIXEL_PNG;
use sentra_storage::models::{CreateEvent, CreateSuppression};
use sentra_storage::repository::{
    CampaignRepository, EventRepository, LinkMappingRepository, SendJobRepository,
    SuppressionRepository,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AppState;

/// Client facts extracted from request headers
#[derive(Debug, Clone, Default)]
struct ClientInfo {
    user_agent: Option<String>,
    ip_address: Option<String>,
    country: Option<String>,
    referrer: Option<String>,
}

impl ClientInfo {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        // Country comes from the CDN when one fronts the service
        let country = header("cloudfront-viewer-country").or_else(|| header("cf-ipcountry"));

        let ip_address = header("x-forwarded-for")
            .map(|raw| raw.split(',').next().unwrap_or("").trim().to_string())
            .filter(|ip| !ip.is_empty());

        Self {
            user_agent: header("user-agent"),
            ip_address,
            country,
            referrer: header("referer"),
        }
    }

    fn apply(self, event: &mut CreateEvent) {
        event.user_agent = self.user_agent;
        event.ip_address = self.ip_address;
        event.country = self.country;
        event.referrer = self.referrer;
    }
}

fn pixel_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        TRACKING_PIXEL_PNG,
    )
        .into_response()
}

/// Record an open and serve the pixel. The pixel is returned no matter
/// what.
///
/// GET /track/open/:tracking_id
pub async fn track_open(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Ok(tracking_id) = tracking_id.parse::<Uuid>() else {
        debug!("Open ping with malformed tracking id");
        return pixel_response();
    };

    let jobs = SendJobRepository::new(state.db_pool.pool().clone());
    let job = match jobs.get_by_tracking_id(tracking_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            debug!(%tracking_id, "Open ping for unknown tracking id");
            return pixel_response();
        }
        Err(e) => {
            warn!(%tracking_id, "Failed to resolve open ping: {}", e);
            return pixel_response();
        }
    };

    let mut event = CreateEvent::bare(job.campaign_id, tracking_id, &job.email, EventType::Open);
    ClientInfo::from_headers(&headers).apply(&mut event);

    let events = EventRepository::new(state.db_pool.pool().clone());
    if let Err(e) = events.append(event).await {
        warn!(%tracking_id, "Failed to record open event: {}", e);
    }

    pixel_response()
}

/// Record a click and redirect. Unknown or expired tokens go to the safe
/// default instead of an error page.
///
/// GET /track/click/:token
pub async fn track_click(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Redirect {
    let safe = Redirect::temporary(&state.config.tracking.safe_redirect_url);

    let Ok(token) = token.parse::<Uuid>() else {
        debug!("Click with malformed token");
        return safe;
    };

    let links = LinkMappingRepository::new(state.db_pool.pool().clone());
    let mapping = match links.get_alive(token).await {
        Ok(Some(mapping)) => mapping,
        Ok(None) => {
            debug!(%token, "Click token unknown or expired");
            return safe;
        }
        Err(e) => {
            warn!(%token, "Failed to resolve click token: {}", e);
            return safe;
        }
    };

    let mut event = CreateEvent::bare(
        mapping.campaign_id,
        mapping.tracking_id,
        &mapping.email,
        EventType::Click,
    );
    event.link_url = Some(mapping.original_url.clone());
    ClientInfo::from_headers(&headers).apply(&mut event);

    let events = EventRepository::new(state.db_pool.pool().clone());
    if let Err(e) = events.append(event).await {
        warn!(%token, "Failed to record click event: {}", e);
    }

    Redirect::temporary(&mapping.original_url)
}

const UNSUBSCRIBE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Unsubscribed</title></head>
<body style="font-family: sans-serif; max-width: 32rem; margin: 4rem auto;">
<h1>You're unsubscribed</h1>
<p>You will no longer receive emails from this sender.</p>
</body>
</html>"#;

/// Suppress the recipient and show a confirmation page. The page is shown
/// even for invalid tokens so the link in an old email never breaks.
///
/// GET /unsubscribe/:token
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Html<&'static str> {
    let page = Html(UNSUBSCRIBE_PAGE);

    let Some(tracking_id) = verify_tracking_token(&token, &state.config.tracking.secret) else {
        warn!("Unsubscribe with invalid token");
        return page;
    };

    let jobs = SendJobRepository::new(state.db_pool.pool().clone());
    let job = match jobs.get_by_tracking_id(tracking_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!(%tracking_id, "Unsubscribe for unknown tracking id");
            return page;
        }
        Err(e) => {
            warn!(%tracking_id, "Failed to resolve unsubscribe: {}", e);
            return page;
        }
    };

    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());
    let owner_id = match campaigns.get(job.campaign_id).await {
        Ok(Some(campaign)) => campaign.owner_id,
        Ok(None) | Err(_) => {
            warn!(campaign_id = %job.campaign_id, "Unsubscribe could not resolve campaign owner");
            return page;
        }
    };

    let suppressions = SuppressionRepository::new(state.db_pool.pool().clone());
    if let Err(e) = suppressions
        .create(CreateSuppression {
            owner_id,
            email: job.email.clone(),
            source: SuppressionSource::Unsubscribe,
            campaign_id: Some(job.campaign_id),
        })
        .await
    {
        warn!(%tracking_id, "Failed to record suppression: {}", e);
    }

    let mut event = CreateEvent::bare(
        job.campaign_id,
        tracking_id,
        &job.email,
        EventType::Unsubscribe,
    );
    ClientInfo::from_headers(&headers).apply(&mut event);

    let events = EventRepository::new(state.db_pool.pool().clone());
    if let Err(e) = events.append(event).await {
        warn!(%tracking_id, "Failed to record unsubscribe event: {}", e);
    }

    page
}
