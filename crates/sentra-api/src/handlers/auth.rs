//! Account handlers: registration, login, and API key management

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use sentra_common::types::normalize_email;
use sentra_storage::models::{CreateUser, User};
use sentra_storage::repository::UserRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{
    generate_api_key, hash_password, verify_password, AppState, AuthContext,
};
use crate::handlers::{db_error, validation_error, ApiError, ErrorResponse};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account info, never including secrets
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub api_key_prefix: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            api_key_prefix: u.api_key_prefix,
            created_at: u.created_at,
            last_login_at: u.last_login_at,
        }
    }
}

/// Registration response; the only time the full key is returned
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    /// Full API key; store it now, it cannot be shown again
    pub api_key: String,
}

/// Register a new account
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if input.name.trim().is_empty() {
        return Err(validation_error("Name is required"));
    }

    let email = normalize_email(&input.email)
        .ok_or_else(|| validation_error("A valid email address is required"))?;

    let min_len = state.config.auth.min_password_length;
    if input.password.len() < min_len {
        return Err(validation_error(format!(
            "Password must be at least {} characters",
            min_len
        )));
    }

    let password_hash = hash_password(&input.password).map_err(|e| {
        error!("Password hashing failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to create account".to_string(),
            }),
        )
    })?;

    let generated = generate_api_key();
    let repo = UserRepository::new(state.db_pool.pool().clone());

    let user = repo
        .create(CreateUser {
            name: input.name.trim().to_string(),
            email,
            password_hash,
            api_key_prefix: generated.prefix,
            api_key_hash: generated.hash,
        })
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                return (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse {
                        error: "conflict".to_string(),
                        message: "An account with this email already exists".to_string(),
                    }),
                );
            }
            db_error("Failed to create account", e)
        })?;

    info!(user_id = %user.id, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            api_key: generated.key,
        }),
    ))
}

/// Log in with email and password
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
                message: "Invalid email or password".to_string(),
            }),
        )
    };

    let email = normalize_email(&input.email).ok_or_else(unauthorized)?;
    let repo = UserRepository::new(state.db_pool.pool().clone());

    let user = repo
        .find_by_email(&email)
        .await
        .map_err(|e| db_error("Failed to look up account", e))?
        .ok_or_else(unauthorized)?;

    if !verify_password(&input.password, &user.password_hash) {
        return Err(unauthorized());
    }

    if let Err(e) = repo.touch_last_login(user.id).await {
        error!(user_id = %user.id, "Failed to record login: {}", e);
    }

    Ok(Json(user.into()))
}

/// Return the authenticated account
///
/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, ApiError> {
    let repo = UserRepository::new(state.db_pool.pool().clone());

    let user = repo
        .get(auth.user_id)
        .await
        .map_err(|e| db_error("Failed to load account", e))?
        .ok_or_else(|| crate::handlers::not_found("Account not found"))?;

    Ok(Json(user.into()))
}

/// Rotate the API key; the old key stops working immediately
///
/// POST /api/v1/auth/regenerate-key
pub async fn regenerate_key(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let generated = generate_api_key();
    let repo = UserRepository::new(state.db_pool.pool().clone());

    let user = repo
        .update_api_key(auth.user_id, &generated.prefix, &generated.hash)
        .await
        .map_err(|e| db_error("Failed to rotate API key", e))?
        .ok_or_else(|| crate::handlers::not_found("Account not found"))?;

    info!(user_id = %user.id, "API key rotated");

    Ok(Json(RegisterResponse {
        user: user.into(),
        api_key: generated.key,
    }))
}
