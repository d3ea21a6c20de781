//! API key authentication
//!
//! Every key is `sk_` followed by random URL-safe base64. Only a SHA-256
//! hash and an 8-character prefix are stored; the full key is shown once
//! at creation and cannot be recovered.

use argon2::password_hash::{rand_core::OsRng as ArgonOsRng, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sentra_common::Config;
use sentra_core::{CampaignDispatcher, ContentClient};
use sentra_storage::repository::UserRepository;
use sentra_storage::DatabasePool;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Length of the stored key prefix used for lookup
pub const API_KEY_PREFIX_LEN: usize = 8;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub config: Config,
    pub dispatcher: CampaignDispatcher,
    pub ai: Arc<ContentClient>,
}

/// Authenticated context extracted from an API key
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
}

/// A freshly generated API key and its storable parts
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// The full key; shown to the caller exactly once
    pub key: String,
    pub prefix: String,
    pub hash: String,
}

/// Generate a new `sk_` API key
pub fn generate_api_key() -> GeneratedApiKey {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let key = format!("sk_{}", URL_SAFE_NO_PAD.encode(bytes));

    GeneratedApiKey {
        prefix: key[..API_KEY_PREFIX_LEN].to_string(),
        hash: hash_api_key(&key),
        key,
    }
}

/// Hash an API key for storage and comparison
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password with Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut ArgonOsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .ok()
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Extract an API key from the Authorization or X-API-Key header
pub fn extract_api_key(req: &Request) -> Option<&str> {
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(key) = auth_str.strip_prefix("Bearer ") {
                return Some(key);
            }
        }
    }

    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str);
        }
    }

    None
}

/// Validate an API key against the database
async fn validate_api_key(db_pool: &DatabasePool, api_key: &str) -> Result<AuthContext, StatusCode> {
    if !api_key.starts_with("sk_") || api_key.len() < API_KEY_PREFIX_LEN {
        warn!("Malformed API key");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let prefix = &api_key[..API_KEY_PREFIX_LEN];
    let repo = UserRepository::new(db_pool.pool().clone());

    // The prefix narrows candidates; the hash decides
    let candidates = repo.find_by_api_key_prefix(prefix).await.map_err(|e| {
        error!("Database error while looking up API key: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let hash = hash_api_key(api_key);
    for candidate in candidates {
        if candidate.api_key_hash == hash {
            debug!(user_id = %candidate.id, "API key authenticated");
            return Ok(AuthContext {
                user_id: candidate.id,
                email: candidate.email,
            });
        }
    }

    warn!("API key hash mismatch for prefix: {}", prefix);
    Err(StatusCode::UNAUTHORIZED)
}

/// Authentication middleware for the private API surface
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let api_key = extract_api_key(&request).ok_or_else(|| {
        warn!("Missing API key in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    let auth_context = validate_api_key(&state.db_pool, api_key).await?;

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_key_shape() {
        let generated = generate_api_key();
        assert!(generated.key.starts_with("sk_"));
        assert_eq!(generated.prefix.len(), API_KEY_PREFIX_LEN);
        assert_eq!(generated.prefix, &generated.key[..API_KEY_PREFIX_LEN]);
        assert_eq!(generated.hash, hash_api_key(&generated.key));
    }

    #[test]
    fn test_keys_are_unique() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not a phc string"));
    }
}
