//! Signed tokens for unsubscribe links and webhook payloads
//!
//! Tracking ids are unguessable on their own, but unsubscribe links mutate
//! state, so they carry an HMAC-SHA256 signature over the tracking id.
//! Tokens look like `{uuid}.{hex_mac}`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

fn mac_hex(data: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Sign a tracking id into an unsubscribe token
pub fn sign_tracking_id(tracking_id: &Uuid, secret: &str) -> String {
    let id = tracking_id.to_string();
    let sig = mac_hex(id.as_bytes(), secret);
    format!("{}.{}", id, sig)
}

/// Verify an unsubscribe token, returning the tracking id when valid
pub fn verify_tracking_token(token: &str, secret: &str) -> Option<Uuid> {
    let (id, sig) = token.split_once('.')?;
    let tracking_id = Uuid::parse_str(id).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    let expected = hex::decode(sig).ok()?;
    mac.verify_slice(&expected).ok()?;

    Some(tracking_id)
}

/// Hex HMAC over an arbitrary payload, used to sign and verify webhook bodies
pub fn payload_signature(payload: &[u8], secret: &str) -> String {
    mac_hex(payload, secret)
}

/// Constant-time verification of a webhook payload signature
pub fn verify_payload_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    match hex::decode(signature) {
        Ok(expected) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sign_and_verify_round_trip() {
        let id = Uuid::new_v4();
        let token = sign_tracking_id(&id, "secret");
        assert_eq!(verify_tracking_token(&token, "secret"), Some(id));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let id = Uuid::new_v4();
        let token = sign_tracking_id(&id, "secret");
        assert_eq!(verify_tracking_token(&token, "other"), None);
    }

    #[test]
    fn test_verify_rejects_tampered_id() {
        let token = sign_tracking_id(&Uuid::new_v4(), "secret");
        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", Uuid::new_v4(), sig);
        assert_eq!(verify_tracking_token(&forged, "secret"), None);
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert_eq!(verify_tracking_token("not-a-token", "secret"), None);
        assert_eq!(verify_tracking_token("a.b", "secret"), None);
    }

    #[test]
    fn test_payload_signature() {
        let sig = payload_signature(b"{\"ok\":true}", "secret");
        assert!(verify_payload_signature(b"{\"ok\":true}", &sig, "secret"));
        assert!(!verify_payload_signature(b"{\"ok\":false}", &sig, "secret"));
        assert!(!verify_payload_signature(b"{\"ok\":true}", "zz", "secret"));
    }
}
