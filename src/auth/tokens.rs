//! Token storage and management

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Stored access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: Option<u64>,
}

impl StoredToken {
    /// Wrap a JWT, reading its expiry from the `exp` claim when present.
    pub fn new(token: String) -> Self {
        let expires_at = jwt_expiry(&token);
        Self { token, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs();
                // Consider expired if less than 60 seconds remaining
                now + 60 >= exp
            }
            None => false,
        }
    }
}

/// Read the `exp` claim out of a JWT payload without verifying the signature.
///
/// The backend is the source of truth; this only feeds status display and
/// has no bearing on the 401-driven refresh path.
pub fn jwt_expiry(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_u64()
}

/// Token store trait for different storage backends
pub trait TokenStore {
    fn get_access_token(&self) -> Option<StoredToken>;
    fn set_access_token(&mut self, token: String);
    fn get_refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&mut self, token: String);
    fn clear_tokens(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jwt(claims: serde_json::Value) -> String {
        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.{}",
            engine.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            engine.encode(claims.to_string()),
            engine.encode("sig")
        )
    }

    #[test]
    fn test_jwt_expiry_reads_exp_claim() {
        let token = fake_jwt(serde_json::json!({"user_id": 3, "exp": 1900000000u64}));
        assert_eq!(jwt_expiry(&token), Some(1900000000));
    }

    #[test]
    fn test_jwt_expiry_missing_claim() {
        let token = fake_jwt(serde_json::json!({"user_id": 3}));
        assert_eq!(jwt_expiry(&token), None);
    }

    #[test]
    fn test_jwt_expiry_garbage_token() {
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.%%%.c"), None);
    }

    #[test]
    fn test_expired_token() {
        let token = fake_jwt(serde_json::json!({"exp": 1000u64}));
        let stored = StoredToken::new(token);
        assert!(stored.is_expired());
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let stored = StoredToken {
            token: "opaque".to_string(),
            expires_at: None,
        };
        assert!(!stored.is_expired());
    }
}
