use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::{error::ClientError, models::Claims};

/// Decode the claims segment of a bearer token.
/// The signature is not checked here; the API does that on every request.
pub fn decode_claims(token: &str) -> Result<Claims, ClientError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ClientError::InvalidToken("empty token"));
    }

    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClientError::InvalidToken("expected three dot-separated segments"));
    };

    // Some issuers pad the segments; URL_SAFE_NO_PAD rejects that.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| ClientError::InvalidToken("payload is not base64url"))?;

    serde_json::from_slice(&bytes).map_err(|_| ClientError::InvalidToken("payload is not a claims object"))
}

/// Short SHA-256 hex prefix used to identify a token in logs without leaking it.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(&out[..6])
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanStatus, Role};

    #[test]
    fn decodes_payload() {
        let token = test_tokens::with_payload(&serde_json::json!({
            "sub": "42", "role": "ADMIN", "exp": 2_000_000_000i64, "planStatus": "WAITING"
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, Some(Role::Admin));
        assert_eq!(claims.plan_status, Some(PlanStatus::Waiting));
        assert_eq!(claims.exp, Some(2_000_000_000));
    }

    #[test]
    fn tolerates_padded_payload() {
        let token = test_tokens::with_payload(&serde_json::json!({"sub": "a"}));
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1].push_str("==");
        assert!(decode_claims(&parts.join(".")).is_ok());
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(decode_claims(""), Err(ClientError::InvalidToken(_))));
        assert!(decode_claims("opaque-token").is_err());
        assert!(decode_claims("a.b.c.d").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
        let not_claims = format!("x.{}.y", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(decode_claims(&not_claims).is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = token_fingerprint("abc");
        assert_eq!(a.len(), 12);
        assert_eq!(a, token_fingerprint("abc"));
        assert_ne!(a, token_fingerprint("abd"));
    }
}
