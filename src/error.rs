use reqwest::StatusCode;
use serde::Deserialize;

/// Error envelope returned by the clinic API: `{"error": {"code", "message"}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Deserialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

/// Some endpoints answer with a bare `{"message": "..."}` instead.
#[derive(Debug, Deserialize)]
struct BareMessage {
    message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unauthorized [{0}]: {1}")]
    Unauthorized(String, String),
    #[error("forbidden [{0}]: {1}")]
    Forbidden(String, String),
    #[error("bad request [{0}]: {1}")]
    BadRequest(String, String),
    #[error("not found [{0}]: {1}")]
    NotFound(String, String),
    #[error("conflict [{0}]: {1}")]
    Conflict(String, String),
    #[error("server error {0}: {1}")]
    Server(u16, String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("session expired")]
    SessionExpired,
    #[error("invalid token: {0}")]
    InvalidToken(&'static str),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("token storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// Build the error for a non-success response from its status and raw body.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let (code, message) = parse_envelope(body).unwrap_or_else(|| {
            let fallback = status.canonical_reason().unwrap_or("request failed");
            (status_code_name(status).to_string(), fallback.to_string())
        });

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(code, message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(code, message),
            StatusCode::NOT_FOUND => ClientError::NotFound(code, message),
            StatusCode::CONFLICT => ClientError::Conflict(code, message),
            s if s.is_client_error() => ClientError::BadRequest(code, message),
            s => ClientError::Server(s.as_u16(), message),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict(..))
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Unauthorized(..) | ClientError::SessionExpired)
    }
}

fn parse_envelope(body: &str) -> Option<(String, String)> {
    if body.trim().is_empty() {
        return None;
    }
    if let Ok(env) = serde_json::from_str::<ErrorResponse>(body) {
        return Some((env.error.code, env.error.message));
    }
    serde_json::from_str::<BareMessage>(body)
        .ok()
        .map(|b| ("ERROR".to_string(), b.message))
}

fn status_code_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
        StatusCode::FORBIDDEN => "FORBIDDEN",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::CONFLICT => "CONFLICT",
        s if s.is_client_error() => "BAD_REQUEST",
        _ => "INTERNAL",
    }
}
