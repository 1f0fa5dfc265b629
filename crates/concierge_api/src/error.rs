use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unauthorized: {}", detail_or(.detail, "token rejected"))]
    Unauthorized { detail: Option<String> },

    #[error("HTTP {status}: {}", detail_or(.detail, fallback_reason(.status)))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("request was cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Status { status, .. } => Some(*status),
            Self::Request(error) => error.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Server-provided `detail` message, when one was parsed from the body.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { detail } | Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// True for failures where no HTTP response was obtained.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Request(error) => error.status().is_none(),
            Self::StreamInterrupted(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    detail: Option<Value>,
}

/// Extract the human-readable `detail` from an error body.
///
/// Accepts `{"detail": "..."}` as well as the validation shape
/// `{"detail": [{"msg": "..."}]}`, where the first message wins.
pub fn parse_error_detail(body: &str) -> Option<String> {
    let payload = serde_json::from_str::<ErrorPayload>(body).ok()?;
    match payload.detail? {
        Value::String(detail) => non_empty(detail),
        Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .and_then(non_empty),
        Value::Object(fields) => fields
            .get("msg")
            .or_else(|| fields.get("message"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .and_then(non_empty),
        _ => None,
    }
}

/// Map a non-success status and its body to a typed error.
pub fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    let detail = parse_error_detail(body);
    if status == StatusCode::UNAUTHORIZED {
        return ApiError::Unauthorized { detail };
    }
    ApiError::Status { status, detail }
}

fn detail_or<'a>(detail: &'a Option<String>, fallback: &'a str) -> &'a str {
    detail.as_deref().unwrap_or(fallback)
}

fn fallback_reason(status: &StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("request failed")
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
