use url::Url;

use crate::error::ApiError;

/// Default base URL used when no backend host is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

pub const PATH_TOKEN: &str = "/auth/token";
pub const PATH_SIGNUP: &str = "/auth/";
pub const PATH_GOOGLE_LOGIN: &str = "/auth/google/login";
pub const PATH_GOOGLE_CALLBACK: &str = "/auth/google/callback";
pub const PATH_USER: &str = "/user/";
pub const PATH_PASSWORD: &str = "/user/password";
pub const PATH_BOOKINGS: &str = "/user/bookings";
pub const PATH_CHAT: &str = "/agent/chat";

/// Normalize a configured base URL.
///
/// Normalization rules:
/// 1) surrounding whitespace and trailing `/` are removed
/// 2) an empty value falls back to [`DEFAULT_BACKEND_URL`]
/// 3) the result must parse as an absolute `http` or `https` URL
pub fn normalize_base_url(input: &str) -> Result<String, ApiError> {
    let trimmed = input.trim();
    let base = if trimmed.is_empty() {
        DEFAULT_BACKEND_URL
    } else {
        trimmed
    };
    let base = base.trim_end_matches('/');

    let parsed = Url::parse(base).map_err(|error| ApiError::InvalidBaseUrl {
        url: base.to_string(),
        message: error.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidBaseUrl {
            url: base.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(base.to_string())
}

/// Join a normalized base with an absolute endpoint path.
pub fn join_endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
