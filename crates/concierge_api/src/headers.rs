use std::collections::BTreeMap;

use crate::config::ApiConfig;
use crate::payload::AccessToken;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const ACCEPT_JSON: &str = "application/json";
pub const ACCEPT_EVENT_STREAM: &str = "text/event-stream";

/// Build a deterministic header map for backend requests.
///
/// Configured extra headers are applied last and may override defaults, except
/// `authorization`, which always reflects `token` when one is given.
pub fn build_headers(
    config: &ApiConfig,
    token: Option<&AccessToken>,
    accept: &str,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(HEADER_ACCEPT.to_owned(), accept.to_owned());
    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    if let Some(token) = token {
        headers.insert(HEADER_AUTHORIZATION.to_owned(), token.authorization());
    }

    headers
}

fn default_user_agent() -> String {
    format!(
        "concierge/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
