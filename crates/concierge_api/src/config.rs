use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_BACKEND_URL;

/// Transport configuration for concierge backend requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL of the primary API host (auth, user, bookings).
    pub base_url: String,
    /// Base URL of the dedicated streaming host. Falls back to `base_url`.
    pub chat_base_url: Option<String>,
    /// Base URL that serves booking invoice downloads.
    pub download_base_url: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into every request.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout. Applies to the whole chat stream as well.
    pub timeout: Option<Duration>,
    /// Ignore system proxy settings.
    pub no_proxy: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            chat_base_url: None,
            download_base_url: None,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            no_proxy: false,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_chat_base_url(mut self, chat_base_url: impl Into<String>) -> Self {
        self.chat_base_url = Some(chat_base_url.into());
        self
    }

    pub fn with_download_base_url(mut self, download_base_url: impl Into<String>) -> Self {
        self.download_base_url = Some(download_base_url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }

    /// Streaming host, or the primary host when no dedicated one is set.
    pub fn chat_base(&self) -> &str {
        self.chat_base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.base_url)
    }
}
