use url::Url;

use crate::auth::AuthStore;

/// Client-side navigation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    /// `/auth/*` carrying an OAuth `code`.
    AuthCallback { code: String },
    Home,
    Preferences,
    Bookings,
    PaymentSuccess,
    PaymentFailure,
    NotFound(String),
}

impl Route {
    /// Parse a path with an optional query string, e.g. `/auth/google?code=x`.
    pub fn parse(target: &str) -> Self {
        let Some(url) = resolve(target) else {
            return Self::NotFound(target.to_string());
        };
        let path = url.path().trim_end_matches('/');

        match path {
            "" => Self::Landing,
            "/login" => Self::Login,
            "/home" => Self::Home,
            "/preferences" => Self::Preferences,
            "/bookings" => Self::Bookings,
            "/payment/success" => Self::PaymentSuccess,
            "/payment/failure" => Self::PaymentFailure,
            auth if auth == "/auth" || auth.starts_with("/auth/") => {
                match query_value(&url, "code") {
                    Some(code) => Self::AuthCallback { code },
                    None => Self::Login,
                }
            }
            other => Self::NotFound(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Landing => "/",
            Self::Login => "/login",
            Self::AuthCallback { .. } => "/auth/callback",
            Self::Home => "/home",
            Self::Preferences => "/preferences",
            Self::Bookings => "/bookings",
            Self::PaymentSuccess => "/payment/success",
            Self::PaymentFailure => "/payment/failure",
            Self::NotFound(path) => path,
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Home | Self::Preferences | Self::Bookings)
    }

    /// Redirect protected routes to [`Route::Login`] when signed out.
    pub fn guard(self, authenticated: bool) -> Self {
        if self.requires_auth() && !authenticated {
            Self::Login
        } else {
            self
        }
    }
}

pub fn guard(route: Route, auth: &AuthStore) -> Route {
    route.guard(auth.is_authenticated())
}

fn resolve(target: &str) -> Option<Url> {
    let base = Url::parse("http://client.invalid/").ok()?;
    let target = target.trim();
    if target.is_empty() {
        return Some(base);
    }
    base.join(target).ok()
}

pub(crate) fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn query_url(query: &str) -> Option<Url> {
    let mut url = Url::parse("http://client.invalid/").ok()?;
    url.set_query(Some(query.trim_start_matches('?')));
    Some(url)
}
