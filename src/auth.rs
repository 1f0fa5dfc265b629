use std::sync::Arc;

use concierge_api::{
    AccessToken, ApiError, Booking, ConciergeApiClient, PasswordChange, SignupRequest,
    UserProfile,
};
use session_store::{SessionStorage, ACCESS_TOKEN_KEY, TOKEN_TYPE_KEY, USER_KEY};
use tracing::{debug, info, warn};

use crate::error::AuthError;

const LOGIN_FAILED: &str = "Authentication failed. Please check your credentials.";
const SIGNUP_FAILED: &str = "Signup failed. Account may already exist.";
const OAUTH_CALLBACK_FAILED: &str = "Google authentication failed. Please try again.";
const OAUTH_TOKEN_MISSING: &str = "Could not retrieve access token.";
const OAUTH_START_FAILED: &str = "Could not initialize Google Login.";
const OAUTH_START_INVALID: &str = "Invalid response from Google Login service.";
const PASSWORD_CHANGE_FAILED: &str = "Failed to change password.";
const PROFILE_FETCH_FAILED: &str = "Failed to fetch user.";
const BOOKINGS_FETCH_FAILED: &str = "Failed to fetch bookings.";

/// Session token and cached user profile, persisted in a [`SessionStorage`].
///
/// Every bearer call goes through this store so a 401 anywhere clears the
/// session the same way.
pub struct AuthStore {
    client: Arc<ConciergeApiClient>,
    storage: Arc<dyn SessionStorage>,
}

impl AuthStore {
    pub fn new(client: Arc<ConciergeApiClient>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { client, storage }
    }

    pub fn client(&self) -> &ConciergeApiClient {
        &self.client
    }

    /// Exchange credentials for a token, then fetch and cache the profile.
    ///
    /// Either both are stored or neither is.
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, AuthError> {
        let token = self
            .client
            .exchange_password(username, password)
            .await
            .map_err(|error| AuthError::from_api(error, LOGIN_FAILED))?;
        self.establish(token, LOGIN_FAILED).await
    }

    /// Finish the Google flow with the callback `code`.
    pub async fn login_via_oauth(&self, code: &str) -> Result<AccessToken, AuthError> {
        let token = self.client.oauth_callback(code).await.map_err(|error| {
            fixed_message(
                error,
                OAUTH_CALLBACK_FAILED,
                OAUTH_TOKEN_MISSING,
            )
        })?;
        self.establish(token, OAUTH_CALLBACK_FAILED).await
    }

    /// Authorization URL the user must visit to start the Google flow.
    pub async fn oauth_login_url(&self) -> Result<String, AuthError> {
        self.client
            .oauth_login_url()
            .await
            .map_err(|error| fixed_message(error, OAUTH_START_FAILED, OAUTH_START_INVALID))
    }

    /// Create an account. The session is left untouched.
    pub async fn signup(&self, record: &SignupRequest) -> Result<(), AuthError> {
        self.client
            .signup(record)
            .await
            .map_err(|error| AuthError::from_api(error, SIGNUP_FAILED))
    }

    /// Clear token and user. Storage failures are logged, never surfaced.
    pub fn logout(&self) {
        for key in [ACCESS_TOKEN_KEY, TOKEN_TYPE_KEY, USER_KEY] {
            if let Err(error) = self.storage.remove(key) {
                warn!(key, %error, "failed to clear session key");
            }
        }
        info!("session cleared");
    }

    pub fn current_token(&self) -> Option<AccessToken> {
        let token = self.read(ACCESS_TOKEN_KEY)?;
        if token.trim().is_empty() {
            return None;
        }
        let token_type = self
            .read(TOKEN_TYPE_KEY)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| concierge_api::payload::BEARER.to_string());
        Some(AccessToken {
            access_token: token,
            token_type,
        })
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        let raw = self.read(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(error) => {
                debug!(%error, "cached user is not valid JSON; ignoring");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    /// Re-fetch the profile for the current token and cache it.
    pub async fn refresh_user(&self) -> Result<UserProfile, AuthError> {
        let user = self
            .with_token(PROFILE_FETCH_FAILED, |client, token| async move {
                client.fetch_user(&token).await
            })
            .await?;
        self.cache_user(&user)?;
        Ok(user)
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), AuthError> {
        let change = change.clone();
        self.with_token(PASSWORD_CHANGE_FAILED, |client, token| async move {
            client.change_password(&token, &change).await
        })
        .await
    }

    pub async fn fetch_bookings(&self) -> Result<Vec<Booking>, AuthError> {
        self.with_token(BOOKINGS_FETCH_FAILED, |client, token| async move {
            client.fetch_bookings(&token).await
        })
        .await
    }

    /// Record a 401 seen outside this store.
    pub fn handle_unauthorized(&self) {
        info!("token rejected by server; logging out");
        self.logout();
    }

    async fn establish(&self, token: AccessToken, fallback: &str) -> Result<AccessToken, AuthError> {
        self.storage.set(ACCESS_TOKEN_KEY, token.as_str())?;
        self.storage.set(TOKEN_TYPE_KEY, &token.token_type)?;

        let user = match self.client.fetch_user(&token).await {
            Ok(user) => user,
            Err(error) => {
                warn!(%error, "profile fetch after login failed; discarding token");
                self.logout();
                return Err(AuthError::from_api(error, fallback));
            }
        };
        if let Err(error) = self.cache_user(&user) {
            self.logout();
            return Err(error);
        }

        info!(username = %user.username, "signed in");
        Ok(token)
    }

    async fn with_token<T, F, Fut>(&self, fallback: &str, call: F) -> Result<T, AuthError>
    where
        F: FnOnce(Arc<ConciergeApiClient>, AccessToken) -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        let token = self.current_token().ok_or(AuthError::NotAuthenticated)?;
        match call(Arc::clone(&self.client), token).await {
            Ok(value) => Ok(value),
            Err(error) if error.is_unauthorized() => {
                self.handle_unauthorized();
                Err(AuthError::Unauthorized)
            }
            Err(error) => Err(AuthError::from_api(error, fallback)),
        }
    }

    fn cache_user(&self, user: &UserProfile) -> Result<(), AuthError> {
        let json = serde_json::to_string(user).map_err(|error| {
            AuthError::Rejected(format!("could not encode user profile: {error}"))
        })?;
        self.storage.set(USER_KEY, &json)?;
        Ok(())
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(error) => {
                warn!(key, %error, "failed to read session key");
                None
            }
        }
    }
}

/// OAuth failures show fixed messages rather than server detail.
fn fixed_message(error: ApiError, rejected: &str, malformed: &str) -> AuthError {
    match error {
        error if error.is_network() => AuthError::Network(error),
        ApiError::UnexpectedResponse(_) | ApiError::Serde(_) => {
            AuthError::Rejected(malformed.to_string())
        }
        _ => AuthError::Rejected(rejected.to_string()),
    }
}
