use concierge_api::ApiError;
use session_store::SessionStoreError;
use thiserror::Error;

/// Failure of the streaming path: open, read, or cancel.
pub type TransportError = ApiError;

/// Errors surfaced by [`crate::auth::AuthStore`].
///
/// `Rejected` carries the message a view shows inline: the server's `detail`
/// when it sent one, otherwise a fixed fallback for the operation.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(#[source] ApiError),

    #[error("session expired; please sign in again")]
    Unauthorized,

    #[error("not signed in")]
    NotAuthenticated,

    #[error("session storage failed: {0}")]
    Store(#[from] SessionStoreError),
}

impl AuthError {
    /// Map a transport error to an auth error, using `fallback` when the
    /// server gave no usable detail.
    pub(crate) fn from_api(error: ApiError, fallback: &str) -> Self {
        if error.is_network() {
            return Self::Network(error);
        }
        if let ApiError::Serde(_) | ApiError::UnexpectedResponse(_) = error {
            return Self::Rejected(fallback.to_string());
        }
        Self::Rejected(error.detail().unwrap_or(fallback).to_string())
    }
}

/// Reasons `send` refuses to start a turn. Neither touches the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("a response is still streaming")]
    Busy,

    #[error("sign in before sending messages")]
    NotAuthenticated,
}
