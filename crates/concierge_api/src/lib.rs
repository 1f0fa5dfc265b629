//! Transport-only client primitives for the travel concierge backend.
//!
//! This crate owns request building, response normalization, and the
//! server-sent event path of the chat endpoint: raw byte chunks are decoded
//! into `data:` frame payloads by [`SseFrameDecoder`], and each payload is
//! mapped to exactly one [`StreamEvent`] by [`interpret`]. It holds no
//! session state and performs no retries; callers decide what a failure means
//! for the conversation.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use cancel::{await_or_cancel, is_cancelled, CancellationSignal};
pub use client::{ByteStream, ConciergeApiClient};
pub use config::ApiConfig;
pub use error::ApiError;
pub use events::{interpret, StepKind, StreamEvent, DONE_SENTINEL};
pub use payload::{
    AccessToken, Booking, BookingStatus, PasswordChange, SignupRequest, UserProfile,
};
pub use reqwest::StatusCode;
pub use sse::{SseFrameDecoder, SseFrames};
pub use url::normalize_base_url;
