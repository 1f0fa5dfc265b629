//! Streaming chat client core for the travel concierge.
//!
//! The crate owns the conversation view model and everything that mutates it:
//!
//! - [`auth::AuthStore`] holds the bearer token and cached user profile.
//! - [`provider::ChatTransport`] opens the chat byte stream; the HTTP and mock
//!   implementations live in [`providers`].
//! - [`reducer`] applies one [`StreamEvent`] to the in-progress assistant turn
//!   and returns the next turn value.
//! - [`conversation::Conversation`] is the ordered list of turns plus the index
//!   of the single growing turn.
//! - [`runtime::ChatController`] runs one send: open, decode, interpret,
//!   reduce, release.
//!
//! Frame decoding and event interpretation are transport concerns and live in
//! `concierge_api`. Hosts only read snapshots; they never mutate turns.

pub mod auth;
pub mod conversation;
pub mod error;
pub mod payment;
pub mod provider;
pub mod providers;
pub mod reducer;
pub mod routes;
pub mod runtime;

pub use auth::AuthStore;
pub use concierge_api::{CancellationSignal, StepKind, StreamEvent};
pub use conversation::{AssistantTurn, Conversation, FlowStep, Role, StepStatus, Turn};
pub use error::{AuthError, SendError, TransportError};
pub use payment::PaymentOutcome;
pub use provider::ChatTransport;
pub use reducer::TRANSPORT_FAILURE_APOLOGY;
pub use routes::Route;
pub use runtime::{ChatController, StreamOutcome};
