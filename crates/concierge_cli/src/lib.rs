//! Terminal host for the travel concierge.
//!
//! ## Configuration
//!
//! Every setting can come from a flag, an environment variable, or the JSON
//! file named by `--config` / `CONCIERGE_CONFIG_PATH`, in that order of
//! precedence:
//!
//! ```json
//! {
//!   "backend_url": "https://api.example.com",
//!   "chat_url": "https://chat.example.com",
//!   "download_url": "https://app.example.com",
//!   "timeout_sec": 120
//! }
//! ```
//!
//! - Every field is optional; unknown fields are rejected.
//! - `timeout_sec` must be > 0 when provided.
//! - `chat_url` falls back to `backend_url`.
//!
//! ## Transport
//!
//! `--provider http` (the default) talks to the backend. `--provider mock`
//! replays a canned transcript offline and signs in a guest session, so no
//! backend is needed.
//!
//! ## Session
//!
//! The signed-in session lives in memory and ends with the process.
//! `--session-file PATH` (or `CONCIERGE_SESSION_FILE`) keeps it in that file
//! between runs; `--remember` uses the per-user data directory instead. The
//! file is created readable by its owner only.
//!
//! ## Logging
//!
//! `CONCIERGE_LOG` takes an `EnvFilter` directive (default `warn`). Logs go to
//! stderr; assistant text goes to stdout.

pub mod app;
pub mod commands;
pub mod config;
pub mod interrupt;
pub mod logging;
pub mod render;
