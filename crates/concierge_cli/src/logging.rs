use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "CONCIERGE_LOG";
pub const DEFAULT_LOG_DIRECTIVE: &str = "warn";

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}

/// Route `tracing` output to stderr so it never interleaves with streamed text.
///
/// A second call is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
