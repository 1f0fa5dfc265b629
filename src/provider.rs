//! Seam between the conversation runtime and whatever produces chat bytes.

use concierge_api::{AccessToken, ApiError, ByteStream, CancellationSignal};
use futures_util::future::BoxFuture;

/// Opens one chat stream per call.
///
/// Implementations must fail before yielding any chunk when the server
/// rejects the request, and surface mid-stream read failures as an `Err` item
/// on the returned stream.
pub trait ChatTransport: Send + Sync + 'static {
    /// Stable identifier used for selection and logging.
    fn name(&self) -> &'static str;

    fn open_chat_stream(
        &self,
        token: &AccessToken,
        message: &str,
        cancel: Option<CancellationSignal>,
    ) -> BoxFuture<'static, Result<ByteStream, ApiError>>;
}
