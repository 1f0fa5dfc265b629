use std::sync::Arc;

use concierge_api::{AccessToken, ApiError, ByteStream, CancellationSignal, ConciergeApiClient};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::provider::ChatTransport;

pub const HTTP_PROVIDER_ID: &str = "http";

/// Chat transport backed by the real `/agent/chat` endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: Arc<ConciergeApiClient>,
}

impl HttpChatTransport {
    pub fn new(client: Arc<ConciergeApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ConciergeApiClient {
        &self.client
    }
}

impl ChatTransport for HttpChatTransport {
    fn name(&self) -> &'static str {
        HTTP_PROVIDER_ID
    }

    fn open_chat_stream(
        &self,
        token: &AccessToken,
        message: &str,
        cancel: Option<CancellationSignal>,
    ) -> BoxFuture<'static, Result<ByteStream, ApiError>> {
        let client = Arc::clone(&self.client);
        let token = token.clone();
        let message = message.to_string();
        async move {
            client
                .open_chat_stream(&token, &message, cancel.as_ref())
                .await
        }
        .boxed()
    }
}
