use std::sync::Arc;

use concierge_api::ConciergeApiClient;

use crate::provider::ChatTransport;

mod http;
mod mock;

pub use http::{HttpChatTransport, HTTP_PROVIDER_ID};
pub use mock::{MockChatTransport, MOCK_PROVIDER_ID};

pub const DEFAULT_PROVIDER_ID: &str = HTTP_PROVIDER_ID;
pub const PROVIDER_ENV_VAR: &str = "CONCIERGE_PROVIDER";

/// Resolve a transport by id. `http` needs the shared API client.
pub fn transport_for_id(
    provider_id: &str,
    client: Arc<ConciergeApiClient>,
) -> Result<Arc<dyn ChatTransport>, String> {
    match provider_id.trim() {
        HTTP_PROVIDER_ID => Ok(Arc::new(HttpChatTransport::new(client))),
        MOCK_PROVIDER_ID => Ok(Arc::new(MockChatTransport::default())),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {HTTP_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        )),
    }
}
