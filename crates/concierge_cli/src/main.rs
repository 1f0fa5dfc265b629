use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use concierge::providers::{transport_for_id, MOCK_PROVIDER_ID};
use concierge::{AuthStore, ChatController};
use concierge_api::ConciergeApiClient;
use concierge_cli::app::{offline_storage, App, StdinLines};
use concierge_cli::config::Cli;
use concierge_cli::interrupt::Interrupts;
use concierge_cli::logging::init_logging;
use session_store::{FileSessionStore, MemorySessionStore, SessionStorage};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let config = Cli::parse().resolve()?;

    let client = Arc::new(
        ConciergeApiClient::new(config.api.clone()).context("invalid backend configuration")?,
    );
    let storage: Arc<dyn SessionStorage> = if config.provider == MOCK_PROVIDER_ID {
        offline_storage()?
    } else if let Some(path) = config.session_file.as_deref() {
        Arc::new(
            FileSessionStore::open(path)
                .with_context(|| format!("failed to open session file {}", path.display()))?,
        )
    } else {
        Arc::new(MemorySessionStore::new())
    };

    let transport =
        transport_for_id(&config.provider, Arc::clone(&client)).map_err(anyhow::Error::msg)?;
    let auth = Arc::new(AuthStore::new(client, storage));
    let chat = Arc::new(ChatController::new(transport, auth));

    let interrupts = Interrupts::new();
    let _interrupt_guard = interrupts
        .install()
        .context("failed to install the Ctrl-C handler")?;

    let app = App::new(chat, interrupts, config.api.download_base_url.clone());
    let mut input = StdinLines::new();
    let mut out = std::io::stdout();
    app.run(&mut input, &mut out).await?;
    Ok(())
}
