#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use concierge::providers::MockChatTransport;
use concierge::{AuthStore, ChatController, ChatTransport};
use concierge_api::{ApiConfig, ConciergeApiClient};
use concierge_cli::app::{offline_storage, App, LineSource};
use concierge_cli::interrupt::Interrupts;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use session_store::{MemorySessionStore, SessionStorage};

/// Lines typed by the user, in order.
#[derive(Debug, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(ToString::to_string).collect(),
        }
    }
}

impl LineSource for ScriptedLines {
    fn next_line(&mut self) -> BoxFuture<'_, io::Result<Option<String>>> {
        let line = self.lines.pop_front();
        async move { Ok(line) }.boxed()
    }
}

/// Backend address nothing listens on.
pub const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:9";

pub fn client() -> Arc<ConciergeApiClient> {
    Arc::new(
        ConciergeApiClient::new(ApiConfig::new(UNREACHABLE_BACKEND).without_proxy())
            .expect("client"),
    )
}

pub fn fast_mock() -> Arc<dyn ChatTransport> {
    Arc::new(MockChatTransport::default().with_chunk_delay(Duration::ZERO))
}

pub fn app_with(transport: Arc<dyn ChatTransport>, storage: Arc<dyn SessionStorage>) -> App {
    let auth = Arc::new(AuthStore::new(client(), storage));
    App::new(
        Arc::new(ChatController::new(transport, auth)),
        Interrupts::new(),
        Some("https://app.example.test".to_string()),
    )
}

pub fn offline_app() -> App {
    app_with(fast_mock(), offline_storage().expect("offline session"))
}

pub fn signed_out_app() -> App {
    app_with(fast_mock(), Arc::new(MemorySessionStore::new()))
}

/// Run the shell over `lines` and return everything it printed.
pub async fn run_lines(app: &App, lines: &[&str]) -> String {
    let mut input = ScriptedLines::new(lines);
    let mut out = Vec::new();
    app.run(&mut input, &mut out).await.expect("shell runs");
    String::from_utf8(out).expect("utf-8 output")
}
