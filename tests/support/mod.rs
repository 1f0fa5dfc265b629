#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use concierge::{AuthStore, ChatController, ChatTransport};
use concierge_api::{AccessToken, ApiConfig, ApiError, ByteStream, CancellationSignal, ConciergeApiClient};
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use concierge_api::StatusCode;
use session_store::{MemorySessionStore, SessionStorage, ACCESS_TOKEN_KEY, TOKEN_TYPE_KEY};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// One pull from a scripted body.
#[derive(Debug, Clone)]
pub enum Pull {
    Bytes(Vec<u8>),
    Fail(String),
}

pub fn bytes(text: &str) -> Pull {
    Pull::Bytes(text.as_bytes().to_vec())
}

/// How a scripted open resolves.
#[derive(Debug, Clone)]
pub enum Script {
    Body(Vec<Pull>),
    Status(u16, String),
}

/// Transport answering each open with the next script in order.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    messages: Mutex<Vec<String>>,
    opens: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    pub fn body(pulls: Vec<Pull>) -> Arc<Self> {
        Self::new(vec![Script::Body(pulls)])
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Acquire)
    }

    pub fn messages(&self) -> Vec<String> {
        lock_unpoisoned(&self.messages).clone()
    }
}

impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open_chat_stream(
        &self,
        _token: &AccessToken,
        message: &str,
        _cancel: Option<CancellationSignal>,
    ) -> BoxFuture<'static, Result<ByteStream, ApiError>> {
        self.opens.fetch_add(1, Ordering::AcqRel);
        lock_unpoisoned(&self.messages).push(message.to_string());
        let script = lock_unpoisoned(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| Script::Status(500, "no script left".to_string()));

        async move {
            match script {
                Script::Status(code, body) => Err(concierge_api::error::error_for_status(
                    StatusCode::from_u16(code).expect("valid status"),
                    &body,
                )),
                Script::Body(pulls) => Ok(stream::iter(pulls)
                    .map(|pull| match pull {
                        Pull::Bytes(bytes) => Ok(bytes),
                        Pull::Fail(reason) => Err(ApiError::StreamInterrupted(reason)),
                    })
                    .boxed()),
            }
        }
        .boxed()
    }
}

/// Transport whose single body is fed live by the test through a channel.
pub struct ChannelTransport {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Pull>>>,
}

impl ChannelTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Pull>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                receiver: Mutex::new(Some(receiver)),
            }),
            sender,
        )
    }
}

impl ChatTransport for ChannelTransport {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn open_chat_stream(
        &self,
        _token: &AccessToken,
        _message: &str,
        _cancel: Option<CancellationSignal>,
    ) -> BoxFuture<'static, Result<ByteStream, ApiError>> {
        let receiver = lock_unpoisoned(&self.receiver).take();
        async move {
            let receiver = receiver.ok_or_else(|| {
                ApiError::UnexpectedResponse("channel body already taken".to_string())
            })?;
            let body = stream::unfold(receiver, |mut receiver| async move {
                let pull = receiver.recv().await?;
                let item = match pull {
                    Pull::Bytes(bytes) => Ok(bytes),
                    Pull::Fail(reason) => Err(ApiError::StreamInterrupted(reason)),
                };
                Some((item, receiver))
            });
            Ok::<ByteStream, ApiError>(body.boxed())
        }
        .boxed()
    }
}

pub fn api_client(base_url: &str) -> Arc<ConciergeApiClient> {
    Arc::new(ConciergeApiClient::new(ApiConfig::new(base_url).without_proxy()).expect("client"))
}

pub fn signed_in_storage() -> Arc<MemorySessionStore> {
    let storage = Arc::new(MemorySessionStore::new());
    storage.set(ACCESS_TOKEN_KEY, "tok").expect("seed token");
    storage.set(TOKEN_TYPE_KEY, "bearer").expect("seed token type");
    storage
}

pub fn controller(transport: Arc<dyn ChatTransport>) -> ChatController {
    controller_with_storage(transport, signed_in_storage())
}

pub fn controller_with_storage(
    transport: Arc<dyn ChatTransport>,
    storage: Arc<MemorySessionStore>,
) -> ChatController {
    let auth = AuthStore::new(api_client("http://127.0.0.1:9"), storage);
    ChatController::new(transport, Arc::new(auth))
}

/// Serialize payloads the way the server writes them.
pub fn sse(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|payload| format!("data: {payload}\n"))
        .collect()
}

// Scripted HTTP server for tests that exercise the real reqwest transport.

#[derive(Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

pub fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse {
        status,
        content_type: "application/json",
        body: body.as_bytes().to_vec(),
    }
}

pub fn response_sse(payloads: &[&str]) -> ScriptedResponse {
    ScriptedResponse {
        status: 200,
        content_type: "text/event-stream",
        body: sse(payloads).into_bytes(),
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

pub struct ScriptedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let base_url = format!(
            "http://{}",
            listener.local_addr().expect("resolved local listener address")
        );

        let handle = tokio::spawn({
            let requests = Arc::clone(&requests);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, requests).await;
                    });
                }
            }
        });

        Self {
            base_url,
            requests,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let Ok(Some(request)) = read_request(&mut socket).await else {
        return;
    };
    lock_unpoisoned(&requests).push(request);

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r#"{"detail":"unexpected request"}"#));

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        StatusCode::from_u16(response.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Status"),
        response.content_type,
        response.body.len(),
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    if response.status != 204 && socket.write_all(&response.body).await.is_err() {
        return;
    }
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<RecordedRequest>> {
    let mut raw = Vec::new();
    let mut buffer = [0_u8; 2048];

    let header_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(None);
        }
        raw.extend_from_slice(&buffer[..n]);
        if let Some(position) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let mut authorization = None;
    let mut content_length = 0;
    for (key, value) in lines.filter_map(|line| line.split_once(':')) {
        match key.trim().to_ascii_lowercase().as_str() {
            "authorization" => authorization = Some(value.trim().to_string()),
            "content-length" => content_length = value.trim().parse().unwrap_or(0),
            _ => {}
        }
    }

    let mut body = raw[header_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buffer[..n]);
    }

    Ok(Some(RecordedRequest {
        method,
        path,
        authorization,
        body: String::from_utf8_lossy(&body).to_string(),
    }))
}

/// Poll `condition` until it holds or a generous deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
