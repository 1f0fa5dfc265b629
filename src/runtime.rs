use std::sync::{Arc, Mutex, MutexGuard};

use concierge_api::{await_or_cancel, interpret, ApiError, CancellationSignal, SseFrames, StreamEvent};
use tracing::{debug, info, warn};

use crate::auth::AuthStore;
use crate::conversation::{AssistantTurn, Conversation, Turn};
use crate::error::{SendError, TransportError};
use crate::provider::ChatTransport;

/// How a started send ended. The assistant turn is closed in every case.
#[derive(Debug)]
pub enum StreamOutcome {
    /// The server sent `end`, `chat_end`, or `[DONE]`.
    Completed,
    /// The body ended without a terminal frame.
    ReaderEnded,
    /// Opening or reading the stream failed.
    TransportFailed(TransportError),
    /// The caller raised the cancel signal.
    Cancelled,
    /// The server rejected the token; the session has been cleared.
    Unauthorized,
}

/// Runs sends against one conversation, at most one at a time.
pub struct ChatController {
    conversation: Arc<Mutex<Conversation>>,
    transport: Arc<dyn ChatTransport>,
    auth: Arc<AuthStore>,
}

impl ChatController {
    pub fn new(transport: Arc<dyn ChatTransport>, auth: Arc<AuthStore>) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(Conversation::new())),
            transport,
            auth,
        }
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock_conversation().is_streaming()
    }

    pub fn messages(&self) -> Vec<Turn> {
        self.lock_conversation().snapshot()
    }

    pub fn with_conversation<R>(&self, read: impl FnOnce(&Conversation) -> R) -> R {
        read(&self.lock_conversation())
    }

    pub fn clear(&self) -> Result<(), SendError> {
        self.lock_conversation().clear()
    }

    pub async fn send(&self, message: &str) -> Result<StreamOutcome, SendError> {
        self.send_with(message, None, |_| {}).await
    }

    /// Send `message` and stream the reply into a new assistant turn.
    ///
    /// `on_update` sees the turn after every change, starting with the empty
    /// placeholder. Raising `cancel` stops at the next suspension point and
    /// closes the turn with whatever content arrived.
    pub async fn send_with<F>(
        &self,
        message: &str,
        cancel: Option<&CancellationSignal>,
        mut on_update: F,
    ) -> Result<StreamOutcome, SendError>
    where
        F: FnMut(&AssistantTurn) + Send,
    {
        let (token, placeholder) = {
            let mut conversation = self.lock_conversation();
            if conversation.is_streaming() {
                return Err(SendError::Busy);
            }
            let token = self.auth.current_token().ok_or(SendError::NotAuthenticated)?;
            conversation.begin_turn(message)?;
            (token, conversation.active_turn().cloned())
        };
        if let Some(turn) = placeholder {
            on_update(&turn);
        }
        debug!(transport = self.transport.name(), "opening chat stream");

        let opened = await_or_cancel(
            self.transport
                .open_chat_stream(&token, message, cancel.cloned()),
            cancel,
        )
        .await;
        let bytes = match opened {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(ApiError::Cancelled)) | Err(_) => {
                self.finish(Conversation::close, &mut on_update);
                return Ok(StreamOutcome::Cancelled);
            }
            Ok(Err(error)) => return Ok(self.transport_failed(error, &mut on_update)),
        };

        let mut frames = SseFrames::new(bytes);
        let outcome = loop {
            let next = match await_or_cancel(frames.next_frame(), cancel).await {
                Ok(next) => next,
                Err(_) => {
                    self.finish(Conversation::close, &mut on_update);
                    break StreamOutcome::Cancelled;
                }
            };

            let payload = match next {
                Some(Ok(payload)) => payload,
                Some(Err(error)) => break self.transport_failed(error, &mut on_update),
                None => {
                    debug!("chat stream ended without a terminal frame");
                    self.finish(Conversation::close, &mut on_update);
                    break StreamOutcome::ReaderEnded;
                }
            };

            let event = interpret(&payload);
            if let StreamEvent::Ignored { reason } = &event {
                debug!(%reason, "dropping chat frame");
                continue;
            }

            let terminal = event.is_terminal();
            self.finish(|conversation| conversation.apply(&event), &mut on_update);
            if terminal {
                break StreamOutcome::Completed;
            }
        };

        frames.release();
        Ok(outcome)
    }

    fn transport_failed<F>(&self, error: ApiError, on_update: &mut F) -> StreamOutcome
    where
        F: FnMut(&AssistantTurn),
    {
        self.finish(Conversation::fail, on_update);
        if error.is_unauthorized() {
            info!("chat request unauthorized; logging out");
            self.auth.handle_unauthorized();
            return StreamOutcome::Unauthorized;
        }
        warn!(%error, "chat stream failed");
        StreamOutcome::TransportFailed(error)
    }

    fn finish<F>(
        &self,
        step: impl for<'a> FnOnce(&'a mut Conversation) -> Option<&'a AssistantTurn>,
        on_update: &mut F,
    ) where
        F: FnMut(&AssistantTurn),
    {
        let mut conversation = self.lock_conversation();
        let turn = step(&mut *conversation).cloned();
        drop(conversation);
        if let Some(turn) = turn {
            on_update(&turn);
        }
    }

    fn lock_conversation(&self) -> MutexGuard<'_, Conversation> {
        lock_unpoisoned(&self.conversation)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
