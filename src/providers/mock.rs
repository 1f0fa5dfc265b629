use std::time::Duration;

use concierge_api::{AccessToken, ApiError, ByteStream, CancellationSignal};
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};

use crate::provider::ChatTransport;

pub const MOCK_PROVIDER_ID: &str = "mock";

/// Offline transport replaying a scripted travel-planning transcript.
///
/// The serialized frames are cut into chunks of irregular sizes so that the
/// decoder sees frames split mid-object and mid-prefix, exactly as it would
/// over a real connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockChatTransport {
    frames: Vec<String>,
    chunk_sizes: Vec<usize>,
    chunk_delay: Duration,
}

impl MockChatTransport {
    const CHUNK_DELAY_MS: u64 = 40;

    pub fn new(frames: Vec<String>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    pub fn with_chunk_sizes(mut self, chunk_sizes: Vec<usize>) -> Self {
        self.chunk_sizes = chunk_sizes;
        self
    }

    pub fn with_chunk_delay(mut self, chunk_delay: Duration) -> Self {
        self.chunk_delay = chunk_delay;
        self
    }

    /// Full `text/event-stream` body for the scripted frames.
    pub fn body(&self) -> Vec<u8> {
        let mut body = String::new();
        for frame in &self.frames {
            body.push_str("data: ");
            body.push_str(frame);
            body.push_str("\n\n");
        }
        body.into_bytes()
    }

    fn chunks(&self) -> Vec<Vec<u8>> {
        let body = self.body();
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut sizes = self.chunk_sizes.iter().copied().filter(|size| *size > 0).cycle();

        while start < body.len() {
            let size = sizes.next().unwrap_or(body.len());
            let end = (start + size).min(body.len());
            chunks.push(body[start..end].to_vec());
            start = end;
        }
        chunks
    }
}

impl Default for MockChatTransport {
    fn default() -> Self {
        let frames = [
            r#"{"type":"chat_start"}"#,
            r#"{"type":"status","message":"planning"}"#,
            r#"{"type":"search","query":"boutique hotels in Lisbon, Alfama district"}"#,
            r#"{"type":"search_results","content":"4 hotels found"}"#,
            r#"{"type":"database_query","task":"check availability for 3 nights"}"#,
            r#"{"type":"content","content":"Here is a three-night plan for **Lisbon**:\n\n"}"#,
            r#"{"type":"content","content":"1. Stay at *Memmo Alfama*, close to the miradouros.\n"}"#,
            r#"{"type":"content","content":"2. Day trip to Sintra by train from Rossio.\n"}"#,
            r#"{"type":"processing","message":"estimating budget"}"#,
            r#"{"type":"content","content":"3. Budget: about €620 for lodging and transit.\n"}"#,
            r#"{"type":"end"}"#,
        ];
        Self {
            frames: frames.iter().map(ToString::to_string).collect(),
            chunk_sizes: vec![7, 31, 3, 64, 18, 1, 45],
            chunk_delay: Duration::from_millis(Self::CHUNK_DELAY_MS),
        }
    }
}

impl ChatTransport for MockChatTransport {
    fn name(&self) -> &'static str {
        MOCK_PROVIDER_ID
    }

    fn open_chat_stream(
        &self,
        _token: &AccessToken,
        _message: &str,
        _cancel: Option<CancellationSignal>,
    ) -> BoxFuture<'static, Result<ByteStream, ApiError>> {
        let delay = self.chunk_delay;
        let chunks = self.chunks();
        async move {
            let bytes = stream::iter(chunks)
                .then(move |chunk| async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok::<_, ApiError>(chunk)
                })
                .boxed();
            Ok::<ByteStream, ApiError>(bytes)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_reassemble_to_the_full_body() {
        let transport = MockChatTransport::default();
        let joined: Vec<u8> = transport.chunks().concat();
        assert_eq!(joined, transport.body());
        assert!(transport.chunks().iter().any(|chunk| chunk.len() == 1));
    }

    #[test]
    fn no_chunk_sizes_yields_one_chunk() {
        let transport = MockChatTransport::new(vec![r#"{"type":"end"}"#.to_string()])
            .with_chunk_sizes(Vec::new());
        assert_eq!(transport.chunks().len(), 1);
    }
}
