use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Literal payload that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const TYPE_CONTENT: &str = "content";
const TYPE_CHAT_START: &str = "chat_start";
const TYPE_END: &str = "end";
const TYPE_CHAT_END: &str = "chat_end";
const TYPE_STATUS: &str = "status";
const TYPE_SEARCH_RESULTS: &str = "search_results";

/// Fields that can carry a flow step's detail, in priority order.
const DETAIL_FIELDS: [&str; 4] = ["query", "content", "task", "message"];

/// Domain event decoded from one frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Append `text` to the in-progress assistant turn.
    ContentDelta { text: String },
    /// Cosmetic start marker.
    StreamStart,
    /// `end`, `chat_end`, or `[DONE]`.
    StreamEnd,
    /// `status` frames carry nothing the turn needs.
    StatusNoop,
    /// A new reasoning step of the given raw `type`.
    FlowStep { kind: String, detail: String },
    /// Terminates active search steps instead of opening a new one.
    SearchResults { detail: String },
    /// Payload that could not be interpreted.
    Ignored { reason: String },
}

impl StreamEvent {
    /// True when the event closes the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamEnd)
    }
}

/// Coarse classification of a flow step `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Search,
    Database,
    Process,
    Other,
}

impl StepKind {
    /// Classify a raw step type.
    ///
    /// Known kinds are matched exactly; anything else falls back to a
    /// case-insensitive substring check.
    pub fn classify(kind: &str) -> Self {
        let normalized = kind.trim().to_ascii_lowercase().replace(' ', "_");
        match normalized.as_str() {
            "search" | "web_search" | "search_query" | "searching" => Self::Search,
            "database" | "db_query" | "database_query" => Self::Database,
            "process" | "processing" | "tool_call" => Self::Process,
            other if other.contains("search") => Self::Search,
            other if other.contains("database") => Self::Database,
            other if other.contains("process") => Self::Process,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Value,
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

/// Map a frame payload (text after `data: `) to exactly one domain event.
///
/// This is a pure function; malformed payloads become [`StreamEvent::Ignored`].
pub fn interpret(payload: &str) -> StreamEvent {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return StreamEvent::StreamEnd;
    }

    let frame = match serde_json::from_str::<RawFrame>(payload) {
        Ok(frame) => frame,
        Err(error) => {
            return StreamEvent::Ignored {
                reason: format!("unparseable frame: {error}"),
            }
        }
    };

    let Some(kind) = frame.kind.as_str().map(str::trim) else {
        return StreamEvent::Ignored {
            reason: "frame `type` is not a string".to_string(),
        };
    };

    match kind {
        TYPE_CONTENT => StreamEvent::ContentDelta {
            text: frame
                .fields
                .get("content")
                .map(text_of)
                .unwrap_or_default(),
        },
        TYPE_CHAT_START => StreamEvent::StreamStart,
        TYPE_END | TYPE_CHAT_END => StreamEvent::StreamEnd,
        TYPE_STATUS => StreamEvent::StatusNoop,
        TYPE_SEARCH_RESULTS => StreamEvent::SearchResults {
            detail: step_detail(&frame.fields),
        },
        "" => StreamEvent::Ignored {
            reason: "frame `type` is empty".to_string(),
        },
        other => StreamEvent::FlowStep {
            kind: other.to_string(),
            detail: step_detail(&frame.fields),
        },
    }
}

fn step_detail(fields: &serde_json::Map<String, Value>) -> String {
    DETAIL_FIELDS
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|value| is_truthy(value))
        .map(text_of)
        .unwrap_or_default()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_without_text_is_an_empty_delta() {
        assert_eq!(
            interpret(r#"{"type":"content"}"#),
            StreamEvent::ContentDelta {
                text: String::new()
            }
        );
    }

    #[test]
    fn detail_skips_empty_fields_in_priority_order() {
        assert_eq!(
            interpret(r#"{"type":"planning","query":"","task":"compare fares","message":"x"}"#),
            StreamEvent::FlowStep {
                kind: "planning".to_string(),
                detail: "compare fares".to_string(),
            }
        );
    }

    #[test]
    fn classification_falls_back_to_substring() {
        assert_eq!(StepKind::classify("Hotel_Search"), StepKind::Search);
        assert_eq!(StepKind::classify("database"), StepKind::Database);
        assert_eq!(StepKind::classify("data processing"), StepKind::Process);
        assert_eq!(StepKind::classify("thinking"), StepKind::Other);
    }
}
