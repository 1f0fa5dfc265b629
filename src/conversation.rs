use concierge_api::{StepKind, StreamEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SendError;
use crate::reducer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Active,
    Done,
}

/// One reasoning stage reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub id: String,
    /// Raw step `type` as sent by the server.
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
    pub status: StepStatus,
}

impl FlowStep {
    /// A fresh active step with a unique id.
    pub fn active(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            detail: detail.into(),
            status: StepStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StepStatus::Active
    }

    /// Display label: the raw type with underscores shown as spaces.
    pub fn label(&self) -> String {
        self.kind.replace('_', " ")
    }

    pub fn step_kind(&self) -> StepKind {
        StepKind::classify(&self.kind)
    }

    pub(crate) fn finished(mut self) -> Self {
        self.status = StepStatus::Done;
        self
    }
}

/// The assistant side of one exchange.
///
/// `content` only grows while the turn is open; once `complete` is set the
/// turn is frozen and every step is done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantTurn {
    pub content: String,
    pub flows: Vec<FlowStep>,
    pub complete: bool,
}

impl AssistantTurn {
    pub fn active_step(&self) -> Option<&FlowStep> {
        self.flows.iter().find(|step| step.is_active())
    }

    pub fn active_step_count(&self) -> usize {
        self.flows.iter().filter(|step| step.is_active()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { content: String },
    Assistant(AssistantTurn),
}

impl Turn {
    pub fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant(_) => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User { content } => content,
            Self::Assistant(turn) => &turn.content,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            Self::Assistant(turn) => Some(turn),
            Self::User { .. } => None,
        }
    }
}

/// Ordered turns plus the index of the one assistant turn still growing.
///
/// `is_streaming()` is true exactly when that index is set, and it always
/// points at the last turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
    active: Option<usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Turn] {
        &self.turns
    }

    /// Owned copy of the turns for hosts that render off-lock.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// The growing assistant turn, while streaming.
    pub fn active_turn(&self) -> Option<&AssistantTurn> {
        self.active
            .and_then(|index| self.turns.get(index))
            .and_then(Turn::as_assistant)
    }

    /// Last assistant turn, streaming or not.
    pub fn last_assistant(&self) -> Option<&AssistantTurn> {
        self.turns.iter().rev().find_map(Turn::as_assistant)
    }

    /// Append the user turn and an empty assistant placeholder.
    ///
    /// Fails with [`SendError::Busy`] without touching anything when a turn is
    /// already streaming.
    pub fn begin_turn(&mut self, message: &str) -> Result<usize, SendError> {
        if self.is_streaming() {
            return Err(SendError::Busy);
        }

        self.turns.push(Turn::User {
            content: message.to_string(),
        });
        self.turns.push(Turn::Assistant(AssistantTurn::default()));
        let index = self.turns.len() - 1;
        self.active = Some(index);
        Ok(index)
    }

    /// Reduce one event into the growing turn. Terminal events end streaming.
    pub fn apply(&mut self, event: &StreamEvent) -> Option<&AssistantTurn> {
        let next = reducer::reduce(self.active_turn()?, event);
        self.replace_active(next, event.is_terminal())
    }

    /// Close the growing turn as a clean end: content kept, steps done.
    pub fn close(&mut self) -> Option<&AssistantTurn> {
        let next = reducer::close(self.active_turn()?);
        self.replace_active(next, true)
    }

    /// Close the growing turn after a transport failure.
    pub fn fail(&mut self) -> Option<&AssistantTurn> {
        let next = reducer::fail(self.active_turn()?);
        self.replace_active(next, true)
    }

    /// Drop every turn. Refused while streaming.
    pub fn clear(&mut self) -> Result<(), SendError> {
        if self.is_streaming() {
            return Err(SendError::Busy);
        }
        self.turns.clear();
        Ok(())
    }

    fn replace_active(&mut self, next: AssistantTurn, finished: bool) -> Option<&AssistantTurn> {
        let index = self.active?;
        self.turns[index] = Turn::Assistant(next);
        if finished {
            self.active = None;
        }
        self.turns[index].as_assistant()
    }
}
