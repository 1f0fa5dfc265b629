//! Pure reduction of stream events onto an assistant turn.
//!
//! Every function takes the current turn by reference and returns the next
//! value; callers swap it into the conversation. Frozen turns are returned
//! unchanged.

use concierge_api::{StepKind, StreamEvent};
use tracing::debug;

use crate::conversation::{AssistantTurn, FlowStep};

/// Content shown when a turn fails before any text arrived.
pub const TRANSPORT_FAILURE_APOLOGY: &str = "I'm sorry, I encountered an issue. Please try again.";

pub fn reduce(turn: &AssistantTurn, event: &StreamEvent) -> AssistantTurn {
    if turn.complete {
        return turn.clone();
    }

    match event {
        StreamEvent::ContentDelta { text } => {
            let mut next = turn.clone();
            next.content.push_str(text);
            next
        }
        StreamEvent::FlowStep { kind, detail } => {
            let mut flows: Vec<FlowStep> = turn.flows.iter().cloned().map(FlowStep::finished).collect();
            flows.push(FlowStep::active(kind.as_str(), detail.as_str()));
            AssistantTurn {
                content: turn.content.clone(),
                flows,
                complete: false,
            }
        }
        StreamEvent::SearchResults { .. } => AssistantTurn {
            content: turn.content.clone(),
            flows: turn
                .flows
                .iter()
                .cloned()
                .map(|step| {
                    if step.step_kind() == StepKind::Search {
                        step.finished()
                    } else {
                        step
                    }
                })
                .collect(),
            complete: false,
        },
        StreamEvent::StreamEnd => close(turn),
        StreamEvent::StreamStart | StreamEvent::StatusNoop => turn.clone(),
        StreamEvent::Ignored { reason } => {
            debug!(%reason, "ignoring stream frame");
            turn.clone()
        }
    }
}

/// Clean end: every step done, turn frozen.
pub fn close(turn: &AssistantTurn) -> AssistantTurn {
    if turn.complete {
        return turn.clone();
    }
    AssistantTurn {
        content: turn.content.clone(),
        flows: turn.flows.iter().cloned().map(FlowStep::finished).collect(),
        complete: true,
    }
}

/// Transport failure: like [`close`], and an empty turn gets the apology.
pub fn fail(turn: &AssistantTurn) -> AssistantTurn {
    if turn.complete {
        return turn.clone();
    }
    let mut next = close(turn);
    if next.content.is_empty() {
        next.content = TRANSPORT_FAILURE_APOLOGY.to_string();
    }
    next
}
