//! Incremental projection of an assistant turn onto a line terminal.

use concierge::{AssistantTurn, StepKind, StepStatus, StreamOutcome};

pub const STEP_DONE_MARKER: &str = "done";

/// Turns successive snapshots of one assistant turn into the text that is new
/// since the previous snapshot.
#[derive(Debug)]
pub struct TurnRenderer {
    printed: usize,
    steps: Vec<StepStatus>,
    at_line_start: bool,
}

impl Default for TurnRenderer {
    fn default() -> Self {
        Self {
            printed: 0,
            steps: Vec::new(),
            at_line_start: true,
        }
    }
}

impl TurnRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, turn: &AssistantTurn) -> String {
        let mut out = String::new();

        for (index, step) in turn.flows.iter().enumerate() {
            let line = match self.steps.get(index).copied() {
                None => {
                    self.steps.push(step.status);
                    Some(step_line(step.step_kind(), &step.label(), &step.detail))
                }
                Some(StepStatus::Active) if step.status == StepStatus::Done => {
                    self.steps[index] = StepStatus::Done;
                    Some(step_line(step.step_kind(), &step.label(), STEP_DONE_MARKER))
                }
                Some(_) => None,
            };
            if let Some(line) = line {
                self.start_line(&mut out);
                out.push_str(&line);
                out.push('\n');
            }
        }

        if let Some(fresh) = turn.content.get(self.printed..) {
            if !fresh.is_empty() {
                out.push_str(fresh);
                self.at_line_start = fresh.ends_with('\n');
            }
        }
        self.printed = turn.content.len();

        out
    }

    /// Closing text for a finished send.
    pub fn finish(&mut self, outcome: &StreamOutcome) -> String {
        let mut out = String::new();
        self.start_line(&mut out);
        match outcome {
            StreamOutcome::Completed | StreamOutcome::ReaderEnded => {}
            StreamOutcome::Cancelled => out.push_str("(stopped)\n"),
            StreamOutcome::TransportFailed(error) => {
                out.push_str(&format!("[error] {error}\n"));
            }
            StreamOutcome::Unauthorized => {
                out.push_str("Your session has expired. Please /login again.\n");
            }
        }
        out
    }

    fn start_line(&mut self, out: &mut String) {
        if !self.at_line_start {
            out.push('\n');
            self.at_line_start = true;
        }
    }
}

/// One-character tag per step kind, standing in for the web client's icons.
fn step_glyph(kind: StepKind) -> char {
    match kind {
        StepKind::Search => '?',
        StepKind::Database => '#',
        StepKind::Process => '$',
        StepKind::Other => '*',
    }
}

fn step_line(kind: StepKind, label: &str, detail: &str) -> String {
    let glyph = step_glyph(kind);
    if detail.trim().is_empty() {
        format!("{glyph} [{label}]")
    } else {
        format!("{glyph} [{label}] {}", detail.trim())
    }
}

#[cfg(test)]
mod tests {
    use concierge::reducer::reduce;
    use concierge::StreamEvent;

    use super::*;

    fn step(kind: &str, detail: &str) -> StreamEvent {
        StreamEvent::FlowStep {
            kind: kind.to_string(),
            detail: detail.to_string(),
        }
    }

    fn content(text: &str) -> StreamEvent {
        StreamEvent::ContentDelta {
            text: text.to_string(),
        }
    }

    #[test]
    fn renders_only_what_changed() {
        let mut renderer = TurnRenderer::new();
        let mut turn = AssistantTurn::default();
        let mut out = Vec::new();

        for event in [
            step("web_search", "Lisbon hotels"),
            content("Three "),
            content("options."),
            step("database", ""),
            StreamEvent::StreamEnd,
        ] {
            turn = reduce(&turn, &event);
            out.push(renderer.update(&turn));
        }

        assert_eq!(
            out,
            vec![
                "? [web search] Lisbon hotels\n".to_string(),
                "Three ".to_string(),
                "options.".to_string(),
                "\n? [web search] done\n# [database]\n".to_string(),
                "# [database] done\n".to_string(),
            ]
        );
        assert_eq!(renderer.finish(&StreamOutcome::Completed), "");
    }

    #[test]
    fn step_lines_are_tagged_by_kind() {
        let mut renderer = TurnRenderer::new();
        let mut turn = AssistantTurn::default();
        let mut out = String::new();

        for event in [
            step("flight_search", "LIS to OPO"),
            step("db_query", "availability"),
            step("data processing", ""),
            step("thinking", "options"),
        ] {
            turn = reduce(&turn, &event);
            out.push_str(&renderer.update(&turn));
        }

        let started: Vec<&str> = out.lines().filter(|line| !line.ends_with(" done")).collect();
        assert_eq!(started.len(), 4, "{out}");
        assert!(started[0].starts_with("? ["), "{out}");
        assert!(started[1].starts_with("# ["), "{out}");
        assert!(started[2].starts_with("$ ["), "{out}");
        assert!(started[3].starts_with("* ["), "{out}");
    }

    #[test]
    fn finish_breaks_the_line_and_names_the_outcome() {
        let mut renderer = TurnRenderer::new();
        let turn = reduce(&AssistantTurn::default(), &content("partial"));
        renderer.update(&turn);

        assert_eq!(renderer.finish(&StreamOutcome::Cancelled), "\n(stopped)\n");
    }
}
