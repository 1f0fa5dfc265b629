mod support;

use concierge::conversation::{AssistantTurn, StepStatus};
use concierge::reducer::{close, fail, reduce};
use concierge::{StreamEvent, StreamOutcome, Turn};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use support::{controller, sse, Pull, ScriptedTransport};

const KINDS: [&str; 6] = ["search", "web_search", "database", "processing", "analysis", "flight_search"];

fn random_event(rng: &mut StdRng) -> StreamEvent {
    match rng.gen_range(0..7) {
        0 | 1 => StreamEvent::ContentDelta {
            text: ["Lis", "bon ", "✈", "", "\n"][rng.gen_range(0..5)].to_string(),
        },
        2 | 3 => StreamEvent::FlowStep {
            kind: KINDS[rng.gen_range(0..KINDS.len())].to_string(),
            detail: format!("detail {}", rng.gen_range(0..100)),
        },
        4 => StreamEvent::SearchResults {
            detail: "hits".to_string(),
        },
        5 => StreamEvent::StatusNoop,
        _ => StreamEvent::Ignored {
            reason: "noise".to_string(),
        },
    }
}

fn step_ids(turn: &AssistantTurn) -> Vec<String> {
    turn.flows.iter().map(|step| step.id.clone()).collect()
}

#[test]
fn reducer_laws_hold_for_random_event_sequences() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for _ in 0..300 {
        let mut turn = AssistantTurn::default();
        let length = rng.gen_range(0..40);

        for _ in 0..length {
            let event = random_event(&mut rng);
            let next = reduce(&turn, &event);

            assert!(next.active_step_count() <= 1, "more than one active step");
            assert!(
                next.content.starts_with(&turn.content),
                "content must only grow"
            );
            let before = step_ids(&turn);
            let after = step_ids(&next);
            assert_eq!(&after[..before.len()], before.as_slice(), "steps reordered");
            for (old, new) in turn.flows.iter().zip(&next.flows) {
                if old.status == StepStatus::Done {
                    assert_eq!(new.status, StepStatus::Done, "step reactivated");
                }
            }

            turn = next;
        }

        let terminal = if rng.gen_bool(0.5) {
            reduce(&turn, &StreamEvent::StreamEnd)
        } else {
            fail(&turn)
        };
        assert_eq!(terminal.active_step_count(), 0);
        assert!(terminal.complete);
        assert_eq!(step_ids(&terminal), step_ids(&turn));
        assert_eq!(close(&terminal), terminal);
    }
}

#[test]
fn step_ids_are_unique() {
    let mut turn = AssistantTurn::default();
    for kind in KINDS.iter().cycle().take(50) {
        turn = reduce(
            &turn,
            &StreamEvent::FlowStep {
                kind: kind.to_string(),
                detail: String::new(),
            },
        );
    }
    let mut ids = step_ids(&turn);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
}

#[tokio::test]
async fn randomly_partitioned_bodies_reduce_to_the_same_turn() {
    let body = sse(&[
        r#"{"type":"chat_start"}"#,
        r#"{"type":"search","query":"ryokan in Kyoto"}"#,
        r#"{"type":"content","content":"Two ryokan fit: "}"#,
        r#"{"type":"search_results","content":"2 hits"}"#,
        r#"{"type":"database","task":"rates for 京都"}"#,
        r#"{"type":"content","content":"Yoshida-sanso {quiet} and "}"#,
        r#"{"type":"content","content":"Tawaraya."}"#,
        "[DONE]",
        r#"{"type":"content","content":"ignored"}"#,
    ])
    .into_bytes();
    let mut rng = StdRng::seed_from_u64(7);

    let mut expected: Option<(String, Vec<(String, String)>)> = None;
    for _ in 0..60 {
        let mut cuts: Vec<usize> = (0..rng.gen_range(0..16))
            .map(|_| rng.gen_range(0..=body.len()))
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        let mut pulls = Vec::new();
        let mut start = 0;
        for cut in cuts.into_iter().chain([body.len()]) {
            pulls.push(Pull::Bytes(body[start..cut].to_vec()));
            start = cut;
        }

        let chat = controller(ScriptedTransport::body(pulls));
        let outcome = chat.send("kyoto").await.expect("send starts");
        assert!(matches!(outcome, StreamOutcome::Completed));

        let turns = chat.messages();
        let Some(Turn::Assistant(turn)) = turns.last() else {
            panic!("trailing assistant turn");
        };
        let observed = (
            turn.content.clone(),
            turn.flows
                .iter()
                .map(|step| (step.kind.clone(), step.detail.clone()))
                .collect::<Vec<_>>(),
        );

        match &expected {
            Some(expected) => assert_eq!(&observed, expected),
            None => {
                assert_eq!(observed.0, "Two ryokan fit: Yoshida-sanso {quiet} and Tawaraya.");
                assert_eq!(observed.1.len(), 2);
                expected = Some(observed);
            }
        }
    }
}
