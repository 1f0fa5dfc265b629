mod support;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use concierge::{
    AssistantTurn, SendError, StepStatus, StreamOutcome, Turn, TRANSPORT_FAILURE_APOLOGY,
};
use pretty_assertions::assert_eq;
use session_store::{MemorySessionStore, SessionStorage, ACCESS_TOKEN_KEY};
use support::{bytes, controller, controller_with_storage, sse, ChannelTransport, Pull, Script, ScriptedTransport};

fn last_assistant(turns: &[Turn]) -> AssistantTurn {
    turns
        .last()
        .and_then(Turn::as_assistant)
        .cloned()
        .expect("trailing assistant turn")
}

#[tokio::test]
async fn plain_content_stream() {
    let transport = ScriptedTransport::body(vec![
        bytes("data: {\"type\":\"content\",\"content\":\"Hel\"}\n"),
        bytes("data: {\"type\":\"content\",\"content\":\"lo.\"}\ndata: {\"type\":\"end\"}\n"),
    ]);
    let chat = controller(transport.clone());

    let outcome = chat.send("hi").await.expect("send starts");

    assert!(matches!(outcome, StreamOutcome::Completed));
    let turns = chat.messages();
    assert_eq!(turns.len(), 2);
    assert_eq!(
        turns[0],
        Turn::User {
            content: "hi".to_string()
        }
    );
    let turn = last_assistant(&turns);
    assert_eq!(turn.content, "Hello.");
    assert!(turn.flows.is_empty());
    assert!(!chat.is_streaming());
    assert_eq!(transport.messages(), vec!["hi".to_string()]);
}

#[tokio::test]
async fn split_frame() {
    let chat = controller(ScriptedTransport::body(vec![
        bytes("data: {\"type\":\"cont"),
        bytes("ent\",\"content\":\"X\"}\ndata: [DONE]\n"),
    ]));

    let outcome = chat.send("x").await.expect("send starts");

    assert!(matches!(outcome, StreamOutcome::Completed));
    assert_eq!(last_assistant(&chat.messages()).content, "X");
    assert!(!chat.is_streaming());
}

#[tokio::test]
async fn flow_sequence() {
    let chat = controller(ScriptedTransport::body(vec![bytes(&sse(&[
        r#"{"type":"search","query":"hotels"}"#,
        r#"{"type":"content","content":"Searching..."}"#,
        r#"{"type":"search_results","content":"3 hits"}"#,
        r#"{"type":"end"}"#,
    ]))]));

    chat.send("find hotels").await.expect("send starts");

    let turn = last_assistant(&chat.messages());
    assert_eq!(turn.content, "Searching...");
    assert_eq!(turn.flows.len(), 1);
    assert_eq!(turn.flows[0].kind, "search");
    assert_eq!(turn.flows[0].detail, "hotels");
    assert_eq!(turn.flows[0].status, StepStatus::Done);
    assert!(!chat.is_streaming());
}

#[tokio::test]
async fn busy_reject() {
    let (transport, feed) = ChannelTransport::new();
    let chat = Arc::new(controller(transport));

    let first = tokio::spawn({
        let chat = Arc::clone(&chat);
        async move { chat.send("first").await }
    });

    feed.send(bytes(&sse(&[r#"{"type":"content","content":"working"}"#])))
        .expect("feed chunk");
    support::wait_until(|| {
        chat.with_conversation(|conversation| {
            conversation
                .active_turn()
                .is_some_and(|turn| turn.content == "working")
        })
    })
    .await;

    let before = chat.messages();
    assert_eq!(chat.send("again").await.err(), Some(SendError::Busy));
    assert_eq!(chat.messages(), before);
    assert!(chat.is_streaming());

    feed.send(bytes(&sse(&[r#"{"type":"end"}"#]))).expect("feed end");
    let outcome = first.await.expect("join").expect("first send");
    assert!(matches!(outcome, StreamOutcome::Completed));
    assert_eq!(chat.messages().len(), 2);
}

#[tokio::test]
async fn transport_failure_mid_stream() {
    let chat = controller(ScriptedTransport::body(vec![
        bytes(&sse(&[
            r#"{"type":"search","query":"flights"}"#,
            r#"{"type":"content","content":"partial"}"#,
        ])),
        Pull::Fail("connection reset".to_string()),
    ]));

    let outcome = chat.send("go").await.expect("send starts");

    assert!(matches!(outcome, StreamOutcome::TransportFailed(_)));
    let turn = last_assistant(&chat.messages());
    assert_eq!(turn.content, "partial");
    assert!(turn.flows.iter().all(|step| step.status == StepStatus::Done));
    assert!(!chat.is_streaming());
}

#[tokio::test]
async fn empty_turn_transport_failure() {
    let chat = controller(ScriptedTransport::new(vec![Script::Status(
        502,
        r#"{"detail":"agent offline"}"#.to_string(),
    )]));

    let outcome = chat.send("hello?").await.expect("send starts");

    let StreamOutcome::TransportFailed(error) = outcome else {
        panic!("expected a transport failure");
    };
    assert_eq!(error.detail(), Some("agent offline"));
    let turn = last_assistant(&chat.messages());
    assert_eq!(turn.content, TRANSPORT_FAILURE_APOLOGY);
    assert!(turn.complete);
    assert!(!chat.is_streaming());
}

#[tokio::test]
async fn unauthorized_open_logs_out() {
    let storage = support::signed_in_storage();
    let chat = controller_with_storage(
        ScriptedTransport::new(vec![Script::Status(401, r#"{"detail":"expired"}"#.to_string())]),
        storage.clone(),
    );

    let outcome = chat.send("hi").await.expect("send starts");

    assert!(matches!(outcome, StreamOutcome::Unauthorized));
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).expect("get"), None);
    assert_eq!(last_assistant(&chat.messages()).content, TRANSPORT_FAILURE_APOLOGY);
    assert_eq!(
        chat.send("again").await.err(),
        Some(SendError::NotAuthenticated)
    );
}

#[tokio::test]
async fn send_without_token_has_no_side_effects() {
    let transport = ScriptedTransport::new(Vec::new());
    let chat = controller_with_storage(transport.clone(), Arc::new(MemorySessionStore::new()));

    assert_eq!(chat.send("hi").await.err(), Some(SendError::NotAuthenticated));
    assert!(chat.messages().is_empty());
    assert_eq!(transport.opens(), 0);
}

#[tokio::test]
async fn body_end_without_terminal_frame_closes_turn() {
    let chat = controller(ScriptedTransport::body(vec![bytes(&sse(&[
        r#"{"type":"process","task":"pricing"}"#,
        r#"{"type":"content","content":"Done"}"#,
    ]))]));

    let outcome = chat.send("hi").await.expect("send starts");

    assert!(matches!(outcome, StreamOutcome::ReaderEnded));
    let turn = last_assistant(&chat.messages());
    assert_eq!(turn.content, "Done");
    assert_eq!(turn.active_step_count(), 0);
    assert!(turn.complete);
}

#[tokio::test]
async fn malformed_and_status_frames_do_not_stop_the_stream() {
    let chat = controller(ScriptedTransport::body(vec![bytes(&sse(&[
        r#"{"type":"chat_start"}"#,
        "{oops}",
        r#"{"type":"status","message":"thinking"}"#,
        r#"{"content":"typeless"}"#,
        r#"{"type":"content","content":"ok"}"#,
        r#"{"type":"chat_end"}"#,
    ]))]));

    let outcome = chat.send("hi").await.expect("send starts");

    assert!(matches!(outcome, StreamOutcome::Completed));
    let turn = last_assistant(&chat.messages());
    assert_eq!(turn.content, "ok");
    assert!(turn.flows.is_empty());
}

#[tokio::test]
async fn frames_after_end_are_not_applied() {
    let chat = controller(ScriptedTransport::body(vec![bytes(&sse(&[
        r#"{"type":"content","content":"a"}"#,
        r#"{"type":"end"}"#,
        r#"{"type":"content","content":"b"}"#,
    ]))]));

    chat.send("hi").await.expect("send starts");
    assert_eq!(last_assistant(&chat.messages()).content, "a");
}

#[tokio::test]
async fn cancel_keeps_partial_content_without_apology() {
    let (transport, feed) = ChannelTransport::new();
    let chat = Arc::new(controller(transport));
    let cancel = Arc::new(AtomicBool::new(false));

    let running = tokio::spawn({
        let chat = Arc::clone(&chat);
        let cancel = Arc::clone(&cancel);
        async move { chat.send_with("go", Some(&cancel), |_| {}).await }
    });

    feed.send(bytes(&sse(&[
        r#"{"type":"search","query":"trains"}"#,
        r#"{"type":"content","content":"so far"}"#,
    ])))
    .expect("feed chunk");
    support::wait_until(|| {
        chat.with_conversation(|conversation| {
            conversation
                .active_turn()
                .is_some_and(|turn| turn.content == "so far")
        })
    })
    .await;
    cancel.store(true, std::sync::atomic::Ordering::Release);

    let outcome = running.await.expect("join").expect("send starts");
    assert!(matches!(outcome, StreamOutcome::Cancelled));
    let turn = last_assistant(&chat.messages());
    assert_eq!(turn.content, "so far");
    assert_eq!(turn.active_step_count(), 0);
    assert!(!chat.is_streaming());
    drop(feed);
}

#[tokio::test]
async fn next_send_starts_with_a_clean_decoder() {
    let chat = controller(ScriptedTransport::new(vec![
        Script::Body(vec![bytes("data: {\"type\":\"content\",\"content\":\"one\"}\ndata: {\"type\":\"con")]),
        Script::Body(vec![bytes(&sse(&[
            r#"{"type":"content","content":"two"}"#,
            r#"{"type":"end"}"#,
        ]))]),
    ]));

    let first = chat.send("a").await.expect("first send");
    assert!(matches!(first, StreamOutcome::ReaderEnded));
    chat.send("b").await.expect("second send");

    let turns = chat.messages();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[1].content(), "one");
    assert_eq!(turns[3].content(), "two");
}

#[tokio::test]
async fn updates_are_observed_in_order() {
    let chat = controller(ScriptedTransport::body(vec![bytes(&sse(&[
        r#"{"type":"search","query":"q"}"#,
        r#"{"type":"content","content":"A"}"#,
        r#"{"type":"content","content":"B"}"#,
        r#"{"type":"end"}"#,
    ]))]));
    let mut seen = Vec::new();

    chat.send_with("hi", None, |turn| seen.push(turn.clone()))
        .await
        .expect("send starts");

    let contents: Vec<&str> = seen.iter().map(|turn| turn.content.as_str()).collect();
    assert_eq!(contents, vec!["", "", "A", "AB", "AB"]);
    assert!(seen.last().is_some_and(|turn| turn.complete));
}

#[tokio::test]
async fn update_callback_can_read_the_controller() {
    let chat = controller(ScriptedTransport::body(vec![bytes(&sse(&[
        r#"{"type":"search","query":"q"}"#,
        r#"{"type":"content","content":"A"}"#,
        r#"{"type":"end"}"#,
    ]))]));
    let mut observed = Vec::new();

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(3),
        chat.send_with("hi", None, |turn| {
            observed.push((chat.is_streaming(), chat.messages().len(), turn.complete));
        }),
    )
    .await
    .expect("callback must not block on the conversation lock")
    .expect("send starts");

    assert!(matches!(outcome, StreamOutcome::Completed));
    assert_eq!(observed.len(), 4);
    assert!(observed.iter().all(|(_, turns, _)| *turns == 2));
    assert_eq!(observed.last(), Some(&(false, 2, true)));
    assert!(observed[..3].iter().all(|(streaming, _, _)| *streaming));
}

#[tokio::test]
async fn mock_transport_runs_the_full_pipeline() {
    let transport = Arc::new(
        concierge::providers::MockChatTransport::default()
            .with_chunk_delay(std::time::Duration::ZERO),
    );
    let chat = controller(transport);

    let outcome = chat.send("Plan Lisbon").await.expect("send starts");

    assert!(matches!(outcome, StreamOutcome::Completed));
    let turn = last_assistant(&chat.messages());
    assert!(turn.content.starts_with("Here is a three-night plan"));
    assert!(turn.content.contains("€620"));
    let kinds: Vec<&str> = turn.flows.iter().map(|step| step.kind.as_str()).collect();
    assert_eq!(kinds, vec!["search", "database_query", "processing"]);
    assert!(turn.flows.iter().all(|step| step.status == StepStatus::Done));
}

#[tokio::test]
async fn clear_is_refused_while_streaming_and_allowed_after() {
    let (transport, feed) = ChannelTransport::new();
    let chat = Arc::new(controller(transport));
    let running = tokio::spawn({
        let chat = Arc::clone(&chat);
        async move { chat.send("hi").await }
    });

    support::wait_until(|| chat.is_streaming()).await;
    assert_eq!(chat.clear(), Err(SendError::Busy));

    feed.send(Pull::Bytes(b"data: [DONE]\n".to_vec())).expect("feed");
    running.await.expect("join").expect("send");
    chat.clear().expect("idle clear");
    assert!(chat.messages().is_empty());
}
