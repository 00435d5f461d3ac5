// tests/controller_test.rs — Integration test: full exchange scenarios

use charla::chat::controller::{ChatOptions, Controller};
use charla::chat::message::{Message, Role};
use charla::chat::{RenderSink, SinkClosed, SubmitOutcome};
use charla::provider::mock::ScriptedClient;
use charla::store::{server, CachedStore, Store, StoreHandle};
use std::sync::Arc;
use std::time::Duration;

struct CollectingSink {
    partials: Vec<String>,
    notices: Vec<String>,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            partials: Vec::new(),
            notices: Vec::new(),
        }
    }
}

impl RenderSink for CollectingSink {
    fn partial(&mut self, text: &str) -> Result<(), SinkClosed> {
        self.partials.push(text.to_string());
        Ok(())
    }

    fn message(&mut self, _message: &Message) -> Result<(), SinkClosed> {
        Ok(())
    }

    fn notice(&mut self, text: &str) {
        self.notices.push(text.to_string());
    }
}

fn options() -> ChatOptions {
    ChatOptions {
        model: "test-model".into(),
        system_message: "You are a helpful assistant.".into(),
        preview_len: 50,
        window: 10,
        window_increment: 10,
    }
}

fn controller_with(client: ScriptedClient) -> (Controller, Arc<ScriptedClient>) {
    let client = Arc::new(client);
    let store = CachedStore::new(
        server::spawn(Store::in_memory().unwrap()),
        Duration::from_secs(60),
    );
    (Controller::new(store, client.clone(), options()), client)
}

#[tokio::test]
async fn test_n_submissions_store_2n_alternating_messages() {
    let (controller, _) = controller_with(ScriptedClient::new(&["reply"]));
    let mut conv = controller.conversation();
    let mut sink = CollectingSink::new();

    for i in 0..5 {
        let outcome = controller
            .submit(&mut conv, &format!("message {i}"), &mut sink)
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed { .. }));
    }

    let id = conv.view.active_session_id.clone().unwrap();
    let (total, stored) = controller.transcript_page(&id, 100).await.unwrap();
    assert_eq!(total, 10);
    for (i, message) in stored.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(message.role, expected, "position {i}");
    }
    assert_eq!(stored[8].content, "message 4");
}

#[tokio::test]
async fn test_first_exchange_creates_listed_summary() {
    let (controller, _) = controller_with(ScriptedClient::new(&["Hi! How can I help?"]));
    let mut conv = controller.conversation();
    let mut sink = CollectingSink::new();

    let outcome = controller
        .submit(&mut conv, "Hello, I have a contract question", &mut sink)
        .await
        .unwrap();
    let SubmitOutcome::Completed { session_id, stream_error } = outcome else {
        panic!("expected completed exchange");
    };
    assert!(stream_error.is_none());

    let (total, stored) = controller.transcript_page(&session_id, 10).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(stored[0], Message::user("Hello, I have a contract question"));
    assert_eq!(stored[1].role, Role::Assistant);

    let sessions = controller.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, session_id);
    assert!(sessions[0].first_message.starts_with("Hello"));
}

#[tokio::test]
async fn test_mid_stream_error_keeps_partial_and_persists() {
    let (controller, _) =
        controller_with(ScriptedClient::failing_after(&["Bo", "njour"], "connection reset"));
    let mut conv = controller.conversation();
    let mut sink = CollectingSink::new();

    let outcome = controller.submit(&mut conv, "Greet me", &mut sink).await.unwrap();
    let SubmitOutcome::Completed { session_id, stream_error } = outcome else {
        panic!("expected completed exchange");
    };
    assert!(stream_error.unwrap().contains("connection reset"));
    assert!(!sink.notices.is_empty());

    let (total, stored) = controller.transcript_page(&session_id, 10).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(stored[1], Message::assistant("Bonjour"));
}

#[tokio::test]
async fn test_empty_submission_is_a_noop() {
    let (controller, client) = controller_with(ScriptedClient::new(&["reply"]));
    let mut conv = controller.conversation();
    let mut sink = CollectingSink::new();

    for input in ["", "   ", "\n\t"] {
        let outcome = controller.submit(&mut conv, input, &mut sink).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored);
    }

    assert!(conv.transcript.is_empty());
    assert!(client.requests().is_empty());
    assert!(sink.partials.is_empty());
}

#[tokio::test]
async fn test_select_stored_session_paginates() {
    let store_handle = server::spawn(Store::in_memory().unwrap());
    let transcript: Vec<Message> = (0..15)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("q{i}"))
            } else {
                Message::assistant(format!("a{i}"))
            }
        })
        .collect();
    store_handle
        .put_transcript("old-session".into(), transcript)
        .await
        .unwrap();

    let cached = CachedStore::new(store_handle, Duration::from_secs(60));
    let controller = Controller::new(cached, Arc::new(ScriptedClient::new(&[])), options());

    let mut conv = controller.conversation();
    controller.select_session(&mut conv, "old-session").await.unwrap();

    assert_eq!(conv.visible().len(), 10);
    assert_eq!(conv.visible()[0].content, "q6"); // oldest 5 hidden
    assert!(conv.has_more());

    conv.load_more();
    assert_eq!(conv.visible().len(), 15);
    assert!(!conv.has_more());
}

#[tokio::test]
async fn test_selecting_never_invokes_completion() {
    let (controller, client) = controller_with(ScriptedClient::new(&["reply"]));
    let mut conv = controller.conversation();

    controller.select_session(&mut conv, "any-session").await.unwrap();
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_storage_unavailable_keeps_exchange_in_memory() {
    // A handle whose server task is gone: every storage call fails.
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    drop(rx);
    let dead_store = CachedStore::new(StoreHandle::new(tx), Duration::from_secs(60));

    let controller = Controller::new(
        dead_store,
        Arc::new(ScriptedClient::new(&["still here"])),
        options(),
    );
    let mut conv = controller.conversation();
    let mut sink = CollectingSink::new();

    let outcome = controller.submit(&mut conv, "Hello", &mut sink).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed { stream_error: None, .. }));

    // The exchange survived in memory and the user was told.
    assert_eq!(conv.transcript.len(), 2);
    assert_eq!(conv.transcript[1], Message::assistant("still here"));
    assert!(sink.notices.iter().any(|n| n.contains("in memory")));
}

#[tokio::test]
async fn test_concurrent_submissions_to_one_session_both_persist() {
    let (controller, _) = controller_with(ScriptedClient::new(&["reply"]));

    // Two exchanges racing on the same session id, as two simultaneous
    // HTTP requests would. Serialization must keep both.
    let first = async {
        let mut sink = CollectingSink::new();
        controller
            .submit_to_session("shared", "first question", &mut sink)
            .await
            .unwrap()
    };
    let second = async {
        let mut sink = CollectingSink::new();
        controller
            .submit_to_session("shared", "second question", &mut sink)
            .await
            .unwrap()
    };
    let (a, b) = tokio::join!(first, second);
    assert!(matches!(a, SubmitOutcome::Completed { .. }));
    assert!(matches!(b, SubmitOutcome::Completed { .. }));

    let (total, stored) = controller.transcript_page("shared", 10).await.unwrap();
    assert_eq!(total, 4);
    for (i, message) in stored.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(message.role, expected, "position {i}");
    }
}

#[tokio::test]
async fn test_concurrent_submissions_to_distinct_sessions_do_not_wait() {
    let (controller, _) = controller_with(ScriptedClient::new(&["reply"]));

    let a = async {
        let mut sink = CollectingSink::new();
        controller.submit_to_session("s-a", "hello a", &mut sink).await.unwrap()
    };
    let b = async {
        let mut sink = CollectingSink::new();
        controller.submit_to_session("s-b", "hello b", &mut sink).await.unwrap()
    };
    tokio::join!(a, b);

    assert_eq!(controller.transcript_page("s-a", 10).await.unwrap().0, 2);
    assert_eq!(controller.transcript_page("s-b", 10).await.unwrap().0, 2);
}

#[tokio::test]
async fn test_stored_but_unindexed_session_indexed_on_next_exchange() {
    let handle = server::spawn(Store::in_memory().unwrap());
    handle
        .put_transcript(
            "orphan".into(),
            vec![Message::user("Hello"), Message::assistant("Hi")],
        )
        .await
        .unwrap();

    let cached = CachedStore::new(handle, Duration::from_secs(60));
    let controller = Controller::new(cached, Arc::new(ScriptedClient::new(&["more"])), options());
    let mut conv = controller.conversation();
    let mut sink = CollectingSink::new();

    // A transcript exists but the session was never indexed (its first
    // persist predates the index entry, e.g. storage failed back then).
    controller.select_session(&mut conv, "orphan").await.unwrap();
    assert!(controller.list_sessions().await.unwrap().is_empty());

    controller.submit(&mut conv, "And another thing", &mut sink).await.unwrap();

    let sessions = controller.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "orphan");
    assert_eq!(sessions[0].first_message, "Hello");
}

#[tokio::test]
async fn test_sessions_listed_most_recent_first() {
    let (controller, _) = controller_with(ScriptedClient::new(&["ok"]));
    let mut sink = CollectingSink::new();

    let mut first_conv = controller.conversation();
    controller.submit(&mut first_conv, "older chat", &mut sink).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut second_conv = controller.conversation();
    controller.submit(&mut second_conv, "newer chat", &mut sink).await.unwrap();

    let sessions = controller.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].first_message, "newer chat");
    assert_eq!(sessions[1].first_message, "older chat");
}
