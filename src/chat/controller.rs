// src/chat/controller.rs — Conversation orchestration

use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::chat::message::{self, Message, SessionSummary, Transcript};
use crate::chat::view::ViewState;
use crate::infra::config::Config;
use crate::infra::errors::CharlaError;
use crate::provider::{CompletionClient, CompletionRequest};
use crate::store::CachedStore;

/// Transient marker appended to each rendered partial, stripped when the
/// reply is complete.
pub const CURSOR: &str = "▌";

/// The receiving side of an exchange has gone away (connection dropped).
#[derive(Debug)]
pub struct SinkClosed;

/// Where the controller pushes rendered output. Each `partial` call
/// replaces the previously displayed partial text; `message` delivers a
/// finished message; `notice` reports a non-fatal problem inline.
pub trait RenderSink: Send {
    fn partial(&mut self, text: &str) -> Result<(), SinkClosed>;
    fn message(&mut self, message: &Message) -> Result<(), SinkClosed>;
    fn notice(&mut self, text: &str);
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub system_message: String,
    pub preview_len: usize,
    pub window: usize,
    pub window_increment: usize,
}

impl ChatOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.name.clone(),
            system_message: config.system_message(),
            preview_len: config.chat.preview_len,
            window: config.chat.window,
            window_increment: config.chat.window_increment,
        }
    }
}

/// Ephemeral state for one UI connection: the active transcript, its view
/// window, and a cache of sessions already loaded this connection.
pub struct Conversation {
    pub view: ViewState,
    pub transcript: Transcript,
    loaded: HashMap<String, Transcript>,
    // Set once the active session is known to be in the index, so a
    // session whose first persist failed still gets indexed when storage
    // recovers on a later exchange.
    summary_written: bool,
}

impl Conversation {
    fn new(window: usize, increment: usize) -> Self {
        Self {
            view: ViewState::new(window, increment),
            transcript: Vec::new(),
            loaded: HashMap::new(),
            summary_written: false,
        }
    }

    /// The portion of the transcript currently rendered.
    pub fn visible(&self) -> &[Message] {
        self.view.visible(&self.transcript)
    }

    /// Reveal older messages without refetching from storage.
    pub fn load_more(&mut self) {
        self.view.load_more(self.transcript.len());
    }

    pub fn has_more(&self) -> bool {
        self.view.has_more(self.transcript.len())
    }
}

/// Result of one `submit` call.
#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Whitespace-only input: no message appended, no completion invoked.
    Ignored,
    /// The sink closed mid-stream; nothing was persisted.
    Aborted,
    /// Exchange appended and persisted. `stream_error` carries the notice
    /// when the completion failed mid-way and the partial text was kept.
    Completed {
        session_id: String,
        stream_error: Option<String>,
    },
}

/// Orchestrates one exchange at a time per conversation: resolve session,
/// load transcript, invoke the completion client, append, persist.
pub struct Controller {
    store: CachedStore,
    client: Arc<dyn CompletionClient>,
    options: ChatOptions,
    // One lock per session id, taken for the duration of an exchange.
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Controller {
    pub fn new(store: CachedStore, client: Arc<dyn CompletionClient>, options: ChatOptions) -> Self {
        Self {
            store,
            client,
            options,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Fresh per-connection state with the configured window sizes.
    pub fn conversation(&self) -> Conversation {
        Conversation::new(self.options.window, self.options.window_increment)
    }

    /// Start a new conversation: fresh identifier, empty transcript.
    /// Touches no storage; the session becomes durable on first exchange.
    pub fn start_new(&self, conv: &mut Conversation) -> String {
        let id = message::new_session_id();
        conv.transcript.clear();
        conv.view.activate(&id);
        conv.summary_written = false;
        id
    }

    /// Exclusive access to one session for the duration of an exchange.
    /// Exchanges for the same id run one at a time; different ids never
    /// wait on each other.
    async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.session_locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop a session's lock entry once nobody holds or waits on it.
    async fn release_session(&self, session_id: &str) {
        let mut locks = self.session_locks.lock().await;
        if let Some(lock) = locks.get(session_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(session_id);
            }
        }
    }

    /// One serialized exchange against a stored session, for callers that
    /// hold no per-connection state of their own (one HTTP request is one
    /// exchange). Concurrent calls for the same id queue up, each loading
    /// the transcript only after the previous exchange has persisted, so
    /// no exchange is lost to a concurrent overwrite.
    pub async fn submit_to_session(
        &self,
        session_id: &str,
        text: &str,
        sink: &mut dyn RenderSink,
    ) -> Result<SubmitOutcome, CharlaError> {
        let guard = self.lock_session(session_id).await;

        let mut conv = self.conversation();
        if let Err(e) = self.select_session(&mut conv, session_id).await {
            sink.notice(&format!("History unavailable for this session: {e}"));
        }
        let outcome = self.submit(&mut conv, text, sink).await;

        drop(guard);
        self.release_session(session_id).await;
        outcome
    }

    /// SessionSelected: load the transcript (through the per-connection
    /// cache) and reset the display window. Never invokes the completion
    /// boundary. On storage failure the session is still activated with an
    /// empty in-memory transcript, and the error is returned for display.
    pub async fn select_session(
        &self,
        conv: &mut Conversation,
        session_id: &str,
    ) -> Result<(), CharlaError> {
        conv.summary_written = false;

        if let Some(cached) = conv.loaded.get(session_id) {
            conv.transcript = cached.clone();
            conv.view.activate(session_id);
            return Ok(());
        }

        match self.store.get_transcript(session_id).await {
            Ok(transcript) => {
                conv.loaded.insert(session_id.to_string(), transcript.clone());
                conv.transcript = transcript;
                conv.view.activate(session_id);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load transcript for session {session_id}: {e}");
                conv.transcript = Vec::new();
                conv.view.activate(session_id);
                Err(CharlaError::Other(e))
            }
        }
    }

    /// UserMessageSubmitted: run one full exchange. The request carries the
    /// system message plus the transcript so far; the system message itself
    /// is never persisted. Partial output survives a mid-stream failure.
    pub async fn submit(
        &self,
        conv: &mut Conversation,
        text: &str,
        sink: &mut dyn RenderSink,
    ) -> Result<SubmitOutcome, CharlaError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        let session_id = match conv.view.active_session_id.clone() {
            Some(id) => id,
            None => self.start_new(conv),
        };

        let user = Message::user(trimmed);
        conv.transcript.push(user.clone());
        if sink.message(&user).is_err() {
            return Ok(SubmitOutcome::Aborted);
        }

        let mut prompt = Vec::with_capacity(conv.transcript.len() + 1);
        if !self.options.system_message.is_empty() {
            prompt.push(Message::system(&self.options.system_message));
        }
        prompt.extend(conv.transcript.iter().cloned());

        let request = CompletionRequest {
            model: self.options.model.clone(),
            messages: prompt,
        };

        let mut accumulated = String::new();
        let mut stream_error: Option<String> = None;

        match self.client.stream(request).await {
            Ok(mut stream) => {
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(fragment) => {
                            accumulated.push_str(&fragment);
                            if sink.partial(&format!("{accumulated}{CURSOR}")).is_err() {
                                // Connection gone: abandon without persisting.
                                return Ok(SubmitOutcome::Aborted);
                            }
                        }
                        Err(e) => {
                            stream_error = Some(e.to_string());
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                stream_error = Some(e.to_string());
            }
        }

        // The exchange is over; from here on a closed sink no longer
        // prevents persistence.
        let assistant = Message::assistant(accumulated);
        let _ = sink.partial(&assistant.content);
        let _ = sink.message(&assistant);
        conv.transcript.push(assistant);

        if let Some(ref e) = stream_error {
            sink.notice(e);
        }

        if let Err(e) = self
            .store
            .put_transcript(&session_id, conv.transcript.clone())
            .await
        {
            warn!("Failed to persist transcript for session {session_id}: {e}");
            sink.notice("Chat history could not be saved; continuing in memory only.");
        } else if !conv.summary_written {
            // Index the session alongside its first stored exchange. The
            // insert is idempotent by id, so re-running it after a
            // recovered storage failure leaves a single row.
            let summary =
                SessionSummary::new(&session_id, &conv.transcript[0].content, self.options.preview_len);
            match self.store.add_summary(summary).await {
                Ok(()) => conv.summary_written = true,
                Err(e) => {
                    warn!("Failed to index session {session_id}: {e}");
                    sink.notice("Session could not be added to the history list.");
                }
            }
        }

        conv.loaded.insert(session_id.clone(), conv.transcript.clone());

        Ok(SubmitOutcome::Completed {
            session_id,
            stream_error,
        })
    }

    /// All known sessions, most recent first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, CharlaError> {
        let mut summaries = self.store.list_summaries().await?;
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    /// Last-`window` page of a stored transcript, plus its total length.
    pub async fn transcript_page(
        &self,
        session_id: &str,
        window: usize,
    ) -> Result<(usize, Transcript), CharlaError> {
        let transcript = self.store.get_transcript(session_id).await?;
        let total = transcript.len();
        let start = total.saturating_sub(window);
        Ok((total, transcript[start..].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;
    use crate::provider::mock::ScriptedClient;
    use crate::store::{server, sqlite::Store};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    pub(crate) struct CollectingSink {
        pub partials: Vec<String>,
        pub notices: Vec<String>,
        pub closed: bool,
    }

    impl CollectingSink {
        pub fn new() -> Self {
            Self {
                partials: Vec::new(),
                notices: Vec::new(),
                closed: false,
            }
        }
    }

    impl RenderSink for CollectingSink {
        fn partial(&mut self, text: &str) -> Result<(), SinkClosed> {
            if self.closed {
                return Err(SinkClosed);
            }
            self.partials.push(text.to_string());
            Ok(())
        }

        fn message(&mut self, _message: &Message) -> Result<(), SinkClosed> {
            if self.closed {
                return Err(SinkClosed);
            }
            Ok(())
        }

        fn notice(&mut self, text: &str) {
            self.notices.push(text.to_string());
        }
    }

    fn controller(client: ScriptedClient) -> (Controller, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let store = CachedStore::new(
            server::spawn(Store::in_memory().unwrap()),
            Duration::from_secs(60),
        );
        let options = ChatOptions {
            model: "test-model".into(),
            system_message: "You are terse.".into(),
            preview_len: 50,
            window: 10,
            window_increment: 10,
        };
        (
            Controller::new(store, client.clone(), options),
            client,
        )
    }

    #[tokio::test]
    async fn test_partials_carry_cursor_and_final_strips_it() {
        let (controller, _) = controller(ScriptedClient::new(&["Bo", "njour"]));
        let mut conv = controller.conversation();
        let mut sink = CollectingSink::new();

        controller.submit(&mut conv, "Hello", &mut sink).await.unwrap();

        assert_eq!(
            sink.partials,
            vec!["Bo▌".to_string(), "Bonjour▌".to_string(), "Bonjour".to_string()]
        );
    }

    #[tokio::test]
    async fn test_system_message_in_request_but_not_transcript() {
        let (controller, client) = controller(ScriptedClient::new(&["ok"]));
        let mut conv = controller.conversation();
        let mut sink = CollectingSink::new();

        controller.submit(&mut conv, "Hello", &mut sink).await.unwrap();
        controller.submit(&mut conv, "Again", &mut sink).await.unwrap();

        for request in client.requests() {
            assert_eq!(request.messages[0].role, Role::System);
            assert_eq!(request.messages[0].content, "You are terse.");
        }
        assert!(conv.transcript.iter().all(|m| m.role != Role::System));

        let id = conv.view.active_session_id.clone().unwrap();
        let stored = controller.transcript_page(&id, 100).await.unwrap().1;
        assert!(stored.iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn test_closed_sink_aborts_without_persisting() {
        let (controller, _) = controller(ScriptedClient::new(&["never", "seen"]));
        let mut conv = controller.conversation();
        let mut sink = CollectingSink::new();
        sink.closed = true;

        let outcome = controller.submit(&mut conv, "Hello", &mut sink).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Aborted);

        let id = conv.view.active_session_id.clone().unwrap();
        let (total, _) = controller.transcript_page(&id, 100).await.unwrap();
        assert_eq!(total, 0);
        assert!(controller.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_written_only_on_first_exchange() {
        let (controller, _) = controller(ScriptedClient::new(&["ok"]));
        let mut conv = controller.conversation();
        let mut sink = CollectingSink::new();

        controller.submit(&mut conv, "first", &mut sink).await.unwrap();
        controller.submit(&mut conv, "second", &mut sink).await.unwrap();
        controller.submit(&mut conv, "third", &mut sink).await.unwrap();

        let sessions = controller.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].first_message, "first");
    }

    #[tokio::test]
    async fn test_start_new_touches_no_storage() {
        let (controller, _) = controller(ScriptedClient::new(&["ok"]));
        let mut conv = controller.conversation();

        let id = controller.start_new(&mut conv);
        assert!(conv.transcript.is_empty());
        assert_eq!(conv.view.active_session_id.as_deref(), Some(id.as_str()));
        assert!(controller.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_select_uses_connection_cache() {
        let (controller, _) = controller(ScriptedClient::new(&["ok"]));
        let mut conv = controller.conversation();
        let mut sink = CollectingSink::new();

        controller.submit(&mut conv, "Hello", &mut sink).await.unwrap();
        let id = conv.view.active_session_id.clone().unwrap();

        let other = controller.start_new(&mut conv);
        assert_ne!(other, id);

        controller.select_session(&mut conv, &id).await.unwrap();
        assert_eq!(conv.transcript.len(), 2);
        assert_eq!(conv.transcript[0].content, "Hello");
    }
}
