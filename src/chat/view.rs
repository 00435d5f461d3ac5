// src/chat/view.rs — Per-connection display state

use crate::chat::message::Message;

/// Ephemeral view state for one UI connection. Controls which session is
/// active and how much of its transcript is rendered. Never persisted.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub active_session_id: Option<String>,
    pub window: usize,
    default_window: usize,
    increment: usize,
}

impl ViewState {
    pub fn new(default_window: usize, increment: usize) -> Self {
        Self {
            active_session_id: None,
            window: default_window,
            default_window,
            increment,
        }
    }

    /// Switch to a session and reset the window to the default size.
    pub fn activate(&mut self, session_id: impl Into<String>) {
        self.active_session_id = Some(session_id.into());
        self.window = self.default_window;
    }

    /// Reveal older messages. Operates purely on the in-memory transcript;
    /// the window is capped at the transcript length.
    pub fn load_more(&mut self, transcript_len: usize) {
        self.window = (self.window + self.increment).min(transcript_len.max(self.default_window));
    }

    /// The slice of the transcript that should be rendered: the last
    /// `min(window, len)` messages.
    pub fn visible<'a>(&self, transcript: &'a [Message]) -> &'a [Message] {
        let start = transcript.len().saturating_sub(self.window);
        &transcript[start..]
    }

    /// Whether older messages exist beyond the current window.
    pub fn has_more(&self, transcript_len: usize) -> bool {
        transcript_len > self.window
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(10, 10)
    }
}
