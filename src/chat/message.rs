// src/chat/message.rs — Message and session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One exchanged message. Immutable once created; transcript order is
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only message sequence owned by exactly one session.
pub type Transcript = Vec<Message>;

/// Wire encoding of a transcript: a JSON array of role/content objects.
pub fn encode_transcript(transcript: &Transcript) -> anyhow::Result<String> {
    Ok(serde_json::to_string(transcript)?)
}

/// Decode a stored transcript. A malformed value is treated as an empty
/// transcript rather than an error (data loss is preferred over crash).
pub fn decode_transcript(session_id: &str, body: &str) -> Transcript {
    match serde_json::from_str(body) {
        Ok(t) => t,
        Err(e) => {
            warn!("Discarding malformed transcript for session {session_id}: {e}");
            Vec::new()
        }
    }
}

/// Allocate a fresh collision-resistant session identifier.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Index record for listing past sessions without loading transcripts.
/// Written alongside a session's first successfully stored exchange;
/// insertion is idempotent by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub first_message: String,
    pub created_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn new(id: impl Into<String>, first_message: &str, preview_len: usize) -> Self {
        Self {
            id: id.into(),
            first_message: truncate_preview(first_message, preview_len),
            created_at: Utc::now(),
        }
    }
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let end = text
        .char_indices()
        .nth(max)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!("{}...", &text[..end])
}
