// src/api/types.rs

use serde::{Deserialize, Serialize};

use crate::chat::message::Message;

/// Request body for submitting a user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub content: String,
}

/// Query string for paginated transcript reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    pub window: Option<usize>,
}

/// One page of a stored transcript: the last `window` messages.
#[derive(Debug, Serialize)]
pub struct TranscriptPage {
    pub session_id: String,
    pub total: usize,
    pub window: usize,
    pub messages: Vec<Message>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
