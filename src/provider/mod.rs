// src/provider/mod.rs — Completion boundary

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::chat::message::Message;
use crate::infra::errors::CharlaError;

/// Incremental text fragments in generation order. The sequence is finite;
/// one `Err` item means the stream failed and will produce nothing further.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CharlaError>> + Send>>;

/// One streaming completion request: the full prompt (system message plus
/// transcript so far) and the model to run it on.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

/// The external completion service. One call produces one lazy fragment
/// sequence; fragments are concatenated in arrival order to reconstruct
/// the reply, with no reordering or deduplication.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn id(&self) -> &str;

    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, CharlaError>;
}
