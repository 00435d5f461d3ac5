// src/provider/mock.rs — Scripted completion client for deterministic tests

use async_trait::async_trait;
use std::sync::Mutex;

use super::{CompletionClient, CompletionRequest, FragmentStream};
use crate::infra::errors::CharlaError;

/// Replays a fixed fragment script per request, optionally failing after
/// the scripted fragments. Records every request it receives so tests can
/// assert on the exact prompt sent to the completion boundary.
pub struct ScriptedClient {
    fragments: Vec<String>,
    fail_with: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            fail_with: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Emit the scripted fragments, then error mid-stream.
    pub fn failing_after(fragments: &[&str], message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(fragments)
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, CharlaError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let fragments = self.fragments.clone();
        let fail_with = self.fail_with.clone();

        let stream = async_stream::stream! {
            for fragment in fragments {
                yield Ok(fragment);
            }
            if let Some(message) = fail_with {
                yield Err(CharlaError::Provider {
                    provider: "scripted".into(),
                    message,
                    retriable: false,
                });
            }
        };

        Ok(Box::pin(stream))
    }
}
