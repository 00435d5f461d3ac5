// src/provider/openai.rs — OpenAI-style streaming chat completions

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use std::time::Duration;

use super::{CompletionClient, CompletionRequest, FragmentStream};
use crate::chat::message::Role;
use crate::infra::errors::CharlaError;

pub struct OpenAIClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".into(), timeout)
    }

    /// Any OpenAI-compatible endpoint works; `timeout` bounds the whole
    /// request including stream consumption, and expiry surfaces as a
    /// stream error.
    pub fn with_base_url(api_key: String, base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            client,
            base_url,
        }
    }

    /// Build from the environment; the key is never read from config files.
    pub fn from_env(base_url: String, timeout: Duration) -> Result<Self, CharlaError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| CharlaError::NoApiKey)?;
        Ok(Self::with_base_url(api_key, base_url, timeout))
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    fn id(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, CharlaError> {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect();

        let body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
        });

        let request_builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let mut es = request_builder
            .eventsource()
            .map_err(|e| CharlaError::Provider {
                provider: "openai".into(),
                message: format!("Failed to open SSE stream: {e}"),
                retriable: false,
            })?;

        let stream = async_stream::stream! {
            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        if msg.data == "[DONE]" {
                            break;
                        }
                        let parsed: serde_json::Value = match serde_json::from_str(&msg.data) {
                            Ok(v) => v,
                            Err(e) => {
                                yield Err(CharlaError::Provider {
                                    provider: "openai".into(),
                                    message: format!("Failed to parse SSE data: {e}"),
                                    retriable: false,
                                });
                                break;
                            }
                        };

                        // A chunk without delta content is valid and
                        // contributes nothing.
                        let delta = parsed["choices"][0]["delta"]["content"]
                            .as_str()
                            .unwrap_or("")
                            .to_string();
                        yield Ok(delta);
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        let retriable = matches!(
                            &e,
                            reqwest_eventsource::Error::Transport(t)
                                if t.is_timeout() || t.is_connect()
                        );
                        yield Err(CharlaError::Provider {
                            provider: "openai".into(),
                            message: format!("SSE stream error: {e}"),
                            retriable,
                        });
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
