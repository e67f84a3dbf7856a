use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use owlly_core::config::CompletionConfig;
use owlly_core::Message;

use crate::error::CompletionError;

/// Error code the API uses when the prompt exceeds the model's context.
pub const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// Result of one completion call, already classified for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Reply text of the first choice. May be empty.
    Ok(String),
    /// The conversation no longer fits the model; the thread should close.
    TooLong,
    /// Anything else, with a human-readable detail.
    Error(String),
}

/// Something that can turn a conversation into a reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, model: &str, messages: &[Message]) -> CompletionOutcome;
}

/// Classify a raw completion response.
///
/// 200 yields the first choice's message content (a `null` content is an
/// empty reply). Any other status looks at `error.code`; the context-length
/// code means [`CompletionOutcome::TooLong`], everything else is an error
/// carrying the raw payload.
pub fn classify(status: u16, body: &Value) -> CompletionOutcome {
    if status == 200 {
        return match body.pointer("/choices/0/message") {
            Some(message) => CompletionOutcome::Ok(
                message
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            None => CompletionOutcome::Error(
                CompletionError::Parse("response has no choices[0].message".into()).to_string(),
            ),
        };
    }

    match body.pointer("/error/code").and_then(Value::as_str) {
        Some(CONTEXT_LENGTH_EXCEEDED) => CompletionOutcome::TooLong,
        _ => CompletionOutcome::Error(body.to_string()),
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

/// HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct CompletionClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl CompletionClient {
    pub fn new(api_key: String, url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            url,
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Self {
        Self::new(config.api_key.clone(), config.url.clone())
    }

    async fn post(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<(u16, Value), CompletionError> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest { model, messages })
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Parse(format!("status {status}: {e}")))?;
        Ok((status, body))
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, model: &str, messages: &[Message]) -> CompletionOutcome {
        debug!(model, messages = messages.len(), "sending completion request");

        let outcome = match self.post(model, messages).await {
            Ok((status, body)) => classify(status, &body),
            Err(e) => CompletionOutcome::Error(e.to_string()),
        };
        match &outcome {
            CompletionOutcome::Ok(reply) => debug!(model, len = reply.len(), "completion ok"),
            CompletionOutcome::TooLong => warn!(model, "completion rejected: context too long"),
            CompletionOutcome::Error(detail) => warn!(model, detail = %detail, "completion failed"),
        }
        outcome
    }
}
