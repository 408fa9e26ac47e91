//! Anthropic Messages API client (streaming).
//!
//! Text deltas from the event stream are concatenated into one string; chunk
//! boundaries carry no meaning for the caller.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::clients::traits::{ClientError, GenerationParams, TextGenerator};
use crate::config::GenerationConfig;

const API_VERSION: &str = "2023-06-01";
const BODY_CAP_BYTES: usize = 4 * 1024;

/// Server-sent event payloads we care about. Everything else maps to `Other`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ContentBlockDelta {
        delta: Delta,
    },
    MessageStop,
    Error {
        error: StreamErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StreamErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Line-buffered SSE parser. Buffers raw bytes so multi-byte characters split
/// across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<StreamEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    // `event:` lines repeat the type that the data payload already carries
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!("Failed to parse stream event: {}", e);
            None
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    stream: bool,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Text generator backed by the Messages API. Constructed explicitly and
/// shared by reference; it holds no mutable state.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(cfg: &GenerationConfig, api_key: Option<String>) -> Result<Self, ClientError> {
        let api_key = api_key
            .ok_or_else(|| ClientError::MissingCredentials("ANTHROPIC_API_KEY not set".into()))?;
        let mut builder = reqwest::Client::builder();
        if cfg.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(cfg.timeout_ms));
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Transport(format!("build http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
        })
    }

    /// Same connection and credentials, different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(
        &self,
        system: &str,
        user: &str,
        params: GenerationParams,
    ) -> Result<String, ClientError> {
        tracing::debug!(
            "Calling Anthropic (model={}, max_tokens={}, chars={})",
            self.model,
            params.max_tokens,
            user.len()
        );
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system,
            stream: true,
            messages: [Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            text.truncate(floor_char_boundary(&text, BODY_CAP_BYTES));
            return Err(match status.as_u16() {
                429 | 529 => ClientError::Quota(text),
                code => ClientError::Api { status: code, body: text },
            });
        }

        let mut parser = SseParser::new();
        let mut content = String::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::Transport(e.to_string()))?;
            for event in parser.parse_chunk(&chunk) {
                apply_event(&mut content, event)?;
            }
        }
        if let Some(event) = parser.finish() {
            apply_event(&mut content, event)?;
        }

        if content.trim().is_empty() {
            return Err(ClientError::EmptyResponse);
        }
        Ok(content)
    }
}

fn apply_event(content: &mut String, event: StreamEvent) -> Result<(), ClientError> {
    match event {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => content.push_str(&text),
        StreamEvent::Error { error } => {
            tracing::error!("Anthropic stream error: {} ({})", error.message, error.kind);
            return Err(match error.kind.as_str() {
                "overloaded_error" | "rate_limit_error" => ClientError::Quota(error.message),
                _ => ClientError::Stream(error.message),
            });
        }
        _ => {}
    }
    Ok(())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0)
}
