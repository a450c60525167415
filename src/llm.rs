//! Minimal chat-completions client for the generation service.
//!
//! Any OpenAI-compatible endpoint works; the default base URL is Gemini's
//! OpenAI-compatible API. We only request strict JSON objects.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
  #[error("transport error: {0}")]
  Transport(String),

  #[error("LLM HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("empty response")]
  EmptyResponse,

  #[error("timed out after {0:?}")]
  Timeout(Duration),
}

/// One JSON-mode completion: system instruction + user prompt in, raw text out.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
  async fn complete_json(&self, model: &str, system: &str, user: &str) -> Result<String, BackendError>;
}

#[derive(Clone)]
pub struct ChatCompletionsClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub temperature: f32,
}

impl ChatCompletionsClient {
  pub fn new(api_key: String, base_url: String, temperature: f32) -> Result<Self, BackendError> {
    // The pipeline bounds each call itself; this is only a backstop.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(300))
      .build()
      .map_err(|e| BackendError::Transport(e.to_string()))?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), temperature })
  }
}

#[async_trait]
impl GenerationBackend for ChatCompletionsClient {
  #[instrument(level = "info", skip(self, system, user), fields(model = %model, system_len = system.len(), user_len = user.len()))]
  async fn complete_json(&self, model: &str, system: &str, user: &str) -> Result<String, BackendError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "quizform-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| BackendError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      return Err(BackendError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| BackendError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "LLM response received");

    if text.trim().is_empty() {
      return Err(BackendError::EmptyResponse);
    }
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an API error body.
/// Gemini's compatibility layer sometimes wraps the object in a one-element array.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  if let Ok(w) = serde_json::from_str::<EWrap>(body) {
    return Some(w.error.message);
  }
  serde_json::from_str::<Vec<EWrap>>(body)
    .ok()
    .and_then(|mut v| v.pop())
    .map(|w| w.error.message)
}
