//! Generation client: turns a prompt and a target question count into raw
//! JSON from the generation service, applying the configured retry policy.
//!
//! Every failed attempt (transport, HTTP, timeout, non-JSON) is recorded and
//! the next attempt proceeds. A refusal payload (`{"error": "..."}`) stops the
//! loop immediately; retrying a policy decision only burns quota.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::errors::PipelineError;
use crate::llm::{BackendError, GenerationBackend};
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
  /// Each model once, in priority order.
  ModelFallback { models: Vec<String> },
  /// Same model up to `max_attempts` times, sleeping base·2^k between tries.
  Backoff { model: String, max_attempts: u32, base_delay: Duration },
}

impl RetryPolicy {
  /// Model for each attempt, in order.
  fn attempts(&self) -> Vec<&str> {
    match self {
      RetryPolicy::ModelFallback { models } => models.iter().map(String::as_str).collect(),
      RetryPolicy::Backoff { model, max_attempts, .. } => {
        (0..*max_attempts).map(|_| model.as_str()).collect()
      }
    }
  }

  /// Delay before attempt `attempt` (0-based); none before the first.
  fn delay_before(&self, attempt: usize) -> Option<Duration> {
    match self {
      RetryPolicy::Backoff { base_delay, .. } if attempt > 0 => {
        let exp = (attempt - 1).min(16) as u32;
        Some(base_delay.saturating_mul(2u32.pow(exp)))
      }
      _ => None,
    }
  }
}

pub struct GenerationClient {
  backend: Arc<dyn GenerationBackend>,
  prompts: Prompts,
  policy: RetryPolicy,
  call_timeout: Duration,
}

impl GenerationClient {
  pub fn new(
    backend: Arc<dyn GenerationBackend>,
    prompts: Prompts,
    policy: RetryPolicy,
    call_timeout: Duration,
  ) -> Self {
    Self { backend, prompts, policy, call_timeout }
  }

  pub fn system_instruction(&self, question_count: usize) -> String {
    fill_template(&self.prompts.form_system, &[("question_count", &question_count.to_string())])
  }

  pub fn user_prompt(&self, prompt: &str, avoid: &[String]) -> String {
    let mut user = fill_template(&self.prompts.form_user_template, &[("prompt", prompt.trim())]);
    if !avoid.is_empty() {
      user.push_str("\n\nThe form already contains these questions; do NOT repeat or rephrase them:\n");
      for text in avoid {
        user.push_str("- ");
        user.push_str(text);
        user.push('\n');
      }
    }
    user
  }

  /// Ask for `question_count` questions. Returns the parsed JSON on the first
  /// attempt that yields a JSON document.
  #[instrument(level = "info", skip(self, prompt, avoid), fields(prompt_len = prompt.len(), avoid = avoid.len()))]
  pub async fn generate(
    &self,
    prompt: &str,
    question_count: usize,
    avoid: &[String],
  ) -> Result<Value, PipelineError> {
    let system = self.system_instruction(question_count);
    let user = self.user_prompt(prompt, avoid);
    let mut failures: Vec<String> = Vec::new();

    for (attempt, model) in self.policy.attempts().into_iter().enumerate() {
      if let Some(delay) = self.policy.delay_before(attempt) {
        info!(attempt = attempt + 1, ?delay, "Backing off before retry");
        tokio::time::sleep(delay).await;
      }

      info!(attempt = attempt + 1, %model, "Trying model");
      let outcome = match tokio::time::timeout(self.call_timeout, self.backend.complete_json(model, &system, &user)).await {
        Ok(res) => res,
        Err(_) => Err(BackendError::Timeout(self.call_timeout)),
      };

      let text = match outcome {
        Ok(text) => text,
        Err(e) => {
          warn!(attempt = attempt + 1, %model, error = %e, "Generation attempt failed");
          failures.push(format!("{model}: {e}"));
          continue;
        }
      };

      let value = match parse_json_payload(&text) {
        Ok(v) => v,
        Err(e) => {
          warn!(attempt = attempt + 1, %model, error = %e, preview = %trunc_for_log(&text, 80), "Model returned malformed JSON");
          failures.push(format!("{model}: malformed JSON ({e})"));
          continue;
        }
      };

      if let Some(reason) = refusal_reason(&value) {
        warn!(%model, %reason, "Model declined the request");
        return Err(PipelineError::GenerationRefused(reason));
      }

      info!(attempt = attempt + 1, %model, "Generation succeeded");
      return Ok(value);
    }

    error!(attempts = failures.len(), "All generation attempts failed");
    if failures.is_empty() {
      failures.push("no models configured".into());
    }
    Err(PipelineError::GenerationExhausted { attempts: failures })
  }
}

/// Parse model output as JSON, tolerating a surrounding ```json fence.
fn parse_json_payload(text: &str) -> Result<Value, serde_json::Error> {
  let trimmed = text.trim();
  let unfenced = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .and_then(|s| s.strip_suffix("```"))
    .unwrap_or(trimmed);
  serde_json::from_str(unfenced.trim())
}

/// A JSON object whose `error` field is a non-empty string is a refusal.
fn refusal_reason(value: &Value) -> Option<String> {
  value
    .get("error")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
}
