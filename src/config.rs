//! Loading service configuration (prompts + generation policy + validation mode) from TOML,
//! plus secrets and endpoints from the environment.
//!
//! Every TOML section is optional; missing keys fall back to the defaults below.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::generation::RetryPolicy;
use crate::schema::ValidationMode;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
  #[serde(default)]
  pub validation: ValidationSettings,
}

/// Prompts sent to the generation service.
/// `{question_count}` is substituted into the system template, `{prompt}` into the user one.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub form_system: String,
  pub form_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      form_system: DEFAULT_FORM_SYSTEM.into(),
      form_user_template: "User Request: \"{prompt}\"".into(),
    }
  }
}

const DEFAULT_FORM_SYSTEM: &str = r#"
You are a quiz and survey author that turns a user's request into a Google Form definition.

Rules:
- Produce EXACTLY {question_count} questions. No more, no fewer.
- Every question text must be unique.
- Quiz questions are "single_choice" with exactly 4 options and a "correct_option_index" (0-3).
  Vary the position of the correct option.
- Survey questions may use "multi_choice", "short_text" or "long_text"; text questions have no options.
- Set "is_quiz" to true when the questions have correct answers.

Output ONLY strict JSON of this shape:
{"form_title": string, "is_quiz": boolean, "questions": [
  {"question": string, "type": string, "options": [string], "correct_option_index": number}
]}

If the request is harmful, hateful, sexual, or otherwise inappropriate, output ONLY:
{"error": "<one short sentence explaining why the request was declined>"}
"#;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
  /// Try each model in `models` once, in order.
  #[default]
  ModelFallback,
  /// Retry the first model with exponential backoff.
  Backoff,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub strategy: RetryStrategy,
  pub models: Vec<String>,
  pub max_attempts: u32,
  pub base_backoff_ms: u64,
  pub call_timeout_secs: u64,
  pub temperature: f32,
  pub default_questions: u32,
  pub max_questions: u32,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      strategy: RetryStrategy::ModelFallback,
      models: [
        "gemini-2.5-pro",
        "gemini-2.5-flash-lite",
        "gemini-2.5-flash-lite-preview-09-2025",
        "gemini-2.5-flash",
        "gemini-2.5-flash-preview-09-2025",
        "gemini-3-flash-preview",
      ]
      .iter()
      .map(|m| m.to_string())
      .collect(),
      max_attempts: 3,
      base_backoff_ms: 1000,
      call_timeout_secs: 45,
      temperature: 0.7,
      default_questions: 10,
      max_questions: 50,
    }
  }
}

impl GenerationSettings {
  pub fn retry_policy(&self) -> RetryPolicy {
    match self.strategy {
      RetryStrategy::ModelFallback => RetryPolicy::ModelFallback { models: self.models.clone() },
      RetryStrategy::Backoff => RetryPolicy::Backoff {
        model: self.models.first().cloned().unwrap_or_default(),
        max_attempts: self.max_attempts.max(1),
        base_delay: Duration::from_millis(self.base_backoff_ms),
      },
    }
  }

  pub fn call_timeout(&self) -> Duration {
    Duration::from_secs(self.call_timeout_secs.max(1))
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct ValidationSettings {
  pub mode: ValidationMode,
}

/// Secrets and deployment knobs read from the environment.
#[derive(Clone, Debug)]
pub struct EnvSettings {
  pub port: u16,
  pub llm_api_key: Option<String>,
  pub llm_base_url: String,
  pub app_api_key: Option<String>,
  pub google_client_id: Option<String>,
  pub google_client_secret: Option<String>,
  pub google_redirect_uri: Option<String>,
  pub cookie_secure: bool,
}

impl EnvSettings {
  pub fn from_env() -> Self {
    let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
    Self {
      port: var("PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(3000),
      llm_api_key: var("GEMINI_API_KEY").or_else(|| var("OPENAI_API_KEY")),
      llm_base_url: var("LLM_BASE_URL")
        .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta/openai".into()),
      app_api_key: var("APP_API_KEY"),
      google_client_id: var("GOOGLE_CLIENT_ID"),
      google_client_secret: var("GOOGLE_CLIENT_SECRET"),
      google_redirect_uri: var("GOOGLE_REDIRECT_URI"),
      cookie_secure: var("COOKIE_SECURE").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
    }
  }
}

/// Attempt to load `AgentConfig` from QUIZFORM_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("QUIZFORM_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quizform_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quizform_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quizform_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
