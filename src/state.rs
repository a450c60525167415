//! Application state: the generation pipeline, the Google adapters, and
//! deployment settings shared by every handler.
//!
//! Built once at startup from the TOML config (prompts, retry policy,
//! validation mode) and the environment (secrets, OAuth client).
//! Missing credentials disable the matching feature instead of aborting.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::{load_agent_config_from_env, AgentConfig, EnvSettings};
use crate::forms::{FormCreator, GoogleForms};
use crate::generation::GenerationClient;
use crate::intent::IntentParser;
use crate::llm::ChatCompletionsClient;
use crate::oauth::GoogleOAuth;
use crate::pipeline::FormPipeline;
use crate::schema::SchemaValidator;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Option<Arc<FormPipeline>>,
    pub forms: Arc<dyn FormCreator>,
    pub oauth: Option<GoogleOAuth>,
    pub app_api_key: Option<String>,
    pub cookie_secure: bool,
}

impl AppState {
    /// Build state from env: load config, init the LLM client and the Google adapters.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();
        let env = EnvSettings::from_env();
        let http = reqwest::Client::new();

        let pipeline = match &env.llm_api_key {
            Some(key) => {
                match ChatCompletionsClient::new(key.clone(), env.llm_base_url.clone(), cfg.generation.temperature) {
                    Ok(client) => {
                        info!(target: "quizform_backend", base_url = %client.base_url, strategy = ?cfg.generation.strategy, models = ?cfg.generation.models, "Generation enabled.");
                        Some(Arc::new(build_pipeline(&cfg, Arc::new(client))))
                    }
                    Err(e) => {
                        error!(target: "quizform_backend", error = %e, "Failed to build LLM client; generation disabled.");
                        None
                    }
                }
            }
            None => {
                warn!(target: "quizform_backend", "No GEMINI_API_KEY/OPENAI_API_KEY; generation disabled.");
                None
            }
        };

        let oauth = match (env.google_client_id, env.google_client_secret, env.google_redirect_uri) {
            (Some(id), Some(secret), Some(redirect)) => {
                info!(target: "quizform_backend", %redirect, "Google OAuth enabled.");
                Some(GoogleOAuth::new(http.clone(), id, secret, redirect))
            }
            _ => {
                warn!(target: "quizform_backend", "Google OAuth client not configured; /api/auth/google disabled.");
                None
            }
        };

        if env.app_api_key.is_none() {
            warn!(target: "quizform_backend", "APP_API_KEY not set; x-app-key check disabled.");
        }

        Self {
            pipeline,
            forms: Arc::new(GoogleForms::new(http)),
            oauth,
            app_api_key: env.app_api_key,
            cookie_secure: env.cookie_secure,
        }
    }
}

/// Wire the pipeline stages from config around a generation backend.
pub fn build_pipeline(cfg: &AgentConfig, backend: Arc<dyn crate::llm::GenerationBackend>) -> FormPipeline {
    let gen = &cfg.generation;
    let generator = GenerationClient::new(backend, cfg.prompts.clone(), gen.retry_policy(), gen.call_timeout());
    FormPipeline::new(
        IntentParser::new(gen.default_questions as usize, gen.max_questions as usize),
        generator,
        SchemaValidator::new(cfg.validation.mode),
    )
}
