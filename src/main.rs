//! QuizForm · Prompt-to-Google-Form Backend
//!
//! - Axum HTTP API: prompt → generated, validated form spec → Google Form
//! - Generation through any OpenAI-compatible chat endpoint (Gemini by default)
//! - Google OAuth sign-in, tokens kept in cookies
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   GEMINI_API_KEY        : enables generation (OPENAI_API_KEY also accepted)
//!   LLM_BASE_URL          : default Gemini's OpenAI-compatible endpoint
//!   APP_API_KEY           : when set, required in the `x-app-key` header
//!   GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET / GOOGLE_REDIRECT_URI : OAuth client
//!   COOKIE_SECURE         : "true" to mark session cookies Secure
//!   QUIZFORM_CONFIG_PATH  : path to TOML config (prompts, retry policy, validation mode)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod errors;
mod intent;
mod schema;
mod merge;
mod llm;
mod generation;
mod pipeline;
mod forms;
mod oauth;
mod export;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::config::EnvSettings;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: pipeline, Google adapters, deployment settings.
  let state = Arc::new(AppState::from_env());

  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], EnvSettings::from_env().port));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizform_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "quizform_backend", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "quizform_backend", "Shutdown signal received");
}
