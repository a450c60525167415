//! Error taxonomy for the pipeline and its HTTP mapping.
//!
//! `PipelineError` is what the core returns; `ApiError` is what handlers
//! return and knows how to render itself as a JSON error response.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::forms::FormsError;
use crate::oauth::OAuthError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
  #[error("Invalid question count: {0}")]
  InvalidCount(String),

  #[error("Generation refused: {0}")]
  GenerationRefused(String),

  #[error("All generation attempts failed: {}", .attempts.join("; "))]
  GenerationExhausted { attempts: Vec<String> },

  #[error("JSON Validation Failed: {0}")]
  SchemaValidation(String),

  #[error("Fixed question {index} is invalid: {reason}")]
  InvalidFixedQuestion { index: usize, reason: String },

  #[error("Merged form has {actual} questions but {expected} were requested")]
  MergeCountMismatch { expected: usize, actual: usize },
}

impl PipelineError {
  pub fn error_code(&self) -> &'static str {
    match self {
      PipelineError::InvalidCount(_) => "INVALID_COUNT",
      PipelineError::GenerationRefused(_) => "GENERATION_REFUSED",
      PipelineError::GenerationExhausted { .. } => "GENERATION_EXHAUSTED",
      PipelineError::SchemaValidation(_) => "SCHEMA_VALIDATION",
      PipelineError::InvalidFixedQuestion { .. } => "INVALID_FIXED_QUESTION",
      PipelineError::MergeCountMismatch { .. } => "MERGE_COUNT_MISMATCH",
    }
  }

  /// Failures of the generation service itself, as opposed to bad input or
  /// bad generated content.
  pub fn is_generation_failure(&self) -> bool {
    matches!(self, PipelineError::GenerationRefused(_) | PipelineError::GenerationExhausted { .. })
  }

  /// Message that is safe to show the caller. Attempt-level transport
  /// details stay in the logs.
  pub fn user_message(&self) -> String {
    match self {
      PipelineError::GenerationExhausted { .. } => {
        "All available models failed to generate content. Please try again later.".to_string()
      }
      PipelineError::GenerationRefused(reason) => reason.clone(),
      other => other.to_string(),
    }
  }
}

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  BadRequest(String),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),

  #[error(transparent)]
  Forms(#[from] FormsError),

  #[error(transparent)]
  OAuth(#[from] OAuthError),

  #[error("Not configured: {0}")]
  NotConfigured(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub status: &'static str,
  pub code: &'static str,
  pub message: String,
}

impl ApiError {
  fn error_code(&self) -> &'static str {
    match self {
      ApiError::Unauthorized(_) => "UNAUTHORIZED",
      ApiError::BadRequest(_) => "BAD_REQUEST",
      ApiError::Pipeline(e) => e.error_code(),
      ApiError::Forms(_) => "FORM_CREATION_FAILED",
      ApiError::OAuth(_) => "OAUTH_FAILED",
      ApiError::NotConfigured(_) => "NOT_CONFIGURED",
    }
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Pipeline(e) => match e {
        PipelineError::InvalidCount(_)
        | PipelineError::InvalidFixedQuestion { .. }
        | PipelineError::GenerationRefused(_) => StatusCode::BAD_REQUEST,
        PipelineError::SchemaValidation(_) | PipelineError::MergeCountMismatch { .. } => {
          StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::GenerationExhausted { .. } => StatusCode::BAD_GATEWAY,
      },
      ApiError::Forms(_) => StatusCode::BAD_GATEWAY,
      ApiError::OAuth(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
  }

  fn user_message(&self) -> String {
    match self {
      ApiError::Pipeline(e) => e.user_message(),
      ApiError::Forms(_) => "Failed to create Google Form. Please check your permissions.".to_string(),
      ApiError::OAuth(_) => "Failed to authenticate with Google.".to_string(),
      other => other.to_string(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      error!(target: "quizform_backend", code = self.error_code(), error = %self, "Request failed");
    }
    let body = ErrorOut { status: "error", code: self.error_code(), message: self.user_message() };
    (status, Json(body)).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
