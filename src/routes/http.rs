//! HTTP endpoint handlers. These are thin wrappers that forward to the pipeline
//! and the Google adapters. Each handler is instrumented; prompts and tokens are
//! never logged, only their sizes.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, Query, State},
  http::{header, HeaderMap, HeaderName, HeaderValue},
  response::{AppendHeaders, IntoResponse, Redirect, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::GenerationRequest;
use crate::errors::{ApiError, ApiResult};
use crate::export::questions_as_text;
use crate::pipeline::{FormPipeline, GenerationOutcome};
use crate::protocol::*;
use crate::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "google_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "google_refresh_token";
pub const AUTH_FLAG_COOKIE: &str = "is_authenticated";
const APP_KEY_HEADER: &str = "x-app-key";

const ACCESS_MAX_AGE_SECS: u64 = 60 * 60;
const REFRESH_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation_enabled: state.pipeline.is_some(), oauth_enabled: state.oauth.is_some() })
}

#[instrument(level = "info", skip_all)]
pub async fn http_generate_form(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Result<Json<GenerateFormIn>, JsonRejection>,
) -> ApiResult<Json<GenerateFormOut>> {
  check_app_key(&state, &headers)?;
  let token = cookie_value(&headers, ACCESS_TOKEN_COOKIE)
    .ok_or_else(|| ApiError::Unauthorized("Session expired. Please log in again.".into()))?;
  let request = request_from(body)?;

  let form = pipeline(&state)?.run(&request).await?;
  let links = state.forms.create_form(&token, &form).await?;
  info!(target: "quizform_backend", title = %form.title, questions = form.questions.len(), edit_url = %links.edit_url, "Form created");

  Ok(Json(GenerateFormOut {
    status: "success",
    edit_url: links.edit_url,
    view_url: links.view_url,
    form_title: form.title,
    questions: form.questions,
  }))
}

/// Pipeline only: returns the tagged outcome without creating a Google Form.
#[instrument(level = "info", skip_all)]
pub async fn http_preview_form(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Result<Json<GenerateFormIn>, JsonRejection>,
) -> ApiResult<Json<GenerationOutcome>> {
  check_app_key(&state, &headers)?;
  let request = request_from(body)?;
  Ok(Json(pipeline(&state)?.generate(&request).await))
}

#[instrument(level = "info", skip_all)]
pub async fn http_export_text(body: Result<Json<ExportIn>, JsonRejection>) -> ApiResult<Json<ExportOut>> {
  let Json(body) = body.map_err(bad_body)?;
  info!(target: "quizform_backend", questions = body.form.questions.len(), with_answers = body.with_answers, "Export requested");
  Ok(Json(ExportOut { text: questions_as_text(&body.form, body.with_answers) }))
}

/// Without `code`: redirect to Google's consent screen. With `code`: exchange it,
/// store the tokens in cookies and send the user back to the app.
#[instrument(level = "info", skip_all, fields(has_code = q.code.is_some()))]
pub async fn http_auth_google(
  State(state): State<Arc<AppState>>,
  Query(q): Query<AuthQuery>,
) -> ApiResult<Response> {
  let oauth = state.oauth.as_ref().ok_or_else(|| ApiError::NotConfigured("Google OAuth".into()))?;
  if let Some(err) = q.error {
    warn!(target: "quizform_backend", %err, "Google consent denied");
    return Err(ApiError::BadRequest(format!("Google sign-in failed: {err}")));
  }

  let Some(code) = q.code else {
    let url = oauth.authorize_url()?;
    return Ok(Redirect::to(url.as_str()).into_response());
  };

  let tokens = oauth.exchange_code(&code).await?;
  let secure = state.cookie_secure;
  let mut cookies = vec![
    session_cookie(ACCESS_TOKEN_COOKIE, &tokens.access_token, ACCESS_MAX_AGE_SECS, true, secure),
    session_cookie(AUTH_FLAG_COOKIE, "true", ACCESS_MAX_AGE_SECS, false, secure),
  ];
  if let Some(refresh) = &tokens.refresh_token {
    cookies.push(session_cookie(REFRESH_TOKEN_COOKIE, refresh, REFRESH_MAX_AGE_SECS, true, secure));
  }
  let headers: Vec<(HeaderName, HeaderValue)> = cookies
    .into_iter()
    .filter_map(|c| match HeaderValue::from_str(&c) {
      Ok(v) => Some((header::SET_COOKIE, v)),
      Err(e) => {
        warn!(target: "quizform_backend", error = %e, "Dropping unencodable cookie");
        None
      }
    })
    .collect();

  info!(target: "quizform_backend", cookies = headers.len(), "Google sign-in complete");
  Ok((AppendHeaders(headers), Redirect::to("/")).into_response())
}

/// Parsed body with a non-blank prompt; malformed JSON renders as our error body.
fn request_from(body: Result<Json<GenerateFormIn>, JsonRejection>) -> ApiResult<GenerationRequest> {
  let Json(body) = body.map_err(bad_body)?;
  info!(target: "quizform_backend", prompt_len = body.prompt.as_deref().map_or(0, str::len), fixed = body.fixed_questions.len(), "Generation requested");
  body.into_request().ok_or_else(|| ApiError::BadRequest("Prompt is required.".into()))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
  ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}

fn pipeline(state: &AppState) -> ApiResult<&FormPipeline> {
  state
    .pipeline
    .as_deref()
    .ok_or_else(|| ApiError::NotConfigured("generation service".into()))
}

/// Enforced only when an app key is configured.
fn check_app_key(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
  let Some(expected) = &state.app_api_key else { return Ok(()) };
  let given = headers.get(APP_KEY_HEADER).and_then(|v| v.to_str().ok());
  if given != Some(expected.as_str()) {
    warn!(target: "quizform_backend", present = given.is_some(), "Rejected request with bad app key");
    return Err(ApiError::Unauthorized("Unauthorized: Invalid API Key".into()));
  }
  Ok(())
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(k, v)| *k == name && !v.is_empty())
    .map(|(_, v)| v.to_string())
}

fn session_cookie(name: &str, value: &str, max_age_secs: u64, http_only: bool, secure: bool) -> String {
  let mut c = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; SameSite=Lax");
  if http_only {
    c.push_str("; HttpOnly");
  }
  if secure {
    c.push_str("; Secure");
  }
  c
}
