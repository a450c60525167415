//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - form generation, preview and export under `/api/...`
/// - the Google OAuth callback at `/api/auth/google`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/generate-form", post(http::http_generate_form))
        .route("/api/v1/preview", post(http::http_preview_form))
        .route("/api/v1/export", post(http::http_export_text))
        .route("/api/auth/google", get(http::http_auth_google))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::tests::FakeForms;
    use crate::generation::tests::FakeBackend;
    use crate::oauth::GoogleOAuth;
    use crate::pipeline::tests::{numbered, pipeline_with, quiz_json};
    use crate::schema::ValidationMode;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const APP_KEY: &str = "test-app-key";

    fn state_with(replies: Vec<Result<String, crate::llm::BackendError>>, forms: Arc<FakeForms>) -> Arc<AppState> {
        let backend = Arc::new(FakeBackend::new(replies));
        Arc::new(AppState {
            pipeline: Some(Arc::new(pipeline_with(backend, ValidationMode::Relaxed))),
            forms,
            oauth: Some(GoogleOAuth::new(
                reqwest::Client::new(),
                "client-id".into(),
                "client-secret".into(),
                "http://localhost:3000/api/auth/google".into(),
            )),
            app_api_key: Some(APP_KEY.into()),
            cookie_secure: false,
        })
    }

    fn generate_request(body: Value, app_key: Option<&str>, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/api/generate-form")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(k) = app_key {
            req = req.header("x-app-key", k);
        }
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_enabled_features() {
        let app = build_router(state_with(vec![], Arc::default()));
        let res = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["generation_enabled"], true);
    }

    #[tokio::test]
    async fn wrong_app_key_is_rejected() {
        let app = build_router(state_with(vec![], Arc::default()));
        let req = generate_request(json!({ "prompt": "x" }), Some("nope"), Some("google_access_token=t"));
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["message"], "Unauthorized: Invalid API Key");
    }

    #[tokio::test]
    async fn missing_session_cookie_is_rejected() {
        let app = build_router(state_with(vec![], Arc::default()));
        let req = generate_request(json!({ "prompt": "x" }), Some(APP_KEY), None);
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["message"], "Session expired. Please log in again.");
    }

    #[tokio::test]
    async fn blank_prompt_is_a_bad_request() {
        let app = build_router(state_with(vec![], Arc::default()));
        let req = generate_request(json!({ "prompt": "  " }), Some(APP_KEY), Some("google_access_token=t"));
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["message"], "Prompt is required.");
    }

    #[tokio::test]
    async fn generates_and_creates_form() {
        let forms = Arc::new(FakeForms::default());
        let state = state_with(vec![Ok(quiz_json(&numbered("Python", 5)))], forms.clone());
        let req = generate_request(
            json!({ "prompt": "Create 5 questions about Python" }),
            Some(APP_KEY),
            Some("theme=dark; google_access_token=tok-1"),
        );
        let res = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = json_body(res).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["edit_url"], "https://docs.google.com/forms/d/fake-id/edit");
        assert_eq!(body["form_title"], "Generated Quiz");
        assert_eq!(body["questions"].as_array().unwrap().len(), 5);

        let created = forms.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "tok-1");
    }

    fn fixed_item(text: &str, kind: &str) -> Value {
        json!({ "question": text, "type": kind, "options": ["a", "b", "c", "d"], "correct_option_index": 2 })
    }

    #[tokio::test]
    async fn fixed_questions_accept_label_aliases() {
        let forms = Arc::new(FakeForms::default());
        let state = state_with(vec![Ok(quiz_json(&numbered("Chemistry", 2)))], forms.clone());
        let body = json!({
            "prompt": "Chemistry quiz",
            "fixed_questions": [fixed_item(" Atomic number of carbon? ", "radio")],
            "total_questions": 3
        });
        let req = generate_request(body, Some(APP_KEY), Some("google_access_token=t"));
        let res = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["questions"][0]["question"], "Atomic number of carbon?");
        assert_eq!(body["questions"][0]["type"], "single_choice");
        assert_eq!(forms.created.lock().unwrap()[0].1.questions.len(), 3);
    }

    #[tokio::test]
    async fn fixed_text_question_with_options_is_rejected() {
        let state = state_with(vec![], Arc::default());
        let body = json!({
            "prompt": "x",
            "fixed_questions": [fixed_item("Graded text?", "short_text")],
            "total_questions": 3
        });
        let req = generate_request(body, Some(APP_KEY), Some("google_access_token=t"));
        let res = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["code"], "INVALID_FIXED_QUESTION");
    }

    #[tokio::test]
    async fn unknown_label_gets_json_error_body() {
        let state = state_with(vec![], Arc::default());
        let body = json!({
            "prompt": "x",
            "fixed_questions": [fixed_item("Q?", "riddle")],
            "total_questions": 3
        });
        let req = generate_request(body, Some(APP_KEY), Some("google_access_token=t"));
        let res = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["message"].as_str().unwrap().contains("unknown question type 'riddle'"));
    }

    #[tokio::test]
    async fn schema_failure_maps_to_unprocessable() {
        let forms = Arc::new(FakeForms::default());
        let state = state_with(vec![Ok(quiz_json(&numbered("Go", 2)))], forms.clone());
        let req = generate_request(
            json!({ "prompt": "Create 5 questions about Go" }),
            Some(APP_KEY),
            Some("google_access_token=t"),
        );
        let res = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(res).await["code"], "SCHEMA_VALIDATION");
        assert!(forms.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forms_failure_maps_to_bad_gateway() {
        let forms = Arc::new(FakeForms { fail: true, ..Default::default() });
        let state = state_with(vec![Ok(quiz_json(&numbered("Go", 3)))], forms);
        let req = generate_request(
            json!({ "prompt": "Create 3 questions about Go" }),
            Some(APP_KEY),
            Some("google_access_token=t"),
        );
        let res = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            json_body(res).await["message"],
            "Failed to create Google Form. Please check your permissions."
        );
    }

    #[tokio::test]
    async fn missing_llm_key_is_service_unavailable() {
        let mut state = (*state_with(vec![], Arc::default())).clone();
        state.pipeline = None;
        let req = generate_request(json!({ "prompt": "x" }), Some(APP_KEY), Some("google_access_token=t"));
        let res = build_router(Arc::new(state)).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn preview_returns_tagged_outcome() {
        let state = state_with(vec![Ok(quiz_json(&numbered("Rust", 2)))], Arc::default());
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/preview")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-app-key", APP_KEY)
            .body(Body::from(json!({ "prompt": "Create 2 questions about Rust" }).to_string()))
            .unwrap();
        let res = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["outcome"], "success");
        assert_eq!(body["form"]["questions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn auth_without_code_redirects_to_consent() {
        let app = build_router(state_with(vec![], Arc::default()));
        let res = app
            .oneshot(Request::builder().uri("/api/auth/google").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(res.status().is_redirection());
        let location = res.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(location.contains("access_type=offline"));
    }

    #[tokio::test]
    async fn export_renders_text() {
        let app = build_router(state_with(vec![], Arc::default()));
        let form = json!({
            "form_title": "T",
            "is_quiz": true,
            "questions": [{
                "question": "2 + 2?",
                "type": "single_choice",
                "options": ["3", "4"],
                "correct_option_index": 1
            }]
        });
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/export")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "form": form, "with_answers": true }).to_string()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["text"], "Q.1 2 + 2?\nA. 3\nB. 4\nCorrect Answer - <B> 4\n");
    }
}
