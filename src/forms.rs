//! Google Forms adapter: materializes a validated `FormSpec` as a remote form.
//!
//! Two calls: `forms.create` (title only, as the API requires) and one
//! `forms.batchUpdate` carrying quiz settings and every question item.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::{FormSpec, QuestionKind, QuestionSpec};

const FORMS_API_BASE: &str = "https://forms.googleapis.com/v1";

#[derive(Debug, Error)]
pub enum FormsError {
  #[error("Google Forms transport error: {0}")]
  Transport(String),

  #[error("Google Forms HTTP {status}: {message}")]
  Http { status: u16, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormLinks {
  pub edit_url: String,
  pub view_url: String,
}

#[async_trait]
pub trait FormCreator: Send + Sync {
  async fn create_form(&self, access_token: &str, form: &FormSpec) -> Result<FormLinks, FormsError>;
}

#[derive(Clone)]
pub struct GoogleForms {
  client: reqwest::Client,
  base_url: String,
}

impl GoogleForms {
  pub fn new(client: reqwest::Client) -> Self {
    Self { client, base_url: FORMS_API_BASE.to_string() }
  }

  async fn post_json(&self, url: &str, token: &str, body: &Value) -> Result<reqwest::Response, FormsError> {
    let res = self.client.post(url)
      .header(USER_AGENT, "quizform-backend/0.1")
      .header(AUTHORIZATION, format!("Bearer {token}"))
      .json(body)
      .send()
      .await
      .map_err(|e| FormsError::Transport(e.to_string()))?;
    if !res.status().is_success() {
      let status = res.status().as_u16();
      let message = res.text().await.unwrap_or_default();
      return Err(FormsError::Http { status, message });
    }
    Ok(res)
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedForm {
  form_id: String,
  #[serde(default)]
  responder_uri: Option<String>,
}

#[async_trait]
impl FormCreator for GoogleForms {
  #[instrument(level = "info", skip_all, fields(title = %form.title, questions = form.questions.len()))]
  async fn create_form(&self, access_token: &str, form: &FormSpec) -> Result<FormLinks, FormsError> {
    let create_body = json!({ "info": { "title": form.title, "documentTitle": form.title } });
    let created: CreatedForm = self
      .post_json(&format!("{}/forms", self.base_url), access_token, &create_body)
      .await?
      .json()
      .await
      .map_err(|e| FormsError::Transport(e.to_string()))?;

    let batch = json!({ "requests": build_batch_requests(form) });
    self
      .post_json(&format!("{}/forms/{}:batchUpdate", self.base_url, created.form_id), access_token, &batch)
      .await?;

    let links = links_for(&created.form_id, created.responder_uri);
    info!(form_id = %created.form_id, "Google Form created");
    Ok(links)
  }
}

fn links_for(form_id: &str, responder_uri: Option<String>) -> FormLinks {
  FormLinks {
    edit_url: format!("https://docs.google.com/forms/d/{form_id}/edit"),
    view_url: responder_uri.unwrap_or_else(|| format!("https://docs.google.com/forms/d/{form_id}/viewform")),
  }
}

/// Batch requests: quiz settings first (when a quiz), then one item per question.
pub fn build_batch_requests(form: &FormSpec) -> Vec<Value> {
  let mut requests = Vec::with_capacity(form.questions.len() + 1);
  if form.is_quiz {
    requests.push(json!({
      "updateSettings": {
        "settings": { "quizSettings": { "isQuiz": true } },
        "updateMask": "quizSettings.isQuiz"
      }
    }));
  }
  for (index, q) in form.questions.iter().enumerate() {
    requests.push(json!({
      "createItem": {
        "item": { "title": q.text, "questionItem": { "question": question_body(q, form.is_quiz) } },
        "location": { "index": index }
      }
    }));
  }
  requests
}

fn question_body(q: &QuestionSpec, is_quiz: bool) -> Value {
  let mut body = match q.kind {
    QuestionKind::SingleChoice | QuestionKind::MultiChoice => {
      let kind = if q.kind == QuestionKind::SingleChoice { "RADIO" } else { "CHECKBOX" };
      json!({
        "required": true,
        "choiceQuestion": {
          "type": kind,
          "options": q.options.iter().map(|o| json!({ "value": o })).collect::<Vec<_>>(),
          "shuffle": true
        }
      })
    }
    QuestionKind::ShortText => json!({ "required": true, "textQuestion": { "paragraph": false } }),
    QuestionKind::LongText => json!({ "required": true, "textQuestion": { "paragraph": true } }),
  };

  let graded = is_quiz && q.kind.is_choice();
  if let (true, Some(answer)) = (graded, q.correct_option()) {
    body["grading"] = json!({
      "pointValue": 1,
      "correctAnswers": { "answers": [{ "value": answer }] }
    });
  }
  body
}
