//! Structural validation of raw generation output.
//!
//! Checks run in a fixed order and stop at the first violation, so the
//! message always names the earliest broken rule. Validation is pure.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{FormSpec, QuestionKind, QuestionSpec};
use crate::errors::PipelineError;
use crate::util::normalize_question_text;

/// `Relaxed` accepts any choice question with at least two options.
/// `Strict` is the legacy contract: exactly four options and a graded answer
/// on every single-choice question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
  #[default]
  Relaxed,
  Strict,
}

const STRICT_OPTION_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaValidator {
  pub mode: ValidationMode,
}

impl SchemaValidator {
  pub fn new(mode: ValidationMode) -> Self {
    Self { mode }
  }

  pub fn validate(&self, raw: &Value, expected: Option<usize>) -> Result<FormSpec, PipelineError> {
    let root = raw
      .as_object()
      .ok_or_else(|| invalid("Response is not a valid JSON object."))?;

    let title = root
      .get("form_title")
      .or_else(|| root.get("title"))
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or_else(|| invalid("Missing 'form_title' in response."))?;

    let raw_questions = root
      .get("questions")
      .and_then(Value::as_array)
      .filter(|qs| !qs.is_empty())
      .ok_or_else(|| invalid("Response must contain at least one question."))?;

    if let Some(expected) = expected {
      if raw_questions.len() != expected {
        return Err(invalid(format!(
          "Expected exactly {expected} questions but received {}.",
          raw_questions.len()
        )));
      }
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut questions = Vec::with_capacity(raw_questions.len());
    for (i, raw_q) in raw_questions.iter().enumerate() {
      let n = i + 1;
      let (obj, text) = question_text(n, raw_q)?;
      if let Some(first) = seen.insert(normalize_question_text(text), n) {
        return Err(invalid(format!("Question {n} duplicates question {first}.")));
      }
      questions.push(self.validate_question(n, obj, text)?);
    }

    let is_quiz = match root.get("is_quiz") {
      None | Some(Value::Null) => questions.iter().any(|q| q.correct_option_index.is_some()),
      Some(Value::Bool(b)) => *b,
      Some(_) => return Err(invalid("'is_quiz' must be a boolean.")),
    };

    Ok(FormSpec { title: title.to_string(), is_quiz, questions })
  }

  fn validate_question(&self, n: usize, obj: &Map<String, Value>, text: &str) -> Result<QuestionSpec, PipelineError> {
    let raw_options = obj.get("options").filter(|v| !v.is_null());
    let has_options = raw_options
      .and_then(Value::as_array)
      .map(|a| !a.is_empty())
      .unwrap_or(false);
    let kind = QuestionKind::classify(obj.get("type").and_then(Value::as_str), has_options);

    if !kind.is_choice() {
      return Ok(QuestionSpec {
        text: text.to_string(),
        kind,
        options: Vec::new(),
        correct_option_index: None,
      });
    }

    let options = self.validate_options(n, raw_options)?;
    let correct_option_index = validate_correct_index(n, obj, options.len())?;

    if self.mode == ValidationMode::Strict
      && kind == QuestionKind::SingleChoice
      && correct_option_index.is_none()
    {
      return Err(invalid(format!(
        "Question {n} has an invalid correct_option_index (must be 0-{}).",
        options.len() - 1
      )));
    }

    Ok(QuestionSpec { text: text.to_string(), kind, options, correct_option_index })
  }

  fn validate_options(&self, n: usize, raw: Option<&Value>) -> Result<Vec<String>, PipelineError> {
    let arr = raw.and_then(Value::as_array);
    let len = arr.map(Vec::len).unwrap_or(0);

    match self.mode {
      ValidationMode::Strict if len != STRICT_OPTION_COUNT => {
        return Err(invalid(format!("Question {n} must have exactly {STRICT_OPTION_COUNT} options.")));
      }
      ValidationMode::Relaxed if len < 2 => {
        return Err(invalid(format!("Question {n} must have at least 2 options.")));
      }
      _ => {}
    }

    arr
      .into_iter()
      .flatten()
      .enumerate()
      .map(|(k, opt)| {
        opt
          .as_str()
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .map(str::to_string)
          .ok_or_else(|| invalid(format!("Question {n} option {} must be a non-empty string.", k + 1)))
      })
      .collect()
  }
}

/// Object and trimmed, non-empty text of question `n`.
fn question_text(n: usize, raw: &Value) -> Result<(&Map<String, Value>, &str), PipelineError> {
  let obj = raw
    .as_object()
    .ok_or_else(|| invalid(format!("Question {n} is not an object.")))?;
  let text = obj
    .get("question")
    .or_else(|| obj.get("text"))
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| invalid(format!("Question {n} is missing text.")))?;
  Ok((obj, text))
}

fn validate_correct_index(
  n: usize,
  obj: &Map<String, Value>,
  option_count: usize,
) -> Result<Option<usize>, PipelineError> {
  let raw = match obj.get("correct_option_index") {
    None | Some(Value::Null) => return Ok(None),
    Some(v) => v,
  };
  raw
    .as_u64()
    .map(|i| i as usize)
    .filter(|i| *i < option_count)
    .map(Some)
    .ok_or_else(|| {
      invalid(format!(
        "Question {n} has an invalid correct_option_index (must be 0-{}).",
        option_count - 1
      ))
    })
}

fn invalid(reason: impl Into<String>) -> PipelineError {
  PipelineError::SchemaValidation(reason.into())
}
