//! Domain models: question kinds, questions, forms, and the generation request.

use serde::{de, Deserialize, Deserializer, Serialize};

/// How a question is answered. Produced by `QuestionKind::classify`, never by
/// probing which fields happen to be present downstream.
/// Serializes as the canonical snake_case name; deserializes any label
/// `from_label` accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  SingleChoice,
  MultiChoice,
  ShortText,
  LongText,
}
impl Default for QuestionKind {
  fn default() -> Self { QuestionKind::SingleChoice }
}

impl QuestionKind {
  /// Map a free-form `type` label (as emitted by models) to a kind.
  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
      "single_choice" | "single" | "radio" | "mcq" => Some(QuestionKind::SingleChoice),
      "multi_choice" | "multiple_choice" | "multi" | "checkbox" | "checkboxes" => Some(QuestionKind::MultiChoice),
      "short_text" | "short_answer" | "text" => Some(QuestionKind::ShortText),
      "long_text" | "paragraph" | "essay" => Some(QuestionKind::LongText),
      _ => None,
    }
  }

  /// Explicit label wins; otherwise infer from whether options were supplied.
  pub fn classify(label: Option<&str>, has_options: bool) -> Self {
    match label.and_then(Self::from_label) {
      Some(kind) => kind,
      None if has_options => QuestionKind::SingleChoice,
      None => QuestionKind::ShortText,
    }
  }

  pub fn is_choice(self) -> bool {
    matches!(self, QuestionKind::SingleChoice | QuestionKind::MultiChoice)
  }
}

impl<'de> Deserialize<'de> for QuestionKind {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let label = String::deserialize(deserializer)?;
    Self::from_label(&label).ok_or_else(|| de::Error::custom(format!("unknown question type '{label}'")))
  }
}

/// One question of a form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
  #[serde(rename = "question")]
  pub text: String,
  #[serde(rename = "type", default)]
  pub kind: QuestionKind,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub options: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correct_option_index: Option<usize>,
}

impl QuestionSpec {
  /// Key used for duplicate detection: trimmed and case-folded text.
  pub fn dedup_key(&self) -> String {
    crate::util::normalize_question_text(&self.text)
  }

  pub fn correct_option(&self) -> Option<&str> {
    self.correct_option_index
      .and_then(|i| self.options.get(i))
      .map(String::as_str)
  }
}

/// A validated form, ready to be handed to the form-creation service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSpec {
  #[serde(rename = "form_title")]
  pub title: String,
  pub is_quiz: bool,
  pub questions: Vec<QuestionSpec>,
}

/// Caller input for one pipeline run.
#[derive(Clone, Debug, Default)]
pub struct GenerationRequest {
  pub prompt: String,
  pub fixed_questions: Vec<QuestionSpec>,
  pub total_questions: Option<u32>,
}

impl GenerationRequest {
  pub fn from_prompt(prompt: impl Into<String>) -> Self {
    Self { prompt: prompt.into(), ..Default::default() }
  }
}
