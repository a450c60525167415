//! Merge/select engine: random sub-selection of generated questions, or
//! merging caller-fixed questions ahead of generated ones.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::domain::{FormSpec, QuestionKind, QuestionSpec};
use crate::errors::PipelineError;
use crate::intent::SelectCount;

/// Fixed questions are always graded four-option items.
const FIXED_OPTION_COUNT: usize = 4;

/// Keep a uniformly random `select` sized subset of the questions.
/// Uses a partial Fisher–Yates shuffle, so every subset is equally likely.
pub fn select_random<R: Rng + ?Sized>(mut form: FormSpec, select: SelectCount, rng: &mut R) -> FormSpec {
  let SelectCount::Count(amount) = select else { return form };
  if amount >= form.questions.len() {
    return form;
  }
  let (chosen, _) = form.questions.partial_shuffle(rng, amount);
  let chosen = chosen.to_vec();
  debug!(target: "pipeline", kept = chosen.len(), generated = form.questions.len(), "Random selection applied");
  form.questions = chosen;
  form
}

/// Every fixed question must be a single-choice item with text, exactly four
/// non-blank options and an in-range answer; texts must not repeat.
/// Returns the questions with text and options trimmed.
pub fn check_fixed_questions(fixed: &[QuestionSpec]) -> Result<Vec<QuestionSpec>, PipelineError> {
  let mut seen: HashMap<String, usize> = HashMap::new();
  let mut checked = Vec::with_capacity(fixed.len());
  for (index, q) in fixed.iter().enumerate() {
    let bad = |reason: String| PipelineError::InvalidFixedQuestion { index, reason };
    let text = q.text.trim();
    if text.is_empty() {
      return Err(bad("question text is empty".into()));
    }
    if q.kind != QuestionKind::SingleChoice {
      return Err(bad(format!("must be a single_choice question, found {:?}", q.kind)));
    }
    if q.options.len() != FIXED_OPTION_COUNT {
      return Err(bad(format!("must have exactly {FIXED_OPTION_COUNT} options, found {}", q.options.len())));
    }
    let options: Vec<String> = q.options.iter().map(|o| o.trim().to_string()).collect();
    if let Some(blank) = options.iter().position(String::is_empty) {
      return Err(bad(format!("option {blank} is empty")));
    }
    match q.correct_option_index {
      Some(i) if i < FIXED_OPTION_COUNT => {}
      Some(i) => return Err(bad(format!("correct_option_index {i} is out of range (must be 0-3)"))),
      None => return Err(bad("correct_option_index is required".into())),
    }
    let question = QuestionSpec {
      text: text.to_string(),
      kind: QuestionKind::SingleChoice,
      options,
      correct_option_index: q.correct_option_index,
    };
    if let Some(first) = seen.insert(question.dedup_key(), index) {
      return Err(bad(format!("duplicates fixed question {first}")));
    }
    checked.push(question);
  }
  Ok(checked)
}

/// Fixed questions first (in the given order), then generated questions whose
/// text does not repeat a fixed one. The result must hit `total` exactly.
pub fn merge_fixed(
  mut form: FormSpec,
  fixed: &[QuestionSpec],
  total: usize,
) -> Result<FormSpec, PipelineError> {
  let fixed = check_fixed_questions(fixed)?;

  let fixed_keys: HashSet<String> = fixed.iter().map(QuestionSpec::dedup_key).collect();
  let generated = std::mem::take(&mut form.questions);
  let generated_len = generated.len();

  let mut merged = fixed.clone();
  merged.extend(generated.into_iter().filter(|q| !fixed_keys.contains(&q.dedup_key())));

  let dropped = generated_len + fixed.len() - merged.len();
  if dropped > 0 {
    warn!(target: "pipeline", dropped, "Generated questions duplicated fixed questions");
  }
  if merged.len() != total {
    return Err(PipelineError::MergeCountMismatch { expected: total, actual: merged.len() });
  }

  form.questions = merged;
  Ok(form)
}
