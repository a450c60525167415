//! Intent parsing: how many questions to generate, how many to keep, and
//! whether caller-fixed questions are merged in.
//!
//! Free-text extraction is a best-effort heuristic. Anything it cannot read
//! confidently falls through to the configured default count.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::errors::PipelineError;

const COUNT_NOUNS: &str = r"questions?|items?|mcqs?|problems?";
const CREATE_VERBS: &str = r"create|generate|make|write|produce|give|prepare|build";
const SELECT_VERBS: &str = r"select|pick|choose|keep";

/// `<N> [up to two words] <noun>`: the only shape read as a question count.
/// Bare numbers (years, versions, "World War 2") never count.
static COUNT_NOUN: Lazy<Regex> = Lazy::new(|| {
  Regex::new(&format!(r"(?i)\b(\d+)\s+(?:[\w-]+\s+){{0,2}}?(?:{COUNT_NOUNS})\b"))
    .expect("COUNT_NOUN is a valid regex pattern")
});

/// `<create verb> [me|us] <N>` with N directly after the verb and closing the
/// clause or followed by a topic preposition ("Generate 5 about Rust").
static GENERATE_BARE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(&format!(
    r"(?i)\b(?:{CREATE_VERBS})\s+(?:me\s+|us\s+)?(\d+)(?:\s+(?:about|on|for|covering|regarding)\b|\s*(?:[.,;:!?]|$))"
  ))
  .expect("GENERATE_BARE is a valid regex pattern")
});

/// A counted generate clause followed by `<select verb> [only|just] <M>`, where
/// M closes the clause or is tied to a noun, "of them", or "at random".
static GENERATE_AND_SELECT: Lazy<Regex> = Lazy::new(|| {
  Regex::new(&format!(
    r"(?is)\b(\d+)\s+(?:[\w-]+\s+){{0,2}}?(?:{COUNT_NOUNS})\b.*?\b(?:{SELECT_VERBS})\s+(?:only\s+|just\s+)?(\d+)(?:\s+(?:of\s+(?:them|those)|at\s+random|randomly|(?:[\w-]+\s+){{0,2}}?(?:{COUNT_NOUNS}))\b|\s*(?:[.,;:!?)]|$))"
  ))
  .expect("GENERATE_AND_SELECT is a valid regex pattern")
});

/// How many of the generated questions end up in the form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectCount {
  All,
  Count(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intent {
  pub generate_count: usize,
  pub select_count: SelectCount,
  pub merge_mode: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct IntentParser {
  pub default_count: usize,
  pub max_count: usize,
}

impl Default for IntentParser {
  fn default() -> Self {
    Self { default_count: 10, max_count: 50 }
  }
}

impl IntentParser {
  pub fn new(default_count: usize, max_count: usize) -> Self {
    Self { default_count: default_count.max(1), max_count: max_count.max(1) }
  }

  /// Derive counts from explicit parameters first, then from the prompt text.
  pub fn parse(
    &self,
    prompt: &str,
    fixed_count: usize,
    total: Option<u32>,
  ) -> Result<Intent, PipelineError> {
    let intent = match (fixed_count, total) {
      (0, None) => self.parse_prompt(prompt)?,
      (0, Some(total)) => Intent {
        generate_count: self.check_count(total as usize)?,
        select_count: SelectCount::All,
        merge_mode: false,
      },
      (_, None) => {
        return Err(PipelineError::InvalidCount(
          "total_questions is required when fixed questions are supplied".into(),
        ))
      }
      (fixed, Some(total)) => {
        let total = total as usize;
        if total <= fixed {
          return Err(PipelineError::InvalidCount(format!(
            "total_questions ({total}) must be greater than the number of fixed questions ({fixed})"
          )));
        }
        self.check_count(total)?;
        Intent { generate_count: total - fixed, select_count: SelectCount::All, merge_mode: true }
      }
    };

    debug!(target: "pipeline", generate = intent.generate_count, select = ?intent.select_count, merge = intent.merge_mode, "Intent parsed");
    Ok(intent)
  }

  fn parse_prompt(&self, prompt: &str) -> Result<Intent, PipelineError> {
    if let Some(caps) = GENERATE_AND_SELECT.captures(prompt) {
      let generate = self.check_count(parse_number(&caps[1])?)?;
      let select = parse_number(&caps[2])?;
      if select == 0 {
        return Err(PipelineError::InvalidCount("cannot select 0 questions".into()));
      }
      if select > generate {
        return Err(PipelineError::InvalidCount(format!(
          "cannot select {select} questions out of {generate} generated"
        )));
      }
      return Ok(Intent {
        generate_count: generate,
        select_count: SelectCount::Count(select),
        merge_mode: false,
      });
    }

    let counted = COUNT_NOUN.captures(prompt).or_else(|| GENERATE_BARE.captures(prompt));
    let generate = match counted {
      Some(caps) => self.check_count(parse_number(&caps[1])?)?,
      None => self.default_count,
    };

    Ok(Intent { generate_count: generate, select_count: SelectCount::All, merge_mode: false })
  }

  fn check_count(&self, n: usize) -> Result<usize, PipelineError> {
    if n == 0 {
      return Err(PipelineError::InvalidCount("at least one question must be generated".into()));
    }
    if n > self.max_count {
      return Err(PipelineError::InvalidCount(format!(
        "{n} questions requested; the maximum is {}",
        self.max_count
      )));
    }
    Ok(n)
  }
}

fn parse_number(digits: &str) -> Result<usize, PipelineError> {
  digits
    .parse::<usize>()
    .map_err(|_| PipelineError::InvalidCount(format!("'{digits}' is not a usable count")))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parser() -> IntentParser {
    IntentParser::default()
  }

  #[test]
  fn single_generate_count() {
    let intent = parser().parse("Create 5 questions about Python", 0, None).unwrap();
    assert_eq!(intent, Intent { generate_count: 5, select_count: SelectCount::All, merge_mode: false });
  }

  #[test]
  fn generate_then_select() {
    let intent = parser().parse("Create 10 questions and select 3", 0, None).unwrap();
    assert_eq!(intent.generate_count, 10);
    assert_eq!(intent.select_count, SelectCount::Count(3));
    assert!(!intent.merge_mode);

    let intent = parser()
      .parse("Please generate 12 MCQs on the French Revolution, then pick 4 of them at random", 0, None)
      .unwrap();
    assert_eq!((intent.generate_count, intent.select_count), (12, SelectCount::Count(4)));
  }

  #[test]
  fn select_larger_than_generate_is_rejected() {
    let err = parser().parse("generate 3 questions and select 5", 0, None).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidCount(_)));
  }

  #[test]
  fn count_noun_without_verb() {
    let intent = parser().parse("I need 7 hard questions on calculus", 0, None).unwrap();
    assert_eq!(intent.generate_count, 7);
  }

  #[test]
  fn ambiguous_prompt_uses_default() {
    let intent = parser().parse("A quiz about volcanoes", 0, None).unwrap();
    assert_eq!(intent.generate_count, 10);
    assert_eq!(intent.select_count, SelectCount::All);
  }

  #[test]
  fn zero_and_oversized_counts_are_rejected() {
    assert!(parser().parse("generate 0 questions", 0, None).is_err());
    assert!(parser().parse("generate 500 questions", 0, None).is_err());
  }

  #[test]
  fn topical_numbers_are_not_counts() {
    for prompt in [
      "Create a quiz about the French Revolution of 1789",
      "Make a quiz about World War 2",
      "Generate a survey for our Q3 offsite",
      "Write a quiz on Python 3 features",
    ] {
      let intent = parser().parse(prompt, 0, None).unwrap();
      assert_eq!(intent.generate_count, 10, "{prompt}");
      assert_eq!(intent.select_count, SelectCount::All, "{prompt}");
    }
  }

  #[test]
  fn bare_count_right_after_verb() {
    assert_eq!(parser().parse("Generate 5 about Rust lifetimes", 0, None).unwrap().generate_count, 5);
    assert_eq!(parser().parse("Give me 3.", 0, None).unwrap().generate_count, 3);
    assert_eq!(parser().parse("Make 2 teams for a relay", 0, None).unwrap().generate_count, 10);
  }

  #[test]
  fn unrelated_select_verb_is_ignored() {
    let intent = parser()
      .parse("Create 5 questions about Python; keep it short for 10 year olds", 0, None)
      .unwrap();
    assert_eq!(intent, Intent { generate_count: 5, select_count: SelectCount::All, merge_mode: false });

    let intent = parser().parse("Make 8 questions and keep 2 minutes per answer in mind", 0, None).unwrap();
    assert_eq!(intent.select_count, SelectCount::All);
  }

  #[test]
  fn select_forms_tied_to_questions() {
    let intent = parser().parse("Write 20 quiz questions on WW2, choose only 5 questions", 0, None).unwrap();
    assert_eq!((intent.generate_count, intent.select_count), (20, SelectCount::Count(5)));

    let intent = parser().parse("Produce 15 items about 1789 and keep 6 at random.", 0, None).unwrap();
    assert_eq!((intent.generate_count, intent.select_count), (15, SelectCount::Count(6)));
  }

  #[test]
  fn merge_mode_subtracts_fixed_questions() {
    let intent = parser().parse("anything", 2, Some(5)).unwrap();
    assert_eq!(intent, Intent { generate_count: 3, select_count: SelectCount::All, merge_mode: true });
  }

  #[test]
  fn merge_mode_with_no_room_left_fails() {
    let err = parser().parse("anything", 1, Some(1)).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidCount(_)));
  }

  #[test]
  fn fixed_questions_without_total_fail() {
    assert!(matches!(parser().parse("x", 2, None), Err(PipelineError::InvalidCount(_))));
  }

  #[test]
  fn explicit_total_overrides_prompt() {
    let intent = parser().parse("Create 5 questions", 0, Some(8)).unwrap();
    assert_eq!(intent.generate_count, 8);
    assert!(!intent.merge_mode);
  }
}
