//! Plain-text rendering of a form, for copy/paste or printing.

use crate::domain::{FormSpec, QuestionSpec};

/// `Q.1 text`, lettered options, and optionally the correct answer line.
pub fn questions_as_text(form: &FormSpec, with_answers: bool) -> String {
  form.questions
    .iter()
    .enumerate()
    .map(|(i, q)| question_block(i + 1, q, with_answers))
    .collect::<Vec<_>>()
    .join("\n")
}

fn question_block(n: usize, q: &QuestionSpec, with_answers: bool) -> String {
  let mut text = format!("Q.{n} {}\n", q.text);
  if q.kind.is_choice() {
    for (idx, opt) in q.options.iter().enumerate() {
      text.push_str(&format!("{}. {}\n", option_label(idx), opt));
    }
  } else {
    text.push_str("(free text answer)\n");
  }
  if with_answers {
    if let (Some(idx), Some(answer)) = (q.correct_option_index, q.correct_option()) {
      text.push_str(&format!("Correct Answer - <{}> {}\n", option_label(idx), answer));
    }
  }
  text
}

/// A, B, C, … then AA, AB for very long option lists.
fn option_label(idx: usize) -> String {
  let letter = |i: usize| char::from(b'A' + (i % 26) as u8);
  if idx < 26 {
    letter(idx).to_string()
  } else {
    format!("{}{}", letter(idx / 26 - 1), letter(idx))
  }
}
