//! Pipeline orchestrator: intent → generation → schema validation →
//! select/merge. Any failure aborts the run; no partial form escapes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{FormSpec, GenerationRequest};
use crate::errors::PipelineError;
use crate::generation::GenerationClient;
use crate::intent::IntentParser;
use crate::merge::{check_fixed_questions, merge_fixed, select_random};
use crate::schema::SchemaValidator;

/// Caller-facing result of one run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
  Success { form: FormSpec },
  ValidationFailure { code: &'static str, reason: String },
  GenerationFailure { code: &'static str, reason: String },
}

impl From<Result<FormSpec, PipelineError>> for GenerationOutcome {
  fn from(res: Result<FormSpec, PipelineError>) -> Self {
    match res {
      Ok(form) => GenerationOutcome::Success { form },
      Err(e) if e.is_generation_failure() => {
        GenerationOutcome::GenerationFailure { code: e.error_code(), reason: e.user_message() }
      }
      Err(e) => GenerationOutcome::ValidationFailure { code: e.error_code(), reason: e.user_message() },
    }
  }
}

pub struct FormPipeline {
  intent: IntentParser,
  generator: GenerationClient,
  validator: SchemaValidator,
}

impl FormPipeline {
  pub fn new(intent: IntentParser, generator: GenerationClient, validator: SchemaValidator) -> Self {
    Self { intent, generator, validator }
  }

  /// Run the pipeline and fold the result into a tagged outcome.
  pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
    self.run(request).await.into()
  }

  pub async fn run(&self, request: &GenerationRequest) -> Result<FormSpec, PipelineError> {
    // ThreadRng is !Send and would pin the future to one thread.
    let mut rng = StdRng::from_entropy();
    self.run_with_rng(request, &mut rng).await
  }

  #[instrument(
    level = "info",
    skip_all,
    fields(run_id = %Uuid::new_v4(), prompt_len = request.prompt.len(), fixed = request.fixed_questions.len())
  )]
  pub async fn run_with_rng<R: Rng + Send + ?Sized>(
    &self,
    request: &GenerationRequest,
    rng: &mut R,
  ) -> Result<FormSpec, PipelineError> {
    let result = self.run_inner(request, rng).await;
    match &result {
      Ok(form) => info!(target: "pipeline", title = %form.title, questions = form.questions.len(), "Form spec ready"),
      Err(e) if e.is_generation_failure() => error!(target: "pipeline", code = e.error_code(), error = %e, "Pipeline aborted"),
      Err(e) => warn!(target: "pipeline", code = e.error_code(), error = %e, "Pipeline aborted"),
    }
    result
  }

  async fn run_inner<R: Rng + Send + ?Sized>(
    &self,
    request: &GenerationRequest,
    rng: &mut R,
  ) -> Result<FormSpec, PipelineError> {
    let fixed = &request.fixed_questions;
    let intent = self.intent.parse(&request.prompt, fixed.len(), request.total_questions)?;

    // Reject bad fixed questions before spending a generation call on them.
    let avoid: Vec<String> = if intent.merge_mode {
      check_fixed_questions(fixed)?.into_iter().map(|q| q.text).collect()
    } else {
      Vec::new()
    };

    let raw = self.generator.generate(&request.prompt, intent.generate_count, &avoid).await?;
    let form = self.validator.validate(&raw, Some(intent.generate_count))?;

    if intent.merge_mode {
      merge_fixed(form, fixed, fixed.len() + intent.generate_count)
    } else {
      Ok(select_random(form, intent.select_count, rng))
    }
  }
}
