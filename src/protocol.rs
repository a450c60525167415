//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{FormSpec, GenerationRequest, QuestionSpec};

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generation_enabled: bool,
    pub oauth_enabled: bool,
}

/// Body of `POST /api/generate-form`. `prompt` is optional on the wire so a
/// missing prompt reports the same 400 as a blank one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFormIn {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "fixed_questions")]
    pub fixed_questions: Vec<QuestionSpec>,
    #[serde(default, alias = "total_questions")]
    pub total_questions: Option<u32>,
}

impl GenerateFormIn {
    /// Non-blank prompt, or None.
    pub fn into_request(self) -> Option<GenerationRequest> {
        let prompt = self.prompt.filter(|p| !p.trim().is_empty())?;
        Some(GenerationRequest {
            fixed_questions: self.fixed_questions,
            total_questions: self.total_questions,
            ..GenerationRequest::from_prompt(prompt)
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateFormOut {
    pub status: &'static str,
    pub edit_url: String,
    pub view_url: String,
    pub form_title: String,
    pub questions: Vec<QuestionSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ExportIn {
    pub form: FormSpec,
    #[serde(default)]
    pub with_answers: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportOut {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}
