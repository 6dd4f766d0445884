//! Pluggable model capabilities.
//!
//! The three external-model call types the pipeline depends on, each behind
//! its own trait so scoring and ranking stay unit-testable without a live
//! model:
//!
//! - `IntentExtractor`: free text → structured intent payload
//! - `Embedder`: text → fixed-length vector
//! - `ExplanationWriter`: profile + intent → explanation draft
//!
//! One production adapter ([`openai::OpenAiModelClient`], any
//! OpenAI-compatible endpoint) and deterministic test doubles in `stub`.

pub mod openai;
#[cfg(test)]
pub mod stub;

use crate::intent::{ExtractedIntent, Intent};
use crate::preferences::LearnedPreferences;
use crate::profiles::CandidateProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from a model call. Callers recover per stage: extraction falls
/// back to the pinned degraded intent, embedding to no-vector, explanation
/// to the profile-field template.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model output was not usable: {0}")]
    Malformed(String),
}

/// Context supplied to intent extraction: prior intent when refining, and
/// learned preferences as a hint for the prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractionContext<'a> {
    pub prior: Option<&'a Intent>,
    pub preferences: Option<&'a LearnedPreferences>,
}

/// Model-written explanation fields, before percentage and emoji are
/// attached by the pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationDraft {
    pub tagline: String,
    pub summary: String,
    pub conversation_starters: Vec<String>,
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(
        &self,
        query: &str,
        context: ExtractionContext<'_>,
    ) -> Result<ExtractedIntent, ModelError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;
}

#[async_trait]
pub trait ExplanationWriter: Send + Sync {
    async fn write_explanation(
        &self,
        profile: &CandidateProfile,
        intent: &Intent,
    ) -> Result<ExplanationDraft, ModelError>;
}
