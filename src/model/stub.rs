//! Deterministic test doubles for the model capabilities.
//!
//! Each stub either returns a fixed value or fails on every call, and counts
//! invocations so tests can assert a stage was (or was not) reached.

use crate::intent::{ExtractedIntent, Intent};
use crate::model::{
    Embedder, ExplanationDraft, ExplanationWriter, ExtractionContext, IntentExtractor, ModelError,
};
use crate::profiles::CandidateProfile;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

fn stub_failure() -> ModelError {
    ModelError::Malformed("stubbed failure".to_string())
}

pub struct StubExtractor {
    result: Option<ExtractedIntent>,
    pub calls: AtomicUsize,
}

impl StubExtractor {
    pub fn returning(result: ExtractedIntent) -> Self {
        Self {
            result: Some(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentExtractor for StubExtractor {
    async fn extract(
        &self,
        _query: &str,
        _context: ExtractionContext<'_>,
    ) -> Result<ExtractedIntent, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().ok_or_else(stub_failure)
    }
}

pub struct StubEmbedder {
    result: Option<Vec<f32>>,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            result: Some(vector),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().ok_or_else(stub_failure)
    }
}

pub struct StubExplainer {
    fail_for: Vec<String>,
    fail_all: bool,
    pub calls: AtomicUsize,
}

impl StubExplainer {
    /// Writes a deterministic draft for every candidate.
    pub fn succeeding() -> Self {
        Self {
            fail_for: vec![],
            fail_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails only for the named profile ids, succeeds for the rest.
    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            fail_for: ids.iter().map(|s| s.to_string()).collect(),
            fail_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_for: vec![],
            fail_all: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExplanationWriter for StubExplainer {
    async fn write_explanation(
        &self,
        profile: &CandidateProfile,
        _intent: &Intent,
    ) -> Result<ExplanationDraft, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all || self.fail_for.iter().any(|id| id.as_str() == profile.id.as_str()) {
            return Err(stub_failure());
        }

        Ok(ExplanationDraft {
            tagline: format!("Meet {}", profile.name),
            summary: format!("{} looks like a great fit.", profile.name),
            conversation_starters: vec![format!("Ask {} about their week", profile.name)],
        })
    }
}
