//! Candidate profiles and the read-only profile store.
//!
//! The matching core never owns profile data. It reads eligible, visible
//! candidates (with precomputed embeddings) through the narrow
//! [`ProfileStore`] trait and only ever hands a [`SanitizedProfile`]
//! projection back to callers. The embedding vector and the
//! visibility/eligibility flags stay inside the core.

use crate::ids::ProfileId;
use serde::{Deserialize, Serialize};

/// A candidate as the profile store hands it to the matching core.
///
/// `embedding`, `visible` and `eligible` are internal-only: they are
/// deliberately absent from [`SanitizedProfile`] and must never be
/// serialized into a response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: ProfileId,
    pub name: String,
    pub age: u8,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub distance_km: Option<u32>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub prompt_answer: Option<String>,

    /// Precomputed profile embedding. Internal only.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Whether the profile is discoverable at all. Internal only.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Whether the profile passes eligibility checks (complete, not
    /// suspended). Internal only.
    #[serde(default = "default_true")]
    pub eligible: bool,
}

fn default_true() -> bool {
    true
}

/// The outward projection of a candidate. This is the only profile shape
/// that ever crosses the API boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SanitizedProfile {
    pub id: ProfileId,
    pub name: String,
    pub age: u8,
    pub bio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub traits: Vec<String>,
    pub interests: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_answer: Option<String>,
}

impl From<&CandidateProfile> for SanitizedProfile {
    fn from(p: &CandidateProfile) -> Self {
        SanitizedProfile {
            id: p.id.clone(),
            name: p.name.clone(),
            age: p.age,
            bio: p.bio.clone(),
            location: p.location.clone(),
            traits: p.traits.clone(),
            interests: p.interests.clone(),
            prompt_answer: p.prompt_answer.clone(),
        }
    }
}

/// Read-only access to candidate profiles.
///
/// Contract: `candidates()` returns profiles in ascending id order, so
/// pagination with a fixed offset is stable absent underlying data changes.
pub trait ProfileStore: Send + Sync {
    fn candidates(&self) -> anyhow::Result<Vec<CandidateProfile>>;
}

/// In-memory profile store, loadable from a JSON file. Backs the daemon and
/// the one-shot CLI; tests construct it directly.
pub struct InMemoryProfileStore {
    profiles: Vec<CandidateProfile>,
}

impl InMemoryProfileStore {
    pub fn new(mut profiles: Vec<CandidateProfile>) -> Self {
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Self { profiles }
    }

    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let profiles: Vec<CandidateProfile> = serde_json::from_str(&raw)?;
        Ok(Self::new(profiles))
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn candidates(&self) -> anyhow::Result<Vec<CandidateProfile>> {
        Ok(self.profiles.clone())
    }
}
