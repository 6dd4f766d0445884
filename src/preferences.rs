//! Per-user learned preference weights.
//!
//! The weights are owned and mutated elsewhere (feedback events); this core
//! only reads a best-effort snapshot. The read interface distinguishes a
//! user with no stored preferences ([`PreferenceSnapshot::Absent`]) from a
//! user whose stored map happens to be empty — absence triggers the neutral
//! preference score in the ranker, an empty map does not.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token→weight map built from historical feedback. Tokens are matched
/// case-insensitively, so keys are normalized to lowercase on construction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LearnedPreferences {
    weights: HashMap<String, f32>,
}

impl LearnedPreferences {
    pub fn new(weights: HashMap<String, f32>) -> Self {
        let weights = weights
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { weights }
    }

    pub fn weight_of(&self, token: &str) -> Option<f32> {
        self.weights.get(&token.to_lowercase()).copied()
    }

    /// Sum of all positive weights: the maximum preference mass any single
    /// candidate could accumulate.
    pub fn max_weight_sum(&self) -> f32 {
        self.weights.values().filter(|w| **w > 0.0).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Highest-weighted tokens, for seeding extraction prompts.
    pub fn top_tokens(&self, count: usize) -> Vec<String> {
        let mut entries: Vec<(&String, f32)> =
            self.weights.iter().map(|(k, v)| (k, *v)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().take(count).map(|(k, _)| k.clone()).collect()
    }
}

/// Read result from the preference store. `Absent` is an explicit sentinel,
/// never conflated with an empty map.
#[derive(Clone, Debug)]
pub enum PreferenceSnapshot {
    Absent,
    Loaded(LearnedPreferences),
}

impl PreferenceSnapshot {
    pub fn as_loaded(&self) -> Option<&LearnedPreferences> {
        match self {
            PreferenceSnapshot::Absent => None,
            PreferenceSnapshot::Loaded(prefs) => Some(prefs),
        }
    }
}

/// Narrow read interface to the externally-owned preference state.
pub trait PreferenceStore: Send + Sync {
    fn load(&self, user_id: &str) -> anyhow::Result<PreferenceSnapshot>;
}

/// In-memory preference store, loadable from a JSON file mapping user id to
/// token weights.
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    by_user: HashMap<String, LearnedPreferences>,
}

impl InMemoryPreferenceStore {
    pub fn new(by_user: HashMap<String, LearnedPreferences>) -> Self {
        Self { by_user }
    }

    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: HashMap<String, HashMap<String, f32>> = serde_json::from_str(&raw)?;
        let by_user = parsed
            .into_iter()
            .map(|(user, weights)| (user, LearnedPreferences::new(weights)))
            .collect();
        Ok(Self { by_user })
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn load(&self, user_id: &str) -> anyhow::Result<PreferenceSnapshot> {
        Ok(self
            .by_user
            .get(user_id)
            .map(|prefs| PreferenceSnapshot::Loaded(prefs.clone()))
            .unwrap_or(PreferenceSnapshot::Absent))
    }
}
