//! Structured search intent derived from free text.
//!
//! The intent extraction model returns an [`ExtractedIntent`] wire payload;
//! this module turns it into an [`Intent`], provides the pinned fallback for
//! degraded parses, and implements the refinement merge:
//! - scalar filter fields: new value overrides the prior one
//! - array fields: union, de-duplicated case-insensitively, prior first
//! - semantic text: prior + "; " + delta, unless the model judged the delta
//!   a full restatement

use crate::profiles::CandidateProfile;
use serde::{Deserialize, Serialize};

/// Confidence assigned to the fallback intent when parsing degrades.
pub const FALLBACK_CONFIDENCE: f32 = 0.2;

/// Coarse categorical tag for the desired match mood.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vibe {
    Romantic,
    Adventurous,
    Chill,
    Intellectual,
    Funny,
    Serious,
    Any,
}

impl Vibe {
    /// Parse a model-provided vibe string. Unknown values map to `Any`.
    pub fn parse(s: &str) -> Vibe {
        match s.trim().to_lowercase().as_str() {
            "romantic" => Vibe::Romantic,
            "adventurous" => Vibe::Adventurous,
            "chill" => Vibe::Chill,
            "intellectual" => Vibe::Intellectual,
            "funny" => Vibe::Funny,
            "serious" => Vibe::Serious,
            _ => Vibe::Any,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Vibe::Romantic => "💕",
            Vibe::Adventurous => "🏔️",
            Vibe::Chill => "😌",
            Vibe::Intellectual => "🤓",
            Vibe::Funny => "😂",
            Vibe::Serious => "💙",
            Vibe::Any => "✨",
        }
    }
}

/// Structured constraints extracted from the query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub age_min: Option<u8>,
    pub age_max: Option<u8>,
    pub max_distance_km: Option<u32>,
    pub location: Option<String>,
    pub interests: Vec<String>,
    pub dealbreakers: Vec<String>,
}

impl Filters {
    /// Number of filters the user actually set. Each set scalar counts one,
    /// each non-empty array field counts one.
    pub fn active_count(&self) -> u32 {
        let mut n = 0;
        n += self.age_min.is_some() as u32;
        n += self.age_max.is_some() as u32;
        n += self.max_distance_km.is_some() as u32;
        n += self.location.is_some() as u32;
        n += !self.interests.is_empty() as u32;
        n += !self.dealbreakers.is_empty() as u32;
        n
    }

    /// Count how many of the active filters this candidate satisfies.
    /// Returns 0 when no filters are set.
    pub fn satisfied_count(&self, profile: &CandidateProfile) -> u32 {
        let mut n = 0;

        if let Some(min) = self.age_min {
            if profile.age >= min {
                n += 1;
            }
        }
        if let Some(max) = self.age_max {
            if profile.age <= max {
                n += 1;
            }
        }
        if let Some(max_km) = self.max_distance_km {
            if profile.distance_km.map(|d| d <= max_km).unwrap_or(false) {
                n += 1;
            }
        }
        if let Some(loc) = &self.location {
            let matches = profile
                .location
                .as_deref()
                .map(|l| l.eq_ignore_ascii_case(loc))
                .unwrap_or(false);
            if matches {
                n += 1;
            }
        }
        if !self.interests.is_empty() {
            let any = self
                .interests
                .iter()
                .any(|want| contains_ci(&profile.interests, want));
            if any {
                n += 1;
            }
        }
        if !self.dealbreakers.is_empty() {
            // Satisfied when the candidate has none of the dealbreakers.
            let clean = !self.dealbreakers.iter().any(|bad| {
                contains_ci(&profile.traits, bad) || contains_ci(&profile.interests, bad)
            });
            if clean {
                n += 1;
            }
        }

        n
    }

    /// Refinement merge: new scalar values override, arrays union.
    pub fn merged_into(&self, fresh: &Filters) -> Filters {
        Filters {
            age_min: fresh.age_min.or(self.age_min),
            age_max: fresh.age_max.or(self.age_max),
            max_distance_km: fresh.max_distance_km.or(self.max_distance_km),
            location: fresh.location.clone().or_else(|| self.location.clone()),
            interests: union_ci(&self.interests, &fresh.interests),
            dealbreakers: union_ci(&self.dealbreakers, &fresh.dealbreakers),
        }
    }
}

/// What the user said they want, grouped the way the model reports it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceLists {
    pub traits: Vec<String>,
    pub interests: Vec<String>,
    pub personality: Vec<String>,
}

impl PreferenceLists {
    pub fn merged_into(&self, fresh: &PreferenceLists) -> PreferenceLists {
        PreferenceLists {
            traits: union_ci(&self.traits, &fresh.traits),
            interests: union_ci(&self.interests, &fresh.interests),
            personality: union_ci(&self.personality, &fresh.personality),
        }
    }
}

/// Structured representation of what the user is looking for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub vibe: Vibe,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub preferences: PreferenceLists,
    pub semantic_query: String,
    /// Parser trust in [0, 1]. Clamped on construction and never silently
    /// upgraded afterwards.
    pub confidence: f32,
    #[serde(default)]
    pub is_refinement: bool,
}

impl Intent {
    /// The pinned fallback when intent extraction fails or times out.
    pub fn fallback(raw_query: &str) -> Intent {
        Intent {
            vibe: Vibe::Any,
            filters: Filters::default(),
            preferences: PreferenceLists::default(),
            semantic_query: raw_query.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            is_refinement: false,
        }
    }

    /// Build an intent from the model's wire payload.
    pub fn from_extracted(raw_query: &str, extracted: &ExtractedIntent) -> Intent {
        let semantic_query = if extracted.semantic_query.trim().is_empty() {
            raw_query.to_string()
        } else {
            extracted.semantic_query.clone()
        };

        Intent {
            vibe: Vibe::parse(&extracted.vibe),
            filters: extracted.filters.clone(),
            preferences: PreferenceLists {
                traits: extracted.traits.clone(),
                interests: extracted.interests.clone(),
                personality: extracted.personality.clone(),
            },
            semantic_query,
            confidence: extracted.confidence.clamp(0.0, 1.0),
            is_refinement: false,
        }
    }

    /// Merge a freshly parsed refinement delta into a prior intent.
    ///
    /// `restated` is the model's judgment that the delta fully restates the
    /// search; in that case the prior semantic text is dropped instead of
    /// concatenated.
    pub fn merge_refinement(prior: &Intent, fresh: &Intent, restated: bool) -> Intent {
        let vibe = if fresh.vibe == Vibe::Any && prior.vibe != Vibe::Any {
            prior.vibe
        } else {
            fresh.vibe
        };

        let semantic_query = if restated || prior.semantic_query.trim().is_empty() {
            fresh.semantic_query.clone()
        } else {
            format!("{}; {}", prior.semantic_query, fresh.semantic_query)
        };

        Intent {
            vibe,
            filters: prior.filters.merged_into(&fresh.filters),
            preferences: prior.preferences.merged_into(&fresh.preferences),
            semantic_query,
            confidence: fresh.confidence,
            is_refinement: true,
        }
    }
}

/// Intent plus the out-of-band degradation marker. The marker is not part of
/// [`Intent`] itself: downstream stages key off it (a degraded intent is
/// never embedded) but it never serializes outward.
#[derive(Clone, Debug)]
pub struct ParsedIntent {
    pub intent: Intent,
    pub degraded: bool,
}

/// JSON payload the extraction model is asked to produce. Every field has a
/// serde default so a sparse model answer still deserializes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedIntent {
    pub vibe: String,
    pub filters: Filters,
    pub traits: Vec<String>,
    pub interests: Vec<String>,
    pub personality: Vec<String>,
    pub semantic_query: String,
    pub confidence: f32,
    /// Refinement only: the model judged the delta a full restatement.
    pub restated: bool,
}

fn contains_ci(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|h| h.eq_ignore_ascii_case(needle))
}

/// Union of two string lists, de-duplicated case-insensitively. Keeps
/// first-seen casing and order, base list first.
fn union_ci(base: &[String], add: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();

    for value in base.iter().chain(add.iter()) {
        let key = value.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(value.clone());
        }
    }

    out
}
