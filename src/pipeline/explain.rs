//! Explanation synthesis for the top ranked candidates.
//!
//! One explanation per candidate, same order, same count as the ranked
//! input: a model failure or timeout for a single candidate substitutes a
//! profile-field template, it never drops or reorders anyone.

use crate::intent::{Intent, Vibe};
use crate::model::{ExplanationDraft, ExplanationWriter};
use crate::pipeline::ScoredCandidate;
use crate::profiles::CandidateProfile;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MAX_CONVERSATION_STARTERS: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Explanation {
    pub tagline: String,
    pub summary: String,
    pub vibe_emoji: String,
    pub conversation_starters: Vec<String>,
    pub match_percentage: u8,
}

/// `round(total * 100)`, clamped to [0, 100].
pub fn match_percentage(total: f64) -> u8 {
    (total * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Write one explanation per ranked candidate. The output length always
/// equals `ranked.len()`.
pub async fn explain_all(
    writer: &dyn ExplanationWriter,
    per_candidate_timeout: Duration,
    ranked: &[ScoredCandidate],
    intent: &Intent,
) -> Vec<Explanation> {
    let mut explanations = Vec::with_capacity(ranked.len());

    for candidate in ranked {
        let result = tokio::time::timeout(
            per_candidate_timeout,
            writer.write_explanation(&candidate.profile, intent),
        )
        .await;

        let explanation = match result {
            Ok(Ok(draft)) => finalize(draft, intent.vibe, candidate.total),
            Ok(Err(err)) => {
                log::warn!(
                    "explanation failed for candidate {}: {:?}",
                    candidate.profile.id,
                    err
                );
                fallback_explanation(&candidate.profile, intent.vibe, candidate.total)
            }
            Err(_) => {
                log::warn!(
                    "explanation timed out for candidate {}",
                    candidate.profile.id
                );
                fallback_explanation(&candidate.profile, intent.vibe, candidate.total)
            }
        };

        explanations.push(explanation);
    }

    explanations
}

fn finalize(draft: ExplanationDraft, vibe: Vibe, total: f64) -> Explanation {
    let mut starters = draft.conversation_starters;
    starters.truncate(MAX_CONVERSATION_STARTERS);

    Explanation {
        tagline: draft.tagline,
        summary: draft.summary,
        vibe_emoji: vibe.emoji().to_string(),
        conversation_starters: starters,
        match_percentage: match_percentage(total),
    }
}

/// Deterministic template built from profile fields alone.
pub fn fallback_explanation(profile: &CandidateProfile, vibe: Vibe, total: f64) -> Explanation {
    let tagline = format!("{}, {}", profile.name, profile.age);
    let summary = match profile.interests.first() {
        Some(interest) => format!("{} is into {}.", profile.name, interest),
        None => format!("{} could be worth a look.", profile.name),
    };

    Explanation {
        tagline,
        summary,
        vibe_emoji: vibe.emoji().to_string(),
        conversation_starters: vec![],
        match_percentage: match_percentage(total),
    }
}
