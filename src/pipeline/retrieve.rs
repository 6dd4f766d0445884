//! Candidate retrieval and raw sub-scoring.
//!
//! Builds the bounded working pool for one ranking pass. Hard exclusions
//! (self, explicit excludes, invisible or ineligible profiles) are applied
//! before any scoring, so an excluded candidate can never surface no matter
//! how well it would score. The pool is oversized relative to the requested
//! page to give the ranker reordering headroom.

use crate::ids::ProfileId;
use crate::intent::Intent;
use crate::pipeline::ScoredCandidate;
use crate::profiles::CandidateProfile;

/// Cosine similarity between an intent vector and a candidate embedding,
/// clamped to [0, 1]. Dimension mismatches and zero-norm vectors score 0.0
/// rather than erroring: a missing signal is not a request failure.
pub fn cosine_score(query: &[f32], target: &[f32]) -> f32 {
    if query.is_empty() || query.len() != target.len() {
        return 0.0;
    }

    let query_norm = l2_norm(query);
    let target_norm = l2_norm(target);
    if query_norm < f32::EPSILON || target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    (dot / (query_norm * target_norm)).clamp(0.0, 1.0)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Build the scored candidate pool for one request.
///
/// `candidates` is the store's full id-ordered snapshot. The pool covers
/// the whole requested window: `(offset + limit) * pool_multiplier`
/// candidates from the front of the id ordering. Pagination slices the
/// RANKED pool (the caller skips `offset` after ranking), never the raw id
/// order; skipping before ranking would let a strong candidate surface on
/// every page.
///
/// Vector score is exactly 0.0 (never absent) when there is no intent
/// vector; filter_match is 0 when the intent carries no filters.
pub fn build_pool(
    candidates: Vec<CandidateProfile>,
    user_id: &str,
    intent: &Intent,
    intent_vector: Option<&[f32]>,
    limit: usize,
    offset: usize,
    exclude: &[ProfileId],
    pool_multiplier: usize,
) -> Vec<ScoredCandidate> {
    let mut eligible: Vec<CandidateProfile> = candidates
        .into_iter()
        .filter(|p| p.visible && p.eligible)
        .filter(|p| p.id.as_str() != user_id)
        .filter(|p| !exclude.contains(&p.id))
        .collect();

    // The store contract already orders by id; re-sorting keeps pagination
    // deterministic even against a misbehaving store.
    eligible.sort_by(|a, b| a.id.cmp(&b.id));

    let pool_size = offset
        .saturating_add(limit)
        .saturating_mul(pool_multiplier);

    eligible
        .into_iter()
        .take(pool_size)
        .map(|profile| {
            let vector_score = intent_vector
                .map(|v| cosine_score(v, &profile.embedding))
                .unwrap_or(0.0);
            let filter_match = intent.filters.satisfied_count(&profile);

            ScoredCandidate {
                profile,
                vector_score,
                preference_score: 0.0,
                filter_match,
                total: 0.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Filters;

    fn profile(id: &str, embedding: Vec<f32>) -> CandidateProfile {
        CandidateProfile {
            id: id.into(),
            name: format!("p-{}", id),
            age: 28,
            bio: String::new(),
            location: None,
            distance_km: None,
            traits: vec![],
            interests: vec![],
            prompt_answer: None,
            embedding,
            visible: true,
            eligible: true,
        }
    }

    fn intent() -> Intent {
        Intent::fallback("anyone")
    }

    #[test]
    fn test_cosine_identical_is_one() {
        let score = cosine_score(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((score - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_orthogonal_is_zero() {
        assert_eq!(cosine_score(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_negative_clamped_to_zero() {
        assert_eq!(cosine_score(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatch_and_zero_norm_score_zero() {
        assert_eq!(cosine_score(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_score(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_score(&[], &[]), 0.0);
    }

    #[test]
    fn test_hard_exclusions_applied_before_scoring() {
        let candidates = vec![
            profile("a", vec![1.0, 0.0]),
            profile("b", vec![1.0, 0.0]),
            {
                let mut p = profile("c", vec![1.0, 0.0]);
                p.visible = false;
                p
            },
            {
                let mut p = profile("d", vec![1.0, 0.0]);
                p.eligible = false;
                p
            },
        ];

        // "b" is excluded, "a" is a perfect vector match but is the searcher
        let pool = build_pool(
            candidates,
            "a",
            &intent(),
            Some(&[1.0, 0.0]),
            10,
            0,
            &["b".into()],
            3,
        );

        assert!(pool.is_empty());
    }

    #[test]
    fn test_vector_score_zero_without_intent_vector() {
        let pool = build_pool(
            vec![profile("a", vec![1.0, 0.0])],
            "me",
            &intent(),
            None,
            5,
            0,
            &[],
            3,
        );
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].vector_score, 0.0);
        assert_eq!(pool[0].filter_match, 0);
    }

    #[test]
    fn test_pool_oversized_and_capped() {
        let candidates: Vec<CandidateProfile> = (0..20)
            .map(|i| profile(&format!("{:02}", i), vec![1.0, 0.0]))
            .collect();

        let pool = build_pool(
            candidates,
            "me",
            &intent(),
            Some(&[1.0, 0.0]),
            4,
            0,
            &[],
            3,
        );
        assert_eq!(pool.len(), 12); // (offset + limit) * multiplier
    }

    #[test]
    fn test_pool_widens_with_offset_instead_of_skipping() {
        let candidates: Vec<CandidateProfile> = (0..30)
            .map(|i| profile(&format!("{:02}", i), vec![1.0, 0.0]))
            .collect();

        let pool = build_pool(candidates, "me", &intent(), None, 3, 3, &[], 3);

        // (offset + limit) * multiplier, always anchored at the front of
        // the id ordering so later pages rank a superset
        assert_eq!(pool.len(), 18);
        assert_eq!(pool[0].profile.id.as_str(), "00");
        assert_eq!(pool[17].profile.id.as_str(), "17");
    }

    #[test]
    fn test_filter_match_counted_per_candidate() {
        let mut young = profile("a", vec![]);
        young.age = 22;
        let mut older = profile("b", vec![]);
        older.age = 40;

        let mut intent = intent();
        intent.filters = Filters {
            age_max: Some(30),
            ..Default::default()
        };

        let pool = build_pool(vec![young, older], "me", &intent, None, 5, 0, &[], 3);
        assert_eq!(pool[0].filter_match, 1);
        assert_eq!(pool[1].filter_match, 0);
    }
}
