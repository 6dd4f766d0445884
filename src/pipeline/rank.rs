//! Multi-factor ranking of the candidate pool.
//!
//! `total` is a fixed convex combination of the three sub-scores. The
//! weights are deployment policy, pinned at build time — not configuration,
//! not derived at runtime.
//!
//! Tie-break order, required for determinism: total desc, filter_match desc,
//! profile id asc.

use crate::intent::Intent;
use crate::pipeline::ScoredCandidate;
use crate::preferences::{LearnedPreferences, PreferenceSnapshot};
use crate::profiles::CandidateProfile;

/// Ranking weights. Must sum to 1.0 (asserted in tests).
pub const VECTOR_WEIGHT: f64 = 0.5;
pub const PREFERENCE_WEIGHT: f64 = 0.3;
pub const FILTER_WEIGHT: f64 = 0.2;

/// Preference score applied to every candidate when no learned preferences
/// exist for the user. Absence is orthogonal to candidate quality, so it
/// must not read as a vote against anyone.
pub const NEUTRAL_PREFERENCE_SCORE: f32 = 0.5;

/// Normalized weighted overlap between a candidate's traits/interests and
/// the learned preference map, in [0, 1]. The normalizer is the maximum
/// possible weight sum, i.e. the sum of all positive weights in the map.
/// A loaded map with no positive mass scores 0.0 uniformly.
pub fn preference_score(profile: &CandidateProfile, prefs: &LearnedPreferences) -> f32 {
    let max_sum = prefs.max_weight_sum();
    if max_sum <= 0.0 {
        return 0.0;
    }

    let mut seen: Vec<String> = Vec::new();
    let mut sum = 0.0_f32;
    for token in profile.traits.iter().chain(profile.interests.iter()) {
        let key = token.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        if let Some(weight) = prefs.weight_of(token) {
            if weight > 0.0 {
                sum += weight;
            }
        }
    }

    (sum / max_sum).clamp(0.0, 1.0)
}

/// The fixed convex combination. `active_filters` caps the filter term at
/// the number of filters the intent actually carries; with no filters the
/// term is 0 for everyone.
pub fn total_score(
    vector_score: f32,
    preference_score: f32,
    filter_match: u32,
    active_filters: u32,
) -> f64 {
    let filter_ratio = filter_match as f64 / active_filters.max(1) as f64;
    VECTOR_WEIGHT * vector_score as f64
        + PREFERENCE_WEIGHT * preference_score as f64
        + FILTER_WEIGHT * filter_ratio
}

/// Fill in preference scores and totals, then sort the pool in place.
pub fn rank(pool: &mut [ScoredCandidate], intent: &Intent, snapshot: &PreferenceSnapshot) {
    let active_filters = intent.filters.active_count();

    for candidate in pool.iter_mut() {
        candidate.preference_score = match snapshot.as_loaded() {
            Some(prefs) => preference_score(&candidate.profile, prefs),
            None => NEUTRAL_PREFERENCE_SCORE,
        };
        candidate.total = total_score(
            candidate.vector_score,
            candidate.preference_score,
            candidate.filter_match,
            active_filters,
        );
    }

    pool.sort_by(compare);
}

/// Ranking order: total desc, filter_match desc, id asc. `total_cmp` keeps
/// the ordering byte-identical across runs where `partial_cmp` would not be
/// total.
pub(crate) fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> std::cmp::Ordering {
    b.total
        .total_cmp(&a.total)
        .then_with(|| b.filter_match.cmp(&a.filter_match))
        .then_with(|| a.profile.id.cmp(&b.profile.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::LearnedPreferences;
    use std::collections::HashMap;

    fn profile(id: &str, traits: &[&str], interests: &[&str]) -> CandidateProfile {
        CandidateProfile {
            id: id.into(),
            name: id.to_string(),
            age: 30,
            bio: String::new(),
            location: None,
            distance_km: None,
            traits: traits.iter().map(|s| s.to_string()).collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            prompt_answer: None,
            embedding: vec![],
            visible: true,
            eligible: true,
        }
    }

    fn scored(id: &str, vector_score: f32, filter_match: u32) -> ScoredCandidate {
        ScoredCandidate {
            profile: profile(id, &[], &[]),
            vector_score,
            preference_score: 0.0,
            filter_match,
            total: 0.0,
        }
    }

    fn prefs(pairs: &[(&str, f32)]) -> LearnedPreferences {
        let map: HashMap<String, f32> =
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        LearnedPreferences::new(map)
    }

    #[test]
    fn test_weights_sum_to_one() {
        assert!((VECTOR_WEIGHT + PREFERENCE_WEIGHT + FILTER_WEIGHT - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_preference_score_normalized_overlap() {
        let p = prefs(&[("hiking", 0.6), ("jazz", 0.4)]);

        let full = profile("a", &[], &["Hiking", "Jazz"]);
        assert!((preference_score(&full, &p) - 1.0).abs() < 0.001);

        let half = profile("b", &[], &["hiking"]);
        assert!((preference_score(&half, &p) - 0.6).abs() < 0.001);

        let none = profile("c", &[], &["chess"]);
        assert_eq!(preference_score(&none, &p), 0.0);
    }

    #[test]
    fn test_preference_score_ignores_duplicate_tokens() {
        let p = prefs(&[("hiking", 0.5), ("other", 0.5)]);
        // "hiking" both as trait and interest must not count twice
        let doubled = profile("a", &["hiking"], &["Hiking"]);
        assert!((preference_score(&doubled, &p) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_empty_loaded_map_scores_zero_not_neutral() {
        let p = prefs(&[]);
        assert_eq!(preference_score(&profile("a", &["kind"], &[]), &p), 0.0);
    }

    #[test]
    fn test_total_monotone_in_each_subscore() {
        let base = total_score(0.4, 0.4, 1, 3);
        assert!(total_score(0.5, 0.4, 1, 3) > base);
        assert!(total_score(0.4, 0.5, 1, 3) > base);
        assert!(total_score(0.4, 0.4, 2, 3) > base);
    }

    #[test]
    fn test_total_with_no_filters_uses_zero_filter_term() {
        let t = total_score(0.0, 0.0, 0, 0);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_ranking_descending_with_tiebreak() {
        // equal preference and filter scores, vector scores
        // [0.9, 0.1, 0.5, 0.5, 0.2]
        let mut pool = vec![
            scored("e1", 0.9, 0),
            scored("e2", 0.1, 0),
            scored("e3", 0.5, 0),
            scored("e4", 0.5, 0),
            scored("e5", 0.2, 0),
        ];

        rank(&mut pool, &Intent::fallback("q"), &PreferenceSnapshot::Absent);

        let ids: Vec<&str> = pool.iter().map(|c| c.profile.id.as_str()).collect();
        // the 0.5 pair ties on total and filter_match, so id asc decides
        assert_eq!(ids, vec!["e1", "e3", "e4", "e5", "e2"]);
    }

    #[test]
    fn test_tiebreak_filter_match_then_id() {
        let mut a = scored("b", 0.0, 1);
        a.total = 0.5;
        let mut b = scored("a", 0.0, 2);
        b.total = 0.5;

        // equal totals: higher filter_match wins
        assert_eq!(compare(&b, &a), std::cmp::Ordering::Less);

        // equal totals and filter_match: id ascending wins
        let mut c = scored("c", 0.0, 2);
        c.total = 0.5;
        assert_eq!(compare(&b, &c), std::cmp::Ordering::Less);
        assert_eq!(compare(&c, &b), std::cmp::Ordering::Greater);
    }

    #[test]
    fn test_absent_preferences_neutral_half_for_everyone() {
        let mut pool = vec![scored("a", 0.9, 0), scored("b", 0.1, 0)];
        rank(&mut pool, &Intent::fallback("q"), &PreferenceSnapshot::Absent);

        for candidate in &pool {
            assert_eq!(candidate.preference_score, NEUTRAL_PREFERENCE_SCORE);
        }
    }

    #[test]
    fn test_determinism_identical_inputs_identical_order() {
        let snapshot = PreferenceSnapshot::Loaded(prefs(&[("hiking", 0.7)]));
        let mut intent = Intent::fallback("q");
        intent.filters.age_max = Some(40);

        let build = || {
            vec![
                scored("c", 0.31, 1),
                scored("a", 0.31, 1),
                scored("b", 0.72, 0),
                scored("d", 0.31, 0),
            ]
        };

        let mut first = build();
        rank(&mut first, &intent, &snapshot);
        let first_ids: Vec<String> =
            first.iter().map(|c| c.profile.id.to_string()).collect();

        for _ in 0..10 {
            let mut next = build();
            rank(&mut next, &intent, &snapshot);
            let ids: Vec<String> = next.iter().map(|c| c.profile.id.to_string()).collect();
            assert_eq!(ids, first_ids);
        }
    }
}
