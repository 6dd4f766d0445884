//! Crowdsourced "pack" compilation.
//!
//! Friends submit short descriptions of a user; a completed round is
//! compiled exactly once into word-frequency statistics and a synthesized
//! free-text prompt, which then drives the ordinary matching pipeline.
//! Submission quota enforcement happens upstream; this module assumes a
//! complete round.

use crate::analytics::{record_best_effort, AnalyticsEvent, AnalyticsSink};
use crate::pipeline::{MatchError, MatchPipeline, MatchRequest, MatchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Words accepted per submission ("three words", with slack).
pub const MAX_WORDS_PER_SUBMISSION: usize = 5;
pub const MAX_GREEN_FLAGS_PER_SUBMISSION: usize = 5;
pub const MAX_TOP_WORDS: usize = 3;
pub const MAX_COMPILED_GREEN_FLAGS: usize = 5;
pub const MAX_HYPE_LINES: usize = 3;

/// One friend's take on the target user.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackSubmission {
    pub three_words: Vec<String>,
    pub green_flags: Vec<String>,
    pub red_flag_funny: Option<String>,
    pub hype_note: Option<String>,
}

/// Aggregated statistics over one round of submissions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledSummary {
    /// Most frequent descriptive words, ties broken by first-seen order.
    pub top_words: Vec<String>,
    /// Exact-match deduped, first-seen order.
    pub green_flags: Vec<String>,
    /// First non-empty red flag, verbatim.
    pub funniest_red_flag: Option<String>,
    pub hype_lines: Vec<String>,
}

/// Compile a round of submissions. Pure and idempotent: the same submission
/// list always yields the identical summary.
pub fn compile(submissions: &[PackSubmission]) -> CompiledSummary {
    // (display casing, lowercase key, count) in first-seen order
    let mut word_counts: Vec<(String, String, usize)> = Vec::new();

    for submission in submissions {
        for word in submission.three_words.iter().take(MAX_WORDS_PER_SUBMISSION) {
            let word = word.trim();
            if word.is_empty() {
                continue;
            }
            let key = word.to_lowercase();
            match word_counts.iter_mut().find(|(_, k, _)| *k == key) {
                Some(entry) => entry.2 += 1,
                None => word_counts.push((word.to_string(), key, 1)),
            }
        }
    }

    // stable sort: equal counts keep first-seen order
    word_counts.sort_by(|a, b| b.2.cmp(&a.2));
    let top_words = word_counts
        .into_iter()
        .take(MAX_TOP_WORDS)
        .map(|(display, _, _)| display)
        .collect();

    let mut green_flags: Vec<String> = Vec::new();
    for submission in submissions {
        for flag in submission
            .green_flags
            .iter()
            .take(MAX_GREEN_FLAGS_PER_SUBMISSION)
        {
            let flag = flag.trim();
            if flag.is_empty() || green_flags.iter().any(|f| f == flag) {
                continue;
            }
            if green_flags.len() < MAX_COMPILED_GREEN_FLAGS {
                green_flags.push(flag.to_string());
            }
        }
    }

    let funniest_red_flag = submissions
        .iter()
        .filter_map(|s| s.red_flag_funny.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| s.to_string());

    let mut hype_lines: Vec<String> = Vec::new();
    for submission in submissions {
        if let Some(note) = submission.hype_note.as_deref() {
            let note = note.trim();
            if !note.is_empty()
                && !hype_lines.iter().any(|l| l == note)
                && hype_lines.len() < MAX_HYPE_LINES
            {
                hype_lines.push(note.to_string());
            }
        }
    }

    CompiledSummary {
        top_words,
        green_flags,
        funniest_red_flag,
        hype_lines,
    }
}

/// Synthesize the free-text query that seeds the pipeline for this round.
pub fn wingman_prompt(summary: &CompiledSummary) -> String {
    let mut prompt = String::from("Find a match for someone");

    if !summary.top_words.is_empty() {
        prompt.push_str(" whose friends describe them as ");
        prompt.push_str(&summary.top_words.join(", "));
    }
    if !summary.green_flags.is_empty() {
        prompt.push_str(". Their green flags: ");
        prompt.push_str(&summary.green_flags.join("; "));
    }
    if !summary.hype_lines.is_empty() {
        prompt.push_str(". In their friends' words: ");
        prompt.push_str(&summary.hype_lines.join(" "));
    }
    prompt.push_str(". Someone who would click with that energy.");

    prompt
}

/// One opened round: the compiled pack plus its matches.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackRound {
    pub round_number: u32,
    pub compiled_summary: CompiledSummary,
    pub wingman_prompt: String,
    pub matches: Vec<MatchResult>,
    pub generated_at: DateTime<Utc>,
    pub opened_at: DateTime<Utc>,
}

/// Compiles and caches one round per user. Repeated opens of the same round
/// return the cached result unchanged; the `pack_opened` analytics event
/// fires at most once per round, on first open. The cache lock is never
/// held across the pipeline run, so one user's slow model calls cannot
/// stall another user's round.
pub struct PackService {
    pipeline: Arc<MatchPipeline>,
    analytics: Arc<dyn AnalyticsSink>,
    rounds: Mutex<HashMap<String, PackRound>>,
}

impl PackService {
    pub fn new(pipeline: Arc<MatchPipeline>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            pipeline,
            analytics,
            rounds: Mutex::new(HashMap::new()),
        }
    }

    pub async fn open_round(
        &self,
        user_id: &str,
        round_number: u32,
        submissions: &[PackSubmission],
        limit: usize,
    ) -> Result<PackRound, MatchError> {
        if user_id.trim().is_empty() {
            return Err(MatchError::InvalidRequest("user_id is required".to_string()));
        }
        if submissions.is_empty() {
            return Err(MatchError::InvalidRequest(
                "a round needs at least one submission".to_string(),
            ));
        }

        {
            let rounds = self.rounds.lock().unwrap();
            if let Some(cached) = rounds.get(user_id) {
                if cached.round_number == round_number {
                    return Ok(cached.clone());
                }
            }
        }

        let compiled_summary = compile(submissions);
        let prompt = wingman_prompt(&compiled_summary);

        let response = self
            .pipeline
            .run(MatchRequest {
                user_id: user_id.to_string(),
                query_text: prompt.clone(),
                prior_intent: None,
                exclude_ids: vec![],
                limit,
                offset: 0,
            })
            .await?;

        let now = Utc::now();
        let round = PackRound {
            round_number,
            compiled_summary,
            wingman_prompt: prompt,
            matches: response.matches,
            generated_at: now,
            opened_at: now,
        };

        {
            let mut rounds = self.rounds.lock().unwrap();
            if let Some(existing) = rounds.get(user_id) {
                if existing.round_number == round_number {
                    // a concurrent open won the race; keep its result and
                    // its single pack_opened event
                    return Ok(existing.clone());
                }
            }
            rounds.insert(user_id.to_string(), round.clone());
        }

        record_best_effort(
            self.analytics.as_ref(),
            AnalyticsEvent::new(
                "pack_opened",
                user_id,
                json!({
                    "round_number": round_number,
                    "match_count": round.matches.len(),
                }),
            ),
        );

        Ok(round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> PackSubmission {
        PackSubmission {
            three_words: list.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_top_words_frequency_then_first_seen() {
        let submissions = vec![
            words(&["funny", "kind"]),
            words(&["funny", "ambitious"]),
            words(&["kind", "funny"]),
        ];

        let summary = compile(&submissions);
        assert_eq!(summary.top_words, vec!["funny", "kind", "ambitious"]);
    }

    #[test]
    fn test_word_counting_case_insensitive_keeps_first_casing() {
        let submissions = vec![words(&["Funny"]), words(&["FUNNY", "dry"])];
        let summary = compile(&submissions);
        assert_eq!(summary.top_words, vec!["Funny", "dry"]);
    }

    #[test]
    fn test_word_cap_per_submission() {
        let submissions = vec![words(&["a", "b", "c", "d", "e", "f", "g"])];
        let summary = compile(&submissions);
        // only the first five words of a submission count; all tie at one,
        // so first-seen order decides
        assert_eq!(summary.top_words, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_green_flags_exact_dedup_first_seen() {
        let submissions = vec![
            PackSubmission {
                green_flags: vec!["calls their mom".into(), "tips well".into()],
                ..Default::default()
            },
            PackSubmission {
                green_flags: vec!["tips well".into(), "reads".into()],
                ..Default::default()
            },
        ];

        let summary = compile(&submissions);
        assert_eq!(
            summary.green_flags,
            vec!["calls their mom", "tips well", "reads"]
        );
    }

    #[test]
    fn test_funniest_red_flag_first_non_empty() {
        let submissions = vec![
            PackSubmission {
                red_flag_funny: Some("   ".into()),
                ..Default::default()
            },
            PackSubmission {
                red_flag_funny: Some("alphabetizes their spice rack".into()),
                ..Default::default()
            },
            PackSubmission {
                red_flag_funny: Some("later one".into()),
                ..Default::default()
            },
        ];

        let summary = compile(&submissions);
        assert_eq!(
            summary.funniest_red_flag.as_deref(),
            Some("alphabetizes their spice rack")
        );
    }

    #[test]
    fn test_no_red_flag_is_none() {
        assert_eq!(compile(&[words(&["kind"])]).funniest_red_flag, None);
    }

    #[test]
    fn test_compile_is_idempotent() {
        let submissions = vec![
            PackSubmission {
                three_words: vec!["warm".into(), "loud".into()],
                green_flags: vec!["plants".into()],
                red_flag_funny: Some("quotes movies".into()),
                hype_note: Some("the best".into()),
            },
            words(&["warm"]),
        ];

        let first = compile(&submissions);
        let second = compile(&submissions);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_wingman_prompt_mentions_top_words() {
        let summary = compile(&[words(&["funny", "kind"])]);
        let prompt = wingman_prompt(&summary);
        assert!(prompt.contains("funny"));
        assert!(prompt.contains("kind"));
        assert!(!prompt.trim().is_empty());
    }
}
