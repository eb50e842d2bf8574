//! Ranking capability: job scope + candidates -> scored matches.
//!
//! Prompts the model to score each candidate against the project
//! requirements with a short rationale. Degrades gracefully twice over:
//! an empty candidate list returns an empty successful result without a
//! model call, and an unusable reply falls back to positional scoring.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{Candidate, Match, MatchResult, RankRequest, Stage};

use super::claude::{extract_json_array, ClaudeClient};
use super::{StageAdapter, StageError};

const SERVICE: &str = "ranker";
const MAX_TOKENS: u32 = 2048;

/// Candidates offered to the model per request. Directory searches can
/// return long tails; scores below the top ten are never surfaced.
const RANKING_POOL: usize = 10;

/// Model-backed candidate ranker
pub struct ClaudeRanker {
    client: ClaudeClient,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MatchDraft {
    professional_id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    concerns: Option<String>,
}

impl ClaudeRanker {
    pub fn new(client: ClaudeClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn prompt(request: &RankRequest) -> String {
        let candidates_text = request
            .candidates
            .iter()
            .take(RANKING_POOL)
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "{}. {} - {} in {}, {} (id: {})\n   Services: {}\n   Rating: {}\n   Price: {}",
                    i + 1,
                    c.name,
                    c.trade,
                    c.city,
                    c.state,
                    c.id,
                    c.services.join(", "),
                    c.rating,
                    c.price_band,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let scope_json =
            serde_json::to_string_pretty(&request.scope).unwrap_or_else(|_| "{}".into());

        format!(
            "You are matching a customer's project with contractors.\n\n\
             Project Requirements:\n{}\n\n\
             Candidate Contractors:\n{}\n\n\
             Rank these contractors and provide:\n\
             1. A score (0-100) for each based on fit\n\
             2. A brief reason why they're a good match\n\
             3. Any concerns or caveats\n\n\
             Return JSON array ONLY:\n\
             [\n\
               {{\n\
                 \"professional_id\": \"id\",\n\
                 \"score\": 95,\n\
                 \"reason\": \"Excellent match because...\",\n\
                 \"concerns\": \"optional concerns\"\n\
               }}\n\
             ]\n\n\
             Sort by score descending.",
            scope_json, candidates_text
        )
    }

    /// Positional scoring used when the model reply is unusable: every
    /// candidate is still surfaced, in directory order, with a
    /// templated rationale.
    fn fallback_matches(candidates: &[Candidate]) -> Vec<Match> {
        candidates
            .iter()
            .take(RANKING_POOL)
            .enumerate()
            .map(|(i, c)| Match {
                professional_id: c.id.clone(),
                score: 95.0 - (i as f32 * 5.0),
                reason: format!(
                    "{} is a qualified {} professional in your area with a {:.1} rating.",
                    c.name, c.trade, c.rating
                ),
                concerns: None,
            })
            .collect()
    }

    fn matches_from_reply(request: &RankRequest, reply: &str) -> Vec<Match> {
        let Some(value) = extract_json_array(reply) else {
            warn!(job_id = %request.job_id, "no JSON array in ranking reply, using positional scores");
            return Self::fallback_matches(&request.candidates);
        };

        let drafts: Vec<MatchDraft> = match serde_json::from_value(value) {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!(job_id = %request.job_id, error = %e, "unparseable ranking reply, using positional scores");
                return Self::fallback_matches(&request.candidates);
            }
        };

        if drafts.is_empty() {
            return Self::fallback_matches(&request.candidates);
        }

        let mut matches: Vec<Match> = drafts
            .into_iter()
            .map(|d| Match {
                professional_id: d.professional_id,
                score: d.score.clamp(0.0, 100.0),
                reason: d.reason,
                concerns: d.concerns,
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }
}

#[async_trait]
impl StageAdapter for ClaudeRanker {
    type Input = RankRequest;
    type Output = MatchResult;

    fn stage(&self) -> Stage {
        Stage::Rank
    }

    fn name(&self) -> &str {
        SERVICE
    }

    async fn invoke(&self, input: RankRequest) -> Result<MatchResult, StageError> {
        if input.candidates.is_empty() {
            return Ok(MatchResult::empty(input.job_id));
        }

        let prompt = Self::prompt(&input);
        let reply = self
            .client
            .complete(SERVICE, &prompt, MAX_TOKENS, self.timeout)
            .await?;
        let matches = Self::matches_from_reply(&input, &reply);
        Ok(MatchResult::new(input.job_id, matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobScope, Urgency};
    use uuid::Uuid;

    fn candidate(id: &str, name: &str) -> Candidate {
        Candidate {
            id: id.into(),
            name: name.into(),
            trade: "Plumbing".into(),
            city: "Austin".into(),
            state: "TX".into(),
            services: vec!["faucet repair".into()],
            rating: 4.6,
            price_band: "medium".into(),
            license: None,
            website: None,
            bio: None,
        }
    }

    fn request(candidates: Vec<Candidate>) -> RankRequest {
        let job_id = Uuid::new_v4();
        RankRequest {
            job_id,
            scope: JobScope {
                job_id,
                trade: "Plumbing".into(),
                services: vec!["faucet repair".into()],
                urgency: Urgency::Normal,
                project_type: "repair".into(),
                budget_hint: None,
                location_requirements: None,
            },
            candidates,
        }
    }

    #[test]
    fn test_matches_from_well_formed_reply_sorted() {
        let request = request(vec![candidate("p1", "Alpha"), candidate("p2", "Beta")]);
        let reply = r#"[
            {"professional_id": "p2", "score": 70, "reason": "decent"},
            {"professional_id": "p1", "score": 92, "reason": "great fit"}
        ]"#;

        let matches = ClaudeRanker::matches_from_reply(&request, reply);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].professional_id, "p1");
        assert_eq!(matches[0].score, 92.0);
    }

    #[test]
    fn test_garbage_reply_uses_positional_scores() {
        let request = request(vec![candidate("p1", "Alpha"), candidate("p2", "Beta")]);
        let matches = ClaudeRanker::matches_from_reply(&request, "no rankings today");

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].score, 95.0);
        assert_eq!(matches[1].score, 90.0);
        assert!(matches[0].reason.contains("Alpha"));
    }

    #[test]
    fn test_scores_clamped_to_range() {
        let request = request(vec![candidate("p1", "Alpha")]);
        let reply = r#"[{"professional_id": "p1", "score": 250, "reason": "!"}]"#;

        let matches = ClaudeRanker::matches_from_reply(&request, reply);
        assert_eq!(matches[0].score, 100.0);
    }

    #[tokio::test]
    async fn test_empty_candidates_short_circuit() {
        let ranker = ClaudeRanker::new(
            ClaudeClient::new("unused".into(), "unused".into()),
            Duration::from_secs(1),
        );
        let result = ranker.invoke(request(Vec::new())).await.unwrap();

        assert!(result.success);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_prompt_caps_candidate_pool() {
        let many: Vec<Candidate> = (0..25)
            .map(|i| candidate(&format!("p{}", i), &format!("Biz {}", i)))
            .collect();
        let prompt = ClaudeRanker::prompt(&request(many));

        assert!(prompt.contains("Biz 9"));
        assert!(!prompt.contains("Biz 10"));
    }
}
