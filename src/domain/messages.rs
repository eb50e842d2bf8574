//! Message shapes exchanged with the stage capabilities.
//!
//! Field names follow the JSON wire convention of the boundary API
//! (camelCase), so these types serialize directly into the payloads the
//! front-end and the external capabilities exchange.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A submission as received at the boundary, before a job id exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    /// Free-text description of the work
    pub prompt: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

impl JobSubmission {
    /// Reject malformed submissions before any job is created.
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.prompt.trim().is_empty() {
            missing.push("prompt");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.state.trim().is_empty() {
            missing.push("state");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required fields: {}", missing.join(", ")))
        }
    }

    /// Attach a freshly assigned job id, producing the intake input.
    pub fn into_request(self, job_id: Uuid) -> JobRequest {
        JobRequest {
            job_id,
            prompt: self.prompt,
            city: self.city,
            state: self.state,
            zip_code: self.zip_code,
            photo_urls: self.photo_urls,
        }
    }
}

/// The original request, carried on the job and fed to intake
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_id: Uuid,
    pub prompt: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

/// Urgency tier extracted by intake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Emergency,
}

impl Urgency {
    /// Lenient parse for values coming back from a language model.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Urgency::Low,
            "high" => Urgency::High,
            "emergency" => Urgency::Emergency,
            _ => Urgency::Normal,
        }
    }
}

/// Structured scope produced by intake; input to directory search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobScope {
    pub job_id: Uuid,

    /// Primary trade, e.g. "Plumbing"
    pub trade: String,

    /// Specific services required
    pub services: Vec<String>,

    pub urgency: Urgency,

    /// installation | repair | maintenance | renovation | general
    pub project_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_hint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_requirements: Option<String>,
}

/// A professional returned by directory search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub trade: String,
    pub city: String,
    pub state: String,
    pub services: Vec<String>,
    pub rating: f32,
    pub price_band: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Search output / rank input. An empty list is a valid result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateList {
    pub job_id: Uuid,
    pub candidates: Vec<Candidate>,
    pub count: usize,
}

impl CandidateList {
    pub fn new(job_id: Uuid, candidates: Vec<Candidate>) -> Self {
        let count = candidates.len();
        Self {
            job_id,
            candidates,
            count,
        }
    }
}

/// Input to directory search: the analyzed scope plus the location
/// fields from the original request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryQuery {
    pub job_id: Uuid,
    pub scope: JobScope,
    pub city: String,
    pub state: String,
}

/// Input to ranking: the scope and the candidates to score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    pub job_id: Uuid,
    pub scope: JobScope,
    pub candidates: Vec<Candidate>,
}

/// A single scored match with rationale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub professional_id: String,

    /// Fit score, 0..100
    pub score: f32,

    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concerns: Option<String>,
}

/// Terminal rank output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub job_id: Uuid,
    pub matches: Vec<Match>,
    pub count: usize,
    pub success: bool,
}

impl MatchResult {
    pub fn new(job_id: Uuid, matches: Vec<Match>) -> Self {
        let count = matches.len();
        Self {
            job_id,
            matches,
            count,
            success: true,
        }
    }

    /// Graceful result for a job with no candidates to rank.
    pub fn empty(job_id: Uuid) -> Self {
        Self::new(job_id, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_validation() {
        let ok = JobSubmission {
            prompt: "leaking faucet".into(),
            city: "Austin".into(),
            state: "TX".into(),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let missing = JobSubmission {
            prompt: "  ".into(),
            city: "Austin".into(),
            state: String::new(),
            ..Default::default()
        };
        let err = missing.validate().unwrap_err();
        assert!(err.contains("prompt"));
        assert!(err.contains("state"));
        assert!(!err.contains("city"));
    }

    #[test]
    fn test_urgency_lenient_parse() {
        assert_eq!(Urgency::parse_lenient("EMERGENCY"), Urgency::Emergency);
        assert_eq!(Urgency::parse_lenient(" low "), Urgency::Low);
        assert_eq!(Urgency::parse_lenient("whenever"), Urgency::Normal);
    }

    #[test]
    fn test_request_wire_shape() {
        let id = Uuid::new_v4();
        let request = JobSubmission {
            prompt: "repaint the living room".into(),
            city: "Denver".into(),
            state: "CO".into(),
            zip_code: Some("80202".into()),
            photo_urls: vec!["https://example.com/a.jpg".into()],
        }
        .into_request(id);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jobId"], serde_json::json!(id));
        assert_eq!(json["zipCode"], "80202");
        assert_eq!(json["photoUrls"][0], "https://example.com/a.jpg");

        let back: JobRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.city, "Denver");
    }

    #[test]
    fn test_empty_match_result_is_success() {
        let result = MatchResult::empty(Uuid::new_v4());
        assert!(result.success);
        assert_eq!(result.count, 0);
    }
}
