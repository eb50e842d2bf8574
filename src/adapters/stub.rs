//! Deterministic in-process stage capabilities.
//!
//! Used by the test suites to drive every pipeline transition without a
//! network, and by the CLI as demo mode when no credentials are
//! configured. Each stub counts its invocations and can be configured
//! to fail or hang, so callers can assert exactly which stages ran.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::{
    Candidate, CandidateList, DirectoryQuery, JobRequest, JobScope, Match, MatchResult,
    RankRequest, Stage, Urgency,
};

use super::{StageAdapter, StageError};

/// Shared failure/observability switches for the stubs
#[derive(Clone, Default)]
struct StubBehavior {
    fail_with: Option<StageError>,
    hang: bool,
    calls: Arc<AtomicUsize>,
}

impl StubBehavior {
    async fn gate(&self) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            // Models a capability that never answers; the caller's
            // stream ceiling is the only way out.
            std::future::pending::<()>().await;
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Stable candidate id from the listing's identity fields
fn candidate_id(name: &str, city: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(city.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}

/// Keyword-table intake: maps request text onto a trade without a model
pub struct StubIntake {
    behavior: StubBehavior,
}

impl Default for StubIntake {
    fn default() -> Self {
        Self::new()
    }
}

impl StubIntake {
    pub fn new() -> Self {
        Self {
            behavior: StubBehavior::default(),
        }
    }

    /// A stub that fails every invocation with the given error
    pub fn failing(err: StageError) -> Self {
        Self {
            behavior: StubBehavior {
                fail_with: Some(err),
                ..Default::default()
            },
        }
    }

    /// A stub that never resolves
    pub fn hanging() -> Self {
        Self {
            behavior: StubBehavior {
                hang: true,
                ..Default::default()
            },
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.behavior.calls.clone()
    }

    fn classify(prompt: &str) -> (&'static str, &'static str) {
        let text = prompt.to_ascii_lowercase();
        const TABLE: &[(&[&str], &str, &str)] = &[
            (
                &["faucet", "leak", "pipe", "drain", "toilet"],
                "Plumbing",
                "repair",
            ),
            (
                &["outlet", "wiring", "breaker", "light fixture"],
                "Electrical",
                "repair",
            ),
            (
                &["furnace", "air conditioning", "hvac", "heating"],
                "HVAC",
                "maintenance",
            ),
            (
                &["paint", "interior", "decor", "design"],
                "Interior Design",
                "renovation",
            ),
            (
                &["kitchen", "bathroom", "remodel", "renovat"],
                "Remodeling",
                "renovation",
            ),
        ];

        for (keywords, trade, project_type) in TABLE {
            if keywords.iter().any(|k| text.contains(k)) {
                return (trade, project_type);
            }
        }
        ("General Contractor", "general")
    }
}

#[async_trait]
impl StageAdapter for StubIntake {
    type Input = JobRequest;
    type Output = JobScope;

    fn stage(&self) -> Stage {
        Stage::Intake
    }

    fn name(&self) -> &str {
        "stub-intake"
    }

    async fn invoke(&self, input: JobRequest) -> Result<JobScope, StageError> {
        self.behavior.gate().await?;

        let (trade, project_type) = Self::classify(&input.prompt);
        let urgency = if input.prompt.to_ascii_lowercase().contains("emergency") {
            Urgency::Emergency
        } else {
            Urgency::Normal
        };

        Ok(JobScope {
            job_id: input.job_id,
            trade: trade.into(),
            services: vec!["repair".into()],
            urgency,
            project_type: project_type.into(),
            budget_hint: None,
            location_requirements: None,
        })
    }
}

/// Fixed-roster directory: synthesizes a deterministic candidate list
/// for whatever trade the scope asks for.
pub struct StubDirectory {
    behavior: StubBehavior,
    count: usize,
}

const BUSINESS_PREFIXES: &[&str] = &[
    "Summit",
    "Lone Star",
    "Blue Ribbon",
    "Cornerstone",
    "Beacon",
    "Heritage",
    "Cedar Creek",
];

const PRICE_BANDS: &[&str] = &["low", "medium", "high"];

impl Default for StubDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl StubDirectory {
    pub fn new() -> Self {
        Self::with_count(3)
    }

    /// A directory that always returns exactly `count` candidates
    pub fn with_count(count: usize) -> Self {
        Self {
            behavior: StubBehavior::default(),
            count,
        }
    }

    pub fn failing(err: StageError) -> Self {
        Self {
            behavior: StubBehavior {
                fail_with: Some(err),
                ..Default::default()
            },
            count: 0,
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.behavior.calls.clone()
    }
}

#[async_trait]
impl StageAdapter for StubDirectory {
    type Input = DirectoryQuery;
    type Output = CandidateList;

    fn stage(&self) -> Stage {
        Stage::Search
    }

    fn name(&self) -> &str {
        "stub-directory"
    }

    async fn invoke(&self, input: DirectoryQuery) -> Result<CandidateList, StageError> {
        self.behavior.gate().await?;

        let candidates = (0..self.count)
            .map(|i| {
                let prefix = BUSINESS_PREFIXES[i % BUSINESS_PREFIXES.len()];
                let name = format!("{} {}", prefix, input.scope.trade);
                Candidate {
                    id: candidate_id(&name, &input.city),
                    name,
                    trade: input.scope.trade.clone(),
                    city: input.city.clone(),
                    state: input.state.clone(),
                    services: input.scope.services.clone(),
                    rating: 4.2 + (i as f32 * 0.15),
                    price_band: PRICE_BANDS[i % PRICE_BANDS.len()].into(),
                    license: Some(format!("CONT-{}-{:04}", input.state, 1000 + i)),
                    website: None,
                    bio: None,
                }
            })
            .collect();

        Ok(CandidateList::new(input.job_id, candidates))
    }
}

/// Positional ranker: scores candidates in directory order, the same
/// formula the live ranker falls back to.
pub struct StubRanker {
    behavior: StubBehavior,
}

impl Default for StubRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl StubRanker {
    pub fn new() -> Self {
        Self {
            behavior: StubBehavior::default(),
        }
    }

    pub fn failing(err: StageError) -> Self {
        Self {
            behavior: StubBehavior {
                fail_with: Some(err),
                ..Default::default()
            },
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.behavior.calls.clone()
    }
}

#[async_trait]
impl StageAdapter for StubRanker {
    type Input = RankRequest;
    type Output = MatchResult;

    fn stage(&self) -> Stage {
        Stage::Rank
    }

    fn name(&self) -> &str {
        "stub-ranker"
    }

    async fn invoke(&self, input: RankRequest) -> Result<MatchResult, StageError> {
        self.behavior.gate().await?;

        let matches: Vec<Match> = input
            .candidates
            .iter()
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
            .collect();

        Ok(MatchResult::new(input.job_id, matches))
    }
}
