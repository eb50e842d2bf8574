//! Adapter interfaces for the external stage capabilities.
//!
//! Each pipeline stage (intake, search, rank) is an independent external
//! call behind a uniform contract: stage-specific input in, stage-specific
//! output or a typed failure out. Adapters own their timeouts and any
//! internal fallback policy; the orchestrator only sees success or
//! `StageError`.

pub mod claude;
pub mod directory;
pub mod intake;
pub mod ranker;
pub mod stub;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CandidateList, DirectoryQuery, JobRequest, JobScope, MatchResult, RankRequest, Stage};

pub use claude::ClaudeClient;
pub use directory::HttpDirectory;
pub use intake::ClaudeIntake;
pub use ranker::ClaudeRanker;
pub use stub::{StubDirectory, StubIntake, StubRanker};

/// Failure category, carried on every stage error.
///
/// The orchestrator currently treats both categories as fatal to the
/// job; the distinction is recorded for adapters that want to retry
/// internally and for operators reading the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Transient => f.write_str("transient"),
            ErrorCategory::Permanent => f.write_str("permanent"),
        }
    }
}

/// Typed failure from a stage capability invocation
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("{service} timed out after {timeout:?}")]
    Timeout { service: String, timeout: Duration },

    #[error("{service} transport error: {message}")]
    Transport { service: String, message: String },

    #[error("{service} returned an unusable response: {message}")]
    BadResponse { service: String, message: String },

    #[error("pipeline state error: {0}")]
    State(String),
}

impl StageError {
    pub fn timeout(service: impl Into<String>, timeout: Duration) -> Self {
        StageError::Timeout {
            service: service.into(),
            timeout,
        }
    }

    pub fn transport(service: impl Into<String>, message: impl ToString) -> Self {
        StageError::Transport {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn bad_response(service: impl Into<String>, message: impl ToString) -> Self {
        StageError::BadResponse {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StageError::Timeout { .. } | StageError::Transport { .. } => ErrorCategory::Transient,
            StageError::BadResponse { .. } | StageError::State(_) => ErrorCategory::Permanent,
        }
    }
}

/// Uniform boundary between the orchestrator and a stage capability
#[async_trait]
pub trait StageAdapter: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// The pipeline stage this adapter serves
    fn stage(&self) -> Stage;

    /// Human-readable capability name (for logs and health output)
    fn name(&self) -> &str;

    /// Invoke the capability. Expected to apply its own timeout.
    async fn invoke(&self, input: Self::Input) -> Result<Self::Output, StageError>;

    /// Connectivity probe for capabilities with a remote side
    async fn health_check(&self) -> Result<(), StageError> {
        Ok(())
    }
}

pub type IntakeAdapter = Arc<dyn StageAdapter<Input = JobRequest, Output = JobScope>>;
pub type SearchAdapter = Arc<dyn StageAdapter<Input = DirectoryQuery, Output = CandidateList>>;
pub type RankAdapter = Arc<dyn StageAdapter<Input = RankRequest, Output = MatchResult>>;

/// The three capabilities a pipeline needs, injected into the orchestrator
#[derive(Clone)]
pub struct StageSet {
    pub intake: IntakeAdapter,
    pub search: SearchAdapter,
    pub rank: RankAdapter,
}

impl StageSet {
    /// Deterministic in-process capabilities: the default when no
    /// credentials are configured, and the harness the tests drive.
    pub fn stubbed() -> Self {
        Self {
            intake: Arc::new(StubIntake::new()),
            search: Arc::new(StubDirectory::new()),
            rank: Arc::new(StubRanker::new()),
        }
    }
}
