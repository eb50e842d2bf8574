//! Job record and lifecycle state.
//!
//! A Job is the central entity: one end-to-end service request from
//! submission to terminal outcome. Status transitions are monotonic and
//! strictly ordered (intake -> search -> rank); once a job is completed
//! or failed it never changes again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{ErrorEvent, JobEvent, ProgressEvent, ProgressStage};
use super::messages::{CandidateList, JobRequest, JobScope, MatchResult};

/// A pipeline stage with its own external capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Natural-language analysis of the request into a structured scope
    Intake,

    /// Candidate discovery against the professional directory
    Search,

    /// Scoring and explanation of the discovered candidates
    Rank,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Search => "search",
            Stage::Rank => "rank",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum JobStatus {
    /// Accepted, pipeline not yet started
    Queued,

    /// One stage currently in flight
    Running { stage: Stage },

    /// Terminal: ranked matches available in `result`
    Completed,

    /// Terminal: a stage failed, details in `error`
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => f.write_str("queued"),
            JobStatus::Running { stage } => write!(f, "running:{}", stage),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Structured failure attached to a failed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    /// Stage the failure originated from
    pub stage: Stage,

    /// Human-readable cause
    pub message: String,
}

/// Output of one successfully completed stage.
///
/// Appended in stage order; the record never shrinks, and its length
/// always equals the number of stages completed so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "output")]
pub enum StageOutput {
    Scope(JobScope),
    Candidates(CandidateList),
    Matches(MatchResult),
}

/// One end-to-end service request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique identifier, assigned at submission
    pub id: Uuid,

    /// Current lifecycle state
    #[serde(flatten)]
    pub status: JobStatus,

    /// The original request as submitted
    pub input: JobRequest,

    /// Outputs of completed stages, in stage order
    pub stage_outputs: Vec<StageOutput>,

    /// Final ranked matches, present only when completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,

    /// Failure details, present only when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,

    /// When the job was submitted
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal state (set exactly once)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a freshly submitted job
    pub fn new(id: Uuid, input: JobRequest) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            input,
            stage_outputs: Vec::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Check if the job has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    /// The analyzed scope, if intake has completed
    pub fn scope(&self) -> Option<&JobScope> {
        self.stage_outputs.iter().find_map(|o| match o {
            StageOutput::Scope(scope) => Some(scope),
            _ => None,
        })
    }

    /// The discovered candidates, if search has completed
    pub fn candidates(&self) -> Option<&CandidateList> {
        self.stage_outputs.iter().find_map(|o| match o {
            StageOutput::Candidates(list) => Some(list),
            _ => None,
        })
    }

    /// Finalize as completed with the ranked matches.
    ///
    /// No-op if the job is already terminal; `completed_at` is only ever
    /// written here and in `finalize_failed`, exactly once.
    pub fn finalize_completed(&mut self, result: MatchResult) {
        if self.is_terminal() {
            return;
        }
        self.stage_outputs.push(StageOutput::Matches(result.clone()));
        self.result = Some(result);
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Finalize as failed, naming the originating stage.
    pub fn finalize_failed(&mut self, stage: Stage, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.error = Some(JobFailure {
            stage,
            message: message.into(),
        });
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// The event a late subscriber should observe for an already-settled
    /// job, or `None` while the pipeline is still running.
    pub fn terminal_event(&self) -> Option<JobEvent> {
        match self.status {
            JobStatus::Completed => {
                let count = self.result.as_ref().map(|r| r.count).unwrap_or(0);
                Some(JobEvent::Progress(ProgressEvent::new(
                    self.id,
                    ProgressStage::Done,
                    format!("Found {} qualified professionals", count),
                )))
            }
            JobStatus::Failed => {
                let failure = self.error.as_ref()?;
                Some(JobEvent::Error(ErrorEvent::new(
                    self.id,
                    failure.stage.into(),
                    failure.message.clone(),
                )))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::JobSubmission;

    fn request(id: Uuid) -> JobRequest {
        JobSubmission {
            prompt: "leaking faucet".into(),
            city: "Austin".into(),
            state: "TX".into(),
            zip_code: None,
            photo_urls: Vec::new(),
        }
        .into_request(id)
    }

    #[test]
    fn test_new_job_is_queued() {
        let id = Uuid::new_v4();
        let job = Job::new(id, request(id));

        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(!job.is_terminal());
        assert!(job.completed_at.is_none());
        assert!(job.stage_outputs.is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Queued.to_string(), "queued");
        assert_eq!(
            JobStatus::Running {
                stage: Stage::Intake
            }
            .to_string(),
            "running:intake"
        );
        assert_eq!(JobStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_finalize_failed_sets_error_once() {
        let id = Uuid::new_v4();
        let mut job = Job::new(id, request(id));
        job.status = JobStatus::Running {
            stage: Stage::Intake,
        };

        job.finalize_failed(Stage::Intake, "capability timed out");
        let first_completed_at = job.completed_at;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_ref().unwrap().stage, Stage::Intake);
        assert!(job.result.is_none());
        assert!(first_completed_at.is_some());

        // Terminal states are sticky
        job.finalize_failed(Stage::Search, "should not overwrite");
        assert_eq!(job.error.as_ref().unwrap().stage, Stage::Intake);
        assert_eq!(job.completed_at, first_completed_at);
    }

    #[test]
    fn test_completed_job_never_gains_error() {
        let id = Uuid::new_v4();
        let mut job = Job::new(id, request(id));
        job.finalize_completed(MatchResult::empty(id));

        job.finalize_failed(Stage::Rank, "too late");

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_terminal_event_for_running_job_is_none() {
        let id = Uuid::new_v4();
        let job = Job::new(id, request(id));
        assert!(job.terminal_event().is_none());
    }
}
