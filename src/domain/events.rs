//! Progress and error events delivered over per-job status streams.
//!
//! Events are ephemeral: they exist to be delivered to whoever is
//! watching a job and are not persisted beyond that. The job record in
//! the store remains the source of truth for status polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::Stage;

/// Stage label carried on progress events.
///
/// Includes the two stream-level markers (`connected`, `done`) that do
/// not correspond to a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// Subscription acknowledgement, first event on every stream
    Connected,
    Intake,
    Search,
    Rank,
    /// Terminal: the job completed
    Done,
}

impl From<Stage> for ProgressStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Intake => ProgressStage::Intake,
            Stage::Search => ProgressStage::Search,
            Stage::Rank => ProgressStage::Rank,
        }
    }
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProgressStage::Connected => "connected",
            ProgressStage::Intake => "intake",
            ProgressStage::Search => "search",
            ProgressStage::Rank => "rank",
            ProgressStage::Done => "done",
        };
        f.write_str(label)
    }
}

/// Where an error event originated: a pipeline stage, or the stream
/// layer itself (subscription ceiling reached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Intake,
    Search,
    Rank,
    Stream,
}

impl From<Stage> for ErrorStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Intake => ErrorStage::Intake,
            Stage::Search => ErrorStage::Search,
            Stage::Rank => ErrorStage::Rank,
        }
    }
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorStage::Intake => "intake",
            ErrorStage::Search => "search",
            ErrorStage::Rank => "rank",
            ErrorStage::Stream => "stream",
        };
        f.write_str(label)
    }
}

/// Non-fatal status notification emitted at each stage transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub stage: ProgressStage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(job_id: Uuid, stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            job_id,
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Notification that a job has failed, naming the originating stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub job_id: Uuid,
    pub stage: ErrorStage,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(job_id: Uuid, stage: ErrorStage, error: impl Into<String>) -> Self {
        Self {
            job_id,
            stage,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A single event on a job's status stream.
///
/// Serialized untagged: progress events carry a `message` field, error
/// events an `error` field, matching the payloads the front-end's
/// event-source hook already distinguishes on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobEvent {
    Progress(ProgressEvent),
    Error(ErrorEvent),
}

impl JobEvent {
    /// Subscription acknowledgement, yielded before any pipeline event.
    pub fn connected(job_id: Uuid) -> Self {
        JobEvent::Progress(ProgressEvent::new(
            job_id,
            ProgressStage::Connected,
            "Connected to progress stream",
        ))
    }

    /// Synthetic error for a subscription that hit its ceiling without
    /// observing a terminal event. Does not reflect the job's status.
    pub fn stream_timeout(job_id: Uuid) -> Self {
        JobEvent::Error(ErrorEvent::new(
            job_id,
            ErrorStage::Stream,
            "Timed out waiting for job to finish",
        ))
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Progress(e) => e.job_id,
            JobEvent::Error(e) => e.job_id,
        }
    }

    /// Terminal events close the stream: `done` or any error.
    pub fn is_terminal(&self) -> bool {
        match self {
            JobEvent::Progress(e) => e.stage == ProgressStage::Done,
            JobEvent::Error(_) => true,
        }
    }
}
