//! Main orchestrator for the matching pipeline.
//!
//! Drives each job through intake -> search -> rank and guarantees that
//! exactly one terminal state is reached. The `advance` match below is
//! the transition table: every status has exactly one outgoing edge per
//! trigger, stages are never skipped or revisited, and any stage failure
//! becomes a single terminal `Failed` transition.

use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{StageError, StageSet};
use crate::domain::{
    DirectoryQuery, ErrorEvent, Job, JobEvent, JobStatus, JobSubmission, ProgressEvent,
    ProgressStage, RankRequest, Stage, StageOutput,
};

use super::job_store::{JobStore, JobStoreError};
use super::stream::{EventBus, JobSubscription};

const INTAKE_MESSAGE: &str = "Analyzing your project requirements";
const SEARCH_MESSAGE: &str = "Finding professionals for your specific needs";
const RANK_MESSAGE: &str = "Ranking the best matches for your project";

/// Errors surfaced by `submit` before a job enters the state machine
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid submission: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// What `advance` tells the per-job driver loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// More stages remain
    Continue,
    /// A terminal state was reached (or already held)
    Settled,
}

/// Pipeline orchestrator: job store, event bus, and the stage
/// capabilities, behind one cloneable handle.
#[derive(Clone)]
pub struct Orchestrator {
    store: JobStore,
    events: EventBus,
    stages: StageSet,
}

impl Orchestrator {
    pub fn new(stages: StageSet, events: EventBus) -> Self {
        Self {
            store: JobStore::new(),
            events,
            stages,
        }
    }

    /// Deterministic in-process pipeline with default stream ceiling
    pub fn stubbed() -> Self {
        Self::new(StageSet::stubbed(), EventBus::default())
    }

    /// The job registry (for status polling and listings)
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Accept a submission, create the job, and start its pipeline.
    ///
    /// Returns as soon as the job record exists; the pipeline runs on
    /// its own task. Malformed submissions are rejected here and never
    /// enter the state machine.
    pub fn submit(&self, submission: JobSubmission) -> Result<Uuid, SubmitError> {
        submission.validate().map_err(SubmitError::Invalid)?;

        let job_id = Uuid::new_v4();
        let request = submission.into_request(job_id);
        self.store.create(job_id, request)?;
        self.events.register(job_id);

        info!(%job_id, "job submitted");

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run(job_id).await;
        });

        Ok(job_id)
    }

    /// Snapshot of a job's current state
    pub fn status(&self, job_id: Uuid) -> Result<Job, JobStoreError> {
        self.store.get(job_id)
    }

    /// Open a bounded event stream for a job.
    ///
    /// The receiver is attached before the status check so a terminal
    /// transition between the two is observed either way: from the
    /// snapshot if it already happened, from the channel if not.
    pub fn subscribe(&self, job_id: Uuid) -> Result<JobSubscription, JobStoreError> {
        let rx = self.events.attach(job_id);
        let job = self.store.get(job_id)?;

        let mut ready = std::collections::VecDeque::new();
        ready.push_back(JobEvent::connected(job_id));

        if let Some(terminal) = job.terminal_event() {
            ready.push_back(terminal);
            return Ok(JobSubscription::new(
                job_id,
                ready,
                None,
                self.events.ceiling(),
            ));
        }

        Ok(JobSubscription::new(job_id, ready, rx, self.events.ceiling()))
    }

    /// Drive one job to a terminal state, one stage at a time.
    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn run(&self, job_id: Uuid) {
        loop {
            match self.advance(job_id).await {
                Ok(Flow::Continue) => continue,
                Ok(Flow::Settled) => break,
                Err(e) => {
                    // The store never drops records, so this indicates a
                    // bug rather than a recoverable condition.
                    error!(error = %e, "job disappeared from store mid-pipeline");
                    break;
                }
            }
        }
        self.events.remove(job_id);
    }

    /// One step of the state machine.
    ///
    /// Reads the job's current status, performs that state's single
    /// action, and applies the transition. Invoked exactly once per
    /// stage completion by the driver loop; calling it on a terminal
    /// job is a no-op.
    async fn advance(&self, job_id: Uuid) -> Result<Flow, JobStoreError> {
        let job = self.store.get(job_id)?;

        match job.status {
            JobStatus::Queued => {
                self.store.update(job_id, |j| {
                    j.status = JobStatus::Running {
                        stage: Stage::Intake,
                    }
                })?;
                self.publish_progress(job_id, ProgressStage::Intake, INTAKE_MESSAGE);
                Ok(Flow::Continue)
            }

            JobStatus::Running {
                stage: Stage::Intake,
            } => match self.stages.intake.invoke(job.input.clone()).await {
                Ok(scope) => {
                    info!(%job_id, trade = %scope.trade, "intake complete");
                    self.store.update(job_id, |j| {
                        j.stage_outputs.push(StageOutput::Scope(scope));
                        j.status = JobStatus::Running {
                            stage: Stage::Search,
                        };
                    })?;
                    self.publish_progress(job_id, ProgressStage::Search, SEARCH_MESSAGE);
                    Ok(Flow::Continue)
                }
                Err(e) => self.fail(job_id, Stage::Intake, e),
            },

            JobStatus::Running {
                stage: Stage::Search,
            } => {
                let Some(scope) = job.scope().cloned() else {
                    return self.fail(
                        job_id,
                        Stage::Search,
                        StageError::State("intake output missing".into()),
                    );
                };
                let query = DirectoryQuery {
                    job_id,
                    scope,
                    city: job.input.city.clone(),
                    state: job.input.state.clone(),
                };
                match self.stages.search.invoke(query).await {
                    Ok(candidates) => {
                        // An empty directory result is not a failure;
                        // ranking degrades gracefully downstream.
                        if candidates.count == 0 {
                            warn!(%job_id, "directory search returned no candidates");
                        } else {
                            info!(%job_id, count = candidates.count, "search complete");
                        }
                        self.store.update(job_id, |j| {
                            j.stage_outputs.push(StageOutput::Candidates(candidates));
                            j.status = JobStatus::Running { stage: Stage::Rank };
                        })?;
                        self.publish_progress(job_id, ProgressStage::Rank, RANK_MESSAGE);
                        Ok(Flow::Continue)
                    }
                    Err(e) => self.fail(job_id, Stage::Search, e),
                }
            }

            JobStatus::Running { stage: Stage::Rank } => {
                let (Some(scope), Some(candidates)) =
                    (job.scope().cloned(), job.candidates().cloned())
                else {
                    return self.fail(
                        job_id,
                        Stage::Rank,
                        StageError::State("search output missing".into()),
                    );
                };
                let request = RankRequest {
                    job_id,
                    scope,
                    candidates: candidates.candidates,
                };
                match self.stages.rank.invoke(request).await {
                    Ok(result) => {
                        let count = result.count;
                        self.store.update(job_id, |j| j.finalize_completed(result))?;
                        info!(%job_id, count, "job completed");
                        self.publish_progress(
                            job_id,
                            ProgressStage::Done,
                            format!("Found {} qualified professionals", count),
                        );
                        Ok(Flow::Settled)
                    }
                    Err(e) => self.fail(job_id, Stage::Rank, e),
                }
            }

            JobStatus::Completed | JobStatus::Failed => Ok(Flow::Settled),
        }
    }

    /// Convert a stage failure into the single terminal transition.
    fn fail(&self, job_id: Uuid, stage: Stage, err: StageError) -> Result<Flow, JobStoreError> {
        let message = err.to_string();
        error!(%job_id, stage = %stage, category = %err.category(), error = %message, "stage failed");

        self.store
            .update(job_id, |j| j.finalize_failed(stage, message.clone()))?;
        self.events
            .publish(JobEvent::Error(ErrorEvent::new(job_id, stage.into(), message)));
        Ok(Flow::Settled)
    }

    fn publish_progress(&self, job_id: Uuid, stage: ProgressStage, message: impl Into<String>) {
        self.events
            .publish(JobEvent::Progress(ProgressEvent::new(job_id, stage, message)));
    }
}
