//! In-memory job registry.
//!
//! The single source of truth for status polling. One writer per job at
//! a time (the orchestrator never runs two stages concurrently for one
//! job); any number of concurrent readers, each getting a tear-free
//! snapshot rather than a live reference.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Job, JobRequest};

/// Errors from registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("job already exists: {0}")]
    AlreadyExists(Uuid),
}

/// Process-wide map from job id to job record.
///
/// Cheap to clone; clones share the same underlying map.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh job record.
    ///
    /// Ids are always freshly generated, so a collision is unreachable
    /// in normal operation, but it is a defined error rather than a
    /// silent overwrite.
    pub fn create(&self, id: Uuid, input: JobRequest) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        if jobs.contains_key(&id) {
            return Err(JobStoreError::AlreadyExists(id));
        }
        let job = Job::new(id, input);
        jobs.insert(id, job.clone());
        Ok(job)
    }

    /// Snapshot of a job record (copy-on-read)
    pub fn get(&self, id: Uuid) -> Result<Job, JobStoreError> {
        let jobs = self.jobs.read().expect("job store lock poisoned");
        jobs.get(&id).cloned().ok_or(JobStoreError::NotFound(id))
    }

    /// Apply a mutation atomically and return the updated snapshot.
    ///
    /// Concurrent updates serialize on the write lock; readers never
    /// observe a partially applied mutation.
    pub fn update<F>(&self, id: Uuid, mutate: F) -> Result<Job, JobStoreError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        mutate(job);
        Ok(job.clone())
    }

    /// All job snapshots, most recent first
    pub fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().expect("job store lock poisoned");
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn len(&self) -> usize {
        self.jobs.read().expect("job store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
