//! Job Store Integration Tests
//!
//! Registry contract and snapshot semantics under concurrent access.

use renova::core::{JobStore, JobStoreError};
use renova::domain::{JobStatus, JobSubmission, Stage};
use uuid::Uuid;

fn request(id: Uuid) -> renova::domain::JobRequest {
    JobSubmission {
        prompt: "install ceiling fan".into(),
        city: "Austin".into(),
        state: "TX".into(),
        zip_code: None,
        photo_urls: Vec::new(),
    }
    .into_request(id)
}

#[test]
fn test_registry_contract() {
    let store = JobStore::new();
    let id = Uuid::new_v4();

    // Unknown ids are a defined error on every operation
    assert_eq!(store.get(id).unwrap_err(), JobStoreError::NotFound(id));
    assert_eq!(
        store.update(id, |_| {}).unwrap_err(),
        JobStoreError::NotFound(id)
    );

    let created = store.create(id, request(id)).unwrap();
    assert_eq!(created.status, JobStatus::Queued);

    // Re-creating an existing id is rejected, not overwritten
    assert_eq!(
        store.create(id, request(id)).unwrap_err(),
        JobStoreError::AlreadyExists(id)
    );
    assert_eq!(store.len(), 1);
}

#[test]
fn test_update_is_visible_to_subsequent_reads() {
    let store = JobStore::new();
    let id = Uuid::new_v4();
    store.create(id, request(id)).unwrap();

    store
        .update(id, |job| {
            job.status = JobStatus::Running {
                stage: Stage::Intake,
            }
        })
        .unwrap();

    assert_eq!(
        store.get(id).unwrap().status,
        JobStatus::Running {
            stage: Stage::Intake
        }
    );
}

/// Readers polling while a writer walks a job through its transitions
/// must only ever observe fully applied states.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_see_only_complete_states() {
    let store = JobStore::new();
    let id = Uuid::new_v4();
    store.create(id, request(id)).unwrap();

    let writer_store = store.clone();
    let writer = tokio::spawn(async move {
        let transitions = [
            JobStatus::Running {
                stage: Stage::Intake,
            },
            JobStatus::Running {
                stage: Stage::Search,
            },
            JobStatus::Running { stage: Stage::Rank },
        ];
        for status in transitions {
            writer_store.update(id, |job| job.status = status).unwrap();
            tokio::task::yield_now().await;
        }
        writer_store
            .update(id, |job| {
                job.finalize_completed(renova::domain::MatchResult::empty(id))
            })
            .unwrap();
    });

    let reader_store = store.clone();
    let reader = tokio::spawn(async move {
        loop {
            let job = reader_store.get(id).unwrap();
            // A snapshot is internally consistent: result and error are
            // mutually exclusive, and a terminal status always carries
            // its completion time.
            assert!(job.result.is_none() || job.error.is_none());
            match job.status {
                JobStatus::Completed => {
                    assert!(job.result.is_some());
                    assert!(job.completed_at.is_some());
                    break;
                }
                JobStatus::Failed => {
                    assert!(job.error.is_some());
                    assert!(job.completed_at.is_some());
                    break;
                }
                _ => {
                    assert!(job.completed_at.is_none());
                }
            }
            tokio::task::yield_now().await;
        }
    });

    writer.await.unwrap();
    reader.await.unwrap();
}

#[test]
fn test_list_returns_snapshots_of_every_job() {
    let store = JobStore::new();
    for _ in 0..5 {
        let id = Uuid::new_v4();
        store.create(id, request(id)).unwrap();
    }

    let all = store.list();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|job| job.status == JobStatus::Queued));
}
