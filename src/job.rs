//! Progress tracking for folder jobs.
//!
//! Each job gets its own [`JobHandle`], created by the [`JobRegistry`] and
//! moved into whatever runs the job. The handle is the only writer of its
//! status; the registry hands out snapshots and forgets the job on
//! [`JobRegistry::dispose`].
//!
//! Percent mapping: 5 when scanning starts, file progress spread over
//! 5..=90, 92 while the report is written, 100 when done or failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::Progress;

const SCAN_PERCENT: u8 = 5;
const FILES_SPAN: usize = 85;
const REPORT_PERCENT: u8 = 92;

/// Snapshot of a job's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub percent: u8,
    pub message: String,
    pub done: bool,
    pub error: Option<String>,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self {
            percent: 0,
            message: "Queued".to_string(),
            done: false,
            error: None,
        }
    }
}

type Shared = Arc<Mutex<JobStatus>>;

fn lock(state: &Shared) -> MutexGuard<'_, JobStatus> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of live jobs keyed by id.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<Uuid, Shared>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job and return its writer handle.
    pub fn create(&self) -> JobHandle {
        let id = Uuid::new_v4();
        let state: Shared = Arc::new(Mutex::new(JobStatus::default()));
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&state));
        JobHandle { id, state }
    }

    pub fn status(&self, id: Uuid) -> Option<JobStatus> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).map(|state| lock(state).clone())
    }

    /// Forget a job, returning its final status.
    pub fn dispose(&self, id: Uuid) -> Option<JobStatus> {
        let state = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)?;
        let status = lock(&state).clone();
        Some(status)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writer side of one job.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    state: Shared,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.state).clone()
    }

    pub fn update(&self, percent: u8, message: impl Into<String>) {
        let mut status = lock(&self.state);
        status.percent = percent.min(100);
        status.message = message.into();
    }

    pub fn scanning(&self) {
        self.update(SCAN_PERCENT, "Scanning files");
    }

    /// Map a folder progress event into 5..=90.
    pub fn file_progress(&self, progress: &Progress) {
        let total = progress.total.max(1);
        let current = progress.current.min(total);
        let percent = usize::from(SCAN_PERCENT) + current * FILES_SPAN / total;
        self.update(
            u8::try_from(percent).unwrap_or(90),
            format!(
                "{}: {} ({}/{})",
                progress.stage, progress.file_name, progress.current, progress.total
            ),
        );
    }

    pub fn writing_report(&self) {
        self.update(REPORT_PERCENT, "Writing report");
    }

    pub fn complete(&self) {
        let mut status = lock(&self.state);
        status.percent = 100;
        status.message = "Complete".to_string();
        status.done = true;
    }

    pub fn fail(&self, error: &str) {
        let mut status = lock(&self.state);
        status.percent = 100;
        status.message = "Failed".to_string();
        status.done = true;
        status.error = Some(format!("Processing failed: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    fn progress(current: usize, total: usize) -> Progress {
        Progress {
            current,
            total,
            stage: Stage::Processed,
            file_name: "p.xhtml".to_string(),
        }
    }

    #[test]
    fn lifecycle() {
        let registry = JobRegistry::new();
        let handle = registry.create();
        let id = handle.id();
        assert_eq!(registry.status(id).unwrap().message, "Queued");

        handle.scanning();
        assert_eq!(registry.status(id).unwrap().percent, 5);
        handle.writing_report();
        assert_eq!(registry.status(id).unwrap().percent, 92);
        handle.complete();

        let last = registry.dispose(id).unwrap();
        assert!(last.done);
        assert_eq!(last.percent, 100);
        assert!(registry.status(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn file_progress_maps_into_range() {
        let registry = JobRegistry::new();
        let handle = registry.create();
        handle.file_progress(&progress(0, 4));
        assert_eq!(handle.status().percent, 5);
        handle.file_progress(&progress(2, 4));
        assert_eq!(handle.status().percent, 47);
        handle.file_progress(&progress(4, 4));
        assert_eq!(handle.status().percent, 90);
        assert_eq!(handle.status().message, "Processed: p.xhtml (4/4)");
        handle.file_progress(&progress(0, 0));
        assert_eq!(handle.status().percent, 5);
    }

    #[test]
    fn jobs_are_independent() {
        let registry = JobRegistry::new();
        let a = registry.create();
        let b = registry.create();
        a.fail("disk full");
        let status_b = registry.status(b.id()).unwrap();
        assert!(!status_b.done);
        let status_a = registry.status(a.id()).unwrap();
        assert_eq!(status_a.error.as_deref(), Some("Processing failed: disk full"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn handle_moves_to_worker_thread() {
        let registry = JobRegistry::new();
        let handle = registry.create();
        let id = handle.id();
        std::thread::spawn(move || handle.complete()).join().unwrap();
        assert!(registry.status(id).unwrap().done);
    }
}
