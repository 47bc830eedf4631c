// crates/core/src/jobs/store.rs
//! Concurrency-safe table of job records.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::record::JobRecord;
use super::types::{JobId, JobSnapshot, JobState};

/// Table of all known jobs, keyed by id.
///
/// The map lock only guards membership; per-job mutable state lives inside
/// each [`JobRecord`], so queries against unrelated jobs never contend.
/// Records are never removed; they persist until the process exits.
pub struct JobStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<JobId, Arc<JobRecord>>,
    /// Ids in submission order, for ordered enumeration.
    order: Vec<JobId>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn insert(&self, record: Arc<JobRecord>) {
        let id = record.id();
        match self.inner.write() {
            Ok(mut inner) => {
                if inner.records.insert(id, record).is_none() {
                    inner.order.push(id);
                }
            }
            Err(e) => tracing::error!("RwLock poisoned inserting job record: {e}"),
        }
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<JobRecord>> {
        match self.inner.read() {
            Ok(inner) => inner.records.get(id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job store: {e}");
                None
            }
        }
    }

    /// Snapshots of all jobs in submission order, optionally filtered to a
    /// single state.
    pub fn list(&self, filter: Option<JobState>) -> Vec<JobSnapshot> {
        match self.inner.read() {
            Ok(inner) => inner
                .order
                .iter()
                .filter_map(|id| inner.records.get(id))
                .map(|record| record.snapshot())
                .filter(|snapshot| filter.is_none_or(|state| snapshot.state == state))
                .collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned listing jobs: {e}");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(inner) => inner.order.len(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job store length: {e}");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobSpec;

    fn record(name: &str) -> Arc<JobRecord> {
        Arc::new(JobRecord::new(JobSpec::new("/bin/true").with_name(name)))
    }

    #[test]
    fn test_insert_and_get() {
        let store = JobStore::new();
        let a = record("a");
        let id = a.id();
        store.insert(a);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).unwrap().name(), "a");
        assert!(store.get(&uuid::Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_list_preserves_submission_order() {
        let store = JobStore::new();
        for name in ["first", "second", "third"] {
            store.insert(record(name));
        }

        let names: Vec<_> = store.list(None).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_list_filters_by_state() {
        let store = JobStore::new();
        let a = record("a");
        let b = record("b");
        b.mark_running().unwrap();
        store.insert(a);
        store.insert(b);

        let running = store.list(Some(JobState::Running));
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].name, "b");

        assert!(store.list(Some(JobState::Failed)).is_empty());
        assert_eq!(store.list(None).len(), 2);
    }
}
