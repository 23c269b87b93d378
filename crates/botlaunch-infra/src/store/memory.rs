//! DashMap-backed implementation of the [`JobStore`] port.
//!
//! Sharded per-key locking: progress reports for unrelated bots never
//! serialize on a common mutex. History optionally persists through a
//! [`HistoryFile`], reloaded at construction time.

use botlaunch_core::tracker::JobStore;
use botlaunch_types::error::StoreError;
use botlaunch_types::job::{HistoryEntry, JobId, JobKey, PublishJob};
use dashmap::DashMap;

use super::history_file::{HistoryFile, HistorySnapshot};

/// In-memory job store with optional flat-file history persistence.
pub struct MemoryJobStore {
    live: DashMap<JobKey, Vec<PublishJob>>,
    history: DashMap<JobKey, Vec<HistoryEntry>>,
    persistence: Option<HistoryFile>,
}

impl MemoryJobStore {
    /// Process-lifetime store, nothing touches disk.
    pub fn new() -> Self {
        Self {
            live: DashMap::new(),
            history: DashMap::new(),
            persistence: None,
        }
    }

    /// Store backed by a history document, loaded now and rewritten after
    /// every append.
    pub async fn with_persistence(file: HistoryFile) -> Self {
        let snapshot = file.load().await;
        let history = DashMap::new();
        for (bot_id, profiles) in snapshot {
            for (profile_name, entries) in profiles {
                history.insert(JobKey::new(bot_id.clone(), profile_name), entries);
            }
        }
        Self {
            live: DashMap::new(),
            history,
            persistence: Some(file),
        }
    }

    async fn persist(&self) {
        let Some(file) = &self.persistence else {
            return;
        };
        let mut snapshot = HistorySnapshot::new();
        for entry in self.history.iter() {
            snapshot
                .entry(entry.key().bot_id.clone())
                .or_default()
                .insert(entry.key().profile_name.clone(), entry.value().clone());
        }
        if let Err(e) = file.write(&snapshot).await {
            tracing::warn!(error = %e, "failed to persist history");
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for MemoryJobStore {
    async fn put_job(&self, job: &PublishJob) -> Result<(), StoreError> {
        let mut jobs = self.live.entry(job.key()).or_default();
        match jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job.clone(),
            None => jobs.push(job.clone()),
        }
        Ok(())
    }

    async fn get_job(
        &self,
        key: &JobKey,
        job_id: Option<JobId>,
    ) -> Result<Option<PublishJob>, StoreError> {
        let Some(jobs) = self.live.get(key) else {
            return Ok(None);
        };
        Ok(match job_id {
            Some(id) => jobs.iter().find(|j| j.id == id).cloned(),
            None => jobs
                .iter()
                .max_by_key(|j| (j.created_at, j.id.0))
                .cloned(),
        })
    }

    async fn remove_job(
        &self,
        key: &JobKey,
        job_id: JobId,
    ) -> Result<Option<PublishJob>, StoreError> {
        let removed = self.live.get_mut(key).and_then(|mut jobs| {
            jobs.iter()
                .position(|j| j.id == job_id)
                .map(|pos| jobs.remove(pos))
        });
        // Drop empty per-pair vectors so the table does not grow without
        // bound across bots.
        self.live.remove_if(key, |_, jobs| jobs.is_empty());
        Ok(removed)
    }

    async fn append_history(&self, key: &JobKey, entry: HistoryEntry) -> Result<(), StoreError> {
        self.history
            .entry(key.clone())
            .or_default()
            .insert(0, entry);
        self.persist().await;
        Ok(())
    }

    async fn history(&self, key: &JobKey) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .history
            .get(key)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }
}
