//! Job store trait definition.
//!
//! Defines the storage interface for the live-job table and the per-pair
//! history lists. The infrastructure layer implements this trait with a
//! DashMap-backed store and optional flat-file history persistence; tests
//! substitute lightweight fakes.
//!
//! Invariants the implementations must uphold:
//! - at most one live job per `(bot_id, profile_name, job_id)`;
//! - the live table and the history list for a pair are disjoint -- the
//!   tracker moves a job by appending to history first, then removing it
//!   from the live table;
//! - history lists are newest-first and append-only.

use botlaunch_types::error::StoreError;
use botlaunch_types::job::{HistoryEntry, JobId, JobKey, PublishJob};

/// Storage port for live jobs and history.
///
/// Uses native async fn in traits (RPITIT) -- no async_trait macro.
pub trait JobStore: Send + Sync {
    /// Insert or replace the live entry for `job.id`.
    fn put_job(
        &self,
        job: &PublishJob,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a live job: the one matching `job_id` when given, otherwise
    /// the most recently created job for the pair.
    fn get_job(
        &self,
        key: &JobKey,
        job_id: Option<JobId>,
    ) -> impl std::future::Future<Output = Result<Option<PublishJob>, StoreError>> + Send;

    /// Remove a live job, returning it if it existed.
    fn remove_job(
        &self,
        key: &JobKey,
        job_id: JobId,
    ) -> impl std::future::Future<Output = Result<Option<PublishJob>, StoreError>> + Send;

    /// Prepend an entry to the pair's history (newest first) and persist
    /// when persistence is configured.
    fn append_history(
        &self,
        key: &JobKey,
        entry: HistoryEntry,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// The pair's history, newest first. Empty when never published.
    fn history(
        &self,
        key: &JobKey,
    ) -> impl std::future::Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send;
}
