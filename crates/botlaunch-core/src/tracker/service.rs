//! The publish tracker: submit, poll, history.
//!
//! `submit` validates the profile, registers a live job, and detaches the
//! pipeline as an independent background task -- the call returns before
//! any real work happens. Progress flows back through the per-job event
//! channel; a single updater task owns every store write for the job and,
//! on the terminal event, moves the job to history and triggers working
//! directory cleanup. No job is ever silently lost: any pipeline error is
//! normalized into the job log and the job still reaches history.

use std::sync::Arc;

use botlaunch_types::error::StoreError;
use botlaunch_types::job::{HistoryEntry, JobId, JobKey, JobStatus, PublishJob};
use botlaunch_types::profile::PublishRequest;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::pipeline::ports::PublishPipeline;

use super::progress::{progress_channel, ProgressEvent};
use super::store::JobStore;

/// Coordination layer for publish jobs.
///
/// Generic over the store and pipeline so tests can substitute in-memory
/// fakes for both.
pub struct PublishTracker<S, P> {
    store: Arc<S>,
    pipeline: Arc<P>,
}

impl<S, P> PublishTracker<S, P>
where
    S: JobStore + 'static,
    P: PublishPipeline + 'static,
{
    pub fn new(store: Arc<S>, pipeline: Arc<P>) -> Self {
        Self { store, pipeline }
    }

    /// Accept a publish submission.
    ///
    /// Returns the registered job (status 202) before the pipeline runs.
    /// Validation failures return a terminal 500 job instead: it is
    /// appended straight to history and never enters the live table.
    pub async fn submit(
        &self,
        bot_id: &str,
        request: PublishRequest,
    ) -> Result<PublishJob, StoreError> {
        let key = JobKey::new(bot_id, request.profile.profile_name.clone());

        if let Some(reason) = validate(&request) {
            let mut job = PublishJob::accepted(&key, request.metadata.comment.clone());
            job.status = JobStatus::Failed;
            job.message = reason.clone();
            job.append_log(&reason);
            self.store
                .append_history(&key, HistoryEntry::from(&job))
                .await?;
            tracing::warn!(
                bot_id,
                profile = key.profile_name.as_str(),
                reason = reason.as_str(),
                "publish rejected before launch"
            );
            return Ok(job);
        }

        let job = PublishJob::accepted(&key, request.metadata.comment.clone());
        self.store.put_job(&job).await?;

        tracing::info!(
            job_id = %job.id,
            bot_id,
            profile = key.profile_name.as_str(),
            "publish accepted"
        );

        let (reporter, rx) = progress_channel();
        let request = Arc::new(request);

        // Single-writer updater: owns every store write for this job.
        tokio::spawn(update_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.pipeline),
            Arc::clone(&request),
            job.clone(),
            rx,
        ));

        // The detached pipeline itself. Errors never escape this task --
        // they become the job's terminal event.
        let pipeline = Arc::clone(&self.pipeline);
        let bot_id = bot_id.to_string();
        tokio::spawn(async move {
            match pipeline.run(&bot_id, &request, reporter.clone()).await {
                Ok(message) => reporter.terminal(JobStatus::Success, message),
                Err(e) => {
                    let detail = e.to_string();
                    reporter.log(format!("publish failed: {detail}"));
                    reporter.terminal(JobStatus::Failed, detail);
                }
            }
        });

        Ok(job)
    }

    /// Current status for the pair: the live job (newest, or by `job_id`),
    /// else the newest history entry as a synthetic job, else a synthetic
    /// 404 meaning "never published".
    pub async fn poll(
        &self,
        key: &JobKey,
        job_id: Option<JobId>,
    ) -> Result<PublishJob, StoreError> {
        if let Some(job) = self.store.get_job(key, job_id).await? {
            return Ok(job);
        }

        let history = self.store.history(key).await?;
        if let Some(entry) = history.first() {
            return Ok(entry.as_job(key));
        }

        Ok(PublishJob {
            id: JobId::synthetic(),
            bot_id: key.bot_id.clone(),
            profile_name: key.profile_name.clone(),
            status: JobStatus::Unknown,
            message: "no publish history for this bot and profile".to_string(),
            log: String::new(),
            created_at: Utc::now(),
            comment: None,
        })
    }

    /// The pair's full history, newest first.
    pub async fn history(&self, key: &JobKey) -> Result<Vec<HistoryEntry>, StoreError> {
        self.store.history(key).await
    }
}

/// Required-field validation, performed before anything is launched.
fn validate(request: &PublishRequest) -> Option<String> {
    if !request.profile.has_access_token() {
        return Some("missing required field: accessToken".to_string());
    }
    if request.profile.settings.is_null() {
        return Some("missing required field: settings".to_string());
    }
    None
}

/// Consume progress events for one job until the terminal event, then move
/// the job to history, drop it from the live table, and clean the working
/// directory. Store failures are logged and swallowed; there is nobody
/// upstream to propagate them to.
async fn update_loop<S: JobStore, P: PublishPipeline>(
    store: Arc<S>,
    pipeline: Arc<P>,
    request: Arc<PublishRequest>,
    mut job: PublishJob,
    mut rx: UnboundedReceiver<ProgressEvent>,
) {
    let key = job.key();

    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::Log(chunk) => {
                job.append_log(&chunk);
                if let Err(e) = store.put_job(&job).await {
                    tracing::error!(job_id = %job.id, error = %e, "failed to republish job");
                }
            }
            ProgressEvent::Terminal { status, message } => {
                job.status = status;
                job.message = message;

                // Copy to history first, then remove from the live table,
                // so a crash between the two duplicates rather than loses.
                if let Err(e) = store.append_history(&key, HistoryEntry::from(&job)).await {
                    tracing::error!(job_id = %job.id, error = %e, "failed to append history");
                }
                if let Err(e) = store.remove_job(&key, job.id).await {
                    tracing::error!(job_id = %job.id, error = %e, "failed to remove live job");
                }

                pipeline.cleanup(&request).await;

                tracing::info!(
                    job_id = %job.id,
                    bot_id = key.bot_id.as_str(),
                    profile = key.profile_name.as_str(),
                    status = %job.status,
                    "publish job finished"
                );
                break;
            }
        }
    }
}
