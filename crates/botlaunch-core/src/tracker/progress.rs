//! Progress event channel between pipeline stages and the job table.
//!
//! Stages never touch the store directly; they send ordered events through
//! a per-job mpsc channel, and a single updater task owns all writes for
//! that job. This preserves log-line ordering without the stages knowing
//! anything about storage.

use botlaunch_types::job::JobStatus;
use tokio::sync::mpsc;

/// One progress report from a pipeline stage.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Append a chunk to the job log and republish the live job.
    Log(String),
    /// The pipeline reached a terminal state; the updater moves the job
    /// to history and triggers cleanup.
    Terminal { status: JobStatus, message: String },
}

/// Cloneable handle pipeline stages use to report progress.
///
/// Sends are infallible from the caller's perspective: once the updater
/// has gone away there is nobody left to read the log, so late events are
/// silently dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    /// Append a line to the job log.
    pub fn log(&self, chunk: impl Into<String>) {
        let _ = self.tx.send(ProgressEvent::Log(chunk.into()));
    }

    /// Report the terminal outcome. Exactly one terminal event is expected
    /// per job; the updater stops reading after the first.
    pub fn terminal(&self, status: JobStatus, message: impl Into<String>) {
        let _ = self.tx.send(ProgressEvent::Terminal {
            status,
            message: message.into(),
        });
    }
}

/// Create a progress channel for one job.
pub fn progress_channel() -> (ProgressReporter, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressReporter { tx }, rx)
}
