//! Publish job tracking types.
//!
//! A [`PublishJob`] is one in-flight or completed publish attempt. Live jobs
//! are mutated in place by the background pipeline; once terminal they are
//! copied into an immutable [`HistoryEntry`] and removed from the live table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a publish job, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new JobId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a JobId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Placeholder id for synthetic jobs (history-backed poll answers).
    /// Stable across calls so repeated polls return identical results.
    pub fn synthetic() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Status of a publish job, carried as an HTTP-style numeric code on the
/// wire so pollers can branch on it without a string table.
///
/// - `Accepted` (202): the pipeline is running
/// - `Success` (200): terminal success
/// - `Failed` (500): terminal failure (including synchronous validation)
/// - `Unknown` (404): synthetic status for "never published"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum JobStatus {
    Accepted,
    Success,
    Failed,
    Unknown,
}

impl JobStatus {
    /// The numeric wire code for this status.
    pub fn code(&self) -> u16 {
        match self {
            JobStatus::Accepted => 202,
            JobStatus::Success => 200,
            JobStatus::Failed => 500,
            JobStatus::Unknown => 404,
        }
    }

    /// Whether this status ends the job's life in the live table.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

impl From<JobStatus> for u16 {
    fn from(status: JobStatus) -> u16 {
        status.code()
    }
}

impl TryFrom<u16> for JobStatus {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            202 => Ok(JobStatus::Accepted),
            200 => Ok(JobStatus::Success),
            500 => Ok(JobStatus::Failed),
            404 => Ok(JobStatus::Unknown),
            other => Err(format!("invalid job status code: {other}")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Composite key grouping jobs and history per bot/profile pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub bot_id: String,
    pub profile_name: String,
}

impl JobKey {
    pub fn new(bot_id: impl Into<String>, profile_name: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            profile_name: profile_name.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bot_id, self.profile_name)
    }
}

/// One in-flight or completed publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishJob {
    pub id: JobId,
    pub bot_id: String,
    pub profile_name: String,
    pub status: JobStatus,
    /// One-line human-readable summary of the current state.
    pub message: String,
    /// Accumulated pipeline output. Append-only within a job.
    pub log: String,
    pub created_at: DateTime<Utc>,
    /// Caller-supplied annotation, carried through to history unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl PublishJob {
    /// Create a freshly accepted job for a bot/profile pair.
    pub fn accepted(key: &JobKey, comment: Option<String>) -> Self {
        Self {
            id: JobId::new(),
            bot_id: key.bot_id.clone(),
            profile_name: key.profile_name.clone(),
            status: JobStatus::Accepted,
            message: "publish accepted".to_string(),
            log: String::new(),
            created_at: Utc::now(),
            comment,
        }
    }

    /// The grouping key for this job.
    pub fn key(&self) -> JobKey {
        JobKey::new(self.bot_id.clone(), self.profile_name.clone())
    }

    /// Append a chunk to the job log, normalizing the trailing newline.
    pub fn append_log(&mut self, chunk: &str) {
        self.log.push_str(chunk);
        if !chunk.ends_with('\n') {
            self.log.push('\n');
        }
    }
}

/// Immutable record of a terminal job outcome.
///
/// Appended newest-first to the per-pair history list; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: JobStatus,
    pub message: String,
    pub log: String,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl From<&PublishJob> for HistoryEntry {
    fn from(job: &PublishJob) -> Self {
        Self {
            status: job.status,
            message: job.message.clone(),
            log: job.log.clone(),
            time: Utc::now(),
            comment: job.comment.clone(),
        }
    }
}

impl HistoryEntry {
    /// Wrap a history entry as a synthetic job so pollers get a uniform
    /// shape whether the job is live or already archived.
    pub fn as_job(&self, key: &JobKey) -> PublishJob {
        PublishJob {
            id: JobId::synthetic(),
            bot_id: key.bot_id.clone(),
            profile_name: key.profile_name.clone(),
            status: self.status,
            message: self.message.clone(),
            log: self.log.clone(),
            created_at: self.time,
            comment: self.comment.clone(),
        }
    }
}
