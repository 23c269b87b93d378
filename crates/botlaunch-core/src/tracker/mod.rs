//! Job status and history tracking.
//!
//! The tracker is the coordination layer of the publish pipeline: it
//! accepts a submission, answers immediately, detaches the pipeline as a
//! background task, and exposes poll-based status plus append-only history
//! per bot/profile pair.

pub mod progress;
pub mod service;
pub mod store;

pub use progress::{progress_channel, ProgressEvent, ProgressReporter};
pub use service::PublishTracker;
pub use store::JobStore;
