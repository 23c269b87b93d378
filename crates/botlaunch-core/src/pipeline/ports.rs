//! Port definitions for the publish pipeline.
//!
//! The infrastructure layer provides the real implementations (filesystem
//! working directories, reqwest clients); tests inject fakes. All traits
//! use native async fn in traits (RPITIT) with `Send` bounds.

use std::path::PathBuf;

use botlaunch_types::error::PublishError;
use botlaunch_types::profile::{LuCredentials, PublishProfile, PublishRequest, QnaCredentials};
use botlaunch_types::project::ProjectFile;

use crate::tracker::ProgressReporter;

/// A model trained and published by a remote builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltModel {
    /// Dialog the model belongs to (source file stem).
    pub dialog: String,
    /// Remote model id (application id / knowledge-base id).
    pub model_id: String,
    /// Runtime endpoint for the hosted model, when the builder returns one.
    pub endpoint: Option<String>,
    /// Runtime key assigned to the hosted model, when the builder returns one.
    pub endpoint_key: Option<String>,
}

/// The per-job working directory: prepare, settings, generated assets,
/// unconditional cleanup.
pub trait Workspace: Send + Sync {
    /// Resource key for a project/target/environment triple. Two jobs with
    /// the same key contend for the same on-disk slot.
    fn key_for(&self, project: &str, target: &str, environment: &str) -> String;

    /// Wipe any previous directory for `key`, recreate it, copy the runtime
    /// template in, write the project files, and return the bundle root.
    fn prepare(
        &self,
        key: &str,
        files: &[ProjectFile],
    ) -> impl std::future::Future<Output = Result<PathBuf, PublishError>> + Send;

    /// Settings shipped with the runtime template (lowest merge precedence).
    fn bundled_settings(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, PublishError>> + Send;

    /// Write the merged settings payload the runtime reads at start-up.
    fn write_settings(
        &self,
        key: &str,
        settings: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), PublishError>> + Send;

    /// Write cross-train output files into the transient generated area.
    fn write_generated(
        &self,
        key: &str,
        files: &[ProjectFile],
    ) -> impl std::future::Future<Output = Result<(), PublishError>> + Send;

    /// Remove the transient generated area. Runs after the model step
    /// regardless of its outcome; must tolerate a missing directory.
    fn remove_generated(&self, key: &str) -> impl std::future::Future<Output = ()> + Send;

    /// Empty and remove the working directory. Idempotent and
    /// non-throwing even when preparation never completed.
    fn cleanup(&self, key: &str) -> impl std::future::Future<Output = ()> + Send;
}

/// Remote language-understanding builder.
pub trait LuModelBuilder: Send + Sync {
    /// Train and publish the given source files, returning one model per
    /// dialog.
    fn build(
        &self,
        files: &[ProjectFile],
        creds: &LuCredentials,
        project: &str,
        environment: &str,
        language: &str,
    ) -> impl std::future::Future<Output = Result<Vec<BuiltModel>, PublishError>> + Send;

    /// Point the trained model's runtime key at the target hosting
    /// subscription. Language-understanding only; knowledge bases carry
    /// their key in the build response.
    fn assign_account(
        &self,
        model: &BuiltModel,
        creds: &LuCredentials,
    ) -> impl std::future::Future<Output = Result<(), PublishError>> + Send;
}

/// Remote knowledge-base builder.
pub trait QnaModelBuilder: Send + Sync {
    fn build(
        &self,
        files: &[ProjectFile],
        creds: &QnaCredentials,
        project: &str,
    ) -> impl std::future::Future<Output = Result<Vec<BuiltModel>, PublishError>> + Send;
}

/// Archive-and-upload channel to the hosting target.
pub trait BundleUploader: Send + Sync {
    /// Package `bundle_dir` and stream it to the profile's deployment
    /// endpoint.
    fn deploy(
        &self,
        bundle_dir: &std::path::Path,
        profile: &PublishProfile,
    ) -> impl std::future::Future<Output = Result<(), PublishError>> + Send;
}

/// The whole detached pipeline as one unit, as the tracker sees it.
pub trait PublishPipeline: Send + Sync {
    /// Drive all stages for one job. Returns the terminal success message;
    /// any error is normalized by the tracker's top-level handler.
    fn run(
        &self,
        bot_id: &str,
        request: &PublishRequest,
        reporter: ProgressReporter,
    ) -> impl std::future::Future<Output = Result<String, PublishError>> + Send;

    /// Remove the job's working directory. Invoked by the tracker on both
    /// terminal paths, after the history append.
    fn cleanup(
        &self,
        request: &PublishRequest,
    ) -> impl std::future::Future<Output = ()> + Send;
}
