//! Filesystem implementation of the [`Workspace`] port.
//!
//! Bundle layout under `{root}/{key}/`:
//!
//! ```text
//! {key}/
//!   ... runtime template files ...
//!   ... project files at their relative paths ...
//!   settings/appsettings.json      merged settings (written late)
//!   generated/interruption/        transient cross-train output
//! ```

use std::path::{Path, PathBuf};

use botlaunch_core::pipeline::Workspace;
use botlaunch_types::error::PublishError;
use botlaunch_types::project::ProjectFile;
use glob::Pattern;
use walkdir::WalkDir;

use super::key::resource_key;

/// Relative path of the merged settings file inside a bundle.
const SETTINGS_PATH: &str = "settings/appsettings.json";

/// Transient cross-train output area inside a bundle.
const GENERATED_PATH: &str = "generated/interruption";

/// Directory names never copied from the runtime template.
const SKIP_DIRS: &[&str] = &["node_modules", ".git", "target", ".DS_Store"];

/// Bundle workspaces rooted at `{root}`, one sub-directory per resource
/// key, with an optional runtime template copied into every bundle.
pub struct FsWorkspace {
    root: PathBuf,
    template_dir: Option<PathBuf>,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>, template_dir: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            template_dir,
        }
    }

    /// The bundle directory for a key.
    pub fn bundle_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Locate a deployment manifest inside the bundle, if the project or
    /// template ships one (`*/manifests/*.json`). The provisioner reads it
    /// to learn the bot's declared endpoints.
    pub fn manifest_path(&self, key: &str) -> Option<PathBuf> {
        let bundle = self.bundle_dir(key);
        let pattern = Pattern::new("*/manifests/*.json").ok()?;
        WalkDir::new(&bundle)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|entry| {
                entry.path().is_file()
                    && entry
                        .path()
                        .strip_prefix(&bundle)
                        .ok()
                        .map(|rel| pattern.matches_path(rel))
                        .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
    }

    fn copy_template(&self, bundle: &Path) -> Result<(), PublishError> {
        let Some(template) = self.template_dir.as_deref() else {
            return Ok(());
        };
        if !template.exists() {
            tracing::warn!(
                template = %template.display(),
                "runtime template directory missing, bundling project files only"
            );
            return Ok(());
        }

        for entry in WalkDir::new(template)
            .into_iter()
            .filter_entry(|e| !should_skip(e.path()))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let rel = path.strip_prefix(template).unwrap_or(path);
            let target = bundle.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(path, target)?;
        }
        Ok(())
    }
}

fn should_skip(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| SKIP_DIRS.contains(&name))
}

/// Reject project paths that would escape the bundle directory.
fn safe_relative_path(relative: &str) -> Result<PathBuf, PublishError> {
    let path = Path::new(relative);
    if path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(PublishError::Io(format!(
            "project file path escapes the bundle: '{relative}'"
        )));
    }
    Ok(path.to_path_buf())
}

impl Workspace for FsWorkspace {
    fn key_for(&self, project: &str, target: &str, environment: &str) -> String {
        resource_key(project, target, environment)
    }

    async fn prepare(
        &self,
        key: &str,
        files: &[ProjectFile],
    ) -> Result<PathBuf, PublishError> {
        let bundle = self.bundle_dir(key);

        // Wipe any previous bundle for this key before reuse.
        match tokio::fs::remove_dir_all(&bundle).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&bundle).await?;

        self.copy_template(&bundle)?;

        for file in files {
            let rel = safe_relative_path(&file.relative_path)?;
            let target = bundle.join(rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &file.content).await?;
        }

        tracing::debug!(key, files = files.len(), bundle = %bundle.display(), "bundle prepared");
        Ok(bundle)
    }

    async fn bundled_settings(&self, key: &str) -> Result<serde_json::Value, PublishError> {
        let path = self.bundle_dir(key).join(SETTINGS_PATH);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| PublishError::Io(format!("malformed bundled settings: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(serde_json::Value::Object(serde_json::Map::new()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_settings(
        &self,
        key: &str,
        settings: &serde_json::Value,
    ) -> Result<(), PublishError> {
        let path = self.bundle_dir(key).join(SETTINGS_PATH);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_string_pretty(settings)
            .map_err(|e| PublishError::Io(e.to_string()))?;
        tokio::fs::write(&path, payload).await?;
        Ok(())
    }

    async fn write_generated(
        &self,
        key: &str,
        files: &[ProjectFile],
    ) -> Result<(), PublishError> {
        let generated = self.bundle_dir(key).join(GENERATED_PATH);
        for file in files {
            let rel = safe_relative_path(&file.relative_path)?;
            let target = generated.join(rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &file.content).await?;
        }
        Ok(())
    }

    async fn remove_generated(&self, key: &str) {
        let generated = self.bundle_dir(key).join(GENERATED_PATH);
        if let Err(e) = tokio::fs::remove_dir_all(&generated).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(key, error = %e, "failed to remove generated area");
            }
        }
    }

    async fn cleanup(&self, key: &str) {
        let bundle = self.bundle_dir(key);
        if let Err(e) = tokio::fs::remove_dir_all(&bundle).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(key, error = %e, "failed to remove working directory");
            }
        }
    }
}
