//! Project file set supplied by the design-time editor.
//!
//! The editor hands the pipeline an ordered sequence of materialized files
//! (relative path + content). The pipeline never reads the authoring
//! project from disk itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single declarative project file, already materialized by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    /// Path relative to the project root, forward-slash separated.
    pub relative_path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ProjectFile {
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: content.into(),
            last_modified: None,
        }
    }

    /// The file name without its extension ("dialogs/greet/greet.lu" -> "greet").
    pub fn stem(&self) -> &str {
        let name = self
            .relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path);
        name.split('.').next().unwrap_or(name)
    }

    fn has_extension(&self, ext: &str) -> bool {
        std::path::Path::new(&self.relative_path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Language-understanding model source.
    pub fn is_lu(&self) -> bool {
        self.has_extension("lu")
    }

    /// Knowledge-base model source.
    pub fn is_qna(&self) -> bool {
        self.has_extension("qna")
    }

    /// Declarative dialog definition.
    pub fn is_dialog(&self) -> bool {
        self.has_extension("dialog")
    }

    /// Whether the file has any non-whitespace content. Empty model sources
    /// signal "feature not in use" and are excluded from training.
    pub fn is_non_empty(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_strips_directories_and_extension() {
        let f = ProjectFile::new("dialogs/greet/greet.en-us.lu", "# Greet");
        assert_eq!(f.stem(), "greet");
    }

    #[test]
    fn classification_by_extension() {
        assert!(ProjectFile::new("main.lu", "x").is_lu());
        assert!(ProjectFile::new("main.qna", "x").is_qna());
        assert!(ProjectFile::new("main.dialog", "{}").is_dialog());
        assert!(!ProjectFile::new("main.lg", "x").is_lu());
        assert!(!ProjectFile::new("lu", "x").is_lu());
    }

    #[test]
    fn whitespace_only_content_counts_as_empty() {
        assert!(!ProjectFile::new("main.lu", "  \n\t ").is_non_empty());
        assert!(ProjectFile::new("main.lu", "# Intent").is_non_empty());
    }
}
