//! Deployable archive packaging.
//!
//! Produces a gzip-compressed tarball of a prepared bundle. Packaging is
//! deterministic: entries are walked in sorted order and headers carry
//! fixed metadata, so an unchanged bundle archives to identical bytes.
//! The archive itself and dependency-cache directories are excluded.

use std::fs;
use std::path::{Path, PathBuf};

use botlaunch_types::error::PublishError;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, Header};
use walkdir::WalkDir;

/// Directory names excluded from the archive.
const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "target"];

/// Package `source_dir` into a `.tar.gz` next to it, named after the
/// bundle directory. Returns the archive path.
pub fn archive_bundle(source_dir: &Path) -> Result<PathBuf, PublishError> {
    let name = source_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PublishError::Io("bundle directory has no name".to_string()))?;
    let archive_path = source_dir.with_file_name(format!("{name}.tar.gz"));
    create_archive(source_dir, &archive_path)?;
    Ok(archive_path)
}

fn create_archive(source_dir: &Path, archive_path: &Path) -> Result<(), PublishError> {
    let mut paths: Vec<PathBuf> = WalkDir::new(source_dir)
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && e.path() != archive_path)
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let file = fs::File::create(archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    for path in &paths {
        let rel = path.strip_prefix(source_dir).unwrap_or(path);
        let content = fs::read(path)?;

        // Fixed header fields keep the output byte-stable across runs.
        let mut header = Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();

        builder
            .append_data(&mut header, rel, content.as_slice())
            .map_err(|e| PublishError::Io(format!("archive append failed: {e}")))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| PublishError::Io(format!("archive finalize failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| PublishError::Io(format!("archive compression failed: {e}")))?;
    Ok(())
}

fn is_excluded(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}
