//! Resource key derivation.
//!
//! The working-directory slot for a publish is keyed by a SHA-256 hash of
//! the project name, target name, and environment, truncated for directory
//! name friendliness. Two concurrent publishes with the same key contend
//! destructively for the slot; callers needing serialization submit
//! sequentially.

use sha2::{Digest, Sha256};

/// Length of the truncated hex digest used as the directory name.
const KEY_LEN: usize = 16;

/// Compute the working-directory key for a project/target/environment
/// triple. Lowercase hex, stable across processes.
pub fn resource_key(project: &str, target: &str, environment: &str) -> String {
    let digest = Sha256::digest(format!("{project}\u{1f}{target}\u{1f}{environment}").as_bytes());
    let hex = format!("{digest:x}");
    hex[..KEY_LEN].to_string()
}
