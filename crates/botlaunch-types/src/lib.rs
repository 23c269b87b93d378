//! Shared domain types for Botlaunch.
//!
//! This crate contains the types exchanged between the publish pipeline,
//! the provisioner, and the REST surface: jobs and history, publish
//! profiles, project files, cross-train configuration, and their error
//! types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, secrecy,
//! thiserror.

pub mod config;
pub mod crosstrain;
pub mod error;
pub mod job;
pub mod profile;
pub mod project;
pub mod provision;
