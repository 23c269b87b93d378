//! Publish pipeline and provisioning logic for Botlaunch.
//!
//! This crate defines the "ports" (workspace, model builder, uploader,
//! management API traits) that the infrastructure layer implements. It
//! depends only on `botlaunch-types` -- never on `botlaunch-infra` or any
//! HTTP/filesystem crate.

pub mod crosstrain;
pub mod pipeline;
pub mod provision;
pub mod tracker;
