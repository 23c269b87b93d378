//! Cloud management API client used by the provisioner.

pub mod client;

pub use client::ArmClient;
