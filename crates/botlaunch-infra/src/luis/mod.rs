//! Language-understanding build client.

pub mod client;
pub mod types;

pub use client::LuisBuildClient;
