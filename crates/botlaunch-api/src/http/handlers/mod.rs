//! Request handlers for the publish and provision endpoints.

pub mod provision;
pub mod publish;
