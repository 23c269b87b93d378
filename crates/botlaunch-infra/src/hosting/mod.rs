//! Deployment upload channel to the hosting target.

pub mod upload;

pub use upload::UploadClient;
