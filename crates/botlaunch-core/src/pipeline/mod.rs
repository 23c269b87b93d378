//! The publish pipeline: package, cross-train, train/publish models,
//! archive, upload.
//!
//! The pipeline is expressed against ports (traits) so every external
//! effect -- working directory, remote model builders, upload channel --
//! can be substituted in tests.

pub mod models;
pub mod ports;
pub mod publish;
pub mod settings;

pub use ports::{
    BuiltModel, BundleUploader, LuModelBuilder, PublishPipeline, QnaModelBuilder, Workspace,
};
pub use publish::PublishFlow;
