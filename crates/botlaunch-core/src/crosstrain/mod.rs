//! Cross-training: deriving the trigger-defer configuration from the
//! dialog graph and merging interruption intents into the model sources.

pub mod config;
pub mod merge;

pub use config::build_config;
pub use merge::{cross_train, CrossTrained};
