//! Application state wiring the tracker to the infra implementations.
//!
//! The tracker and pipeline are generic over their ports; AppState pins
//! them to the concrete infra types. Provisioning needs no long-lived
//! state -- each request builds its own management client from the
//! caller's credential.

use std::path::PathBuf;
use std::sync::Arc;

use botlaunch_core::pipeline::PublishFlow;
use botlaunch_core::tracker::PublishTracker;
use botlaunch_infra::config::{load_config, resolve_data_dir};
use botlaunch_infra::hosting::UploadClient;
use botlaunch_infra::luis::LuisBuildClient;
use botlaunch_infra::qna::QnaBuildClient;
use botlaunch_infra::store::{HistoryFile, MemoryJobStore};
use botlaunch_infra::workdir::FsWorkspace;
use botlaunch_types::config::ServiceConfig;

/// Concrete type aliases for the service generics pinned to infra
/// implementations.
pub type ConcretePipeline =
    PublishFlow<FsWorkspace, LuisBuildClient, QnaBuildClient, UploadClient>;

pub type ConcreteTracker = PublishTracker<MemoryJobStore, ConcretePipeline>;

/// Shared application state for the REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<ConcreteTracker>,
    pub config: Arc<ServiceConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize from the default data directory.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = load_config(&data_dir).await;
        Self::from_config(data_dir, config).await
    }

    /// Initialize with an explicit data directory and configuration.
    pub async fn from_config(data_dir: PathBuf, config: ServiceConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let store = if config.persist_history {
            MemoryJobStore::with_persistence(HistoryFile::new(data_dir.join("history.json")))
                .await
        } else {
            MemoryJobStore::new()
        };

        let workspace = FsWorkspace::new(
            data_dir.join("bundles"),
            config.runtime_template_dir.clone(),
        );
        let uploader = match &config.deploy_endpoint {
            Some(endpoint) => UploadClient::with_endpoint(endpoint.clone()),
            None => UploadClient::new(),
        };
        let pipeline = PublishFlow::new(
            workspace,
            LuisBuildClient::new(),
            QnaBuildClient::new(),
            uploader,
        );
        let tracker = PublishTracker::new(Arc::new(store), Arc::new(pipeline));

        Ok(Self {
            tracker: Arc::new(tracker),
            config: Arc::new(config),
            data_dir,
        })
    }
}
