//! The publish flow: the concrete pipeline the tracker detaches.
//!
//! Stages run strictly in sequence -- package, cross-train, train/publish,
//! settings write-back, upload -- with one deliberate exception: the
//! language-understanding and knowledge-base builds are independent and
//! run concurrently, both completing before the bundle is archived.

use botlaunch_types::error::PublishError;
use botlaunch_types::profile::PublishRequest;
use botlaunch_types::project::ProjectFile;

use crate::crosstrain;
use crate::tracker::ProgressReporter;

use super::models;
use super::ports::{BundleUploader, LuModelBuilder, PublishPipeline, QnaModelBuilder, Workspace};
use super::settings;

/// Pipeline wired from the four ports. `AppState` pins the generics to the
/// infra implementations; tests substitute fakes.
pub struct PublishFlow<W, L, Q, U> {
    workspace: W,
    lu: L,
    qna: Q,
    uploader: U,
}

impl<W, L, Q, U> PublishFlow<W, L, Q, U> {
    pub fn new(workspace: W, lu: L, qna: Q, uploader: U) -> Self {
        Self {
            workspace,
            lu,
            qna,
            uploader,
        }
    }
}

impl<W, L, Q, U> PublishFlow<W, L, Q, U>
where
    W: Workspace,
{
    fn resource_key(&self, request: &PublishRequest) -> String {
        self.workspace.key_for(
            &request.bot_name,
            &request.profile.target_name,
            request.profile.environment_or_default(),
        )
    }
}

impl<W, L, Q, U> PublishPipeline for PublishFlow<W, L, Q, U>
where
    W: Workspace,
    L: LuModelBuilder,
    Q: QnaModelBuilder,
    U: BundleUploader,
{
    async fn run(
        &self,
        bot_id: &str,
        request: &PublishRequest,
        reporter: ProgressReporter,
    ) -> Result<String, PublishError> {
        let profile = &request.profile;
        let key = self.resource_key(request);

        tracing::info!(
            bot_id,
            profile = profile.profile_name.as_str(),
            target = profile.target_name.as_str(),
            key = key.as_str(),
            "starting publish pipeline"
        );

        reporter.log(format!(
            "packaging bundle for target '{}'",
            profile.target_name
        ));
        let bundle_dir = self.workspace.prepare(&key, &request.files).await?;

        reporter.log("building cross-train configuration");
        let config = crosstrain::build_config(&request.files)?;
        let lu_sources: Vec<ProjectFile> =
            request.files.iter().filter(|f| f.is_lu()).cloned().collect();
        let qna_sources: Vec<ProjectFile> =
            request.files.iter().filter(|f| f.is_qna()).cloned().collect();
        let trained = crosstrain::cross_train(&lu_sources, &qna_sources, &config)?;

        let mut generated = trained.lu.clone();
        generated.extend(trained.qna.iter().cloned());
        self.workspace.write_generated(&key, &generated).await?;

        // Independent builds; both must complete before archiving.
        let (lu_result, qna_result) = tokio::join!(
            models::publish_lu(&self.lu, &trained.lu, profile, &request.bot_name, &reporter),
            models::publish_qna(&self.qna, &trained.qna, profile, &request.bot_name, &reporter),
        );

        // The transient cross-train output goes away whatever the builds did.
        self.workspace.remove_generated(&key).await;

        let lu_models = lu_result?;
        let qna_models = qna_result?;

        reporter.log("merging runtime settings");
        let bundled = self.workspace.bundled_settings(&key).await?;
        let extra = models::recognizer_settings(&lu_models, &qna_models);
        let merged = settings::merge_settings(bundled, profile.settings.clone(), extra);
        self.workspace.write_settings(&key, &merged).await?;

        reporter.log(format!(
            "uploading bundle to {}",
            profile.hostname_or_default()
        ));
        self.uploader.deploy(&bundle_dir, profile).await?;

        tracing::info!(
            bot_id,
            profile = profile.profile_name.as_str(),
            "publish pipeline complete"
        );
        Ok(format!(
            "published '{}' to {}",
            request.bot_name,
            profile.hostname_or_default()
        ))
    }

    async fn cleanup(&self, request: &PublishRequest) {
        let key = self.resource_key(request);
        self.workspace.cleanup(&key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ports::BuiltModel;
    use crate::tracker::progress_channel;
    use botlaunch_types::profile::{LuCredentials, PublishProfile, QnaCredentials};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingWorkspace {
        fail_prepare: bool,
        fail_settings: bool,
        generated_removed: AtomicBool,
        cleaned: AtomicBool,
    }

    impl Workspace for Arc<RecordingWorkspace> {
        fn key_for(&self, project: &str, target: &str, environment: &str) -> String {
            format!("{project}-{target}-{environment}")
        }

        async fn prepare(
            &self,
            _key: &str,
            _files: &[ProjectFile],
        ) -> Result<PathBuf, PublishError> {
            if self.fail_prepare {
                return Err(PublishError::Io("disk full".to_string()));
            }
            Ok(PathBuf::from("/tmp/bundle"))
        }

        async fn bundled_settings(&self, _key: &str) -> Result<serde_json::Value, PublishError> {
            Ok(serde_json::json!({"runtime": {"command": "npm start"}}))
        }

        async fn write_settings(
            &self,
            _key: &str,
            _settings: &serde_json::Value,
        ) -> Result<(), PublishError> {
            if self.fail_settings {
                return Err(PublishError::Io("settings write failed".to_string()));
            }
            Ok(())
        }

        async fn write_generated(
            &self,
            _key: &str,
            _files: &[ProjectFile],
        ) -> Result<(), PublishError> {
            Ok(())
        }

        async fn remove_generated(&self, _key: &str) {
            self.generated_removed.store(true, Ordering::SeqCst);
        }

        async fn cleanup(&self, _key: &str) {
            self.cleaned.store(true, Ordering::SeqCst);
        }
    }

    struct FakeLu {
        fail: bool,
    }

    impl LuModelBuilder for FakeLu {
        async fn build(
            &self,
            files: &[ProjectFile],
            _creds: &LuCredentials,
            _project: &str,
            _environment: &str,
            _language: &str,
        ) -> Result<Vec<BuiltModel>, PublishError> {
            if self.fail {
                return Err(PublishError::RemoteService {
                    service: "luis".to_string(),
                    detail: "Unauthorized: invalid authoring key".to_string(),
                });
            }
            Ok(files
                .iter()
                .map(|f| BuiltModel {
                    dialog: f.stem().to_string(),
                    model_id: format!("app-{}", f.stem()),
                    endpoint: None,
                    endpoint_key: None,
                })
                .collect())
        }

        async fn assign_account(
            &self,
            _model: &BuiltModel,
            _creds: &LuCredentials,
        ) -> Result<(), PublishError> {
            Ok(())
        }
    }

    struct FakeQna;

    impl QnaModelBuilder for FakeQna {
        async fn build(
            &self,
            files: &[ProjectFile],
            _creds: &QnaCredentials,
            _project: &str,
        ) -> Result<Vec<BuiltModel>, PublishError> {
            Ok(files
                .iter()
                .map(|f| BuiltModel {
                    dialog: f.stem().to_string(),
                    model_id: format!("kb-{}", f.stem()),
                    endpoint: None,
                    endpoint_key: None,
                })
                .collect())
        }
    }

    struct FakeUploader {
        fail: bool,
    }

    impl BundleUploader for FakeUploader {
        async fn deploy(
            &self,
            _bundle_dir: &Path,
            _profile: &PublishProfile,
        ) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::CredentialExpired);
            }
            Ok(())
        }
    }

    fn request() -> PublishRequest {
        serde_json::from_str(
            r##"{
                "botName": "my-bot",
                "profile": {
                    "profileName": "prod",
                    "targetName": "my-bot-app",
                    "accessToken": "tok",
                    "settings": {"MicrosoftAppId": "app-guid"},
                    "luis": {"authoringKey": "lk", "authoringRegion": "westus"},
                    "qna": {"subscriptionKey": "qk"}
                },
                "files": [
                    {"relativePath": "main.dialog",
                     "content": "{\"$kind\": \"Microsoft.AdaptiveDialog\", \"triggers\": []}"},
                    {"relativePath": "main.lu", "content": "# Greet\n- hi"},
                    {"relativePath": "faq.qna", "content": "# ? hours\n```\n9-5\n```"}
                ]
            }"##,
        )
        .unwrap()
    }

    fn flow(
        workspace: Arc<RecordingWorkspace>,
        lu_fail: bool,
        upload_fail: bool,
    ) -> PublishFlow<Arc<RecordingWorkspace>, FakeLu, FakeQna, FakeUploader> {
        PublishFlow::new(
            workspace,
            FakeLu { fail: lu_fail },
            FakeQna,
            FakeUploader { fail: upload_fail },
        )
    }

    #[tokio::test]
    async fn happy_path_reports_each_stage() {
        let workspace = Arc::new(RecordingWorkspace::default());
        let flow = flow(Arc::clone(&workspace), false, false);
        let (reporter, mut rx) = progress_channel();

        let message = flow.run("bot-1", &request(), reporter).await.unwrap();
        assert!(message.contains("my-bot-app.azurewebsites.net"));
        assert!(workspace.generated_removed.load(Ordering::SeqCst));

        let mut log = String::new();
        while let Ok(event) = rx.try_recv() {
            if let crate::tracker::ProgressEvent::Log(chunk) = event {
                log.push_str(&chunk);
                log.push('\n');
            }
        }
        assert!(log.contains("packaging bundle"));
        assert!(log.contains("cross-train"));
        assert!(log.contains("published language model 'main'"));
        assert!(log.contains("uploading bundle"));
    }

    #[tokio::test]
    async fn model_failure_still_removes_generated_area() {
        let workspace = Arc::new(RecordingWorkspace::default());
        let flow = flow(Arc::clone(&workspace), true, false);
        let (reporter, _rx) = progress_channel();

        let err = flow.run("bot-1", &request(), reporter).await.unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
        assert!(workspace.generated_removed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn prepare_failure_short_circuits() {
        let workspace = Arc::new(RecordingWorkspace {
            fail_prepare: true,
            ..RecordingWorkspace::default()
        });
        let flow = flow(Arc::clone(&workspace), false, false);
        let (reporter, _rx) = progress_channel();

        let err = flow.run("bot-1", &request(), reporter).await.unwrap_err();
        assert!(matches!(err, PublishError::Io(_)));
        assert!(!workspace.generated_removed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn upload_credential_expiry_is_distinguished() {
        let workspace = Arc::new(RecordingWorkspace::default());
        let flow = flow(Arc::clone(&workspace), false, true);
        let (reporter, _rx) = progress_channel();

        let err = flow.run("bot-1", &request(), reporter).await.unwrap_err();
        assert!(matches!(err, PublishError::CredentialExpired));
    }

    #[tokio::test]
    async fn cleanup_delegates_to_workspace() {
        let workspace = Arc::new(RecordingWorkspace::default());
        let flow = flow(Arc::clone(&workspace), false, false);
        flow.cleanup(&request()).await;
        assert!(workspace.cleaned.load(Ordering::SeqCst));
    }
}
