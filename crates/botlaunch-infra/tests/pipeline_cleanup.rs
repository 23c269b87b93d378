//! End-to-end pipeline tests against the real filesystem workspace:
//! whichever stage fails, the job terminates into history and the
//! working directory for its resource key is gone.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use botlaunch_core::pipeline::{
    BuiltModel, BundleUploader, LuModelBuilder, PublishFlow, QnaModelBuilder, Workspace,
};
use botlaunch_core::tracker::{JobStore, PublishTracker};
use botlaunch_infra::store::MemoryJobStore;
use botlaunch_infra::workdir::FsWorkspace;
use botlaunch_types::error::PublishError;
use botlaunch_types::job::{JobKey, JobStatus};
use botlaunch_types::profile::{LuCredentials, PublishProfile, PublishRequest, QnaCredentials};
use botlaunch_types::project::ProjectFile;
use tempfile::TempDir;

/// Which stage the scripted remote services fail at.
#[derive(Clone, Copy, PartialEq)]
enum FailAt {
    Nothing,
    LuBuild,
    QnaBuild,
    Upload,
}

struct ScriptedLu {
    fail: bool,
}

impl LuModelBuilder for ScriptedLu {
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
                detail: "BadArgument: The models: - intent cannot be trained".to_string(),
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

struct ScriptedQna {
    fail: bool,
}

impl QnaModelBuilder for ScriptedQna {
    async fn build(
        &self,
        files: &[ProjectFile],
        _creds: &QnaCredentials,
        _project: &str,
    ) -> Result<Vec<BuiltModel>, PublishError> {
        if self.fail {
            return Err(PublishError::RemoteService {
                service: "qna".to_string(),
                detail: "Forbidden: knowledge base quota reached".to_string(),
            });
        }
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

struct ScriptedUploader {
    fail: bool,
}

impl BundleUploader for ScriptedUploader {
    async fn deploy(
        &self,
        bundle_dir: &Path,
        _profile: &PublishProfile,
    ) -> Result<(), PublishError> {
        assert!(bundle_dir.exists(), "upload must see a prepared bundle");
        if self.fail {
            return Err(PublishError::CredentialExpired);
        }
        Ok(())
    }
}

fn request(files_json: &str) -> PublishRequest {
    serde_json::from_str(&format!(
        r#"{{
            "botName": "my-bot",
            "profile": {{
                "profileName": "prod",
                "targetName": "my-bot-app",
                "accessToken": "tok",
                "environment": "prod",
                "settings": {{"MicrosoftAppId": "app-guid"}},
                "luis": {{"authoringKey": "lk", "authoringRegion": "westus"}},
                "qna": {{"subscriptionKey": "qk"}}
            }},
            "files": {files_json}
        }}"#
    ))
    .unwrap()
}

fn valid_files() -> &'static str {
    r##"[
        {"relativePath": "main.dialog",
         "content": "{\"$kind\": \"Microsoft.AdaptiveDialog\", \"triggers\": []}"},
        {"relativePath": "main.lu", "content": "# Greet\n- hi"},
        {"relativePath": "faq.qna", "content": "# ? hours\n```\n9-5\n```"}
    ]"##
}

async fn run_to_history(
    tmp: &TempDir,
    fail_at: FailAt,
    request: PublishRequest,
) -> (Vec<botlaunch_types::job::HistoryEntry>, std::path::PathBuf) {
    let workspace = FsWorkspace::new(tmp.path().join("bundles"), None);
    let key = workspace.key_for(
        &request.bot_name,
        &request.profile.target_name,
        request.profile.environment_or_default(),
    );
    let bundle_dir = workspace.bundle_dir(&key);

    let pipeline = PublishFlow::new(
        workspace,
        ScriptedLu {
            fail: fail_at == FailAt::LuBuild,
        },
        ScriptedQna {
            fail: fail_at == FailAt::QnaBuild,
        },
        ScriptedUploader {
            fail: fail_at == FailAt::Upload,
        },
    );
    let store = Arc::new(MemoryJobStore::new());
    let tracker = PublishTracker::new(Arc::clone(&store), Arc::new(pipeline));

    tracker.submit("bot-1", request).await.unwrap();

    let key = JobKey::new("bot-1", "prod");
    for _ in 0..400 {
        let history = store.history(&key).await.unwrap();
        if !history.is_empty() {
            // The updater removes the working directory just after the
            // history append; give that a moment to land.
            for _ in 0..200 {
                if !bundle_dir.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            return (history, bundle_dir);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job never reached history");
}

#[tokio::test]
async fn successful_publish_archives_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let (history, bundle_dir) =
        run_to_history(&tmp, FailAt::Nothing, request(valid_files())).await;

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobStatus::Success);
    assert!(history[0].log.contains("published language model 'main'"));
    assert!(!bundle_dir.exists(), "bundle must be removed on success");
}

#[tokio::test]
async fn cross_train_failure_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let files = r#"[{"relativePath": "broken.lu", "content": "?? not a section"}]"#;
    let (history, bundle_dir) = run_to_history(&tmp, FailAt::Nothing, request(files)).await;

    assert_eq!(history[0].status, JobStatus::Failed);
    assert!(history[0].log.contains("broken.lu"));
    assert!(!bundle_dir.exists(), "bundle must be removed on cross-train failure");
}

#[tokio::test]
async fn lu_build_failure_surfaces_remote_detail_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let (history, bundle_dir) =
        run_to_history(&tmp, FailAt::LuBuild, request(valid_files())).await;

    assert_eq!(history[0].status, JobStatus::Failed);
    assert!(history[0].log.contains("BadArgument"));
    assert!(!bundle_dir.exists(), "bundle must be removed on model failure");
}

#[tokio::test]
async fn qna_build_failure_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let (history, bundle_dir) =
        run_to_history(&tmp, FailAt::QnaBuild, request(valid_files())).await;

    assert_eq!(history[0].status, JobStatus::Failed);
    assert!(history[0].log.contains("quota reached"));
    assert!(!bundle_dir.exists(), "bundle must be removed on knowledge-base failure");
}

#[tokio::test]
async fn upload_failure_cleans_up_with_actionable_message() {
    let tmp = TempDir::new().unwrap();
    let (history, bundle_dir) =
        run_to_history(&tmp, FailAt::Upload, request(valid_files())).await;

    assert_eq!(history[0].status, JobStatus::Failed);
    assert!(history[0].message.contains("refresh the token"));
    assert!(!bundle_dir.exists(), "bundle must be removed on upload failure");
}

#[tokio::test]
async fn repeat_publish_reuses_the_same_resource_key_slot() {
    let tmp = TempDir::new().unwrap();

    let (first, bundle_a) =
        run_to_history(&tmp, FailAt::Nothing, request(valid_files())).await;
    assert_eq!(first[0].status, JobStatus::Success);
    assert!(!bundle_a.exists());

    // Same project/target/environment triple hashes to the same slot.
    let (_, bundle_b) = run_to_history(&tmp, FailAt::Nothing, request(valid_files())).await;
    assert_eq!(bundle_a, bundle_b);
}
