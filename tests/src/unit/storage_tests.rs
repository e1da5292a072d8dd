use super::fixture::{config, jobseeker, test_runtime};
use jobboard_core::testing::{
    RecordingConnector, ScriptedAuthApi, ScriptedChatApi, ScriptedProfileApi,
};
use jobboard_core::{AppState, FileStorage, Services, ViewerStatus};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn file_backed(root: &Path, auth: Arc<ScriptedAuthApi>, profile: Arc<ScriptedProfileApi>) -> AppState {
    let storage = FileStorage::new(root.to_path_buf()).expect("storage");
    let services = Services {
        auth,
        profile,
        chats: Arc::new(ScriptedChatApi::new()),
        connector: Arc::new(RecordingConnector::new()),
        storage: Arc::new(storage),
    };
    AppState::new(config(), services)
}

#[test]
fn login_survives_restart() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let auth = Arc::new(ScriptedAuthApi::new());
    auth.add_account("+15550100", "secret", "login-token");
    let profile = Arc::new(ScriptedProfileApi::new());
    profile.register("login-token", jobseeker("js-1"));

    let first = file_backed(temp_dir.path(), auth.clone(), profile.clone());
    runtime
        .block_on(first.login_by_phone("+15550100", "secret"))
        .expect("login");
    drop(first);

    let second = file_backed(temp_dir.path(), auth.clone(), profile);
    assert_eq!(second.tokens().get().access_token, "login-token");
    assert_eq!(
        runtime.block_on(second.bootstrap()),
        ViewerStatus::Authenticated
    );
    assert_eq!(auth.refresh_calls(), 0);
}

#[test]
fn logout_survives_restart() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let auth = Arc::new(ScriptedAuthApi::new());
    auth.add_account("+15550100", "secret", "login-token");
    let profile = Arc::new(ScriptedProfileApi::new());
    profile.register("login-token", jobseeker("js-1"));

    let first = file_backed(temp_dir.path(), auth.clone(), profile.clone());
    runtime
        .block_on(first.login_by_phone("+15550100", "secret"))
        .expect("login");
    runtime.block_on(first.logout());
    drop(first);

    let second = file_backed(temp_dir.path(), auth.clone(), profile);
    assert!(second.tokens().get().is_empty());
    assert_eq!(runtime.block_on(second.bootstrap()), ViewerStatus::Anonymous);
    assert_eq!(auth.refresh_calls(), 1);
}
