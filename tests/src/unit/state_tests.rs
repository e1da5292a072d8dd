use super::fixture::{block_on, conversation, eventually, jobseeker, Fixture};
use jobboard_core::testing::LinkRecord;
use jobboard_core::{RefreshError, ViewerStatus};

#[test]
fn bootstrap_with_stored_token_skips_refresh() {
    let fx = Fixture::with_stored_token("stored");
    fx.profile.register("stored", jobseeker("js-1"));

    let status = block_on(fx.state.bootstrap());

    assert_eq!(status, ViewerStatus::Authenticated);
    assert_eq!(fx.auth.refresh_calls(), 0);
    assert_eq!(fx.connector.opened(), vec!["stored".to_string()]);
    assert!(fx.state.connections().is_connected());
    assert_eq!(
        fx.state.session().current_user().map(|user| user.id),
        Some("js-1".to_string())
    );
}

#[test]
fn bootstrap_without_token_refreshes_first() {
    let fx = Fixture::new();
    fx.auth.push_refresh(Ok("t1".into()));
    fx.profile.register("t1", jobseeker("js-1"));

    let status = block_on(fx.state.bootstrap());

    assert_eq!(status, ViewerStatus::Authenticated);
    assert_eq!(fx.auth.refresh_calls(), 1);
    assert_eq!(fx.state.tokens().get().access_token, "t1");
    assert_eq!(fx.connector.opened(), vec!["t1".to_string()]);
}

#[test]
fn stale_stored_token_is_refreshed_once() {
    let fx = Fixture::with_stored_token("stale");
    fx.auth.push_refresh(Ok("fresh".into()));
    fx.profile.register("fresh", jobseeker("js-1"));

    let status = block_on(fx.state.bootstrap());

    assert_eq!(status, ViewerStatus::Authenticated);
    assert_eq!(
        fx.profile.requests(),
        vec!["stale".to_string(), "fresh".to_string()]
    );
    assert_eq!(fx.state.tokens().get().access_token, "fresh");
}

#[test]
fn rejected_refresh_leaves_viewer_anonymous() {
    let fx = Fixture::with_stored_token("stale");
    fx.auth.push_refresh(Err(RefreshError::rejected("session expired")));

    let status = block_on(fx.state.bootstrap());

    assert_eq!(status, ViewerStatus::Anonymous);
    assert!(fx.state.tokens().get().is_empty());
    assert!(fx.connector.opened().is_empty());
    assert!(!fx.state.connections().is_connected());
}

#[test]
fn unreachable_profile_keeps_session_pending() {
    let fx = Fixture::with_stored_token("stored");
    fx.profile.set_offline(true);

    let status = block_on(fx.state.bootstrap());

    assert_eq!(status, ViewerStatus::Pending);
    assert_eq!(fx.state.tokens().get().access_token, "stored");
    assert!(fx.connector.opened().is_empty());
}

#[test]
fn bootstrap_can_be_retried_after_network_failure() {
    let fx = Fixture::with_stored_token("stored");
    fx.profile.register("stored", jobseeker("js-1"));
    fx.profile.set_offline(true);

    let runtime = super::fixture::test_runtime();
    assert_eq!(runtime.block_on(fx.state.bootstrap()), ViewerStatus::Pending);
    fx.profile.set_offline(false);
    assert_eq!(
        runtime.block_on(fx.state.bootstrap()),
        ViewerStatus::Authenticated
    );
}

#[test]
fn login_then_logout() {
    let fx = Fixture::new();
    fx.auth.add_account("+15550100", "secret", "login-token");
    fx.profile.register("login-token", jobseeker("js-1"));
    let runtime = super::fixture::test_runtime();

    let user = runtime
        .block_on(fx.state.login_by_phone("+15550100", "secret"))
        .expect("login");
    assert_eq!(user.id, "js-1");
    assert_eq!(fx.state.session().status(), ViewerStatus::Authenticated);
    assert!(fx.state.connections().is_connected());

    runtime.block_on(fx.state.logout());
    assert_eq!(fx.state.session().status(), ViewerStatus::Anonymous);
    assert!(fx.state.tokens().get().is_empty());
    assert!(!fx.state.connections().is_connected());
    assert!(fx
        .connector
        .records()
        .contains(&LinkRecord::Closed("login-token".into())));
}

#[test]
fn wrong_password_stores_nothing() {
    let fx = Fixture::new();
    fx.auth.add_account("+15550100", "secret", "login-token");

    let err = block_on(fx.state.login_by_phone("+15550100", "guess"))
        .expect_err("login should fail");

    assert!(err.is_unauthenticated());
    assert!(fx.state.tokens().get().is_empty());
    assert!(fx.connector.opened().is_empty());
}

#[test]
fn list_chats_after_bootstrap() {
    let fx = Fixture::with_stored_token("stored");
    fx.profile.register("stored", jobseeker("js-1"));
    fx.chats.accept("stored");
    fx.chats.add_chat(conversation("c1", "js-1"));
    let runtime = super::fixture::test_runtime();

    runtime.block_on(fx.state.bootstrap());
    let chats = runtime.block_on(fx.state.list_chats()).expect("chats");

    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].id, "c1");
}

#[test]
fn clearing_the_credential_closes_the_connection() {
    let fx = Fixture::with_stored_token("stored");
    fx.profile.register("stored", jobseeker("js-1"));

    block_on(async {
        fx.state.bootstrap().await;
        let _background = fx.state.spawn_background();
        assert!(fx.state.connections().is_connected());

        fx.state.tokens().clear();
        eventually(|| !fx.state.connections().is_connected()).await;
    });
}

#[test]
fn first_authorized_call_settles_the_session() {
    let fx = Fixture::new();
    fx.auth.push_refresh(Ok("t1".into()));
    fx.profile.register("t1", jobseeker("js-1"));
    fx.chats.accept("t1");
    fx.chats.add_chat(conversation("c1", "js-1"));
    let runtime = super::fixture::test_runtime();

    for _ in 0..3 {
        let chats = runtime.block_on(fx.state.list_chats()).expect("chats");
        assert_eq!(chats.len(), 1);
    }

    assert_eq!(fx.auth.refresh_calls(), 1);
    assert_eq!(fx.state.session().status(), ViewerStatus::Authenticated);
    assert_eq!(fx.state.tokens().get().access_token, "t1");
}

#[test]
fn settled_session_connects_in_background() {
    let fx = Fixture::new();
    fx.auth.push_refresh(Ok("t1".into()));
    fx.profile.register("t1", jobseeker("js-1"));
    fx.chats.accept("t1");

    block_on(async {
        let _background = fx.state.spawn_background();
        fx.state.list_chats().await.expect("chats");
        eventually(|| fx.state.connections().is_connected()).await;
    });
    assert_eq!(fx.connector.opened(), vec!["t1".to_string()]);
}

#[test]
fn cleared_credential_is_refreshed_before_the_next_call() {
    let fx = Fixture::with_stored_token("stored");
    fx.profile.register("stored", jobseeker("js-1"));
    fx.chats.accept("t2");
    let runtime = super::fixture::test_runtime();

    assert_eq!(
        runtime.block_on(fx.state.bootstrap()),
        ViewerStatus::Authenticated
    );
    fx.state.tokens().clear();
    fx.auth.push_refresh(Ok("t2".into()));

    runtime.block_on(fx.state.list_chats()).expect("chats");
    assert_eq!(fx.auth.refresh_calls(), 1);
    assert_eq!(fx.state.tokens().get().access_token, "t2");
}

#[test]
fn login_with_unreachable_profile_stays_pending() {
    let fx = Fixture::new();
    fx.auth.add_account("+15550100", "secret", "login-token");
    fx.profile.set_offline(true);

    let err = block_on(fx.state.login_by_phone("+15550100", "secret"))
        .expect_err("profile is offline");

    assert!(!err.is_auth());
    assert_eq!(fx.state.session().status(), ViewerStatus::Pending);
    assert_eq!(fx.state.tokens().get().access_token, "login-token");
}
