use super::fixture::{block_on, conversation, eventually, jobseeker, message, Fixture};
use jobboard::recipient_for;
use jobboard_core::{ClientEvent, OutgoingMessage, ServerEvent};

fn signed_in() -> Fixture {
    let fx = Fixture::with_stored_token("stored");
    fx.profile.register("stored", jobseeker("js-1"));
    fx
}

fn fetches(fx: &Fixture) -> usize {
    fx.connector
        .emitted()
        .iter()
        .filter(|event| matches!(event, ClientEvent::FetchMessages { .. }))
        .count()
}

#[test]
fn selecting_a_chat_loads_its_history() {
    let fx = signed_in();
    block_on(async {
        fx.state.bootstrap().await;
        let _background = fx.state.spawn_background();

        fx.state.chat().select_chat("c1").await.expect("select");
        assert_eq!(
            fx.connector.emitted(),
            vec![
                ClientEvent::JoinChat {
                    chat_id: "c1".into()
                },
                ClientEvent::FetchMessages {
                    chat_id: "c1".into()
                },
            ]
        );

        fx.connector.deliver(ServerEvent::Messages {
            chat_id: "c1".into(),
            messages: vec![message("m1", "c1", "hello")],
        });
        eventually(|| fx.state.chat().messages().len() == 1).await;
    });
}

#[test]
fn inbound_message_triggers_full_refetch() {
    let fx = signed_in();
    block_on(async {
        fx.state.bootstrap().await;
        let _background = fx.state.spawn_background();
        fx.state.chat().select_chat("c1").await.expect("select");
        assert_eq!(fetches(&fx), 1);

        fx.connector
            .deliver(ServerEvent::MessageReceived(message("m2", "c1", "ping")));
        eventually(|| fetches(&fx) == 2).await;

        fx.connector
            .deliver(ServerEvent::MessageReceived(message("m3", "other", "elsewhere")));
        fx.connector.deliver(ServerEvent::Messages {
            chat_id: "c1".into(),
            messages: vec![message("m2", "c1", "ping")],
        });
        eventually(|| fx.state.chat().messages().len() == 1).await;
        assert_eq!(fetches(&fx), 2);
    });
}

#[test]
fn history_for_a_previous_selection_is_dropped() {
    let fx = signed_in();
    block_on(async {
        fx.state.bootstrap().await;
        let _background = fx.state.spawn_background();
        fx.state.chat().select_chat("c1").await.expect("select c1");
        fx.state.chat().select_chat("c2").await.expect("select c2");

        fx.connector.deliver(ServerEvent::Messages {
            chat_id: "c1".into(),
            messages: vec![message("m1", "c1", "late")],
        });
        fx.connector.deliver(ServerEvent::Messages {
            chat_id: "c2".into(),
            messages: vec![message("m5", "c2", "current"), message("m6", "c2", "too")],
        });

        eventually(|| fx.state.chat().messages().len() == 2).await;
        assert!(fx
            .state
            .chat()
            .messages()
            .iter()
            .all(|msg| msg.chat_id == "c2"));
    });
}

#[test]
fn send_goes_to_the_other_participant() {
    let fx = signed_in();
    block_on(async {
        fx.state.bootstrap().await;
        let user = fx.state.session().current_user().expect("user");
        let chat = conversation("c1", "js-1");
        fx.state.chat().select_chat("c1").await.expect("select");

        let recipient = recipient_for(&user, &chat);
        fx.state
            .chat()
            .send(OutgoingMessage::new(&user.id, &recipient, "hi there"))
            .await
            .expect("send");

        assert_eq!(
            fx.connector.emitted().last(),
            Some(&ClientEvent::SendMessage {
                chat_id: "c1".into(),
                sender_id: "js-1".into(),
                recipient_id: "company-1".into(),
                content: "hi there".into(),
            })
        );
    });
}

#[test]
fn select_before_bootstrap_waits_for_refresh() {
    let fx = Fixture::new();
    fx.auth.push_refresh(Ok("t1".into()));
    fx.profile.register("t1", jobseeker("js-1"));

    block_on(fx.state.chat().select_chat("c1")).expect("select");

    assert_eq!(fx.auth.refresh_calls(), 1);
    assert!(fx.state.session().is_authenticated());
    assert_eq!(fx.connector.opened(), vec!["t1".to_string()]);
    assert_eq!(fetches(&fx), 1);
}

#[test]
fn send_after_logout_is_rejected() {
    let fx = signed_in();
    block_on(async {
        fx.state.bootstrap().await;
        fx.state.chat().select_chat("c1").await.expect("select");
        fx.state.logout().await;

        let err = fx
            .state
            .chat()
            .send(OutgoingMessage::new("js-1", "company-1", "too late"))
            .await
            .expect_err("send should fail");
        assert!(!err.is_auth());
        assert_eq!(fetches(&fx), 1);
    });
}
