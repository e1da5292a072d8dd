use jobboard_core::models::{ChatStatus, MessageStatus, Participants, UserRole};
use jobboard_core::testing::{
    RecordingConnector, ScriptedAuthApi, ScriptedChatApi, ScriptedProfileApi,
};
use jobboard_core::{
    AppState, ClientConfig, Conversation, IssuedVia, MemoryStorage, Message, Services, TokenStore,
    User,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

pub struct Fixture {
    pub state: AppState,
    pub auth: Arc<ScriptedAuthApi>,
    pub profile: Arc<ScriptedProfileApi>,
    pub chats: Arc<ScriptedChatApi>,
    pub connector: RecordingConnector,
    pub storage: MemoryStorage,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::new())
    }

    /// Fixture whose storage already holds `token`, as after a restart.
    pub fn with_stored_token(token: &str) -> Self {
        let storage = MemoryStorage::new();
        TokenStore::new(Arc::new(storage.clone())).set_credential(token, IssuedVia::Login);
        Self::with_storage(storage)
    }

    pub fn with_storage(storage: MemoryStorage) -> Self {
        let auth = Arc::new(ScriptedAuthApi::new());
        let profile = Arc::new(ScriptedProfileApi::new());
        let chats = Arc::new(ScriptedChatApi::new());
        let connector = RecordingConnector::new();
        let services = Services {
            auth: auth.clone(),
            profile: profile.clone(),
            chats: chats.clone(),
            connector: Arc::new(connector.clone()),
            storage: Arc::new(storage.clone()),
        };
        Self {
            state: AppState::new(config(), services),
            auth,
            profile,
            chats,
            connector,
            storage,
        }
    }
}

pub fn config() -> ClientConfig {
    ClientConfig {
        api_base_url: "http://localhost:3000/api/".parse().expect("api url"),
        realtime_url: "ws://localhost:3000/".parse().expect("realtime url"),
        app_name: "Jobboard".into(),
    }
}

pub fn jobseeker(id: &str) -> User {
    User {
        id: id.into(),
        role: UserRole::Jobseeker,
        phone: Some("+15550100".into()),
        name: None,
    }
}

pub fn conversation(id: &str, jobseeker_id: &str) -> Conversation {
    Conversation {
        id: id.into(),
        participant_ids: Participants {
            company_id: "company-1".into(),
            jobseeker_id: jobseeker_id.into(),
        },
        status: ChatStatus::Active,
        last_message: None,
    }
}

pub fn message(id: &str, chat_id: &str, content: &str) -> Message {
    Message {
        id: id.into(),
        chat_id: chat_id.into(),
        sender_id: "company-1".into(),
        recipient_id: "js-1".into(),
        content: content.into(),
        status: MessageStatus::Sent,
        created_at: chrono::Utc::now(),
    }
}

/// Polls `condition` while letting background tasks run; panics after a
/// second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

pub fn block_on<F: Future>(future: F) -> F::Output {
    test_runtime().block_on(future)
}
