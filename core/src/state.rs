use crate::api::{ChatApi, HttpApi, ProfileApi};
use crate::auth::{AuthApi, CredentialRefresher};
use crate::chat::ChatSessionController;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gate::AuthGate;
use crate::models::{Conversation, User};
use crate::realtime::{ConnectionManager, Connector};
use crate::session::{ViewerSession, ViewerStatus};
use crate::store::{Credential, CredentialStorage, FileStorage, IssuedVia, TokenStore};
use crate::ws::WsConnector;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Backend seams the client talks through.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<dyn AuthApi>,
    pub profile: Arc<dyn ProfileApi>,
    pub chats: Arc<dyn ChatApi>,
    pub connector: Arc<dyn Connector>,
    pub storage: Arc<dyn CredentialStorage>,
}

impl Services {
    /// REST over HTTP, realtime over WebSocket, credential in the data dir.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let api = Arc::new(HttpApi::new(config.api_base_url.clone())?);
        Ok(Self {
            auth: api.clone(),
            profile: api.clone(),
            chats: api,
            connector: Arc::new(WsConnector::new(config.realtime_url.clone())),
            storage: Arc::new(FileStorage::in_data_dir()?),
        })
    }
}

/// Owns every session component and the wiring between them.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ClientConfig>,
    services: Services,
    tokens: TokenStore,
    session: ViewerSession,
    gate: AuthGate,
    connections: ConnectionManager,
    chat: ChatSessionController,
}

impl AppState {
    pub fn new(config: ClientConfig, services: Services) -> Self {
        let tokens = TokenStore::new(services.storage.clone());
        let session = ViewerSession::new();
        let refresher = CredentialRefresher::new(services.auth.clone(), tokens.clone());
        let gate = AuthGate::new(session.clone(), tokens.clone(), refresher)
            .with_profile(services.profile.clone());
        let connections = ConnectionManager::new(services.connector.clone());
        let chat = ChatSessionController::new(gate.clone(), connections.clone());
        Self {
            config: Arc::new(config),
            services,
            tokens,
            session,
            gate,
            connections,
            chat,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn chat(&self) -> &ChatSessionController {
        &self.chat
    }

    /// Resolves who is logged in from the restored credential, refreshing
    /// once if it is missing or rejected.
    pub async fn bootstrap(&self) -> ViewerStatus {
        self.session.begin();
        let profile = self.services.profile.clone();
        let outcome = self
            .gate
            .attempt(|credential: Credential| {
                let profile = profile.clone();
                async move { profile.me(&credential).await }
            })
            .await;

        let authenticated = outcome.is_ok();
        if let Err(err) = &outcome {
            if err.is_auth() {
                self.tokens.clear();
            }
        }
        let status = self.session.resolve(outcome);
        if authenticated {
            self.connect_quietly().await;
        }
        tracing::info!(app = %self.config.app_name, ?status, "session bootstrap finished");
        status
    }

    pub async fn login_by_phone(&self, phone: &str, password: &str) -> Result<User, ClientError> {
        let token = self.services.auth.login_by_phone(phone, password).await?;
        self.tokens.set_credential(token, IssuedVia::Login);
        self.session.begin();
        let outcome = self.services.profile.me(&self.tokens.get()).await;
        if let Err(err) = &outcome {
            if err.is_auth() {
                self.tokens.clear();
            }
        }
        self.session.resolve(outcome.clone());
        let user = outcome?;
        tracing::info!(user_id = %user.id, "logged in");
        self.connect_quietly().await;
        Ok(user)
    }

    pub async fn logout(&self) {
        self.chat.deselect_chat();
        self.connections.disconnect().await;
        self.tokens.clear();
        self.session.sign_out();
        tracing::info!("logged out");
    }

    pub async fn list_chats(&self) -> Result<Vec<Conversation>, ClientError> {
        let chats = self.services.chats.clone();
        self.gate
            .run(|credential: Credential| {
                let chats = chats.clone();
                async move { chats.list_chats(&credential).await }
            })
            .await
    }

    /// Brings the realtime connection in line with the credential: closed
    /// when signed out, keyed to the current token when authenticated.
    pub async fn sync_connection(&self) -> Result<(), ClientError> {
        let credential = self.tokens.get();
        if credential.is_empty() {
            self.connections.disconnect().await;
            return Ok(());
        }
        if self.session.is_authenticated() {
            self.connections.connect(&credential.access_token).await?;
        }
        Ok(())
    }

    async fn connect_quietly(&self) {
        if let Err(err) = self.sync_connection().await {
            tracing::warn!(%err, "realtime connection unavailable");
        }
    }

    /// Starts the connection watcher and the inbound event pump. Both stop
    /// when the returned handle is dropped.
    pub fn spawn_background(&self) -> BackgroundTasks {
        let watcher = {
            let state = self.clone();
            let mut credentials = self.tokens.subscribe();
            let mut status = self.session.subscribe();
            tokio::spawn(async move {
                loop {
                    let changed = tokio::select! {
                        changed = credentials.changed() => changed,
                        changed = status.changed() => changed,
                    };
                    if changed.is_err() {
                        break;
                    }
                    state.connect_quietly().await;
                }
            })
        };

        let pump = {
            let chat = self.chat.clone();
            let mut events = self.connections.events();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => chat.handle_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "realtime events dropped; resyncing history");
                            if let Err(err) = chat.request_history().await {
                                tracing::debug!(%err, "resync skipped");
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        BackgroundTasks(vec![watcher, pump])
    }
}

pub struct BackgroundTasks(Vec<JoinHandle<()>>);

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
