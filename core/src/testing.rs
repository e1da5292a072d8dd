//! Scripted stand-ins for the backend, used by tests and the smoke task.

use crate::api::{ChatApi, ProfileApi};
use crate::auth::AuthApi;
use crate::error::{ClientError, RefreshError};
use crate::models::{Conversation, User};
use crate::realtime::{ClientEvent, Connector, Link, LinkSignals, ServerEvent};
use crate::store::Credential;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Auth endpoints answering from a queue of refresh outcomes. An empty
/// queue rejects, like a missing session cookie.
#[derive(Default)]
pub struct ScriptedAuthApi {
    refresh_results: Mutex<VecDeque<Result<String, RefreshError>>>,
    refresh_calls: AtomicUsize,
    held: AtomicBool,
    release: Notify,
    accounts: Mutex<HashMap<(String, String), String>>,
}

impl ScriptedAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_refresh(&self, result: Result<String, RefreshError>) {
        self.refresh_results.lock().push_back(result);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Parks every refresh until [`Self::release_refreshes`].
    pub fn hold_refreshes(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_refreshes(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn add_account(&self, phone: &str, password: &str, token: &str) {
        self.accounts
            .lock()
            .insert((phone.to_owned(), password.to_owned()), token.to_owned());
    }
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn refresh(&self) -> Result<String, RefreshError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        loop {
            let released = self.release.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if !self.held.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }
        tokio::task::yield_now().await;
        self.refresh_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RefreshError::rejected("no refresh session")))
    }

    async fn login_by_phone(&self, phone: &str, password: &str) -> Result<String, ClientError> {
        self.accounts
            .lock()
            .get(&(phone.to_owned(), password.to_owned()))
            .cloned()
            .ok_or_else(ClientError::unauthenticated)
    }
}

/// `GET /user/me` answering for registered tokens only.
#[derive(Default)]
pub struct ScriptedProfileApi {
    users: Mutex<HashMap<String, User>>,
    offline: AtomicBool,
    requests: Mutex<Vec<String>>,
}

impl ScriptedProfileApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: &str, user: User) {
        self.users.lock().insert(token.to_owned(), user);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Tokens presented so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ProfileApi for ScriptedProfileApi {
    async fn me(&self, credential: &Credential) -> Result<User, ClientError> {
        self.requests.lock().push(credential.access_token.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::network("profile service unreachable"));
        }
        self.users
            .lock()
            .get(&credential.access_token)
            .cloned()
            .ok_or_else(ClientError::unauthenticated)
    }
}

#[derive(Default)]
pub struct ScriptedChatApi {
    chats: Mutex<Vec<Conversation>>,
    accepted: Mutex<HashSet<String>>,
}

impl ScriptedChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, token: &str) {
        self.accepted.lock().insert(token.to_owned());
    }

    pub fn add_chat(&self, chat: Conversation) {
        self.chats.lock().push(chat);
    }
}

#[async_trait]
impl ChatApi for ScriptedChatApi {
    async fn list_chats(&self, credential: &Credential) -> Result<Vec<Conversation>, ClientError> {
        if !self.accepted.lock().contains(&credential.access_token) {
            return Err(ClientError::unauthenticated());
        }
        Ok(self.chats.lock().clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRecord {
    Opened(String),
    Closed(String),
    Emitted(ClientEvent),
}

/// Connector that records link lifecycle and emissions instead of opening
/// sockets.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    records: Arc<Mutex<Vec<LinkRecord>>>,
    signals: Arc<Mutex<Option<LinkSignals>>>,
    refuse: Arc<AtomicBool>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LinkRecord> {
        self.records.lock().clone()
    }

    pub fn emitted(&self) -> Vec<ClientEvent> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| match record {
                LinkRecord::Emitted(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn opened(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| match record {
                LinkRecord::Opened(token) => Some(token.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn last_signals(&self) -> Option<LinkSignals> {
        self.signals.lock().clone()
    }

    /// Pushes a server event through the most recently opened link.
    pub fn deliver(&self, event: ServerEvent) {
        if let Some(signals) = self.last_signals() {
            signals.deliver(event);
        }
    }

    /// Simulates the server dropping the most recently opened link.
    pub fn drop_connection(&self) {
        if let Some(signals) = self.last_signals() {
            signals.mark_dropped();
        }
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn open(&self, token: &str, signals: LinkSignals) -> Result<Box<dyn Link>, ClientError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::network("connection refused"));
        }
        self.records.lock().push(LinkRecord::Opened(token.to_owned()));
        *self.signals.lock() = Some(signals);
        Ok(Box::new(RecordingLink {
            token: token.to_owned(),
            records: self.records.clone(),
            open: AtomicBool::new(true),
        }))
    }
}

struct RecordingLink {
    token: String,
    records: Arc<Mutex<Vec<LinkRecord>>>,
    open: AtomicBool,
}

#[async_trait]
impl Link for RecordingLink {
    async fn emit(&self, event: &ClientEvent) -> Result<(), ClientError> {
        self.records.lock().push(LinkRecord::Emitted(event.clone()));
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.records.lock().push(LinkRecord::Closed(self.token.clone()));
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
