use crate::error::ClientError;
use crate::models::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};

const INBOUND_CAPACITY: usize = 256;

/// Events the client emits on the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    SendMessage {
        chat_id: String,
        sender_id: String,
        recipient_id: String,
        content: String,
    },
    FetchMessages {
        chat_id: String,
    },
    JoinChat {
        chat_id: String,
    },
}

/// Events the server pushes on the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    MessageReceived(Message),
    /// Full history of one chat, answering `fetchMessages`.
    Messages {
        chat_id: String,
        messages: Vec<Message>,
    },
}

/// Handed to a link when it opens so it can report inbound events and an
/// unexpected drop. Signals from a link that has since been replaced are
/// ignored.
#[derive(Clone)]
pub struct LinkSignals {
    epoch: u64,
    current_epoch: Arc<AtomicU64>,
    connected: Arc<watch::Sender<bool>>,
    inbound: broadcast::Sender<ServerEvent>,
}

impl LinkSignals {
    fn is_current(&self) -> bool {
        self.current_epoch.load(Ordering::SeqCst) == self.epoch
    }

    pub fn deliver(&self, event: ServerEvent) {
        if self.is_current() {
            // No subscribers is fine.
            let _ = self.inbound.send(event);
        }
    }

    pub fn mark_dropped(&self) {
        if self.is_current() {
            tracing::warn!(epoch = self.epoch, "realtime connection dropped");
            self.connected.send_replace(false);
        }
    }
}

/// Opens realtime links for a given access token.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, token: &str, signals: LinkSignals) -> Result<Box<dyn Link>, ClientError>;
}

/// One open realtime link.
#[async_trait]
pub trait Link: Send + Sync {
    async fn emit(&self, event: &ClientEvent) -> Result<(), ClientError>;
    async fn close(&self);
    fn is_open(&self) -> bool;
}

struct LiveConnection {
    token: String,
    link: Box<dyn Link>,
}

/// Owns the single realtime connection, keyed by access token.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    live: Arc<Mutex<Option<LiveConnection>>>,
    epoch: Arc<AtomicU64>,
    connected: Arc<watch::Sender<bool>>,
    inbound: broadcast::Sender<ServerEvent>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (connected, _) = watch::channel(false);
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        Self {
            connector,
            live: Arc::new(Mutex::new(None)),
            epoch: Arc::new(AtomicU64::new(0)),
            connected: Arc::new(connected),
            inbound,
        }
    }

    /// Connects with `token`. A no-op when already connected with the same
    /// token; otherwise any existing connection is closed first.
    pub async fn connect(&self, token: &str) -> Result<(), ClientError> {
        let mut live = self.live.lock().await;
        if let Some(current) = live.as_ref() {
            if current.token == token && current.link.is_open() && self.is_connected() {
                tracing::debug!("realtime already connected with this credential");
                return Ok(());
            }
        }
        if let Some(previous) = live.take() {
            self.retire(previous).await;
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let signals = LinkSignals {
            epoch,
            current_epoch: self.epoch.clone(),
            connected: self.connected.clone(),
            inbound: self.inbound.clone(),
        };
        let link = self.connector.open(token, signals).await?;
        *live = Some(LiveConnection {
            token: token.to_owned(),
            link,
        });
        self.connected.send_replace(true);
        tracing::info!(epoch, "realtime connected");
        Ok(())
    }

    /// Closes the connection, if any. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let mut live = self.live.lock().await;
        if let Some(previous) = live.take() {
            self.retire(previous).await;
            tracing::info!("realtime disconnected");
        }
    }

    async fn retire(&self, previous: LiveConnection) {
        // Bump first so the closing link can no longer signal.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.connected.send_replace(false);
        previous.link.close().await;
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ServerEvent> {
        self.inbound.subscribe()
    }

    /// Sends an event on the live connection. Fails fast when disconnected;
    /// nothing is queued.
    pub async fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        let live = self.live.lock().await;
        match live.as_ref() {
            Some(current) if self.is_connected() => current.link.emit(&event).await,
            _ => Err(ClientError::disconnected()),
        }
    }
}
