use crate::error::ClientError;
use crate::gate::AuthGate;
use crate::models::{Message, OutgoingMessage};
use crate::realtime::{ClientEvent, ConnectionManager, ServerEvent};
use crate::store::Credential;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Default)]
struct ChatState {
    selected: Option<String>,
    messages: Vec<Message>,
}

/// Binds the selected conversation to history fetches and sends over the
/// realtime connection.
#[derive(Clone)]
pub struct ChatSessionController {
    gate: AuthGate,
    connections: ConnectionManager,
    state: Arc<RwLock<ChatState>>,
}

impl ChatSessionController {
    pub fn new(gate: AuthGate, connections: ConnectionManager) -> Self {
        Self {
            gate,
            connections,
            state: Arc::new(RwLock::new(ChatState::default())),
        }
    }

    pub fn selected(&self) -> Option<String> {
        self.state.read().selected.clone()
    }

    /// History of the selected chat as last received.
    pub fn messages(&self) -> Vec<Message> {
        self.state.read().messages.clone()
    }

    fn is_selected(&self, chat_id: &str) -> bool {
        self.state.read().selected.as_deref() == Some(chat_id)
    }

    /// Selects `chat_id` and requests its history. Goes through the auth
    /// gate, so while the session is unresolved the request waits for the
    /// credential refresh and connects with the refreshed token.
    pub async fn select_chat(&self, chat_id: impl Into<String>) -> Result<(), ClientError> {
        let chat_id = chat_id.into();
        {
            let mut state = self.state.write();
            if state.selected.as_deref() != Some(chat_id.as_str()) {
                state.messages.clear();
            }
            state.selected = Some(chat_id.clone());
        }
        tracing::info!(chat_id = %chat_id, "chat selected");

        let connections = &self.connections;
        self.gate
            .run(|credential: Credential| {
                let chat_id = chat_id.clone();
                async move {
                    connections.connect(&credential.access_token).await?;
                    connections
                        .emit(ClientEvent::JoinChat {
                            chat_id: chat_id.clone(),
                        })
                        .await?;
                    connections.emit(ClientEvent::FetchMessages { chat_id }).await
                }
            })
            .await
    }

    pub fn deselect_chat(&self) {
        let mut state = self.state.write();
        if let Some(chat_id) = state.selected.take() {
            tracing::info!(chat_id = %chat_id, "chat deselected");
        }
        state.messages.clear();
    }

    pub async fn send(&self, message: OutgoingMessage) -> Result<(), ClientError> {
        let chat_id = self.active_chat()?;
        if message.content.trim().is_empty() {
            return Err(ClientError::validation("message is empty"));
        }
        self.connections
            .emit(ClientEvent::SendMessage {
                chat_id,
                sender_id: message.sender_id,
                recipient_id: message.recipient_id,
                content: message.content,
            })
            .await
    }

    pub async fn request_history(&self) -> Result<(), ClientError> {
        let chat_id = self.active_chat()?;
        tracing::debug!(chat_id = %chat_id, "requesting chat history");
        self.connections
            .emit(ClientEvent::FetchMessages { chat_id })
            .await
    }

    fn active_chat(&self) -> Result<String, ClientError> {
        if !self.connections.is_connected() {
            return Err(ClientError::disconnected());
        }
        self.selected()
            .ok_or_else(|| ClientError::validation("no chat selected"))
    }

    /// Dispatches one inbound realtime event.
    pub async fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::MessageReceived(message) => {
                if !self.is_selected(&message.chat_id) {
                    return;
                }
                // Full resync rather than appending.
                if let Err(err) = self.request_history().await {
                    tracing::warn!(%err, chat_id = %message.chat_id, "history refetch failed");
                }
            }
            ServerEvent::Messages { chat_id, messages } => {
                let mut state = self.state.write();
                if state.selected.as_deref() == Some(chat_id.as_str()) {
                    tracing::debug!(chat_id = %chat_id, count = messages.len(), "history updated");
                    state.messages = messages;
                } else {
                    tracing::debug!(chat_id = %chat_id, "discarding history for a chat no longer selected");
                }
            }
        }
    }
}
