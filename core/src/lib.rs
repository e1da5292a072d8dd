pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod gate;
pub mod models;
pub mod realtime;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod testing;
pub mod ws;

pub use api::{ChatApi, HttpApi, ProfileApi};
pub use auth::{AuthApi, CredentialRefresher};
pub use chat::ChatSessionController;
pub use config::{ClientConfig, ConfigError};
pub use error::{AuthFailure, ClientError, RefreshError, RefreshFailure, TransportFailure};
pub use gate::AuthGate;
pub use models::{Conversation, Message, OutgoingMessage, User};
pub use realtime::{ClientEvent, ConnectionManager, Connector, Link, ServerEvent};
pub use session::{ViewerSession, ViewerStatus};
pub use state::{AppState, BackgroundTasks, Services};
pub use store::{Credential, CredentialStorage, FileStorage, IssuedVia, MemoryStorage, TokenStore};
