use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use jobboard_core::models::{MessageStatus, UserRole};
use jobboard_core::testing::{
    RecordingConnector, ScriptedAuthApi, ScriptedChatApi, ScriptedProfileApi,
};
use jobboard_core::{
    telemetry, AppState, ClientConfig, MemoryStorage, Message, ServerEvent, Services, User,
    ViewerStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Jobboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the session and chat flow against scripted backends.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing("info")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let auth = Arc::new(ScriptedAuthApi::new());
    let profile = Arc::new(ScriptedProfileApi::new());
    let connector = RecordingConnector::new();
    auth.push_refresh(Ok("smoke-token".into()));
    profile.register(
        "smoke-token",
        User {
            id: "smoke-user".into(),
            role: UserRole::Jobseeker,
            phone: None,
            name: Some("Smoke".into()),
        },
    );

    let services = Services {
        auth,
        profile,
        chats: Arc::new(ScriptedChatApi::new()),
        connector: Arc::new(connector.clone()),
        storage: Arc::new(MemoryStorage::new()),
    };
    let config = ClientConfig {
        api_base_url: "http://localhost/api/".parse()?,
        realtime_url: "ws://localhost/".parse()?,
        app_name: "Jobboard smoke".into(),
    };
    let state = AppState::new(config, services);

    runtime.block_on(async {
        let status = state.bootstrap().await;
        if status != ViewerStatus::Authenticated {
            bail!("bootstrap ended {status:?}");
        }
        let _background = state.spawn_background();
        state.chat().select_chat("smoke-chat").await?;

        connector.deliver(ServerEvent::Messages {
            chat_id: "smoke-chat".into(),
            messages: vec![Message {
                id: "m1".into(),
                chat_id: "smoke-chat".into(),
                sender_id: "company".into(),
                recipient_id: "smoke-user".into(),
                content: "welcome".into(),
                status: MessageStatus::Delivered,
                created_at: chrono::Utc::now(),
            }],
        });
        for _ in 0..50 {
            if !state.chat().messages().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        info!(
            "emitted" = connector.emitted().len(),
            "messages" = state.chat().messages().len(),
            "smoke test finished"
        );
        Ok::<(), anyhow::Error>(())
    })
}
