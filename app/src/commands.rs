use anyhow::{bail, Context, Result};
use clap::Subcommand;
use jobboard_core::models::UserRole;
use jobboard_core::{AppState, Conversation, Message, OutgoingMessage, User, ViewerStatus};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve the stored session and print who is logged in.
    Status,
    /// Log in with phone and password.
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored credential.
    Logout,
    /// List conversations of the logged-in user.
    Chats,
    /// Open a conversation; each stdin line is sent, an empty line reprints history.
    Chat { chat_id: String },
}

pub async fn run(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let status = state.bootstrap().await;
            match state.session().current_user() {
                Some(user) => println!("{status:?}: {}", describe(&user)),
                None => println!("{status:?}"),
            }
        }
        Command::Login { phone, password } => {
            let user = state.login_by_phone(&phone, &password).await?;
            println!("Logged in as {}", describe(&user));
        }
        Command::Logout => {
            state.logout().await;
            println!("Logged out");
        }
        Command::Chats => {
            require_session(state).await?;
            for chat in state.list_chats().await? {
                println!("{}\t{:?}\t{}", chat.id, chat.status, preview(&chat));
            }
        }
        Command::Chat { chat_id } => {
            let user = require_session(state).await?;
            let conversation = state
                .list_chats()
                .await?
                .into_iter()
                .find(|chat| chat.id == chat_id)
                .with_context(|| format!("no conversation {chat_id}"))?;
            let recipient = recipient_for(&user, &conversation);

            let _background = state.spawn_background();
            state.chat().select_chat(&chat_id).await?;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let content = line.trim();
                if content.is_empty() {
                    print_history(&state.chat().messages());
                    continue;
                }
                let outgoing = OutgoingMessage::new(&user.id, &recipient, content);
                if let Err(err) = state.chat().send(outgoing).await {
                    eprintln!("not sent: {err}");
                }
            }
            state.chat().deselect_chat();
            state.connections().disconnect().await;
        }
    }
    Ok(())
}

async fn require_session(state: &AppState) -> Result<User> {
    let status = state.bootstrap().await;
    if status != ViewerStatus::Authenticated {
        bail!("not logged in ({status:?}); run `jobboard login` first");
    }
    state
        .session()
        .current_user()
        .context("session resolved without a user")
}

/// The other participant of `conversation` from the viewer's side.
pub fn recipient_for(user: &User, conversation: &Conversation) -> String {
    match user.role {
        UserRole::Jobseeker => conversation.participant_ids.company_id.clone(),
        UserRole::Company => conversation.participant_ids.jobseeker_id.clone(),
    }
}

fn describe(user: &User) -> String {
    let name = user.name.as_deref().or(user.phone.as_deref()).unwrap_or(&user.id);
    format!("{name} ({:?})", user.role)
}

fn preview(chat: &Conversation) -> String {
    chat.last_message
        .as_ref()
        .map(|message| message.content.chars().take(40).collect())
        .unwrap_or_default()
}

fn print_history(messages: &[Message]) {
    for message in messages {
        println!(
            "[{}] {}: {}",
            message.created_at.format("%H:%M"),
            message.sender_id,
            message.content
        );
    }
}
