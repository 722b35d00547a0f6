use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use community_chat_core::{
    default_backend, filter_messages, wire, AppAction, AppBackend, AppReconciler, AppState,
    AppUpdate, ChatMessage, FfiApp, Toast,
};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "community-chat")]
#[command(about = "Community chat client for scripting and manual testing")]
struct Cli {
    /// State directory (chat_config.json and search history live here)
    #[arg(long, default_value = ".community-chat")]
    state_dir: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the message log
    Messages {
        /// Only show messages whose text contains this (case-insensitive)
        #[arg(long)]
        search: Option<String>,
    },

    /// Post a new message
    Send {
        #[arg(long)]
        text: String,

        #[arg(long, env = "COMMUNITY_CHAT_SENDER")]
        sender: Option<String>,
    },

    /// Reply to an existing message
    Reply {
        /// Id of the message being replied to
        #[arg(long)]
        to: String,

        #[arg(long)]
        text: String,

        #[arg(long, env = "COMMUNITY_CHAT_SENDER")]
        sender: Option<String>,
    },

    /// Show the unread notification count for a user
    Notifications {
        #[arg(long)]
        user: String,
    },

    /// Run a live session and print changes (runs until interrupted or --timeout)
    Listen {
        /// User id; enables the notification poller
        #[arg(long)]
        user: Option<String>,

        /// Timeout in seconds (0 = run forever)
        #[arg(long, default_value_t = 0)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.state_dir)
        .with_context(|| format!("create state dir {}", cli.state_dir.display()))?;

    match &cli.cmd {
        Command::Messages { search } => cmd_messages(&cli, search.as_deref()).await,
        Command::Send { text, sender } => cmd_send(&cli, text, sender.as_deref()).await,
        Command::Reply { to, text, sender } => cmd_reply(&cli, to, text, sender.as_deref()).await,
        Command::Notifications { user } => cmd_notifications(&cli, user).await,
        Command::Listen { user, timeout } => cmd_listen(&cli, user.clone(), *timeout).await,
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn state_dir(cli: &Cli) -> anyhow::Result<String> {
    cli.state_dir
        .to_str()
        .map(ToString::to_string)
        .context("state dir must be valid UTF-8")
}

fn backend(cli: &Cli) -> anyhow::Result<AppBackend> {
    default_backend(&state_dir(cli)?).context("build chat backend")
}

fn sender_or_anonymous(sender: Option<&str>) -> &str {
    sender
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(community_chat_core::ANONYMOUS_SENDER)
}

fn message_json(m: &ChatMessage) -> serde_json::Value {
    json!({
        "id": m.id,
        "sender": m.sender,
        "text": m.text,
        "created_at": m.created_at,
        "replies": m.replies.iter().map(|r| json!({
            "sender": r.sender,
            "text": r.text,
            "created_at": r.created_at,
        })).collect::<Vec<_>>(),
    })
}

fn print(v: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&v).context("json encode")?);
    Ok(())
}

fn print_line(v: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(&v).context("json encode")?);
    Ok(())
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn cmd_messages(cli: &Cli, search: Option<&str>) -> anyhow::Result<()> {
    let backend = backend(cli)?;
    let log = backend.api.fetch_messages().await.context("fetch messages")?;
    let visible = filter_messages(&log, search.unwrap_or_default());
    print(json!({
        "total": log.len(),
        "messages": visible.iter().map(message_json).collect::<Vec<_>>(),
    }))
}

async fn cmd_send(cli: &Cli, text: &str, sender: Option<&str>) -> anyhow::Result<()> {
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "message text is empty");
    let sender = sender_or_anonymous(sender);
    let backend = backend(cli)?;
    backend
        .api
        .send_message(text, sender)
        .await
        .context("send message")?;
    print(json!({ "sent": true, "sender": sender }))
}

async fn cmd_reply(cli: &Cli, to: &str, text: &str, sender: Option<&str>) -> anyhow::Result<()> {
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "reply text is empty");
    let sender = sender_or_anonymous(sender);
    let backend = backend(cli)?;
    backend
        .api
        .send_reply(to, text, sender)
        .await
        .with_context(|| format!("reply to {to}"))?;
    print(json!({ "sent": true, "message_id": to, "sender": sender }))
}

async fn cmd_notifications(cli: &Cli, user: &str) -> anyhow::Result<()> {
    let backend = backend(cli)?;
    let list = backend
        .api
        .fetch_notifications(user)
        .await
        .with_context(|| format!("fetch notifications for {user}"))?;
    print(json!({
        "user": user,
        "total": list.len(),
        "unread": wire::unread_notification_count(&list),
    }))
}

/// Returns the toast to print, or `None` if it was already printed. Updates
/// can repeat a toast until its `ClearToast` is processed.
fn unseen_toast(last: &mut Option<Toast>, current: Option<&Toast>) -> Option<Toast> {
    let Some(current) = current else {
        *last = None;
        return None;
    };
    if last.as_ref() == Some(current) {
        return None;
    }
    *last = Some(current.clone());
    Some(current.clone())
}

struct ChannelReconciler(tokio::sync::mpsc::UnboundedSender<AppState>);

impl AppReconciler for ChannelReconciler {
    fn reconcile(&self, update: AppUpdate) {
        let AppUpdate::FullState(state) = update;
        let _ = self.0.send(state);
    }
}

async fn cmd_listen(cli: &Cli, user: Option<String>, timeout_sec: u64) -> anyhow::Result<()> {
    let backend = backend(cli)?;
    let app = FfiApp::with_backend(state_dir(cli)?, backend);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    app.listen_for_updates(Box::new(ChannelReconciler(tx)));
    app.dispatch(AppAction::StartSession { user_id: user });

    let deadline = if timeout_sec == 0 {
        None
    } else {
        Some(tokio::time::Instant::now() + Duration::from_secs(timeout_sec))
    };

    let mut seen = HashSet::<String>::new();
    let mut last_stream = None;
    let mut last_unread = 0u32;
    let mut last_notifications = None;
    let mut last_toast = None;

    loop {
        let recv_fut = rx.recv();
        let state = if let Some(dl) = deadline {
            let remaining = dl.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, recv_fut).await {
                Ok(Some(s)) => s,
                Ok(None) => break,
                Err(_) => break, // timeout
            }
        } else {
            tokio::select! {
                s = recv_fut => match s {
                    Some(s) => s,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        };
        tracing::debug!(rev = state.rev, "update");

        if last_stream.as_ref() != Some(&state.stream) {
            print_line(json!({ "type": "stream", "status": format!("{:?}", state.stream) }))?;
            last_stream = Some(state.stream.clone());
        }
        for m in &state.messages {
            if seen.insert(m.id.clone()) {
                let mut line = message_json(m);
                line["type"] = json!("message");
                print_line(line)?;
            }
        }
        if state.unread.total != last_unread {
            last_unread = state.unread.total;
            print_line(json!({
                "type": "unread",
                "total": state.unread.total,
                "senders": state.unread.senders.iter().map(|s| json!({
                    "sender_id": s.sender_id,
                    "sender_name": s.sender_name,
                    "count": s.count,
                })).collect::<Vec<_>>(),
            }))?;
        }
        let notifications = (state.notifications.unread_count, state.notifications.stale);
        if state.notifications.last_updated_at.is_some()
            && last_notifications != Some(notifications)
        {
            last_notifications = Some(notifications);
            print_line(json!({
                "type": "notifications",
                "unread": notifications.0,
                "stale": notifications.1,
            }))?;
        }
        if let Some(toast) = unseen_toast(&mut last_toast, state.toast.as_ref()) {
            print_line(json!({ "type": "toast", "message": toast.message }))?;
            app.dispatch(AppAction::ClearToast);
        }
    }

    app.dispatch(AppAction::EndSession);
    Ok(())
}
