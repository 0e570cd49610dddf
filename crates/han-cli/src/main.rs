//! han-debug — terminal debugger for han state servers.
//!
//! The terminal counterpart of the browser debug page: lists the snapshot
//! timeline, follows change notifications live, dispatches actions, and
//! time-travels to a prior snapshot.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use han_client::{ChangeStreamClient, ClientConfig, ConnectionStatus, DebugSessionClient};
use han_protocol::{Action, Snapshot, SnapshotId};

#[derive(Parser)]
#[command(name = "han-debug", about = "Debugger for han state servers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the snapshot timeline live until Ctrl-C.
    Watch {
        /// Server authority, e.g. localhost:8000.
        base: String,
    },
    /// Print the snapshot timeline once.
    States {
        /// Server authority, e.g. localhost:8000.
        base: String,
    },
    /// Dispatch one action.
    Dispatch {
        /// Server authority, e.g. localhost:8000.
        base: String,
        /// Action type tag, e.g. INCREMENT.
        action_type: String,
        /// Action properties as key=value (value parsed as JSON, else string).
        #[arg(long = "prop")]
        props: Vec<String>,
    },
    /// Time-travel to a snapshot id.
    Select {
        /// Server authority, e.g. localhost:8000.
        base: String,
        /// Snapshot id (parsed as JSON, else string).
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Watch { base } => watch(&ClientConfig::for_authority(&base)).await,
        Command::States { base } => states(&ClientConfig::for_authority(&base)).await,
        Command::Dispatch {
            base,
            action_type,
            props,
        } => dispatch(&ClientConfig::for_authority(&base), &action_type, &props).await,
        Command::Select { base, id } => select(&ClientConfig::for_authority(&base), &id).await,
    }
}

async fn watch(config: &ClientConfig) -> Result<()> {
    let session = DebugSessionClient::connect(config)
        .await
        .context("failed to connect debugging session")?;
    print_timeline(&session);

    let mut revisions = session.subscribe();
    let _ = revisions.borrow_and_update();
    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                print_timeline(&session);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        if session.watch_status() != ConnectionStatus::Connected {
            tracing::warn!("change stream is down; timeline is no longer live");
            break;
        }
    }

    session.close().await;
    Ok(())
}

async fn states(config: &ClientConfig) -> Result<()> {
    let session = DebugSessionClient::connect(config)
        .await
        .context("failed to connect debugging session")?;
    print_timeline(&session);
    session.close().await;
    Ok(())
}

async fn dispatch(config: &ClientConfig, action_type: &str, props: &[String]) -> Result<()> {
    let mut action = Action::new(action_type);
    for prop in props {
        let (key, value) = prop
            .split_once('=')
            .with_context(|| format!("property '{prop}' is not key=value"))?;
        action = action.with_prop(key, parse_value(value));
    }

    let stream = ChangeStreamClient::connect(config)
        .await
        .context("failed to connect action channel")?;
    stream
        .dispatch(action)
        .await
        .context("failed to dispatch action")?;
    stream.close().await;
    println!("dispatched {action_type}");
    Ok(())
}

async fn select(config: &ClientConfig, id: &str) -> Result<()> {
    let session = DebugSessionClient::connect(config)
        .await
        .context("failed to connect debugging session")?;
    let ack = session
        .select_snapshot(SnapshotId(parse_value(id)))
        .await
        .context("time-travel request failed")?;
    println!("server acknowledged: {ack}");
    session.close().await;
    Ok(())
}

/// Parse a CLI value as JSON where possible, falling back to a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_timeline(session: &DebugSessionClient) {
    let snapshots = session.snapshots();
    let active = session.active_snapshot_id();
    println!("── timeline ({} snapshots) ──", snapshots.len());
    for snapshot in &snapshots {
        print_snapshot(snapshot, active.as_ref() == Some(&snapshot.id));
    }
}

fn print_snapshot(snapshot: &Snapshot, active: bool) {
    let marker = if active { "*" } else { " " };
    println!(
        "{marker} [{}] {} @ {}: {}",
        snapshot.id, snapshot.action.kind, snapshot.diff.path, snapshot.diff.data
    );
}
