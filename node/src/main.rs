//! CourseSync node
//!
//! Runs a master (serves course content to clients) or a client (receives
//! pushed content and pulls from its master on a schedule), and provides
//! the admin commands for both.
//!
//! Usage:
//!   coursesync-node --config coursesync.toml serve
//!   coursesync-node sync-now --kind courses --kind lessons
//!   coursesync-node sync-item lessons 42
//!   coursesync-node push --course 12

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use coursesync_node::config::NodeConfig;
use coursesync_node::{AppState, build_router, tasks};
use coursesync_store::ContentStore;
use coursesync_sync::{MasterApi, ensure_all};
use coursesync_types::{ContentKind, LocalId};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coursesync-node")]
#[command(about = "Course content master/client sync node", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "coursesync.toml", env = "COURSESYNC_CONFIG")]
    config: PathBuf,

    /// Database path (overrides config file)
    #[arg(long, env = "COURSESYNC_DATABASE")]
    database: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (and run scheduled jobs)
    Serve {
        /// Address to bind (overrides config file)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Pull from the master now
    SyncNow {
        /// Kinds to pull; defaults to those enabled in the config
        #[arg(long = "kind")]
        kinds: Vec<ContentKind>,
    },
    /// Pull a single item from the master by its local or stable id
    SyncItem { kind: ContentKind, id: String },
    /// Push whole courses to every client
    Push {
        #[arg(long = "course", required = true)]
        courses: Vec<i64>,
    },
    /// Push a single item to every client
    PushItem { kind: ContentKind, id: i64 },
    /// Assign stable ids to content that has none
    GenerateIds {
        #[arg(long = "kind")]
        kinds: Vec<ContentKind>,
    },
    /// Check the connection to the master
    Verify,
    /// List known client sites
    Clients,
    /// Register a client site to push to
    AddClient {
        url: String,
        secret: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Forget a client site
    RemoveClient { url: String },
    /// Show recent sync log entries
    Logs {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Delete old sync log entries
    PurgeLogs {
        /// Retention in days (defaults to the config value)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Print a fresh random shared secret
    NewSecret,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::NewSecret = cli.command {
        println!("{}", new_secret());
        return Ok(());
    }

    let mut config = NodeConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(database) = cli.database {
        config.database = database;
    }

    let store = Arc::new(
        ContentStore::open(&config.database)
            .with_context(|| format!("Failed to open database {}", config.database.display()))?,
    );
    let state = AppState::new(config, store);

    match cli.command {
        Command::Serve { bind } => serve(state, bind).await,
        Command::SyncNow { kinds } => {
            let report = if kinds.is_empty() {
                tasks::run_pull(&state).await?
            } else {
                state.pull_sync()?.sync_all(&kinds).await?
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::SyncItem { kind, id } => {
            let result = state.pull_sync()?.sync_item(kind, &id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Push { courses } => {
            let courses: Vec<LocalId> = courses.into_iter().map(LocalId::new).collect();
            let report = state.push_coordinator()?.push_courses(&courses).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::PushItem { kind, id } => {
            let report = state.push_coordinator()?.push_item(kind, LocalId::new(id)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::GenerateIds { kinds } => {
            let kinds = if kinds.is_empty() { ContentKind::ALL.to_vec() } else { kinds };
            for kind in kinds {
                let report = ensure_all(&state.store, kind)?;
                println!(
                    "{kind}: {} total, {} assigned, {} already present",
                    report.total, report.newly_assigned, report.already_present
                );
            }
            Ok(())
        }
        Command::Verify => {
            let response = state.master_api()?.verify().await?;
            println!(
                "{} ({} at {}, version {})",
                response.message, response.site_name, response.site_url, response.version
            );
            Ok(())
        }
        Command::Clients => {
            let clients = state.store.list_clients()?;
            if clients.is_empty() {
                println!("No client sites registered.");
            }
            for client in clients {
                println!(
                    "{:<40} {:<24} {:?} last seen {}{}",
                    client.endpoint_url,
                    client.display_name,
                    client.status(),
                    client.last_seen_at.to_rfc3339(),
                    if client.push_secret.is_some() { "" } else { " (no push secret)" },
                );
            }
            Ok(())
        }
        Command::AddClient { url, secret, name } => {
            if secret.trim().is_empty() {
                bail!("Client secret must not be empty");
            }
            let name = name.unwrap_or_else(|| url.clone());
            state.store.add_push_target(&url, &name, &secret)?;
            println!("Added client {name} ({url})");
            Ok(())
        }
        Command::RemoveClient { url } => {
            if state.store.remove_client(&url)? {
                println!("Removed client {url}");
            } else {
                println!("No client registered at {url}");
            }
            Ok(())
        }
        Command::Logs { limit } => {
            for entry in state.store.recent_logs(limit)? {
                let kind = entry.content_kind.map(|k| k.to_string()).unwrap_or_default();
                println!(
                    "{} {:<6} {:<7} {:<9} {:<36} {}",
                    entry.timestamp.to_rfc3339(),
                    entry.direction.as_str(),
                    entry.outcome.as_str(),
                    kind,
                    entry.content_ref,
                    entry.message
                );
            }
            Ok(())
        }
        Command::PurgeLogs { days } => {
            let days = days.unwrap_or(state.config.log_retention_days);
            let purged = tasks::purge_logs(&state.store, days)?;
            println!("Purged {purged} log entries older than {days} days");
            Ok(())
        }
        Command::NewSecret => unreachable!("handled before the store is opened"),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "coursesync_node={level},coursesync_sync={level},coursesync_store={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn new_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

async fn serve(state: Arc<AppState>, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| state.config.server.bind.clone());
    if state.config.shared_secret.trim().is_empty() {
        warn!("shared_secret is not set; authenticated endpoints will reject every request");
    }

    let _pull = tasks::spawn_scheduled_pull(state.clone());
    let _purge = tasks::spawn_log_purge(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(mode = ?state.config.mode, addr = %bind, "CourseSync node listening");

    let app = build_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("HTTP server failed")?;
    info!("shutdown complete");
    Ok(())
}
