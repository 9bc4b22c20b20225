//! # Postline CLI (`postline`)
//!
//! The `postline` binary is the primary interface for Postline. It provides
//! commands for database initialization, client registration, previewing and
//! importing documents, inspecting operations, running the retry worker, and
//! starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! postline --config ./config/postline.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `postline init` | Create the SQLite database and run schema migrations |
//! | `postline client add <name> --credential <token>` | Register a delivery target |
//! | `postline client list` | List registered clients |
//! | `postline preview <file>` | Chunk and score a document without persisting |
//! | `postline import --file/--url/--text ... --client <id>` | Import and deliver |
//! | `postline operation <id>` | Show an operation and its posts |
//! | `postline status` | Queue counts and delivery health |
//! | `postline retry run-once` | Retry due posts once |
//! | `postline retry worker` | Run the retry worker until Ctrl-C |
//! | `postline serve` | Start the HTTP server (and retry worker) |
//!
//! Logs go to stderr (`RUST_LOG`, default `info,sqlx=warn`); command output
//! goes to stdout.

use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postline::source::DocumentSource;
use postline::{clients, config, import, migrate, server, status, worker};

/// Postline CLI: turn a freeform document into quality-checked social posts
/// and deliver them with tracked retries.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/postline.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "postline",
    about = "Postline: quality-checked social posts from freeform documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/postline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the clients, operations, and
    /// posts tables. Running it multiple times is safe.
    Init,

    /// Manage delivery clients.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },

    /// Chunk and score a document without persisting or delivering anything.
    Preview {
        /// Path to the document.
        file: PathBuf,
    },

    /// Import a document: chunk, quality-check, persist, and deliver.
    #[command(group(ArgGroup::new("source").required(true).args(["file", "url", "text"])))]
    Import {
        /// Read the document from a local file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Fetch the document from a URL.
        #[arg(long)]
        url: Option<String>,

        /// Use the given text as the document.
        #[arg(long)]
        text: Option<String>,

        /// Client ID to deliver as.
        #[arg(long)]
        client: String,

        /// Requested publish time (RFC 3339). Recorded on each post.
        #[arg(long)]
        publish_at: Option<DateTime<Utc>>,
    },

    /// Show an operation and its posts.
    Operation {
        /// Operation ID.
        id: String,
    },

    /// Show queue counts, delivery health, and recent operations.
    Status,

    /// Retry failed deliveries.
    Retry {
        #[command(subcommand)]
        action: RetryAction,
    },

    /// Start the HTTP server and the retry worker.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ClientAction {
    /// Register a client and print its ID.
    Add {
        /// Display name.
        name: String,

        /// Publishing credential sent as a bearer token.
        #[arg(long)]
        credential: String,
    },
    /// List registered clients.
    List,
}

#[derive(Subcommand)]
enum RetryAction {
    /// Retry every due post once and exit.
    RunOnce,
    /// Run the retry worker until Ctrl-C.
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Client { action } => match action {
            ClientAction::Add { name, credential } => {
                clients::run_client_add(&cfg, &name, &credential).await?;
            }
            ClientAction::List => {
                clients::run_client_list(&cfg).await?;
            }
        },
        Commands::Preview { file } => {
            import::run_preview_cmd(&cfg, DocumentSource::File(file)).await?;
        }
        Commands::Import {
            file,
            url,
            text,
            client,
            publish_at,
        } => {
            let source = match (file, url, text) {
                (Some(path), _, _) => DocumentSource::File(path),
                (_, Some(url), _) => DocumentSource::Url(url),
                (_, _, Some(text)) => DocumentSource::Text(text),
                _ => anyhow::bail!("one of --file, --url, or --text is required"),
            };
            let request = import::ImportRequest {
                client_id: client,
                source,
                scheduled_for: publish_at,
            };
            import::run_import_cmd(&cfg, request).await?;
        }
        Commands::Operation { id } => {
            import::run_operation_cmd(&cfg, &id).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Retry { action } => match action {
            RetryAction::RunOnce => {
                worker::run_once_cmd(&cfg).await?;
            }
            RetryAction::Worker => {
                worker::run_worker_cmd(&cfg).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
