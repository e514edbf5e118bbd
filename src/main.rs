use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use apilog_core::{CallLog, DEFAULT_CAPACITY, body_payload, redact_url};
use apilog_storage::{BackendKind, StoreConfig, open_backend};
use apilog_tui::ViewerOptions;
use clap::{Parser, Subcommand, ValueEnum};

// ─────────────────────────────────────────────────────────────────────────────
// CLI
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// In-process ring buffer; lost when the process exits.
    Memory,
    /// JSON file in the data directory, rewritten on every change.
    File,
    /// Embedded database in the data directory.
    Embedded,
    /// Forward everything to an `apilog serve` instance.
    Relay,
    /// Relational table in a SQLite database (`--database`).
    Sqlite,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Memory => Self::Memory,
            Backend::File => Self::File,
            Backend::Embedded => Self::Embedded,
            Backend::Relay => Self::Relay,
            Backend::Sqlite => Self::Sqlite,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "apilog",
    about = "Bounded log of billing API calls for demo inspection",
    version
)]
struct Cli {
    /// Storage backend for the log.
    #[arg(short, long, value_enum, env = "APILOG_BACKEND", default_value = "file", global = true)]
    backend: Backend,

    /// Directory for the file and embedded backends.
    #[arg(short, long, env = "APILOG_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the relay server (required for --backend relay).
    #[arg(long, env = "APILOG_RELAY_URL", global = true)]
    relay_url: Option<String>,

    /// SQLite database file (required for --backend sqlite).
    #[arg(long, env = "APILOG_DATABASE", global = true)]
    database: Option<PathBuf>,

    /// Number of calls retained before the oldest is evicted.
    #[arg(long, env = "APILOG_CAPACITY", default_value_t = DEFAULT_CAPACITY, global = true)]
    capacity: usize,

    /// Timeout for each relay round trip, in milliseconds.
    #[arg(long, env = "APILOG_TIMEOUT_MS", default_value = "5000", global = true)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the log over HTTP at /api/logs for relay clients.
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        listen: SocketAddr,
        /// Wipe the log on shutdown.
        #[arg(long)]
        clear_on_exit: bool,
    },
    /// Interactive log viewer.
    View {
        /// Wipe the log when the viewer exits.
        #[arg(long)]
        clear_on_exit: bool,
        /// Reload interval in milliseconds.
        #[arg(long, default_value = "2000")]
        refresh_ms: u64,
    },
    /// Print retained calls as JSON Lines on stdout.
    List {
        #[arg(long)]
        newest_first: bool,
    },
    /// Record one API call.
    Append {
        #[arg(short, long)]
        method: String,
        #[arg(short, long)]
        url: String,
        #[arg(short, long)]
        status: u16,
        /// Response body; stored as JSON when it parses, as text otherwise.
        #[arg(long, default_value = "null")]
        response: String,
        /// Request body, parsed like --response.
        #[arg(long)]
        request_body: Option<String>,
        /// Replace token query parameters in the URL before storing it.
        #[arg(long)]
        redact: bool,
    },
    /// Remove every retained call.
    Clear,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("apilog")
        .join("data")
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            kind: self.backend.into(),
            capacity: self.capacity,
            data_dir: self.data_dir.clone().unwrap_or_else(default_data_dir),
            relay_url: self.relay_url.clone(),
            database: self.database.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The viewer owns the terminal; problems show in its status bar instead.
    let directive = match cli.command {
        Command::View { .. } => "apilog=off",
        _ => "apilog=info",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    let backend = open_backend(&cli.store_config())?;
    let log = CallLog::new(backend.clone());

    match cli.command {
        Command::Serve {
            listen,
            clear_on_exit,
        } => {
            eprintln!(
                "apilog: serving {} log on http://{listen}{}",
                backend.name(),
                apilog_relay::LOGS_PATH
            );
            apilog_relay::serve(listen, backend, async {
                tokio::signal::ctrl_c().await.ok();
            })
            .await?;
            if clear_on_exit {
                log.clear().await;
            }
        }
        Command::View {
            clear_on_exit,
            refresh_ms,
        } => {
            let options = ViewerOptions {
                refresh_every: Duration::from_millis(refresh_ms),
                clear_on_exit,
            };
            apilog_tui::run_viewer(log, options).await?;
        }
        Command::List { newest_first } => {
            let records = if newest_first {
                log.list_newest_first().await
            } else {
                log.list().await
            };
            for record in records {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Command::Append {
            method,
            url,
            status,
            response,
            request_body,
            redact,
        } => {
            let url = if redact {
                redact_url(&url).into_owned()
            } else {
                url
            };
            let appended = log
                .append(
                    &method.to_uppercase(),
                    &url,
                    body_payload(&response),
                    status,
                    request_body.as_deref().map(body_payload),
                )
                .await;
            println!("{}", serde_json::to_string(&appended.record)?);
            eprintln!("apilog: {}", appended.outcome);
        }
        Command::Clear => {
            eprintln!("apilog: clear {}", log.clear().await);
        }
    }

    Ok(())
}
