//! # docvault CLI
//!
//! ## Usage
//!
//! ```bash
//! docvault --config ./config/docvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docvault init` | Create the SQLite database and run schema migrations |
//! | `docvault import <file.json>` | Load source records into the worklist |
//! | `docvault recover` | Fetch, decrypt, extract, and store every pending record |
//! | `docvault decrypt` | Decrypt one blob and print its artifacts |
//! | `docvault status [ID]` | Worklist totals, or one record's status |
//! | `docvault export <ID> --out DIR` | Write a record's stored artifacts to files |
//! | `docvault serve` | Start the HTTP adapter |
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `docvault=info,warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docvault::decrypt::DecryptCommand;
use docvault::progress::ProgressMode;
use docvault::recover::RecoverCommand;
use docvault::{config, decrypt, export, import, migrate, recover, server, shutdown, status};

/// docvault — recover and decrypt documents pinned to content-addressed storage.
#[derive(Parser)]
#[command(
    name = "docvault",
    about = "docvault — recover and decrypt documents pinned to content-addressed storage",
    version,
    long_about = "docvault fetches encrypted document blobs through redundant HTTP gateways, \
    decrypts salted AES-256-CBC envelopes, extracts embedded thumbnail and document images, \
    and stores them idempotently in SQLite."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Load a JSON array of source records into the worklist.
    ///
    /// Records are upserted by `document_id`. Recovery status is left as is.
    Import {
        /// Path to the worklist JSON file.
        file: PathBuf,
    },

    /// Recover every record that has not been recovered yet.
    ///
    /// Records are processed one at a time with a pause between gateway
    /// fetches. Ctrl-C stops after the current record.
    Recover {
        /// Reprocess records already marked recovered.
        #[arg(long)]
        force: bool,

        /// Maximum number of records to load from the worklist.
        #[arg(long)]
        limit: Option<i64>,

        /// Only process this document.
        #[arg(long)]
        document: Option<String>,

        /// Override `[recovery].delay_ms`.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// List the records that would be processed without fetching.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto", value_parser = parse_progress)]
        progress: ProgressMode,
    },

    /// Decrypt one blob and print what it contains.
    ///
    /// Nothing is written to the database.
    Decrypt {
        /// Content reference to fetch through the gateways.
        #[arg(long = "ref", conflicts_with_all = ["blob", "file"])]
        content_ref: Option<String>,

        /// Raw blob text.
        #[arg(long, conflicts_with = "file")]
        blob: Option<String>,

        /// File holding the raw blob text.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Passphrase for encrypted payloads.
        #[arg(long)]
        key: Option<String>,

        /// Write extracted artifacts into this directory.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show recovery status.
    ///
    /// Without an ID prints totals; with an ID prints that record and its
    /// stored artifacts.
    Status {
        /// Document ID.
        id: Option<String>,
    },

    /// Write a record's stored artifacts to files.
    Export {
        /// Document ID.
        id: String,

        /// Output directory.
        #[arg(long)]
        out: PathBuf,
    },

    /// Start the HTTP adapter on `[server].bind`.
    Serve,
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s)
        .ok_or_else(|| format!("invalid progress mode '{}': use auto, human, json, or off", s))
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docvault=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Recover {
            force,
            limit,
            document,
            delay_ms,
            dry_run,
            progress,
        } => {
            let cancel = shutdown::install_signal_handler();
            recover::run_recover(
                &cfg,
                RecoverCommand {
                    force,
                    limit,
                    document,
                    delay_ms,
                    dry_run,
                    progress,
                },
                &cancel,
            )
            .await?;
        }
        Commands::Decrypt {
            content_ref,
            blob,
            file,
            key,
            out,
            json,
        } => {
            decrypt::run_decrypt(
                &cfg,
                DecryptCommand {
                    content_ref,
                    blob,
                    file,
                    key,
                    out,
                    json,
                },
            )
            .await?;
        }
        Commands::Status { id } => {
            status::run_status(&cfg, id.as_deref()).await?;
        }
        Commands::Export { id, out } => {
            export::run_export(&cfg, &id, &out).await?;
        }
        Commands::Serve => {
            let cancel = shutdown::install_signal_handler();
            server::run_server(&cfg, cancel).await?;
        }
    }

    Ok(())
}
