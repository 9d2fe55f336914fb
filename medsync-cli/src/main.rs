//! # medsync
//!
//! Command-line front end for the medsync offline translation core.
//!
//! ## Commands
//!
//! - `translate`: Translate text or an audio file (queued when offline)
//! - `queue`: List, count, retry or remove queued items
//! - `drain`: Replay the offline queue
//! - `discover`: Discover and health-check edge endpoints
//! - `join` / `leave`: Join or end a translation session
//! - `status`: Show connectivity, endpoints, session and queue
//!
//! ## Example
//!
//! ```bash
//! # Translate while the network is down: the request is queued
//! medsync --offline translate "Where does it hurt?" --from en --to es
//!
//! # Back online: replay everything that was queued
//! medsync drain
//!
//! # Inspect what is still waiting
//! medsync queue list
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medsync_client::{
    Connectivity, CoreConfig, FileStore, HttpApi, MockApi, MockTransport, OfflineCore, Transport,
    WsTransport,
};
use medsync_types::DEFAULT_CONTEXT;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{discover, drain, queue, session, status, translate};

/// Command-line front end for the medsync offline translation core.
#[derive(Parser, Debug)]
#[command(name = "medsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for configuration and persisted state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Treat the network as unreachable
    #[arg(long, global = true)]
    offline: bool,

    /// Use the mock API and transport instead of the network (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate text or an audio file
    Translate {
        /// Text to translate (or use --audio-file)
        text: Option<String>,

        /// Audio file to translate
        #[arg(long, conflicts_with = "text")]
        audio_file: Option<PathBuf>,

        /// Source language
        #[arg(long, default_value = "en")]
        from: String,

        /// Target language
        #[arg(long)]
        to: String,

        /// Domain context
        #[arg(long, default_value = DEFAULT_CONTEXT)]
        context: String,
    },

    /// Inspect and manage the offline queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Replay the offline queue
    Drain,

    /// Discover and health-check edge endpoints
    Discover,

    /// Join a translation session
    Join {
        /// Session code
        code: String,

        /// Your language
        #[arg(long, short)]
        language: String,
    },

    /// End the current session
    Leave,

    /// Show status
    Status,
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// List queued items in replay order
    List,
    /// Print the number of queued items
    Size,
    /// Reset a failed item for replay
    Retry {
        /// Queue item id
        id: String,
    },
    /// Delete a queued item
    Remove {
        /// Queue item id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let core_config = config::load_core_config(&data_dir)?;
    let connectivity = Connectivity::from_online(!cli.offline);

    if cli.mock {
        let core = open(
            core_config,
            &data_dir,
            Arc::new(MockApi::new()),
            MockTransport::new(),
            connectivity,
        )
        .await?;
        execute(&core, cli.command, &data_dir).await
    } else {
        let core = open(
            core_config,
            &data_dir,
            Arc::new(HttpApi::new()),
            WsTransport::new(),
            connectivity,
        )
        .await?;
        execute(&core, cli.command, &data_dir).await
    }
}

async fn open<T: Transport>(
    config: CoreConfig,
    data_dir: &Path,
    api: Arc<dyn medsync_client::TranslationApi>,
    transport: T,
    connectivity: Connectivity,
) -> Result<OfflineCore<T>> {
    let store = Arc::new(FileStore::new(config::state_path(data_dir)));
    OfflineCore::load(config, store, api, transport, connectivity)
        .await
        .context("Failed to load persisted state")
}

async fn execute<T: Transport>(core: &OfflineCore<T>, command: Commands, data_dir: &Path) -> Result<()> {
    match command {
        Commands::Translate {
            text,
            audio_file,
            from,
            to,
            context,
        } => {
            let input = if let Some(text) = text.as_deref() {
                translate::Input::Text(text)
            } else if let Some(path) = audio_file.as_deref() {
                translate::Input::AudioFile(path)
            } else {
                anyhow::bail!("Must specify text or --audio-file");
            };
            translate::run(core, input, &from, &to, &context).await?;
        }
        Commands::Queue { action } => match action {
            QueueAction::List => queue::list(core).await?,
            QueueAction::Size => {
                queue::size(core).await?;
            }
            QueueAction::Retry { id } => queue::retry(core, &id).await?,
            QueueAction::Remove { id } => queue::remove(core, &id).await?,
        },
        Commands::Drain => {
            drain::run(core).await?;
        }
        Commands::Discover => {
            discover::run(core).await?;
        }
        Commands::Join { code, language } => {
            session::join(core, &code, &language).await?;
        }
        Commands::Leave => session::leave(core).await?,
        Commands::Status => status::run(core, data_dir).await?,
    }

    Ok(())
}

/// Install a stderr `fmt` subscriber. `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::metadata::LevelFilter::INFO,
        1 => tracing::metadata::LevelFilter::DEBUG,
        _ => tracing::metadata::LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Get the default data directory for medsync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("ai", "medtranslate", "medsync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_offline_translate() {
        let cli = Cli::parse_from(["medsync", "--offline", "translate", "hello", "--to", "es"]);
        assert!(cli.offline);
        match cli.command {
            Commands::Translate {
                text, from, to, context, ..
            } => {
                assert_eq!(text.as_deref(), Some("hello"));
                assert_eq!(from, "en");
                assert_eq!(to, "es");
                assert_eq!(context, "general");
            }
            other => panic!("Expected Translate, got {:?}", other),
        }
    }

    #[test]
    fn text_and_audio_file_conflict() {
        let result = Cli::try_parse_from([
            "medsync", "translate", "hello", "--audio-file", "a.wav", "--to", "es",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_queue_retry() {
        let cli = Cli::parse_from(["medsync", "queue", "retry", "abc"]);
        assert!(matches!(
            cli.command,
            Commands::Queue {
                action: QueueAction::Retry { .. }
            }
        ));
    }

    #[tokio::test]
    async fn mock_translate_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let core = open(
            CoreConfig::default(),
            dir.path(),
            Arc::new(MockApi::new()),
            MockTransport::new(),
            Connectivity::Offline,
        )
        .await
        .unwrap();
        let command = Commands::Translate {
            text: Some("hello".into()),
            audio_file: None,
            from: "en".into(),
            to: "es".into(),
            context: "general".into(),
        };

        execute(&core, command, dir.path()).await.unwrap();

        assert_eq!(core.queue_size().await, 1);
        assert!(dir.path().join(config::STATE_FILE).exists());
    }
}
