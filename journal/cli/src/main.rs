//! Journal Reflect
//!
//! Streams a reflection on one or more journal entries from the configured
//! backend and prints it to stdout as it arrives. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Reflect on today's entry with the configured backend
//! journal-reflect reflect entries/2026-10-17.md
//!
//! # Ask a question about a week of entries, using a local Ollama model
//! journal-reflect --mode local --model qwen3 ask --question "What kept me up?" entries/*.md
//!
//! # Continue from an earlier reflection
//! journal-reflect followup --reflection last.txt entries/2026-10-17.md
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use journal_core::{
    load_config_from_path, BackendMode, ChannelObserver, ConfigOverrides, HttpTransport,
    ReflectionMessage, ReflectionRequest, SessionController,
};

/// Separator placed between entries read from separate files
const ENTRY_SEPARATOR: &str = "\n\n---\n\n";

/// Journal Reflect - stream an LLM reflection on journal entries
#[derive(Parser, Debug)]
#[command(name = "journal-reflect")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Backend to use (remote or local)
    #[arg(long, value_name = "MODE")]
    mode: Option<BackendMode>,

    /// Model name for the active backend
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// API key for the remote backend
    #[arg(long, env = "OPENAI_API_KEY", value_name = "KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reflect on journal entries
    Reflect {
        /// Entry files, joined in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a question about journal entries
    Ask {
        /// The question to ask
        #[arg(short, long)]
        question: String,

        /// Entry files, joined in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Follow up on an earlier reflection
    Followup {
        /// File holding the previous reflection
        #[arg(short, long, value_name = "FILE")]
        reflection: PathBuf,

        /// Entry files, joined in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Initialize logging on stderr so stdout carries only the reflection
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("journal_core={level},journal_cli={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn read_entries(files: &[PathBuf]) -> Result<String> {
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        entries.push(read_file(file).await?);
    }
    Ok(entries.join(ENTRY_SEPARATOR))
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Part of `text` not yet printed
///
/// Each stream update carries the whole accumulated text, so normally only
/// the suffix past `printed` is new.
fn unseen_suffix<'a>(printed: &str, text: &'a str) -> &'a str {
    text.strip_prefix(printed).unwrap_or(text)
}

/// How a streamed session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Interrupted,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Self::Completed | Self::Interrupted => ExitCode::SUCCESS,
            Self::Failed => ExitCode::FAILURE,
        }
    }
}

/// Print session messages to `out` until the session ends or `interrupted`
/// resolves
async fn relay<W, F>(
    rx: &mut UnboundedReceiver<ReflectionMessage>,
    out: &mut W,
    interrupted: F,
) -> Result<Outcome>
where
    W: AsyncWrite + Unpin,
    F: Future,
{
    let mut printed = String::new();
    tokio::pin!(interrupted);

    let outcome = loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(ReflectionMessage::Stream { text }) => {
                    let suffix = unseen_suffix(&printed, &text);
                    out.write_all(suffix.as_bytes()).await?;
                    out.flush().await?;
                    printed = text;
                }
                Some(ReflectionMessage::Complete) => {
                    debug!(visible_len = printed.len(), "Reflection finished");
                    break Outcome::Completed;
                }
                Some(ReflectionMessage::Error { kind, message }) => {
                    eprintln!("{}: {message}", kind.description());
                    break Outcome::Failed;
                }
                None => {
                    warn!("Session ended without a result");
                    break Outcome::Failed;
                }
            },
            _ = &mut interrupted => {
                info!("Interrupted, cancelling reflection");
                break Outcome::Interrupted;
            }
        }
    };

    if !printed.is_empty() {
        out.write_all(b"\n").await?;
        out.flush().await?;
    }
    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = load_config_from_path(args.config.clone()).context("Failed to load config")?;
    let mut overrides = ConfigOverrides::new();
    if let Some(mode) = args.mode {
        overrides = overrides.with_mode(mode);
    }
    if let Some(model) = args.model.clone() {
        overrides = overrides.with_model(model);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(mode = %config.mode, source = %config.source(), "Configuration loaded");

    let backend = config.backend(args.api_key.as_deref());
    let request = match &args.command {
        Command::Reflect { files } => {
            ReflectionRequest::reflection(backend, read_entries(files).await?)
        }
        Command::Ask { question, files } => {
            ReflectionRequest::question(backend, read_entries(files).await?, question.clone())
        }
        Command::Followup { reflection, files } => ReflectionRequest::followup(
            backend,
            read_entries(files).await?,
            read_file(reflection).await?,
        ),
    };

    let transport = HttpTransport::current(config.connect_timeout)
        .context("No tokio runtime available for the HTTP transport")?;
    let controller = SessionController::with_builder(transport, config.request_builder());

    let (observer, mut rx) = ChannelObserver::channel();
    if let Err(e) = controller.start(request, Arc::new(observer)) {
        eprintln!("{}: {}", e.kind().description(), e.message());
        return Ok(ExitCode::FAILURE);
    }

    let mut stdout = tokio::io::stdout();
    let outcome = relay(&mut rx, &mut stdout, tokio::signal::ctrl_c()).await?;
    if outcome == Outcome::Interrupted {
        controller.cancel();
    }

    Ok(outcome.exit_code())
}
