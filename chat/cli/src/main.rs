//! LawLab Chat - Terminal Client for the Legal Research Assistant
//!
//! Submits research questions to the LawLab backend and streams the
//! answers, with their citations, to the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Ask one question, then keep reading questions from stdin
//! lawlab-chat "Research precedents for breach of contract damages"
//!
//! # Custom backend
//! lawlab-chat --base-url https://lawlab.example.com
//!
//! # Print finished answers as HTML
//! lawlab-chat --html < questions.txt
//!
//! # Verbose logging
//! RUST_LOG=debug lawlab-chat
//! ```
//!
//! # Signals
//!
//! - `SIGINT`: Abandon the turn in progress and exit

mod printer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use chat_core::config::{default_config_path, load_config_from_path};
use chat_core::{
    ChatError, ChatUpdate, ConfigOverrides, ConversationController, HttpBackend, Liveness,
    TurnOutcome,
};

use printer::Printer;

/// Suggested research questions
const EXAMPLE_QUERIES: [&str; 4] = [
    "Find case law on employment discrimination in tech companies",
    "Analyze recent Supreme Court decisions on First Amendment rights",
    "Research precedents for breach of contract damages",
    "Compare state vs federal jurisdiction in intellectual property disputes",
];

/// LawLab Chat - Terminal client for the LawLab legal research assistant
#[derive(Parser, Debug)]
#[command(name = "lawlab-chat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Backend base URL (scheme, host and port)
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "LAWLAB_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not save the conversation on the backend
    #[arg(long)]
    no_create_conversation: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print finished answers as HTML
    #[arg(long)]
    html: bool,

    /// List example research questions and exit
    #[arg(long)]
    examples: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "LAWLAB_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Question to ask before reading stdin
    query: Vec<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.base_url {
            overrides = overrides.with_base_url(url);
        }
        if self.no_create_conversation {
            overrides = overrides.with_create_on_first_turn(false);
        }
        if let Some(secs) = self.timeout {
            overrides = overrides.with_request_timeout_secs(secs);
        }
        overrides
    }

    fn initial_query(&self) -> Option<String> {
        let query = self.query.join(" ");
        if query.trim().is_empty() {
            None
        } else {
            Some(query)
        }
    }
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so answers on stdout stay pipeable.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_directives(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Filter directives for the client and library targets
fn log_directives(level: &str) -> String {
    format!("lawlab_chat={level},chat_core={level}")
}

/// Submit one query and report rejections
async fn ask(controller: &ConversationController<HttpBackend>, query: &str) -> bool {
    match controller.submit(query).await {
        Ok(TurnOutcome::Completed { .. } | TurnOutcome::Failed { .. }) => true,
        Ok(TurnOutcome::Disposed) | Err(ChatError::Disposed) => false,
        Err(e) => {
            warn!(error = %e, "Query rejected");
            true
        }
    }
}

/// Read questions from stdin until EOF or disposal
async fn read_queries(
    controller: &ConversationController<HttpBackend>,
    liveness: &Liveness,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            biased;
            () = liveness.disposed() => break,
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };

        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        if !ask(controller, &line).await {
            break;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.examples {
        for query in EXAMPLE_QUERIES {
            println!("{query}");
        }
        return Ok(());
    }

    init_logging(&args.log_level);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(base_url = %config.base_url, source = %config.source(), "Configuration loaded");

    let backend = HttpBackend::from_config(&config).context("Failed to build HTTP client")?;

    // Controller -> terminal
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatUpdate>();
    let html = args.html;
    let printer = tokio::spawn(async move {
        let mut printer = Printer::new(std::io::stdout(), html);
        while let Some(update) = rx.recv().await {
            if let Err(e) = printer.handle(&update) {
                error!(error = %e, "Failed to write to stdout");
                break;
            }
        }
    });

    let controller = ConversationController::new(backend, config, tx);
    let liveness = controller.liveness();

    let signal_liveness = liveness.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received SIGINT, shutting down");
                signal_liveness.dispose();
            }
            Err(e) => warn!(error = %e, "Failed to install SIGINT handler"),
        }
    });

    let mut keep_going = true;
    if let Some(query) = args.initial_query() {
        keep_going = ask(&controller, &query).await;
    }
    if keep_going {
        read_queries(&controller, &liveness).await?;
    }

    // Closing the channel lets the printer drain and exit
    drop(controller);
    if let Err(e) = printer.await {
        warn!(error = %e, "Printer task failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_initial_query_joins_words() {
        let args = Args::parse_from(["lawlab-chat", "breach", "of", "contract"]);
        assert_eq!(args.initial_query().as_deref(), Some("breach of contract"));

        let args = Args::parse_from(["lawlab-chat"]);
        assert_eq!(args.initial_query(), None);
    }

    #[test]
    fn test_default_log_directives() {
        let args = Args::parse_from(["lawlab-chat"]);
        assert_eq!(args.log_level, "info");
        assert_eq!(
            log_directives(&args.log_level),
            "lawlab_chat=info,chat_core=info"
        );
    }

    #[test]
    fn test_overrides_from_flags() {
        let args = Args::parse_from([
            "lawlab-chat",
            "--base-url",
            "https://lawlab.example.com/",
            "--no-create-conversation",
            "--timeout",
            "30",
        ]);
        let overrides = args.overrides();
        assert_eq!(
            overrides.base_url.as_deref(),
            Some("https://lawlab.example.com/")
        );
        assert_eq!(overrides.create_on_first_turn, Some(false));
        assert_eq!(overrides.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_no_flags_no_overrides() {
        let args = Args::parse_from(["lawlab-chat"]);
        let overrides = args.overrides();
        assert!(overrides.base_url.is_none());
        assert!(overrides.create_on_first_turn.is_none());
    }
}
