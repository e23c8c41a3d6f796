//! Clausewise CLI - terminal front end for the contract-analysis dashboard.
//!
//! Each invocation mounts the dashboard from persisted state, performs one
//! action, and exits.

mod commands;

use clap::Parser;
use clausewise_core::render::TabSelection;
use clausewise_core::{AnalysisKind, DisplayTab};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Clausewise: contract risk analysis from the terminal
#[derive(Parser, Debug)]
#[command(name = "clausewise", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (for `.clausewise/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Upload a contract and analyze it under the active (or given) selection
    Analyze {
        /// Contract file (pdf, doc, docx, txt)
        file: PathBuf,
        /// Analysis kind, by label or slug (e.g. risk-assessment)
        #[arg(short, long)]
        kind: Option<AnalysisKind>,
        /// Question text for the custom-query kind
        #[arg(long)]
        query: Option<String>,
        /// API key for this run only; not saved
        #[arg(long)]
        api_key: Option<String>,
        /// Tab to print: analysis, key-points, recommendations, or all
        #[arg(short, long, value_parser = parse_tab_selection)]
        tab: Option<TabSelection>,
    },
    /// Print the stored result for the active (or given) selection
    Show {
        /// Analysis kind to look up instead of the active one
        #[arg(short, long)]
        kind: Option<AnalysisKind>,
        /// Question text for the custom-query kind
        #[arg(long)]
        query: Option<String>,
        /// Tab to print: analysis, key-points, recommendations, or all
        #[arg(short, long, value_parser = parse_tab_selection)]
        tab: Option<TabSelection>,
    },
    /// Change the active analysis kind
    Select {
        #[arg(short, long)]
        kind: AnalysisKind,
        /// Question text for the custom-query kind
        #[arg(long)]
        query: Option<String>,
    },
    /// Manage the saved API key
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
    /// Forget the stored result for the active selection ("new upload")
    Reset,
    /// Clear every stored result and setting
    Clear,
    /// Check that the analysis backend is reachable
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CredentialsAction {
    /// Save an API key
    Set {
        /// The OpenAI API key forwarded to the backend
        key: String,
    },
    /// Remove the saved API key
    Clear,
    /// Report whether an API key is saved
    Status,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the current configuration
    Show,
}

/// `all` or a single tab name.
fn parse_tab_selection(s: &str) -> Result<TabSelection, String> {
    if s.trim().eq_ignore_ascii_case("all") {
        Ok(TabSelection::All)
    } else {
        s.parse::<DisplayTab>().map(TabSelection::One)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "clausewise", "clausewise")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "clausewise.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref(), cli.quiet).await
}
