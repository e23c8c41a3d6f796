//! CLI subcommand handlers.

use std::path::Path;

use clausewise_core::config::{
    ClientConfig, config_exists, load_config, load_config_file, workspace_config_path,
};
use clausewise_core::render::{RenderOptions, TabSelection, render_result, render_snapshot};
use clausewise_core::{
    AnalysisKind, ContractFile, Dashboard, DashboardSnapshot, DashboardState, HttpAnalysisClient,
};
use tracing::warn;

use crate::{Commands, ConfigAction, CredentialsAction};

/// Everything one invocation needs, mounted from persisted state.
struct Session {
    config: ClientConfig,
    dashboard: Dashboard,
}

impl Session {
    fn open(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<Self> {
        let config = resolve_config(workspace, config_file)?;
        for warning in config.validate() {
            warn!("{warning}");
        }
        let dashboard = Dashboard::from_config(&config)?;
        Ok(Self { config, dashboard })
    }

    fn render_options(&self, tabs: Option<TabSelection>) -> RenderOptions {
        RenderOptions {
            show_risk_level: self.config.ui.show_risk_level,
            tabs: tabs.unwrap_or(TabSelection::One(self.dashboard.active_tab())),
        }
    }

    /// Persist an explicit single-tab choice as the active tab.
    fn remember_tab(&self, tabs: Option<TabSelection>) {
        if let Some(TabSelection::One(tab)) = tabs {
            self.dashboard.set_active_tab(tab);
        }
    }

    fn apply_selection(
        &self,
        kind: Option<AnalysisKind>,
        query: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Some(kind) = kind {
            self.dashboard.select_kind(kind)?;
        }
        if let Some(query) = query {
            self.dashboard.set_custom_query(query)?;
        }
        Ok(())
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Analyze {
            file,
            kind,
            query,
            api_key,
            tab,
        } => {
            let session = Session::open(workspace, config_file)?;
            session.apply_selection(kind, query.as_deref())?;
            if let Some(key) = api_key {
                session.dashboard.use_session_credentials(&key)?;
            }
            let contract = ContractFile::read(&file)
                .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", file.display(), e))?;

            if !quiet {
                eprintln!(
                    "Analyzing {} ({}) as {}...",
                    contract.file_name,
                    human_size(contract.size()),
                    session.dashboard.kind()
                );
            }
            let result = session.dashboard.submit(&contract).await?;
            session.remember_tab(tab);
            print!("{}", render_result(&result, &session.render_options(tab)));
            Ok(())
        }
        Commands::Show { kind, query, tab } => {
            let session = Session::open(workspace, config_file)?;
            let snapshot = match kind {
                // Look up another slot without changing the saved selection.
                Some(kind) => {
                    let result = session.dashboard.store().load(kind, query.as_deref());
                    DashboardSnapshot {
                        state: if result.is_some() {
                            DashboardState::Ready
                        } else {
                            DashboardState::Empty
                        },
                        kind,
                        custom_query: query.unwrap_or_default(),
                        has_credentials: session.dashboard.has_credentials(),
                        active_tab: session.dashboard.active_tab(),
                        result,
                    }
                }
                None => session.dashboard.snapshot(),
            };
            session.remember_tab(tab);
            print!("{}", render_snapshot(&snapshot, &session.render_options(tab)));
            Ok(())
        }
        Commands::Select { kind, query } => {
            let session = Session::open(workspace, config_file)?;
            session.apply_selection(Some(kind), query.as_deref())?;
            if kind.is_custom() && session.dashboard.custom_query().trim().is_empty() && !quiet {
                eprintln!("Note: pass --query before analyzing with {kind}.");
            }
            print!(
                "{}",
                render_snapshot(&session.dashboard.snapshot(), &session.render_options(None))
            );
            Ok(())
        }
        Commands::Credentials { action } => {
            handle_credentials(action, Session::open(workspace, config_file)?)
        }
        Commands::Reset => {
            let session = Session::open(workspace, config_file)?;
            session.dashboard.new_upload()?;
            println!(
                "Cleared the stored result for {}. Ready for a new upload.",
                session.dashboard.kind()
            );
            Ok(())
        }
        Commands::Clear => {
            let session = Session::open(workspace, config_file)?;
            session.dashboard.clear_all()?;
            println!("All stored results, settings, and the saved API key were removed.");
            Ok(())
        }
        Commands::Health => {
            let config = resolve_config(workspace, config_file)?;
            let url = config.backend.health_url();
            let client = HttpAnalysisClient::new(&config.backend)?;
            match client.health().await {
                Ok(status) => {
                    match status.service {
                        Some(service) => println!("{}: {} ({})", url, status.status, service),
                        None => println!("{}: {}", url, status.status),
                    }
                    Ok(())
                }
                Err(e) => anyhow::bail!("Backend at {} is not healthy: {}", url, e),
            }
        }
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

fn handle_credentials(action: CredentialsAction, session: Session) -> anyhow::Result<()> {
    match action {
        CredentialsAction::Set { key } => {
            session.dashboard.save_credentials(&key)?;
            println!("API key saved.");
        }
        CredentialsAction::Clear => {
            session.dashboard.clear_credentials();
            println!("API key removed.");
        }
        CredentialsAction::Status => {
            if session.dashboard.has_credentials() {
                println!("API key: configured");
            } else {
                println!("API key: not configured (run `clausewise credentials set <KEY>`)");
            }
        }
    }
    Ok(())
}

fn resolve_config(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<ClientConfig> {
    match config_file {
        Some(path) => Ok(load_config_file(path, Some(workspace))?),
        None => load_config(Some(workspace), None)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e)),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let toml_str = toml::to_string_pretty(&ClientConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", show_config(workspace, config_file)?);
            Ok(())
        }
    }
}

/// The merged configuration as TOML, headed by a comment when no config
/// file contributed to it.
fn show_config(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<String> {
    let config = resolve_config(workspace, config_file)?;
    let toml_str = toml::to_string_pretty(&config)?;
    if config_file.is_none() && !config_exists(Some(workspace)) {
        return Ok(format!(
            "# No configuration file found; showing defaults.\n{toml_str}"
        ));
    }
    Ok(toml_str)
}

fn human_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}
