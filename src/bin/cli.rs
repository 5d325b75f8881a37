use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::Level;

use vault_uri::error::AppError;
use vault_uri::host::fs::FsVault;
use vault_uri::host::memory::{MarkdownIndex, MemoryHost};
use vault_uri::host::Vault;
use vault_uri::identity;
use vault_uri::paths;
use vault_uri::registry::{catalog, execute, CommandOutput};
use vault_uri::settings::{self, UriSettings};
use vault_uri::state::AppState;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "vault-uri-cli",
    about = "Dispatch and build vault URIs from the command line",
    version,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings directory override
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Vault directory (defaults to the current directory)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a URI against the vault
    Dispatch { uri: String },
    /// Build a URI from parameters
    Encode {
        #[arg(long)]
        filepath: Option<String>,
        /// Extra parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        /// Also put the URI on the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Build a URI for the block under a line, adding a block id if needed
    BlockUri {
        filepath: String,
        /// Zero-based line inside the block
        #[arg(long)]
        line: usize,
    },
    /// Print the catalog of dispatch types as JSON
    Types,
    /// Show help for dispatch types
    Help { topic: Option<String> },
    /// Settings management
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Set one setting by key
    SetKey { key: String, value: String },
    /// Allow a foreign handler type
    AllowForeign { kind: String },
    /// Block a foreign handler type
    DenyForeign { kind: String },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got \"{raw}\""))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

// ── State initialization ─────────────────────────────────────────

fn config_dir(cli: &Cli) -> Result<PathBuf, AppError> {
    cli.config_dir
        .clone()
        .or_else(paths::default_config_dir)
        .ok_or_else(|| AppError::internal("no config directory; pass --config-dir"))
}

async fn initialize_state(cli: &Cli) -> Result<(Arc<AppState>, MemoryHost), AppError> {
    let app_config_dir = config_dir(cli)?;
    let loaded = settings::load_settings(&app_config_dir)?;
    let root = match &cli.vault {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let index = Arc::new(MarkdownIndex::new());
    let vault: Arc<dyn Vault> = Arc::new(FsVault::open(root, Arc::clone(&index)).await?);
    let memory = MemoryHost::with_vault(vault, index);
    let state = Arc::new(AppState::new(memory.host(), loaded, app_config_dir));
    Ok((state, memory))
}

// ── Output ───────────────────────────────────────────────────────

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_output(output: &CommandOutput) -> Result<(), AppError> {
    print_json(&serde_json::json!({
        "message": output.message,
        "result": output.result,
    }))
}

/// Notices and clipboard writes have no UI here, so they go to stderr.
fn print_host_effects(memory: &MemoryHost) {
    for message in memory.notifier.messages() {
        eprintln!("notice: {message}");
    }
    if let Some(text) = memory.clipboard.contents() {
        eprintln!("clipboard: {text}");
    }
}

// ── Commands ─────────────────────────────────────────────────────

async fn run(cli: Cli) -> Result<(), AppError> {
    match &cli.command {
        Commands::Dispatch { uri } => {
            let (state, memory) = initialize_state(&cli).await?;
            let result = execute::execute_uri(&state, uri).await;
            print_host_effects(&memory);
            print_output(&result?)
        }
        Commands::Encode { filepath, params, copy } => {
            let (state, memory) = initialize_state(&cli).await?;
            let mut map = IndexMap::new();
            if let Some(path) = filepath {
                map.insert("filepath".to_string(), Value::String(path.clone()));
            }
            for (key, value) in params {
                map.insert(key.clone(), Value::String(value.clone()));
            }
            let uri = if *copy {
                identity::copy_uri(&state, map).await?
            } else {
                identity::generate_uri(&state, map).await?
            };
            print_host_effects(&memory);
            println!("{uri}");
            Ok(())
        }
        Commands::BlockUri { filepath, line } => {
            let (state, memory) = initialize_state(&cli).await?;
            let uri = identity::copy_block_uri(&state, filepath, *line).await?;
            print_host_effects(&memory);
            println!("{uri}");
            Ok(())
        }
        Commands::Types => print_json(&catalog::to_json_schema(None)),
        Commands::Help { topic } => {
            println!("{}", catalog::help_text(topic.as_deref()));
            Ok(())
        }
        Commands::Settings { action } => run_settings(&config_dir(&cli)?, action),
    }
}

fn run_settings(dir: &Path, action: &SettingsAction) -> Result<(), AppError> {
    let mut current: UriSettings = settings::load_settings(dir)?;
    match action {
        SettingsAction::Show => return print_json(&current),
        SettingsAction::SetKey { key, value } => current.set_key(key, value)?,
        SettingsAction::AllowForeign { kind } => {
            current.set_foreign_enabled(kind, true);
        }
        SettingsAction::DenyForeign { kind } => {
            current.set_foreign_enabled(kind, false);
        }
    }
    settings::save_settings(dir, &current)?;
    print_json(&current)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
