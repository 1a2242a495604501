//! Storyline - story versioning and variations.
//!
//! This is the main entry point for the storyline CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use std::path::{Path, PathBuf};
use storyline_core::{Config, Library};
use storyline_util::log::LogLevel;
use tracing::info;

#[derive(Parser)]
#[command(name = "storyline")]
#[command(author, version, about = "Story versioning and variation engine", long_about = None)]
struct Cli {
    /// Library directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Extra configuration file, applied last
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke a named command with a JSON payload
    Invoke {
        /// Command name (see `storyline commands`)
        command: String,
        /// JSON payload (defaults to `{}`)
        payload: Option<String>,
    },
    /// List the available commands
    Commands,
    /// List stories
    Stories,
    /// Show a story's variations
    Show {
        /// Story ID
        story_id: String,
    },
    /// Show configuration
    Config,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Version => {
            print_version();
            return Ok(());
        }
        Commands::Commands => {
            list_commands();
            return Ok(());
        }
        _ => {}
    }

    let (config, data_dir, sources) =
        load_config(cli.data_dir.as_deref(), cli.config.as_deref()).await?;
    let level: LogLevel = config.log_level.map(Into::into).unwrap_or_default();
    let log_file = init_logging(cli.verbose, level, &data_dir);
    if let Some(path) = &log_file {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    match cli.command {
        Commands::Config => show_config(&config, &data_dir, &sources),
        Commands::Invoke { command, payload } => {
            let library = Library::open(&data_dir, &config)?;
            info!(command = %command, "Invoking");
            invoke_command(library, &command, payload.as_deref()).await
        }
        Commands::Stories => {
            let library = Library::open(&data_dir, &config)?;
            list_stories(&library).await
        }
        Commands::Show { story_id } => {
            let library = Library::open(&data_dir, &config)?;
            show_story(&library, &story_id).await
        }
        Commands::Commands | Commands::Version => Ok(()),
    }
}

/// Resolve the library directory and load configuration for it.
///
/// Sources in order: global config, `STORYLINE_CONFIG_CONTENT`, the library's
/// own `storyline.json[c]`, then `--config`.
async fn load_config(
    data_dir: Option<&Path>,
    extra: Option<&Path>,
) -> anyhow::Result<(Config, PathBuf, Vec<PathBuf>)> {
    let data_dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => Config::load(None).await?.0.resolved_data_dir()?,
    };

    let (mut config, mut sources) = Config::load(Some(&data_dir)).await?;
    if let Some(path) = extra {
        config = config.merge(Config::load_file(path).await?);
        sources.push(path.to_path_buf());
    }

    Ok((config, data_dir, sources))
}

/// Show configuration sources and the effective configuration.
fn show_config(config: &Config, data_dir: &Path, sources: &[PathBuf]) -> anyhow::Result<()> {
    println!("Library: {}", data_dir.display());
    println!();

    println!("Configuration sources:");
    if sources.is_empty() {
        println!("  (none)");
    } else {
        for source in sources {
            println!("  {}", source.display());
        }
    }
    println!();

    let versioning = config.versioning()?;
    println!("Current configuration:");
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    println!("Effective versioning:");
    println!("{}", serde_json::to_string_pretty(&versioning)?);

    Ok(())
}

/// Print version information.
fn print_version() {
    println!("storyline {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Versions, variations and merges for long-form writing.");
}
