use std::path::PathBuf;

use clap::{Parser, Subcommand};
use draftkeep_common::telemetry::{self, TelemetryConfig};
use draftkeep_common::{Config, DraftkeepError, FileStore};
use draftkeep_core::{DraftError, FileDraftStore, LocalDraftRecord, LocalDraftStore, StoreError};
use miette::{IntoDiagnostic, Result};

#[derive(Parser)]
#[command(version, about = "Draftkeep - inspect and recover locally autosaved drafts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file (.toml or .json)
    #[arg(long, env = "DRAFTKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Profile directory holding the local draft slot
    #[arg(long, env = "DRAFTKEEP_PROFILE")]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the locally autosaved draft, if any
    Show,
    /// Export the autosaved draft as JSON and optionally clear the slot
    Recover {
        /// File to write the record to (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Delete the local record once written
        #[arg(long)]
        clear: bool,
    },
    /// Delete the locally autosaved draft
    Discard,
    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init(TelemetryConfig::from_env("draftkeep-cli"));
    init_miette();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let file = FileStore::new(&config_path);
    let mut config = Config::load(&file).await?;
    if let Some(profile) = cli.profile {
        config.profile_dir = Some(profile);
    }

    match cli.command {
        Commands::Show => show(&config)?,
        Commands::Recover { out, clear } => recover(&config, out, clear)?,
        Commands::Discard => discard(&config)?,
        Commands::Config { init } => {
            if init {
                config.save(&file).await?;
                println!("Wrote {}", config_path.display());
            } else {
                let rendered = toml::to_string_pretty(&config).into_diagnostic()?;
                print!("{rendered}");
            }
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<FileDraftStore, DraftkeepError> {
    let dir = config.resolved_profile_dir()?;
    let store = FileDraftStore::new(dir, config.autosave.storage_key.clone());
    tracing::debug!(path = %store.path().display(), "using local draft slot");
    Ok(store)
}

fn load_record(store: &FileDraftStore) -> Result<Option<LocalDraftRecord>, DraftkeepError> {
    store.load().map_err(store_error)
}

fn store_error(e: StoreError) -> DraftkeepError {
    DraftError::from(e).into()
}

fn show(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let Some(record) = load_record(&store)? else {
        println!("No local draft at {}", store.path().display());
        return Ok(());
    };

    let title = if record.title.trim().is_empty() {
        "(untitled)"
    } else {
        record.title.as_str()
    };
    println!("Title:    {title}");
    println!(
        "Saved:    {}",
        record
            .saved_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(draft_id) = &record.draft_id {
        println!("Draft id: {draft_id}");
    }
    if !record.tags.is_empty() {
        let tags: Vec<&str> = record.tags.iter().map(|t| t.as_str()).collect();
        println!("Tags:     {}", tags.join(", "));
    }
    println!();
    println!("{}", record.preview(280));
    Ok(())
}

fn recover(config: &Config, out: Option<PathBuf>, clear: bool) -> Result<()> {
    let store = open_store(config)?;
    let Some(record) = load_record(&store)? else {
        return Err(miette::miette!(
            help = "drafts are only kept locally until they reach the server",
            "No local draft to recover at {}",
            store.path().display()
        ));
    };

    let json = serde_json::to_string_pretty(&record).map_err(DraftkeepError::from)?;
    match out {
        Some(path) => {
            std::fs::write(&path, json).map_err(DraftkeepError::from)?;
            println!("Recovered \"{}\" to {}", record.title, path.display());
        }
        None => println!("{json}"),
    }

    if clear {
        store.clear().map_err(store_error)?;
        tracing::info!("local draft cleared after recovery");
    }
    Ok(())
}

fn discard(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    // Corrupt slots load as empty but should still be removable.
    if !store.path().exists() {
        println!("Nothing to discard");
        return Ok(());
    }
    store.clear().map_err(store_error)?;
    println!("Discarded local draft at {}", store.path().display());
    Ok(())
}

fn init_miette() {
    let hook = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }));
    if let Err(e) = hook {
        tracing::debug!(error = %e, "miette hook already installed");
    }
    miette::set_panic_hook();
}
