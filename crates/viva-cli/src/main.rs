//! # viva
//!
//! Command-line entry point for the viva engine: applies database
//! migrations and prints integrity flags, transcripts and feedback for a
//! session.

#![deny(unsafe_code)]

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use viva_llm::openai::{OpenAiChatProvider, OpenAiConfig};
use viva_runtime::VivaService;
use viva_settings::VivaSettings;
use viva_store::{ConnectionConfig, VivaStore};

/// Viva engine tool.
#[derive(Parser, Debug)]
#[command(name = "viva", about = "Viva engine maintenance and session inspection")]
struct Cli {
    /// Settings file (defaults to `~/.viva/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Database file (overrides settings).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and print the schema version.
    Migrate,
    /// Print the integrity flags of a session, one per line.
    Flags {
        /// Session id.
        session_id: String,
    },
    /// Print a session transcript.
    Transcript {
        /// Session id.
        session_id: String,
        /// Include the examiner's model answers.
        #[arg(long)]
        model_answers: bool,
    },
    /// Print the AI and teacher feedback of a session.
    Feedback {
        /// Session id.
        session_id: String,
    },
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<VivaSettings> {
    let path = path.map_or_else(viva_settings::settings_path, Path::to_path_buf);
    viva_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn init_logging(settings: &VivaSettings, override_level: Option<&str>) {
    let level = override_level.unwrap_or(settings.logging.level.as_str());
    if settings.logging.json {
        viva_core::logging::init_json_subscriber(level);
    } else {
        viva_core::logging::init_subscriber(level);
    }
}

fn open_store(settings: &VivaSettings, db: Option<&Path>) -> Result<VivaStore> {
    let db_path = db.map_or_else(|| PathBuf::from(&settings.database.path), Path::to_path_buf);
    ensure_parent_dir(&db_path)?;
    let config = ConnectionConfig {
        pool_size: settings.database.pool_size,
        busy_timeout_ms: settings.database.busy_timeout_ms,
        ..ConnectionConfig::default()
    };
    VivaStore::open(&db_path.to_string_lossy(), &config)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

fn build_service(store: VivaStore, settings: VivaSettings) -> VivaService {
    let llm = &settings.llm;
    let api_key = llm.api_key();
    if api_key.is_none() {
        tracing::debug!(env = %llm.api_key_env, "no API key in environment");
    }
    let provider = OpenAiChatProvider::new(OpenAiConfig {
        base_url: llm.base_url.clone(),
        api_key,
        model: llm.model.clone(),
        temperature: llm.temperature,
        max_tokens: llm.max_tokens,
    });
    VivaService::new(Arc::new(store), Arc::new(provider), settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = load_settings(args.settings.as_deref())?;
    init_logging(&settings, args.log_level.as_deref());

    let store = open_store(&settings, args.db.as_deref())?;
    let service = build_service(store, settings);
    let output = run(&service, &args.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn run(service: &VivaService, command: &Command) -> Result<String> {
    Ok(match command {
        Command::Migrate => format!(
            "schema version {}",
            service.store().schema_version().context("Failed to read schema version")?
        ),
        Command::Flags { session_id } => {
            render::flags(&service.compute_flags(session_id).context("Failed to compute flags")?)
        }
        Command::Transcript {
            session_id,
            model_answers,
        } => render::transcript(
            &service
                .transcript(session_id, *model_answers)
                .context("Failed to load transcript")?,
        ),
        Command::Feedback { session_id } => {
            render::feedback(&service.get_feedback(session_id).context("Failed to load feedback")?)
        }
    })
}
