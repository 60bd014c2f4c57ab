use std::io::{self, Read};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use diagramify::config::ModelSettings;
use diagramify::diagram::{DiagramType, SchemaRegistry, render_value};
use diagramify::error::{ErrorCode, PipelineError};
use diagramify::llm::LlmClient;
use diagramify::llm::types::LlmError;
use diagramify::rate_limit::InMemoryTrialLimiter;
use diagramify::services::{DiagramModel, DiagramService, LlmDiagramModel};
use diagramify::store::VersionStore;
use diagramify::store::memory::MemoryStore;
use diagramify::store::postgres::PgStore;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{}: {}", .0.error_code(), .0)]
    Pipeline(#[from] PipelineError),
    #[error("LLM client not configured: {0}")]
    Llm(#[from] LlmError),
    #[error("database init failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("cannot render: {0}")]
    Render(#[from] diagramify::diagram::RenderError),
    #[error("unknown diagram type '{0}'")]
    UnknownType(String),
}

#[derive(Parser, Debug)]
#[command(name = "diagramify", about = "Natural-language to Mermaid diagrams")]
struct Cli {
    /// Owner of the diagrams created or read by this invocation.
    #[arg(long, env = "DIAGRAMIFY_OWNER", default_value_t = Uuid::nil())]
    owner: Uuid,

    /// Postgres URL. Without it versions live in memory for this process only.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render structured diagram JSON to Mermaid without calling a model.
    Render {
        #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
        input: String,
    },
    /// Report the best diagram type for a prompt.
    Classify { prompt: String },
    /// Generate and render without saving, as an anonymous trial.
    Preview {
        prompt: String,
        #[arg(long, default_value = "cli")]
        identity: String,
    },
    /// Generate and save diagrams. Without --type the classifier decides.
    Generate {
        prompt: String,
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,
    },
    /// Apply a natural-language edit to the latest version of a lineage.
    Reprompt { version_id: Uuid, edit: String },
    /// Save hand-edited Mermaid code as the next version.
    EditCode {
        version_id: Uuid,
        #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
        input: String,
    },
    /// Latest version of each lineage.
    List,
    /// One version.
    Show { version_id: Uuid },
    /// Versions and conversation log of a lineage.
    History { lineage_id: Uuid },
    /// Remove a lineage with its versions and conversation log.
    Delete { lineage_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let owner = cli.owner;

    match cli.command {
        Command::Render { input } => {
            let value: Value = serde_json::from_str(&read_input(&input)?)?;
            print!("{}", render_value(&value)?);
            Ok(())
        }
        Command::Classify { prompt } => {
            let model = build_model()?;
            let best = model.classify(&prompt).await?;
            print_json(&json!({ "bestType": best, "noRelevantType": best.is_none() }))
        }
        command => {
            let service = build_service(cli.database_url.as_deref()).await?;
            run_service(&service, owner, command).await
        }
    }
}

async fn run_service(service: &DiagramService, owner: Uuid, command: Command) -> Result<(), CliError> {
    match command {
        Command::Preview { prompt, identity } => {
            let outcome = service.preview(&identity, &prompt).await?;
            print_json(&json!({
                "diagrams": outcome.diagrams,
                "failures": outcome.failures,
                "noRelevantType": outcome.no_relevant_type,
                "remainingTrials": outcome.remaining_trials,
            }))
        }
        Command::Generate { prompt, types } => {
            let types = types
                .iter()
                .map(|t| t.parse::<DiagramType>().map_err(|_| CliError::UnknownType(t.clone())))
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = service.generate(owner, &prompt, &types).await?;
            print_json(&json!({
                "versions": outcome.versions,
                "failures": outcome.failures,
                "noRelevantType": outcome.no_relevant_type,
            }))
        }
        Command::Reprompt { version_id, edit } => print_json(&service.reprompt(owner, version_id, &edit).await?),
        Command::EditCode { version_id, input } => {
            let code = read_input(&input)?;
            let outcome = service.edit_code(owner, version_id, &code).await?;
            if !outcome.parsed {
                eprintln!("warning: code could not be parsed; saved without structured data");
            }
            print_json(&outcome.version)
        }
        Command::List => print_json(&service.latest_versions(owner).await?),
        Command::Show { version_id } => print_json(&service.get_version(owner, version_id).await?),
        Command::History { lineage_id } => {
            let versions = service.history(owner, lineage_id).await?;
            let chat = service.chat_history(owner, lineage_id).await?;
            print_json(&json!({ "versions": versions, "chat": chat }))
        }
        Command::Delete { lineage_id } => {
            let removed = service.delete_lineage(owner, lineage_id).await?;
            eprintln!("removed {removed} versions");
            Ok(())
        }
        Command::Render { .. } | Command::Classify { .. } => Ok(()),
    }
}

fn build_model() -> Result<Arc<dyn DiagramModel>, CliError> {
    let llm = LlmClient::from_env()?;
    tracing::info!(model = llm.model(), "LLM client initialized");
    Ok(Arc::new(LlmDiagramModel::new(Arc::new(llm), SchemaRegistry::builtin(), ModelSettings::from_env())))
}

async fn build_service(database_url: Option<&str>) -> Result<DiagramService, CliError> {
    let store: Arc<dyn VersionStore> = match database_url {
        Some(url) => Arc::new(PgStore::new(diagramify::db::init_pool(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set; versions are kept in memory for this run only");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(DiagramService::new(build_model()?, store, Arc::new(InMemoryTrialLimiter::new())))
}

fn read_input(path: &str) -> Result<String, CliError> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
