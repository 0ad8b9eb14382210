//! `foreman`: submit tasks to the worker pool from the command line.

mod config;

use clap::{Parser, Subcommand};
use config::{ForemanConfig, API_KEY_ENV};
use foreman_agent::{create_backend, GenerationBackend};
use foreman_core::{Archetype, Priority, TaskCategory};
use foreman_orchestrator::profiles::capabilities;
use foreman_orchestrator::{
    GenerationDecomposer, Orchestrator, TaskAnalyzer, TaskExecutor, TaskRequest, WorkerPool,
    WorkerProfileFactory,
};
use foreman_store::{FileRecordStore, RecordSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "foreman", about = "Foreman: task routing over a pool of specialized workers")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "foreman.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a task, run it on a matching worker and print the outcome
    Submit {
        description: String,
        /// low, medium or high (defaults to executor.default_priority)
        #[arg(short, long)]
        priority: Option<Priority>,
        /// Preset category, e.g. code_generation
        #[arg(long)]
        category: Option<TaskCategory>,
    },
    /// Print the analysis of a task without running it
    Analyze {
        description: String,
        #[arg(short, long)]
        priority: Option<Priority>,
    },
    /// List worker archetypes with their capabilities and generation parameters
    Profiles,
    /// Report availability of the configured generation providers
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = ForemanConfig::load(&cli.config).await?;
    config.apply_api_key(std::env::var(API_KEY_ENV).ok());
    config.validate()?;

    match cli.command {
        Commands::Submit {
            description,
            priority,
            category,
        } => {
            let orchestrator = build_orchestrator(&config).await?;
            let mut request = TaskRequest::new(description)
                .with_priority(priority.unwrap_or(config.executor.default_priority));
            if let Some(category) = category {
                request = request.with_category(category);
            }
            let outcome = orchestrator.submit(request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Analyze {
            description,
            priority,
        } => {
            let analyzer = build_analyzer(&config, None)?;
            let analysis = analyzer
                .analyze(
                    &description,
                    priority.unwrap_or(config.executor.default_priority),
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Profiles => {
            let factory = WorkerProfileFactory::with_overrides(config.profile_overrides()?);
            let profiles: Vec<serde_json::Value> = Archetype::ALL
                .into_iter()
                .map(|archetype| {
                    serde_json::json!({
                        "archetype": archetype,
                        "name": archetype.display_name(),
                        "capabilities": capabilities(archetype),
                        "generation": factory.generation_params(archetype),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        Commands::Health => {
            let backend = create_backend(&config.backend)?;
            let health = backend.health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}

fn build_analyzer(
    config: &ForemanConfig,
    backend: Option<&Arc<dyn GenerationBackend>>,
) -> anyhow::Result<TaskAnalyzer> {
    let analyzer = TaskAnalyzer::new()?;
    Ok(match backend {
        Some(backend) if config.analyzer.use_backend_decomposition => analyzer.with_decomposer(
            Arc::new(GenerationDecomposer::new(Arc::clone(backend))),
            config.analyzer.decomposition_timeout(),
        ),
        _ => analyzer,
    })
}

async fn build_orchestrator(config: &ForemanConfig) -> anyhow::Result<Orchestrator> {
    let backend = create_backend(&config.backend)?;
    let store: Arc<dyn RecordSink> = Arc::new(FileRecordStore::new(&config.data_dir).await?);
    info!(data_dir = %config.data_dir.display(), "Record store ready");

    let factory = WorkerProfileFactory::with_overrides(config.profile_overrides()?);
    let pool = Arc::new(
        WorkerPool::new(factory, config.pool.clone()).with_sink(Arc::clone(&store)),
    );
    let executor = TaskExecutor::new(Arc::clone(&backend), pool, config.backend.timeout())
        .with_sink(store);
    let analyzer = build_analyzer(config, Some(&backend))?;

    Ok(Orchestrator::new(
        analyzer,
        executor,
        config.executor.max_concurrent_tasks,
    ))
}
