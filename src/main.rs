use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use graphrun_core::config::AppConfig;
use graphrun_core::graph::GraphDefinition;
use graphrun_core::types::{RunStatus, StateMap};
use graphrun_engine::Engine;
use graphrun_gateway::GatewayServer;
use graphrun_tools::CapabilityRegistry;

#[derive(Parser)]
#[command(name = "graphrun", version, about = "Workflow graph execution engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "graphrun.toml", env = "GRAPHRUN_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Execute a graph definition file to completion
    Run {
        /// JSON graph definition
        graph: PathBuf,
        /// Initial state as a JSON object
        #[arg(long)]
        state: Option<String>,
    },
    /// List registered capabilities
    Tools,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("graphrun=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "graphrun", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", config.to_toml()?);
        }
        Commands::Tools => {
            let registry = CapabilityRegistry::with_builtins();
            for info in registry.describe() {
                println!(
                    "{:<24} {:<11} {}",
                    info.name,
                    format!("{:?}", info.mode).to_lowercase(),
                    info.description
                );
            }
        }
        Commands::Run { graph, state } => {
            let status = run_file(&config, &graph, state.as_deref()).await?;
            if status != RunStatus::Finished {
                std::process::exit(1);
            }
        }
        Commands::Serve { bind } => {
            let mut gateway_config = config.gateway.clone();
            if let Some(bind) = bind {
                gateway_config.bind = bind;
            }
            let engine = Arc::new(Engine::in_memory(
                CapabilityRegistry::with_builtins(),
                config.engine.clone(),
            ));
            info!(bind = %gateway_config.bind, "Starting HTTP gateway");
            let server = GatewayServer::new(gateway_config, engine);

            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Load a graph file, run it in-process, and print the final run as JSON.
async fn run_file(
    config: &AppConfig,
    path: &Path,
    state: Option<&str>,
) -> anyhow::Result<RunStatus> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph file {}", path.display()))?;
    let definition: GraphDefinition = serde_json::from_str(&content)
        .with_context(|| format!("parsing graph file {}", path.display()))?;
    let initial_state: StateMap = match state {
        Some(raw) => serde_json::from_str(raw).context("--state must be a JSON object")?,
        None => StateMap::new(),
    };

    let engine = Engine::in_memory(CapabilityRegistry::with_builtins(), config.engine.clone());
    let graph_id = engine.create_graph(definition);
    let run = engine.run_to_completion(&graph_id, initial_state).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "run_id": run.run_id,
            "status": run.status,
            "state": run.state,
            "log": run.log,
        }))?
    );
    Ok(run.status)
}
