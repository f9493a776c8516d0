//! CLI command definitions for agora.
//!
//! `run` initializes a fresh agent population and drives the sequential
//! tick loop; `replay` reconstructs per-tick opinion series from the
//! artifacts a finished run leaves behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::config::{SimulationConfig, DEFAULT_MODEL};
use crate::conversation::ConversationOrchestrator;
use crate::llm::{AnthropicProvider, BackendAdapter, BackendKind};
use crate::transcript::{discover_initial_opinions, parse_transcript, reconstruct};

/// Opinion dynamics driven by LLM-agent conversations.
#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "Simulate opinion dynamics through pairwise LLM-agent conversations")]
#[command(version)]
#[command(
    long_about = "agora runs a population of LLM-backed agents that argue about a topic in \
pairwise three-turn conversations, updating a bounded opinion score after each exchange.\n\n\
Runs leave a per-agent memory directory and an append-only transcript behind; the replay \
command turns those artifacts into per-tick opinion series for analysis.\n\nExample usage:\n  \
agora run --topic \"universal basic income\" --agents 10 --ticks 50\n  \
agora replay transcript.txt --final-only"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run a simulation: seed agents, then one conversation per tick.
    Run(RunArgs),

    /// Rebuild per-tick opinion series from a finished run's artifacts.
    ///
    /// Reads initial opinions from the agent memory directory, replays the
    /// transcript with carry-forward semantics and emits the series as JSON.
    Replay(ReplayArgs),
}

/// Arguments for `agora run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Discussion topic the agents argue about.
    #[arg(short, long)]
    pub topic: String,

    /// Number of agents in the population.
    #[arg(short = 'n', long, default_value = "10")]
    pub agents: u32,

    /// Number of ticks; each tick runs one pairwise conversation.
    #[arg(long, default_value = "50")]
    pub ticks: u64,

    /// Model identifier passed to the backend.
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Text-generation backend ("ollama" or "anthropic").
    #[arg(short, long, default_value = "ollama")]
    pub backend: BackendKind,

    /// Directory for per-agent memory files.
    #[arg(long, default_value = "agent_memories")]
    pub memory_dir: PathBuf,

    /// Path of the conversation transcript.
    #[arg(long, default_value = "transcript.txt")]
    pub transcript: PathBuf,

    /// Path of the opinion-parse failure log.
    #[arg(long, default_value = "parse_failures.log")]
    pub failure_log: PathBuf,

    /// Number of recent memory records included in prompts.
    #[arg(short = 'w', long, default_value = "5")]
    pub window: usize,

    /// Token budget for each generated turn.
    #[arg(long, default_value = "300")]
    pub max_tokens: u32,

    /// RNG seed for reproducible pairing, initialization and fallback noise.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Anthropic API key, used with `--backend anthropic` (can also be set
    /// via ANTHROPIC_API_KEY env var).
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    pub api_key: Option<String>,
}

/// Arguments for `agora replay`.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Path to the transcript of a finished run.
    #[arg(default_value = "transcript.txt")]
    pub transcript: PathBuf,

    /// Directory of agent memory files (default: `agent_memories` next to
    /// the transcript).
    #[arg(long)]
    pub memory_dir: Option<PathBuf>,

    /// Write the JSON output here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit only the final per-agent opinions.
    #[arg(long)]
    pub final_only: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// Convenience wrapper; for control over logging initialization, use
/// `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_simulation_command(args).await,
        Commands::Replay(args) => run_replay_command(args).await,
    }
}

async fn run_simulation_command(args: RunArgs) -> anyhow::Result<()> {
    if args.agents < 2 {
        anyhow::bail!("at least 2 agents are required for pairwise conversations");
    }
    if args.topic.trim().is_empty() {
        anyhow::bail!("topic must not be empty");
    }

    let mut config = SimulationConfig::new(args.topic)
        .with_model(args.model)
        .with_backend(args.backend)
        .with_memory_dir(args.memory_dir)
        .with_transcript_path(args.transcript)
        .with_failure_log_path(args.failure_log)
        .with_memory_window(args.window)
        .with_max_output_tokens(args.max_tokens);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let orchestrator = match (config.backend, args.api_key) {
        (BackendKind::Anthropic, Some(key)) => {
            let provider = AnthropicProvider::new(Some(key), config.model.clone());
            ConversationOrchestrator::from_config_with_backend(
                config,
                BackendAdapter::new(Arc::new(provider)),
            )
        }
        _ => ConversationOrchestrator::from_config(config),
    };

    info!(
        topic = %orchestrator.config().topic,
        model = %orchestrator.config().model,
        backend = orchestrator.backend().provider_name(),
        agents = args.agents,
        ticks = args.ticks,
        "starting simulation"
    );

    orchestrator.initialize_agents(args.agents).await?;

    let mut rng = match orchestrator.config().seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    };
    for tick in 1..=args.ticks {
        let agent_a = rng.random_range(0..args.agents);
        // Offset pairing keeps the draw uniform over distinct partners.
        let offset = rng.random_range(1..args.agents);
        let agent_b = (agent_a + offset) % args.agents;

        let outcome = orchestrator.run_conversation(agent_a, agent_b, tick).await?;
        info!(
            tick,
            agent_a,
            agent_b,
            opinion_a = outcome.opinion_a,
            opinion_b = outcome.opinion_b,
            snippet = %outcome.snippet,
            "conversation finished"
        );
    }

    let parser = orchestrator.parser();
    if parser.failures() > 0 {
        warn!(
            failures = parser.failures(),
            attempts = parser.attempts(),
            failure_rate = parser.failure_rate(),
            failure_log = %orchestrator.config().failure_log_path.display(),
            "some opinion extractions fell back to bounded noise"
        );
    } else {
        info!(
            attempts = parser.attempts(),
            "all opinion extractions parsed cleanly"
        );
    }
    info!(
        transcript = %orchestrator.config().transcript_path.display(),
        memory_dir = %orchestrator.config().memory_dir.display(),
        "simulation complete"
    );
    Ok(())
}

async fn run_replay_command(args: ReplayArgs) -> anyhow::Result<()> {
    let memory_dir = args.memory_dir.unwrap_or_else(|| {
        args.transcript
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("agent_memories")
    });

    let initial = discover_initial_opinions(&memory_dir)?;
    let records = parse_transcript(&args.transcript)?;
    let series = reconstruct(&initial, &records);

    info!(
        agents = series.series.len(),
        ticks = series.ticks.len(),
        records = records.len(),
        "replay reconstructed"
    );

    let json = if args.final_only {
        serde_json::to_string_pretty(&series.final_opinions())?
    } else {
        series.to_json()?
    };

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, format!("{json}\n")).await?;
            info!(output = %path.display(), "series written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
