//! Terminal chatbot
//!
//! The `chatbot` command chats with a search-enabled agent and logs every
//! run against the Release for its version.
//!
//! ## Commands
//!
//! - `run`: start a conversation (`--dev` also records an Experiment)
//! - `release`: show the current release or the release history
//! - `experiment list`: list dev-mode experiments
//! - `session list` / `session show`: inspect logged sessions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use chatbot_core::agent::conversational::{DEFAULT_MAX_ITERATIONS, DEFAULT_RETRY_PROMPT};
use chatbot_core::agent::openai::DEFAULT_MODEL;
use chatbot_core::{
    AgentOptions, Bootstrap, ChatbotConfig, EnvironmentResolver, OpenAiComponents,
    ParsingErrorPolicy, ReleaseRegistry,
};
use chatbot_logger::{
    ExperimentStore, RecordHash, ReleaseRecord, ReleaseStore, SessionStore, SurrealStore,
};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "chatbot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Terminal chatbot with release / experiment / session logging", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive conversation on stdin/stdout
    Run {
        /// Dev mode: record the assembled configuration as an Experiment
        #[arg(long)]
        dev: bool,

        /// SerpAPI key for the search tool
        #[arg(long, env = "SERPAPI_API_KEY", hide_env_values = true)]
        serpapi_key: String,

        /// OpenAI key for the language model
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_key: String,

        /// Chat model name
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,

        /// Reasoning steps allowed per message
        #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: usize,

        /// How to handle model output that fits neither format
        #[arg(long, value_enum, default_value_t = ParsingErrors::Retry)]
        parsing_errors: ParsingErrors,

        /// Observation fed back to the model with `--parsing-errors retry`
        #[arg(long, default_value = DEFAULT_RETRY_PROMPT)]
        retry_prompt: String,

        /// Timeout for each model request, in seconds (no timeout by default)
        #[arg(long)]
        request_timeout: Option<u64>,
    },

    /// Inspect releases
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// Inspect dev-mode experiments
    Experiment {
        #[command(subcommand)]
        action: ExperimentAction,
    },

    /// Inspect logged sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum ReleaseAction {
    /// Show the newest release
    Current,
    /// Show all releases (newest first)
    History,
}

#[derive(Subcommand)]
enum ExperimentAction {
    /// List experiments (newest first)
    List {
        /// Only experiments of this release version
        #[arg(long)]
        version: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions (newest first)
    List {
        /// Only sessions of this release version
        #[arg(long)]
        version: Option<String>,
    },
    /// Show one session and its event log
    Show {
        /// Session hash
        hash: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ParsingErrors {
    /// Feed a corrective prompt back to the model
    Retry,
    /// Fail the conversation
    Propagate,
    /// Answer with the raw model text
    Surface,
}

fn parsing_policy(mode: ParsingErrors, retry_prompt: &str) -> ParsingErrorPolicy {
    match mode {
        ParsingErrors::Retry => ParsingErrorPolicy::Retry {
            prompt: retry_prompt.to_string(),
        },
        ParsingErrors::Propagate => ParsingErrorPolicy::Propagate,
        ParsingErrors::Surface => ParsingErrorPolicy::SurfaceRawText,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    chatbot_core::init_tracing(cli.json, level);

    let store = Arc::new(
        SurrealStore::from_env()
            .await
            .context("Failed to connect to chatbot database")?,
    );

    match cli.command {
        Commands::Run {
            dev,
            serpapi_key,
            openai_key,
            model,
            max_iterations,
            parsing_errors,
            retry_prompt,
            request_timeout,
        } => {
            let mut components = OpenAiComponents::new(serpapi_key, openai_key).with_model(model);
            if let Some(secs) = request_timeout {
                components = components.with_request_timeout_secs(secs);
            }
            let config = ChatbotConfig {
                dev_mode: dev,
                agent: AgentOptions {
                    max_iterations,
                    parsing_errors: parsing_policy(parsing_errors, &retry_prompt),
                    ..AgentOptions::default()
                },
            };
            cmd_run(store, components, &config).await
        }
        Commands::Release { action } => match action {
            ReleaseAction::Current => cmd_release_current(store).await,
            ReleaseAction::History => cmd_release_history(store).await,
        },
        Commands::Experiment { action } => match action {
            ExperimentAction::List { version } => {
                cmd_experiment_list(&store, version.as_deref()).await
            }
        },
        Commands::Session { action } => match action {
            SessionAction::List { version } => cmd_session_list(&store, version.as_deref()).await,
            SessionAction::Show { hash } => cmd_session_show(&store, &hash).await,
        },
    }
}

/// Start the chatbot and converse until end of input
async fn cmd_run(
    store: Arc<SurrealStore>,
    components: OpenAiComponents,
    config: &ChatbotConfig,
) -> Result<()> {
    let resolver = EnvironmentResolver::new(env!("CARGO_PKG_VERSION"));
    let runtime = Bootstrap::new(store, resolver, components)
        .run(config)
        .await
        .context("Failed to start chatbot")?;

    info!(
        release = %runtime.release.hash.short(),
        session = %runtime.session.hash().short(),
        "chatbot ready"
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let turns = runtime
        .interact(stdin, tokio::io::stdout())
        .await
        .context("Conversation failed")?;

    info!(turns, "conversation finished");
    Ok(())
}

async fn cmd_release_current(store: Arc<SurrealStore>) -> Result<()> {
    let registry = ReleaseRegistry::new(store);
    match registry.current().await? {
        Some(release) => println!("Current {} -> {}", release.version, release.hash),
        None => println!("No release recorded yet"),
    }
    Ok(())
}

async fn cmd_release_history(store: Arc<SurrealStore>) -> Result<()> {
    let registry = ReleaseRegistry::new(store);
    let history = registry.history().await?;

    if history.is_empty() {
        println!("No release history");
        return Ok(());
    }

    for release in history {
        println!(
            "{} {} {}",
            release.created_at.to_rfc3339(),
            release.version,
            release.hash
        );
    }
    Ok(())
}

/// Resolve an optional `--version` filter to its Release.
///
/// `Ok(None)` without a filter; an error when the version has no Release.
async fn release_filter(
    store: &SurrealStore,
    version: Option<&str>,
) -> Result<Option<ReleaseRecord>> {
    match version {
        Some(v) => {
            let release = store
                .find_release_by_version(v)
                .await
                .with_context(|| format!("No release for version '{}'", v))?;
            Ok(Some(release))
        }
        None => Ok(None),
    }
}

async fn cmd_experiment_list(store: &SurrealStore, version: Option<&str>) -> Result<()> {
    let release = release_filter(store, version).await?;
    let experiments = store
        .list_experiments(release.as_ref().map(|r| &r.hash))
        .await?;

    if experiments.is_empty() {
        println!("No experiments found");
        return Ok(());
    }

    for experiment in experiments {
        let fields: Vec<&str> = experiment.fields.keys().map(String::as_str).collect();
        println!(
            "{} {} {} [{}]",
            experiment.hash.short(),
            experiment.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            experiment.version,
            fields.join(", ")
        );
    }
    Ok(())
}

async fn cmd_session_list(store: &SurrealStore, version: Option<&str>) -> Result<()> {
    let release = release_filter(store, version).await?;
    let sessions = store
        .list_sessions(release.as_ref().map(|r| &r.hash))
        .await?;

    if sessions.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    for session in sessions {
        let experiment = session
            .experiment_reference
            .as_ref()
            .map(|e| e.short().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} {:?} {} {} experiment={}",
            session.hash.short(),
            session.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            session.kind,
            session.username,
            session.chatbot_version,
            experiment
        );
    }
    Ok(())
}

async fn cmd_session_show(store: &SurrealStore, hash: &str) -> Result<()> {
    let hash = RecordHash::try_from(hash.to_string())
        .with_context(|| format!("'{}' is not a session hash", hash))?;
    let session = store
        .get_session(&hash)
        .await
        .with_context(|| format!("Failed to load session {}", hash))?;
    let events = store.get_events(&hash).await?;

    println!("{}", serde_json::to_string_pretty(&session)?);
    println!();
    for event in events {
        println!(
            "#{} {} {} {}",
            event.seq,
            event.timestamp.to_rfc3339(),
            event.kind.as_str(),
            event.payload
        );
    }
    Ok(())
}
