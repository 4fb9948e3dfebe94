//! autotrack - command-line host for the analytics pipeline
//!
//! This tool provides commands for:
//! - Listing the rules interactions are matched against
//! - Checking whether the configuration can start a pipeline
//! - Replaying recorded interactions through the pipeline
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/autotrack/config.toml (~/.config/autotrack/config.toml)
//! - Logs: $XDG_STATE_HOME/autotrack/ (~/.local/state/autotrack/)

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use autotrack_core::{
    default_rules, ComponentDescriptor, Config, ConfigStore, Environment, FilePlatform, Pipeline,
    PipelineOptions, Properties, RuleSpec,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "autotrack")]
#[command(about = "Turn UI interactions into analytics events")]
#[command(version)]
struct Args {
    /// Verbose output (writes logs to the state directory)
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: $XDG_CONFIG_HOME/autotrack/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the active rules as JSON, in evaluation order
    Rules,

    /// Show configuration and check that a pipeline can start
    Check,

    /// Replay a JSON-lines file of interactions through the pipeline
    Replay {
        /// Recorded interactions, one JSON object per line
        file: PathBuf,

        /// Capture environment to simulate
        #[arg(short, long, value_enum, default_value_t = EnvironmentArg::Document)]
        environment: EnvironmentArg,

        /// User agent reported by the simulated document
        #[arg(long, default_value = "Mozilla/5.0 (X11; Linux x86_64)")]
        user_agent: String,

        /// User id attached to replayed events
        #[arg(short, long)]
        user_id: Option<String>,

        /// Also append delivered events to this JSON-lines file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EnvironmentArg {
    Document,
    ComponentTree,
}

/// One line of a replay file.
///
/// Lines with `track` send an explicit event; all others are interactions.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayRecord {
    Track {
        track: String,
        #[serde(default)]
        properties: Properties,
    },
    Interaction {
        event_type: String,
        component: ComponentDescriptor,
        #[serde(default)]
        screen: Option<String>,
        #[serde(default)]
        properties: Properties,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let _log_guard = if args.verbose {
        Some(
            autotrack_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    match args.command {
        Command::Rules => cmd_rules(&config),
        Command::Check => cmd_check(&config, &config_path),
        Command::Replay {
            file,
            environment,
            user_agent,
            user_id,
            output,
        } => {
            let environment = match environment {
                EnvironmentArg::Document => Environment::Document { user_agent },
                EnvironmentArg::ComponentTree => Environment::ComponentTree,
            };
            cmd_replay(&config, &file, environment, user_id, output).await
        }
    }
}

fn cmd_rules(config: &Config) -> Result<()> {
    let specs: Vec<RuleSpec> = match &config.rules {
        Some(specs) => specs.clone(),
        None => default_rules().iter().map(|r| r.to_spec()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&specs)?);
    Ok(())
}

fn cmd_check(config: &Config, config_path: &Path) -> Result<()> {
    println!("Autotrack Configuration");
    println!("=======================");
    println!();
    println!("Config file:     {}", config_path.display());
    println!("Auto tracking:   {}", config.tracking.enable_auto_tracking);
    println!("Debug mode:      {}", config.tracking.debug_mode);
    println!("Session timeout: {}ms", config.tracking.session_timeout_ms);
    println!(
        "Rules:           {}",
        match &config.rules {
            Some(rules) => format!("{} (from config)", rules.len()),
            None => format!("{} (defaults)", default_rules().len()),
        }
    );
    println!("Platforms:       {}", config.platforms.len());
    for spec in &config.platforms {
        println!("  - {}", spec.name());
    }
    println!();

    let overrides = config
        .to_overrides()
        .context("failed to build configured platforms")?;
    let store = ConfigStore::build(overrides);
    if !store.validate() {
        bail!("configuration cannot start a pipeline: at least one platform and one rule are required");
    }

    println!("Configuration OK");
    Ok(())
}

async fn cmd_replay(
    config: &Config,
    file: &Path,
    environment: Environment,
    user_id: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut overrides = config
        .to_overrides()
        .context("failed to build configured platforms")?;
    if let Some(path) = &output {
        let platform = FilePlatform::open("replay", path)
            .with_context(|| format!("failed to open output {}", path.display()))?;
        overrides = overrides.platform(Arc::new(platform));
    }

    let pipeline = Pipeline::new(PipelineOptions::new(overrides), move || environment)
        .context("failed to build pipeline")?;
    if let Some(user_id) = user_id {
        pipeline.set_user_id(user_id);
    }
    pipeline.start().context("failed to start pipeline")?;
    if !pipeline.is_started() {
        println!("Auto tracking is disabled; only explicit events will be sent.");
    }

    let reader = BufReader::new(
        std::fs::File::open(file)
            .with_context(|| format!("failed to open replay file {}", file.display()))?,
    );

    let mut replayed = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", file.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid record on line {}", index + 1))?;

        match record {
            ReplayRecord::Track { track, properties } => pipeline.track(track, properties),
            ReplayRecord::Interaction {
                event_type,
                component,
                screen,
                properties,
            } => {
                if let Some(screen) = screen {
                    pipeline.set_screen(&screen);
                }
                pipeline.track_manual(component, &event_type, properties);
            }
        }
        replayed += 1;
    }

    pipeline.flush().await;
    pipeline.stop();

    let stats = pipeline.stats();
    tracing::info!(replayed, ?stats, "Replay complete");

    println!("Replay complete:");
    println!("  Records replayed:     {}", replayed);
    println!("  Events processed:     {}", stats.events_processed);
    println!("  Deliveries succeeded: {}", stats.deliveries_succeeded);
    println!("  Deliveries failed:    {}", stats.deliveries_failed);
    println!("  Session:              {}", pipeline.session_id());
    Ok(())
}
