#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs headless Tank Arena training episodes.

mod framing;

use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tank_arena_core::CombatantId;
use tank_arena_system_agent::{
    ChaserPolicy, HeuristicPolicy, IdlePolicy, Policy, RandomPolicy, ScriptedInput,
};
use tank_arena_system_analytics::EpisodeAnalytics;
use tank_arena_system_episode::{ArenaConfig, EpisodeOrchestrator};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::framing::LogFraming;

/// Decision makers selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyChoice {
    /// Never moves nor fires.
    Idle,
    /// Samples uniformly among legal actions.
    Random,
    /// Turns towards the opponent, advances and fires when aligned.
    Chaser,
    /// Circles with the trigger held, fed through the combatant's input bindings.
    Scripted,
}

/// Runs Tank Arena episodes without a renderer and reports the tallies.
#[derive(Debug, Parser)]
#[command(name = "tank-arena", version)]
struct Args {
    /// TOML arena description; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of episodes to run.
    #[arg(long, default_value_t = 10)]
    episodes: u64,
    /// Overrides the spawn seed of the arena.
    #[arg(long)]
    seed: Option<u64>,
    /// Policy driving the first combatant.
    #[arg(long, value_enum, default_value_t = PolicyChoice::Chaser)]
    blue: PolicyChoice,
    /// Policy driving every other combatant.
    #[arg(long, value_enum, default_value_t = PolicyChoice::Random)]
    red: PolicyChoice,
    /// Ticks after which an episode is aborted without an outcome.
    #[arg(long, default_value_t = 20_000)]
    max_ticks: u64,
    /// Prints the effective configuration as TOML and exits.
    #[arg(long)]
    dump_config: bool,
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tank_arena=info,warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install the tracing subscriber")
}

fn load_config(args: &Args) -> Result<ArenaConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ArenaConfig::from_toml_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => ArenaConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn build_policies(args: &Args, config: &ArenaConfig) -> BTreeMap<CombatantId, Box<dyn Policy>> {
    let first = config.combatants.iter().map(|entry| entry.id).min();
    config
        .combatants
        .iter()
        .map(|entry| {
            let choice = if Some(entry.id) == first {
                args.blue
            } else {
                args.red
            };
            let kind = entry.variant.action_kind();
            let policy: Box<dyn Policy> = match choice {
                PolicyChoice::Idle => Box::new(IdlePolicy::new(kind)),
                PolicyChoice::Random => Box::new(RandomPolicy::new(
                    kind,
                    config.seed ^ u64::from(entry.id).wrapping_mul(0x9e37_79b9),
                )),
                PolicyChoice::Chaser => Box::new(ChaserPolicy::new(kind)),
                PolicyChoice::Scripted => {
                    let bindings = entry.input_bindings();
                    let mut input = ScriptedInput::new();
                    input.set_axis(&bindings.vertical_axis, 1.0);
                    input.set_axis(&bindings.horizontal_axis, 0.5);
                    input.set_button(&bindings.fire_button, true);
                    Box::new(HeuristicPolicy::new(kind, bindings, Box::new(input)))
                }
            };
            (entry.combatant(), policy)
        })
        .collect()
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    if args.dump_config {
        let rendered =
            toml::to_string_pretty(&config).context("failed to render the configuration")?;
        print!("{rendered}");
        return Ok(());
    }

    let policies = build_policies(args, &config);
    let mut orchestrator = EpisodeOrchestrator::new(config, policies)
        .context("failed to set up the arena")?
        .with_framing(Box::new(LogFraming));
    let mut analytics = EpisodeAnalytics::new();

    for _ in 0..args.episodes {
        let summary = match orchestrator.run_episode(args.max_ticks) {
            Some(summary) => summary,
            None => {
                let Some(first) = orchestrator.combatant_ids().first().copied() else {
                    break;
                };
                warn!(
                    episode = orchestrator.episode(),
                    max_ticks = args.max_ticks,
                    "episode exceeded the tick limit"
                );
                for id in orchestrator.combatant_ids() {
                    if let Some(agent) = orchestrator.agent(id) {
                        debug!("{}", agent.status_line());
                    }
                }
                orchestrator.abort_episode(first)
            }
        };
        analytics.record(&summary);
    }

    info!(episodes = analytics.episodes(), "training run complete");
    print!("{analytics}");
    Ok(())
}

/// Entry point for the Tank Arena command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;
    run(&args)
}
