//! Command-line rotation runner
//!
//! Loads a priority-list script, builds demo action handlers from the
//! per-line `cost=`, `resource=` and `cooldown=` options, and ticks the
//! engine over simulated time, logging every selected action.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::process;

use apl_dsl::{ActionList, OptionValue};
use apl_engine::{
    ActionCategory, ActionMetadata, ActionResult, Engine, FnHandler, GameStateSnapshot,
};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apl-run", version, about = "Run a rotation script against a simulated state")]
struct Cli {
    /// Rotation script file
    script: PathBuf,

    /// Initial state snapshot as JSON; defaults to a 100-mana caster
    #[arg(long)]
    state: Option<PathBuf>,

    /// Simulated seconds to run
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Seconds between decision cycles
    #[arg(long, default_value_t = 0.1)]
    tick_rate: f64,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        error!("{err}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(&cli.script)?;
    let outcome = apl_dsl::parse(&source)?;
    for err in &outcome.errors {
        warn!(%err, "skipped unparseable line");
    }
    if outcome.list.is_empty() {
        return Err("script contains no action lines".into());
    }

    let state = match &cli.state {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => {
            let mut state = GameStateSnapshot::new();
            state.set_resource("mana", 100.0, 100.0, 5.0);
            state
        }
    };

    let mut engine = Engine::new(state);
    register_script_actions(&mut engine, &outcome.list);

    let issues = engine.load_list(outcome.list);
    for issue in &issues {
        warn!(%issue, "validation");
    }

    let ticks = (cli.duration / cli.tick_rate).ceil() as u64;
    let mut executed = 0u64;
    for _ in 0..ticks {
        let selected = engine.tick(cli.tick_rate);
        if let Some(name) = &selected.name {
            executed += 1;
            let result = selected.result.unwrap_or(ActionResult::Failed);
            info!(
                time = engine.scheduler().current_time(),
                action = %name,
                result = %result,
                "executed"
            );
        }
        for err in &selected.stats.errors {
            warn!(%err, "cycle");
        }
    }

    let stats = engine.evaluator().stats();
    info!(
        cycles = engine.executor().cycles(),
        executed,
        cache_hit_rate = stats.hit_rate(),
        "run complete"
    );
    Ok(())
}

/// Build a handler per distinct action name. The `cost=` and `resource=`
/// options drive a spend-gated handler; `cooldown=` arms an ability
/// cooldown on success.
fn register_script_actions(engine: &mut Engine, list: &ActionList) {
    let mut seen = BTreeSet::new();
    for line in &list.lines {
        if !seen.insert(line.name.clone()) {
            continue;
        }
        let name = line.name.clone();
        let cost = number_option(line, "cost").unwrap_or(0.0);
        let pool = text_option(line, "resource").unwrap_or_else(|| "mana".to_string());
        let cooldown = number_option(line, "cooldown").unwrap_or(0.0);

        let mut metadata = ActionMetadata::new(&name, ActionCategory::Spell);
        if cost > 0.0 {
            metadata = metadata.with_cost(&pool, cost);
        }

        let can_pool = pool.clone();
        let can_name = name.clone();
        let run_pool = pool;
        let run_name = name;
        engine.register_action(
            metadata,
            Box::new(FnHandler::new(
                move |state: &GameStateSnapshot, _| {
                    let affordable = cost == 0.0
                        || state
                            .resources
                            .get(&can_pool)
                            .is_some_and(|r| r.current >= cost);
                    let ready = state
                        .cooldowns
                        .get(&can_name)
                        .is_none_or(|cd| cd.ready() == 1.0);
                    affordable && ready
                },
                move |state: &mut GameStateSnapshot, _| {
                    if cost > 0.0 && !state.spend_resource(&run_pool, cost) {
                        return ActionResult::InsufficientResources;
                    }
                    if cooldown > 0.0 {
                        state.set_cooldown(&run_name, cooldown);
                    }
                    ActionResult::Success
                },
            )),
        );
    }
}

fn number_option(line: &apl_dsl::ActionLine, key: &str) -> Option<f64> {
    match line.options.get(key) {
        Some(OptionValue::Number(n)) => Some(*n),
        _ => None,
    }
}

fn text_option(line: &apl_dsl::ActionLine, key: &str) -> Option<String> {
    match line.options.get(key) {
        Some(OptionValue::Text(s)) => Some(s.clone()),
        _ => None,
    }
}
