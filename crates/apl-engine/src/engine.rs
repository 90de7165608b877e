//! Engine facade wiring the pipeline together
//!
//! Owns one of everything: state snapshot, resolution registries, custom
//! functions, action registry, caching evaluator, executor and scheduler.
//! Script in, decision cycles out.

use apl_dsl::ActionList;
use tracing::{info, warn};

use crate::error::Result;
use crate::eval::{Evaluator, FunctionRegistry};
use crate::executor::{Executor, SelectedAction};
use crate::registry::{ActionHandler, ActionMetadata, ActionRegistry};
use crate::resolve::ResolveEnv;
use crate::scheduler::Scheduler;
use crate::state::GameStateSnapshot;
use crate::validate::ValidationIssue;

/// One fully wired decision engine.
pub struct Engine {
    state: GameStateSnapshot,
    env: ResolveEnv,
    functions: FunctionRegistry,
    registry: ActionRegistry,
    evaluator: Evaluator,
    executor: Executor,
    scheduler: Scheduler,
}

impl Engine {
    /// Build an engine around a state snapshot. Resolution modules are
    /// installed for every resource pool present in the snapshot.
    pub fn new(state: GameStateSnapshot) -> Self {
        let pools: Vec<&str> = state.resources.keys().map(String::as_str).collect();
        let env = ResolveEnv::standard(&pools);
        Self {
            state,
            env,
            functions: FunctionRegistry::new(),
            registry: ActionRegistry::new(),
            evaluator: Evaluator::new(),
            executor: Executor::new(),
            scheduler: Scheduler::new(),
        }
    }

    pub fn state(&self) -> &GameStateSnapshot {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameStateSnapshot {
        &mut self.state
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActionRegistry {
        &mut self.registry
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn register_action(&mut self, metadata: ActionMetadata, handler: Box<dyn ActionHandler>) {
        self.registry.register(metadata, handler);
    }

    /// Parse and load a script. Lexing failures abort the load; lines
    /// with parse errors are skipped with a warning and the remaining
    /// lines load. Returns load-time validation findings.
    pub fn load_script(&mut self, source: &str) -> Result<Vec<ValidationIssue>> {
        let outcome = apl_dsl::parse(source)?;
        for error in &outcome.errors {
            warn!(%error, "skipped unparseable line");
        }
        info!(
            lines = outcome.list.len(),
            skipped = outcome.errors.len(),
            "script loaded"
        );
        Ok(self.load_list(outcome.list))
    }

    /// Load an already parsed action list.
    pub fn load_list(&mut self, list: ActionList) -> Vec<ValidationIssue> {
        self.executor.load(list, &self.registry, &self.env)
    }

    /// Run one decision cycle at the scheduler's current time.
    pub fn execute_cycle(&mut self) -> SelectedAction {
        let now = self.scheduler.current_time();
        self.executor.execute_cycle(
            &mut self.registry,
            &mut self.evaluator,
            &self.env,
            &self.functions,
            &mut self.state,
            now,
        )
    }

    /// Advance both clocks by `dt`, fire due events, then run one
    /// decision cycle.
    pub fn tick(&mut self, dt: f64) -> SelectedAction {
        self.state.advance(dt);
        self.scheduler.tick(dt, &mut self.state);
        self.execute_cycle()
    }

    /// Tick repeatedly for `duration` simulated seconds, collecting the
    /// cycles that selected an action.
    pub fn run_for(&mut self, duration: f64, tick_rate: f64) -> Vec<SelectedAction> {
        let mut selections = Vec::new();
        let start = self.scheduler.current_time();
        while self.scheduler.current_time() - start < duration {
            let selected = self.tick(tick_rate);
            if selected.name.is_some() {
                selections.push(selected);
            }
        }
        selections
    }
}
