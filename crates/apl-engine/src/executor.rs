//! Decision-cycle executor
//!
//! Each cycle scans the action list in priority order and executes the
//! first line whose `if` condition and registry-side readiness check
//! both hold. First fit, not best fit: priority is line position and
//! scanning stops at the match.

use apl_dsl::ActionList;
use tracing::{debug, instrument, warn};

use crate::eval::{EvalContext, Evaluator, FunctionRegistry};
use crate::registry::{ActionRegistry, ActionResult};
use crate::resolve::ResolveEnv;
use crate::state::GameStateSnapshot;
use crate::validate::{validate_action_list, ValidationIssue};

/// Executor state machine. Every cycle runs Idle -> Evaluating -> Idle;
/// Error is absorbing and reached only on unrecoverable setup failures
/// such as cycling without a loaded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Evaluating,
    Error,
}

/// Per-cycle bookkeeping
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub lines_considered: usize,
    pub conditions_evaluated: usize,
    pub errors: Vec<String>,
}

/// Output of one decision cycle. `name` is `None` when no line passed
/// its checks; `result` carries the handler's outcome, including
/// `Failed` when the selected handler did not succeed.
#[derive(Debug, Clone)]
pub struct SelectedAction {
    pub name: Option<String>,
    pub result: Option<ActionResult>,
    pub stats: CycleStats,
}

/// Priority-ordered first-fit action selector.
#[derive(Default)]
pub struct Executor {
    list: Option<ActionList>,
    state: CycleState,
    cycles: u64,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn list(&self) -> Option<&ActionList> {
        self.list.as_ref()
    }

    /// Load an action list and run static validation against the
    /// registry and resolution registries. Issues are advisory; the
    /// list loads regardless.
    pub fn load(
        &mut self,
        list: ActionList,
        registry: &ActionRegistry,
        env: &ResolveEnv,
    ) -> Vec<ValidationIssue> {
        let issues = validate_action_list(&list, registry, env);
        for issue in &issues {
            warn!(%issue, "validation issue");
        }
        debug!(lines = list.len(), issues = issues.len(), "action list loaded");
        self.list = Some(list);
        self.state = CycleState::Idle;
        issues
    }

    /// Run one decision cycle at simulation time `now`.
    #[instrument(skip_all, name = "cycle", fields(now = now, cycle = self.cycles))]
    pub fn execute_cycle(
        &mut self,
        registry: &mut ActionRegistry,
        evaluator: &mut Evaluator,
        env: &ResolveEnv,
        functions: &FunctionRegistry,
        state: &mut GameStateSnapshot,
        now: f64,
    ) -> SelectedAction {
        self.cycles += 1;
        let mut stats = CycleStats::default();

        let Some(list) = self.list.as_mut() else {
            self.state = CycleState::Error;
            stats.errors.push("no action list loaded".to_string());
            return SelectedAction {
                name: None,
                result: None,
                stats,
            };
        };
        self.state = CycleState::Evaluating;

        evaluator.invalidate_changed(&state.take_changed());

        let mut selected = None;
        for (i, line) in list.lines.iter().enumerate() {
            stats.lines_considered += 1;

            if now < line.line_cooldown_expires {
                continue;
            }
            let Some(action) = registry.get(&line.name) else {
                stats.errors.push(format!(
                    "line {}: action '{}' not registered",
                    line.line, line.name
                ));
                continue;
            };

            // Absent `if` means always true
            if let Some(expr) = &line.if_expr {
                stats.conditions_evaluated += 1;
                let ctx = EvalContext {
                    env,
                    functions,
                    state,
                    now,
                };
                match evaluator.evaluate(expr, &ctx) {
                    Ok(v) if v != 0.0 => {}
                    Ok(_) => continue,
                    Err(e) => {
                        // Evaluation failure means "condition false"
                        stats.errors.push(format!("line {}: {e}", line.line));
                        continue;
                    }
                }
            }

            if !action.can_execute(state, now) {
                continue;
            }

            selected = Some(i);
            break;
        }

        let (name, result) = match selected {
            Some(i) => {
                let name = list.lines[i].name.clone();
                let result = match registry.get_mut(&name) {
                    Some(action) => action.execute(state, now),
                    None => ActionResult::Failed,
                };

                if result == ActionResult::Success {
                    let mut cooldown = None;
                    if let Some(expr) = &list.lines[i].line_cd_expr {
                        stats.conditions_evaluated += 1;
                        let ctx = EvalContext {
                            env,
                            functions,
                            state,
                            now,
                        };
                        match evaluator.evaluate(expr, &ctx) {
                            Ok(cd) => cooldown = Some(cd),
                            Err(e) => stats.errors.push(format!("line {}: {e}", list.lines[i].line)),
                        }
                    }
                    if let Some(cd) = cooldown {
                        if cd > 0.0 {
                            list.lines[i].line_cooldown_expires = now + cd;
                        }
                    }
                } else {
                    stats
                        .errors
                        .push(format!("action '{name}' did not succeed: {result}"));
                }

                debug!(action = %name, %result, "cycle selected action");
                (Some(name), Some(result))
            }
            None => {
                debug!(
                    lines = stats.lines_considered,
                    "cycle selected no action"
                );
                (None, None)
            }
        };

        self.state = CycleState::Idle;
        SelectedAction {
            name,
            result,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use apl_dsl::parse;

    use super::*;
    use crate::registry::{ActionCategory, ActionMetadata, FnHandler};

    struct Harness {
        registry: ActionRegistry,
        evaluator: Evaluator,
        env: ResolveEnv,
        functions: FunctionRegistry,
        state: GameStateSnapshot,
        executor: Executor,
    }

    impl Harness {
        fn new(script: &str, mana: f64) -> Self {
            let mut registry = ActionRegistry::new();
            for (name, cost) in [("fireball", 30.0), ("frostbolt", 20.0), ("scorch", 10.0)] {
                registry.register(
                    ActionMetadata::new(name, ActionCategory::Spell).with_cost("mana", cost),
                    Box::new(FnHandler::new(
                        move |state: &GameStateSnapshot, _| {
                            state
                                .resources
                                .get("mana")
                                .is_some_and(|r| r.current >= cost)
                        },
                        move |state: &mut GameStateSnapshot, _| {
                            if state.spend_resource("mana", cost) {
                                ActionResult::Success
                            } else {
                                ActionResult::InsufficientResources
                            }
                        },
                    )),
                );
            }

            let env = ResolveEnv::standard(&["mana"]);
            let mut state = GameStateSnapshot::new();
            state.set_resource("mana", mana, 100.0, 0.0);

            let mut executor = Executor::new();
            let list = parse(script).unwrap().list;
            executor.load(list, &registry, &env);

            Self {
                registry,
                evaluator: Evaluator::new(),
                env,
                functions: FunctionRegistry::new(),
                state,
                executor,
            }
        }

        fn cycle(&mut self, now: f64) -> SelectedAction {
            self.executor.execute_cycle(
                &mut self.registry,
                &mut self.evaluator,
                &self.env,
                &self.functions,
                &mut self.state,
                now,
            )
        }
    }

    #[test]
    fn test_first_fit_selects_second_line_with_minimal_evals() {
        let script = "fireball,if=mana>90\nfrostbolt,if=mana>30\nscorch,if=mana>0";
        let mut h = Harness::new(script, 50.0);
        let selected = h.cycle(0.0);
        assert_eq!(selected.name.as_deref(), Some("frostbolt"));
        // scanning stops at the match: only the two leading conditions ran
        assert_eq!(selected.stats.conditions_evaluated, 2);
        assert_eq!(selected.stats.lines_considered, 2);
    }

    #[test]
    fn test_no_action_when_no_condition_holds() {
        let mut h = Harness::new("fireball,if=mana>90", 50.0);
        let selected = h.cycle(0.0);
        assert_eq!(selected.name, None);
        assert_eq!(selected.result, None);
    }

    #[test]
    fn test_readiness_gate_skips_line() {
        // condition passes but the handler refuses: 5 mana < 30 cost
        let mut h = Harness::new("fireball,if=mana>0\nscorch", 5.0);
        let selected = h.cycle(0.0);
        assert_eq!(selected.name.as_deref(), Some("scorch"));
    }

    #[test]
    fn test_missing_action_recorded_and_skipped() {
        let mut h = Harness::new("pyroblast\nfrostbolt", 50.0);
        let selected = h.cycle(0.0);
        assert_eq!(selected.name.as_deref(), Some("frostbolt"));
        assert_eq!(selected.stats.errors.len(), 1);
        assert!(selected.stats.errors[0].contains("pyroblast"));
    }

    #[test]
    fn test_evaluation_error_treated_as_false() {
        let mut h = Harness::new("fireball,if=bogus(1)\nfrostbolt", 50.0);
        let selected = h.cycle(0.0);
        assert_eq!(selected.name.as_deref(), Some("frostbolt"));
        assert_eq!(selected.stats.errors.len(), 1);
    }

    #[test]
    fn test_line_cooldown_blocks_reuse() {
        let mut h = Harness::new("scorch,line_cd=3\nfrostbolt", 100.0);
        assert_eq!(h.cycle(0.0).name.as_deref(), Some("scorch"));
        // within the line cooldown the next line is taken instead
        assert_eq!(h.cycle(1.0).name.as_deref(), Some("frostbolt"));
        assert_eq!(h.cycle(3.5).name.as_deref(), Some("scorch"));
    }

    #[test]
    fn test_cycle_without_list_enters_error_state() {
        let mut registry = ActionRegistry::new();
        let mut evaluator = Evaluator::new();
        let env = ResolveEnv::standard(&[]);
        let functions = FunctionRegistry::new();
        let mut state = GameStateSnapshot::new();
        let mut executor = Executor::new();
        let selected =
            executor.execute_cycle(&mut registry, &mut evaluator, &env, &functions, &mut state, 0.0);
        assert_eq!(selected.name, None);
        assert_eq!(executor.state(), CycleState::Error);
    }
}
