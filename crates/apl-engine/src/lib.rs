//! Rotation decision engine
//!
//! Evaluates priority-list scripts parsed by `apl-dsl` against a game
//! state snapshot. The pipeline:
//!
//! 1. [`resolve`] turns dotted identifiers into numbers via chained
//!    module and attribute registries.
//! 2. [`eval`] computes expressions over those numbers, caching results
//!    with TTL and dependency-based invalidation.
//! 3. [`registry`] holds executable actions behind the
//!    [`ActionHandler`] trait.
//! 4. [`executor`] scans the list each cycle and fires the first line
//!    whose condition and readiness check both pass.
//! 5. [`scheduler`] drives simulated time and expiry events.
//!
//! [`Engine`] wires the whole pipeline behind one type:
//!
//! ```
//! use apl_engine::{ActionCategory, ActionMetadata, ActionResult, Engine, FnHandler,
//!     GameStateSnapshot};
//!
//! let mut state = GameStateSnapshot::new();
//! state.set_resource("mana", 80.0, 100.0, 0.0);
//! let mut engine = Engine::new(state);
//! engine.register_action(
//!     ActionMetadata::new("fireball", ActionCategory::Spell),
//!     Box::new(FnHandler::new(|_, _| true, |_, _| ActionResult::Success)),
//! );
//! engine.load_script("fireball,if=mana>50").unwrap();
//! let selected = engine.execute_cycle();
//! assert_eq!(selected.name.as_deref(), Some("fireball"));
//! ```

pub mod engine;
pub mod error;
pub mod eval;
pub mod executor;
pub mod registry;
pub mod resolve;
pub mod scheduler;
pub mod state;
pub mod validate;

pub use engine::Engine;
pub use error::{Error, Result};
pub use eval::{EvalContext, EvalStats, Evaluator, FunctionRegistry};
pub use executor::{CycleState, CycleStats, Executor, SelectedAction};
pub use registry::{
    ActionCategory, ActionHandler, ActionMetadata, ActionRegistry, ActionResult, FnHandler,
};
pub use resolve::{
    resolve_path, AttributeRegistry, Handle, Module, ModuleRegistry, Resolution, ResolveEnv,
};
pub use scheduler::{EventId, EventKind, EventPriority, RunState, Scheduler, SchedulerStats};
pub use state::{Aura, Cooldown, GameStateSnapshot, Resource, Target};
pub use validate::{validate_action_list, ValidationIssue};
