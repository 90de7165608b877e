//! Action registry
//!
//! Holds the executable action definitions the executor selects from.
//! The registry is the sole owner of definitions; action lines reference
//! entries by name only and resolve them each cycle.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;
use tracing::warn;

use crate::state::GameStateSnapshot;

/// Outcome of executing an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    Failed,
    NotReady,
    InvalidTarget,
    InsufficientResources,
    OnCooldown,
    Interrupted,
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionResult::Success => "success",
            ActionResult::Failed => "failed",
            ActionResult::NotReady => "not_ready",
            ActionResult::InvalidTarget => "invalid_target",
            ActionResult::InsufficientResources => "insufficient_resources",
            ActionResult::OnCooldown => "on_cooldown",
            ActionResult::Interrupted => "interrupted",
        };
        write!(f, "{s}")
    }
}

/// Category for organizing actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Spell,
    Item,
    Macro,
    Buff,
    Debuff,
    Movement,
    Targeting,
    Utility,
    Custom,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionCategory::Spell => "spell",
            ActionCategory::Item => "item",
            ActionCategory::Macro => "macro",
            ActionCategory::Buff => "buff",
            ActionCategory::Debuff => "debuff",
            ActionCategory::Movement => "movement",
            ActionCategory::Targeting => "targeting",
            ActionCategory::Utility => "utility",
            ActionCategory::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

/// Static metadata for a registered action
#[derive(Debug, Clone)]
pub struct ActionMetadata {
    pub name: String,
    pub category: ActionCategory,
    pub description: String,
    pub cooldown: f64,
    pub cast_time: f64,
    pub gcd: f64,
    pub resource_cost: IndexMap<String, f64>,
    pub range: f64,
    pub requires_target: bool,
    pub tags: BTreeSet<String>,
}

impl ActionMetadata {
    pub fn new(name: &str, category: ActionCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            description: String::new(),
            cooldown: 0.0,
            cast_time: 0.0,
            gcd: 1.5,
            resource_cost: IndexMap::new(),
            range: 0.0,
            requires_target: false,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_cost(mut self, resource: &str, amount: f64) -> Self {
        self.resource_cost.insert(resource.to_string(), amount);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }
}

/// Executable capability of an action.
///
/// `can_execute` is the registry-side readiness gate (resources,
/// cooldowns); it may differ from the APL-level `if` condition.
pub trait ActionHandler {
    fn can_execute(&self, state: &GameStateSnapshot, now: f64) -> bool;

    fn execute(&mut self, state: &mut GameStateSnapshot, now: f64) -> ActionResult;

    fn cooldown_remaining(&self, _state: &GameStateSnapshot) -> f64 {
        0.0
    }

    fn cast_time(&self, _state: &GameStateSnapshot) -> f64 {
        0.0
    }
}

type CanFn = Box<dyn Fn(&GameStateSnapshot, f64) -> bool>;
type RunFn = Box<dyn FnMut(&mut GameStateSnapshot, f64) -> ActionResult>;

/// Closure-backed handler for actions without their own type.
pub struct FnHandler {
    can: CanFn,
    run: RunFn,
}

impl FnHandler {
    pub fn new(
        can: impl Fn(&GameStateSnapshot, f64) -> bool + 'static,
        run: impl FnMut(&mut GameStateSnapshot, f64) -> ActionResult + 'static,
    ) -> Self {
        Self {
            can: Box::new(can),
            run: Box::new(run),
        }
    }
}

impl ActionHandler for FnHandler {
    fn can_execute(&self, state: &GameStateSnapshot, now: f64) -> bool {
        (self.can)(state, now)
    }

    fn execute(&mut self, state: &mut GameStateSnapshot, now: f64) -> ActionResult {
        (self.run)(state, now)
    }
}

/// A registered action: metadata, handler and usage bookkeeping.
pub struct RegisteredAction {
    pub metadata: ActionMetadata,
    handler: Box<dyn ActionHandler>,
    pub usage_count: u64,
    pub last_used: f64,
}

impl RegisteredAction {
    pub fn can_execute(&self, state: &GameStateSnapshot, now: f64) -> bool {
        self.handler.can_execute(state, now)
    }

    pub fn execute(&mut self, state: &mut GameStateSnapshot, now: f64) -> ActionResult {
        let result = self.handler.execute(state, now);
        self.usage_count += 1;
        self.last_used = now;
        result
    }

    pub fn cooldown_remaining(&self, state: &GameStateSnapshot) -> f64 {
        self.handler.cooldown_remaining(state)
    }
}

/// Central action registry with category and tag indices.
#[derive(Default)]
pub struct ActionRegistry {
    actions: IndexMap<String, RegisteredAction>,
    aliases: HashMap<String, String>,
    categories: HashMap<ActionCategory, BTreeSet<String>>,
    tags: HashMap<String, BTreeSet<String>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. A duplicate name overwrites the previous
    /// registration with a warning.
    pub fn register(&mut self, metadata: ActionMetadata, handler: Box<dyn ActionHandler>) {
        let name = metadata.name.clone();
        if self.actions.contains_key(&name) {
            warn!(action = %name, "action already registered, overwriting");
            self.unregister(&name);
        }
        self.categories
            .entry(metadata.category)
            .or_default()
            .insert(name.clone());
        for tag in &metadata.tags {
            self.tags.entry(tag.clone()).or_default().insert(name.clone());
        }
        self.actions.insert(
            name,
            RegisteredAction {
                metadata,
                handler,
                usage_count: 0,
                last_used: 0.0,
            },
        );
    }

    /// Register a closure-backed action.
    pub fn register_fn(
        &mut self,
        metadata: ActionMetadata,
        can: impl Fn(&GameStateSnapshot, f64) -> bool + 'static,
        run: impl FnMut(&mut GameStateSnapshot, f64) -> ActionResult + 'static,
    ) {
        self.register(metadata, Box::new(FnHandler::new(can, run)));
    }

    /// Add an alias. Fails if the target action does not exist.
    pub fn add_alias(&mut self, alias: &str, action: &str) -> bool {
        if !self.actions.contains_key(action) {
            return false;
        }
        self.aliases.insert(alias.to_string(), action.to_string());
        true
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Look up by name or alias.
    pub fn get(&self, name: &str) -> Option<&RegisteredAction> {
        self.actions.get(self.canonical(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RegisteredAction> {
        let canonical = self.canonical(name).to_string();
        self.actions.get_mut(&canonical)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(action) = self.actions.shift_remove(name) else {
            return false;
        };
        if let Some(set) = self.categories.get_mut(&action.metadata.category) {
            set.remove(name);
        }
        for tag in &action.metadata.tags {
            if let Some(set) = self.tags.get_mut(tag) {
                set.remove(name);
                if set.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        self.aliases.retain(|_, target| target != name);
        true
    }

    pub fn get_by_category(&self, category: ActionCategory) -> Vec<&RegisteredAction> {
        self.categories
            .get(&category)
            .into_iter()
            .flatten()
            .filter_map(|name| self.actions.get(name))
            .collect()
    }

    pub fn get_by_tag(&self, tag: &str) -> Vec<&RegisteredAction> {
        self.tags
            .get(tag)
            .into_iter()
            .flatten()
            .filter_map(|name| self.actions.get(name))
            .collect()
    }

    /// All actions whose readiness check currently holds.
    pub fn get_available(&self, state: &GameStateSnapshot, now: f64) -> Vec<&RegisteredAction> {
        self.actions
            .values()
            .filter(|a| a.can_execute(state, now))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}
