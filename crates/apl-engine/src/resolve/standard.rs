//! Standard modules and attribute resolvers
//!
//! Covers the conventional rotation-script namespace: resource pools,
//! `buff.*` / `debuff.*`, `cooldown.*`, `target.*`, `time`, `gcd`,
//! `level`, with user variables as the fallback for unclaimed roots.

use apl_dsl::IdentPath;

use super::{resolve_path, AttributeRegistry, Handle, Module, ModuleRegistry, Resolution};
use crate::state::{Aura, Cooldown, GameStateSnapshot, Resource};

/// The two resolution registries bundled for one engine instance.
pub struct ResolveEnv {
    pub modules: ModuleRegistry,
    pub attributes: AttributeRegistry,
}

impl ResolveEnv {
    /// Standard environment covering the named resource pools plus the
    /// conventional namespaces.
    pub fn standard(resource_names: &[&str]) -> Self {
        let (modules, attributes) = standard_registries(resource_names);
        Self {
            modules,
            attributes,
        }
    }

    pub fn resolve(&self, path: &IdentPath, state: &GameStateSnapshot) -> f64 {
        resolve_path(path, &self.modules, &self.attributes, state)
    }
}

/// Build the standard module and attribute registries.
pub fn standard_registries(resource_names: &[&str]) -> (ModuleRegistry, AttributeRegistry) {
    let mut modules = ModuleRegistry::new();
    for name in resource_names {
        modules.register(Box::new(ResourceModule {
            root: name.to_string(),
        }));
    }
    modules.register(Box::new(AuraModule {
        root: "buff",
        debuff: false,
    }));
    modules.register(Box::new(AuraModule {
        root: "debuff",
        debuff: true,
    }));
    modules.register(Box::new(CooldownModule));
    modules.register(Box::new(TargetModule));
    modules.register(Box::new(TimeModule));
    modules.register(Box::new(GcdModule));
    modules.register(Box::new(LevelModule));
    modules.set_fallback(Box::new(VariableModule));

    let mut attributes = AttributeRegistry::new();
    attributes.register_data_attrs(
        "resource",
        &["current", "max", "regen", "pct", "deficit", "deficit_pct"],
    );
    attributes.set_default("resource", "current");

    attributes.register_data_attrs(
        "aura",
        &["up", "down", "stack", "stacks", "remains", "max_stacks"],
    );
    attributes.set_default("aura", "up");

    attributes.register_data_attrs(
        "cooldown",
        &["ready", "remains", "duration", "charges", "max_charges"],
    );
    attributes.set_default("cooldown", "ready");

    attributes.register_data_attrs("target", &["up", "distance", "time_to_die", "adds", "level"]);
    attributes.set_default("target", "up");
    // target.health chains to the target's health pool
    attributes.register("target", "health", |_, state| {
        Resolution::Chain(resource_handle("health", &state.target.health))
    });

    attributes.register_data_attrs("scalar", &["value", "remains"]);
    attributes.set_default("scalar", "value");

    (modules, attributes)
}

fn resource_handle(name: &str, resource: &Resource) -> Handle {
    Handle::new("resource", name)
        .with("current", resource.current)
        .with("max", resource.max)
        .with("regen", resource.regen)
        .with("pct", resource.pct())
        .with("deficit", resource.deficit())
        .with("deficit_pct", resource.deficit_pct())
}

fn aura_handle(name: &str, aura: &Aura) -> Handle {
    Handle::new("aura", name)
        .with("up", aura.up())
        .with("down", aura.down())
        .with("stack", aura.stacks as f64)
        .with("stacks", aura.stacks as f64)
        .with("remains", aura.remains)
        .with("max_stacks", aura.max_stacks as f64)
}

fn cooldown_handle(name: &str, cd: &Cooldown) -> Handle {
    Handle::new("cooldown", name)
        .with("ready", cd.ready())
        .with("remains", cd.remains)
        .with("duration", cd.duration)
        .with("charges", cd.charges as f64)
        .with("max_charges", cd.max_charges as f64)
}

fn scalar_handle(name: &str, value: f64) -> Handle {
    Handle::new("scalar", name)
        .with("value", value)
        .with("remains", value)
}

/// One named resource pool; the root is the pool name itself, so no
/// instance segment follows it.
struct ResourceModule {
    root: String,
}

impl Module for ResourceModule {
    fn root(&self) -> &str {
        &self.root
    }
    fn type_tag(&self) -> &str {
        "resource"
    }
    fn wants_name(&self) -> bool {
        false
    }
    fn lookup(&self, _name: &str, state: &GameStateSnapshot) -> Handle {
        match state.resources.get(&self.root) {
            Some(resource) => resource_handle(&self.root, resource),
            None => Handle::new("resource", &self.root),
        }
    }
}

/// `buff.<name>` / `debuff.<name>`
struct AuraModule {
    root: &'static str,
    debuff: bool,
}

impl Module for AuraModule {
    fn root(&self) -> &str {
        self.root
    }
    fn type_tag(&self) -> &str {
        "aura"
    }
    fn lookup(&self, name: &str, state: &GameStateSnapshot) -> Handle {
        let auras = if self.debuff {
            &state.debuffs
        } else {
            &state.buffs
        };
        match auras.get(name) {
            Some(aura) => aura_handle(name, aura),
            None => Handle::new("aura", name),
        }
    }
}

struct CooldownModule;

impl Module for CooldownModule {
    fn root(&self) -> &str {
        "cooldown"
    }
    fn type_tag(&self) -> &str {
        "cooldown"
    }
    fn lookup(&self, name: &str, state: &GameStateSnapshot) -> Handle {
        match state.cooldowns.get(name) {
            Some(cd) => cooldown_handle(name, cd),
            None => Handle::new("cooldown", name),
        }
    }
}

struct TargetModule;

impl Module for TargetModule {
    fn root(&self) -> &str {
        "target"
    }
    fn type_tag(&self) -> &str {
        "target"
    }
    fn wants_name(&self) -> bool {
        false
    }
    fn lookup(&self, _name: &str, state: &GameStateSnapshot) -> Handle {
        Handle::new("target", "target")
            .with("up", 1.0)
            .with("distance", state.target.distance)
            .with("time_to_die", state.target.time_to_die)
            .with("adds", state.target.adds as f64)
            .with("level", state.target.level as f64)
    }
}

struct TimeModule;

impl Module for TimeModule {
    fn root(&self) -> &str {
        "time"
    }
    fn type_tag(&self) -> &str {
        "scalar"
    }
    fn wants_name(&self) -> bool {
        false
    }
    fn lookup(&self, _name: &str, state: &GameStateSnapshot) -> Handle {
        scalar_handle("time", state.time)
    }
}

struct GcdModule;

impl Module for GcdModule {
    fn root(&self) -> &str {
        "gcd"
    }
    fn type_tag(&self) -> &str {
        "scalar"
    }
    fn wants_name(&self) -> bool {
        false
    }
    fn lookup(&self, _name: &str, state: &GameStateSnapshot) -> Handle {
        scalar_handle("gcd", state.gcd_remains)
    }
}

struct LevelModule;

impl Module for LevelModule {
    fn root(&self) -> &str {
        "level"
    }
    fn type_tag(&self) -> &str {
        "scalar"
    }
    fn wants_name(&self) -> bool {
        false
    }
    fn lookup(&self, _name: &str, state: &GameStateSnapshot) -> Handle {
        scalar_handle("level", state.level as f64)
    }
}

/// Fallback for unclaimed roots: user variables. The root segment itself
/// is the variable name.
struct VariableModule;

impl Module for VariableModule {
    fn root(&self) -> &str {
        "variable"
    }
    fn type_tag(&self) -> &str {
        "scalar"
    }
    fn wants_name(&self) -> bool {
        false
    }
    fn lookup(&self, name: &str, state: &GameStateSnapshot) -> Handle {
        match state.variables.get(name) {
            Some(value) => scalar_handle(name, *value),
            None => Handle::new("scalar", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameStateSnapshot {
        let mut state = GameStateSnapshot::new();
        state.set_resource("mana", 75.0, 100.0, 5.0);
        state.apply_buff("steady_focus", 10.0, 2, 2);
        state.apply_debuff("serpent_sting", 12.0, 1, 1);
        state.set_cooldown("aimed_shot", 6.0);
        state.target.health = Resource::new(40.0, 200.0, 0.0);
        state.target.distance = 25.0;
        state.set_variable("opener_done", 1.0);
        state
    }

    fn resolve(path: &str) -> f64 {
        let env = ResolveEnv::standard(&["mana", "health", "focus"]);
        env.resolve(&IdentPath::from(path), &state())
    }

    #[test]
    fn test_resource_paths() {
        assert_eq!(resolve("mana"), 75.0);
        assert_eq!(resolve("mana.pct"), 75.0);
        assert_eq!(resolve("mana.deficit"), 25.0);
        assert_eq!(resolve("mana.max"), 100.0);
        // registered module but no pool in the snapshot
        assert_eq!(resolve("focus"), 0.0);
    }

    #[test]
    fn test_aura_paths() {
        assert_eq!(resolve("buff.steady_focus"), 1.0);
        assert_eq!(resolve("buff.steady_focus.up"), 1.0);
        assert_eq!(resolve("buff.steady_focus.stack"), 2.0);
        assert_eq!(resolve("buff.steady_focus.remains"), 10.0);
        assert_eq!(resolve("buff.missing.up"), 0.0);
        assert_eq!(resolve("buff.missing.down"), 0.0);
        assert_eq!(resolve("debuff.serpent_sting.up"), 1.0);
    }

    #[test]
    fn test_cooldown_paths() {
        assert_eq!(resolve("cooldown.aimed_shot.ready"), 0.0);
        assert_eq!(resolve("cooldown.aimed_shot.remains"), 6.0);
        assert_eq!(resolve("cooldown.aimed_shot"), 0.0);
    }

    #[test]
    fn test_untracked_cooldown_resolves_to_zero() {
        // a cooldown never entered into the snapshot is a resolution
        // miss, same as any other unknown name
        assert_eq!(resolve("cooldown.arcane_shot.ready"), 0.0);
        assert_eq!(resolve("cooldown.arcane_shot.remains"), 0.0);
        assert_eq!(resolve("cooldown.arcane_shot"), 0.0);
    }

    #[test]
    fn test_target_paths() {
        assert_eq!(resolve("target"), 1.0);
        assert_eq!(resolve("target.distance"), 25.0);
        assert_eq!(resolve("target.health"), 40.0);
        assert_eq!(resolve("target.health.pct"), 20.0);
        assert_eq!(resolve("target.time_to_die"), 999.0);
    }

    #[test]
    fn test_scalar_roots() {
        assert_eq!(resolve("gcd"), 0.0);
        assert_eq!(resolve("level"), 60.0);
        assert_eq!(resolve("gcd.remains"), 0.0);
    }

    #[test]
    fn test_variable_fallback() {
        assert_eq!(resolve("opener_done"), 1.0);
        assert_eq!(resolve("never_set"), 0.0);
    }
}
