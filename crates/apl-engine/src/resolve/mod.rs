//! Chain-based identifier resolution
//!
//! Resolving `buff.steady_focus.stack` is two-phase: a *module* keyed on
//! the first path segment locates the entity and produces a [`Handle`];
//! *attribute resolvers* keyed on `(type_tag, attribute)` then interpret
//! the remaining segments, each consuming exactly one segment and yielding
//! either a terminal number or a new handle to continue the chain.
//!
//! Misses never fail: an unknown root, name or attribute resolves to 0.0,
//! matching permissive rotation-scripting semantics.

mod standard;

pub use standard::{standard_registries, ResolveEnv};

use std::collections::HashMap;

use apl_dsl::IdentPath;
use indexmap::IndexMap;
use tracing::trace;

use crate::state::GameStateSnapshot;

/// A located entity, passed along a resolution chain and discarded when
/// the chain completes. The type tag determines which attribute resolvers
/// apply; the data bag carries precomputed numeric attributes.
#[derive(Debug, Clone)]
pub struct Handle {
    pub type_tag: String,
    pub name: String,
    pub data: IndexMap<String, f64>,
}

impl Handle {
    pub fn new(type_tag: &str, name: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            name: name.to_string(),
            data: IndexMap::new(),
        }
    }

    pub fn with(mut self, attr: &str, value: f64) -> Self {
        self.data.insert(attr.to_string(), value);
        self
    }
}

/// Outcome of one attribute-resolver step
pub enum Resolution {
    /// Terminal numeric result
    Value(f64),
    /// New handle; the chain continues with the remaining segments
    Chain(Handle),
}

/// Phase 1: locates an entity for a path root.
///
/// A module only maps names to handles; it never interprets attributes.
/// Lookup is infallible: unknown names yield an empty-data handle of the
/// module's type so attribute resolvers supply type-appropriate defaults.
pub trait Module {
    /// Path root this module answers for
    fn root(&self) -> &str;

    /// Type tag of the handles this module produces
    fn type_tag(&self) -> &str;

    /// Whether the segment after the root is an instance name. Direct
    /// roots such as `time` or a resource pool take no name; every
    /// segment after the root is an attribute.
    fn wants_name(&self) -> bool {
        true
    }

    fn lookup(&self, name: &str, state: &GameStateSnapshot) -> Handle;
}

/// Phase 1 registry: path root -> module.
///
/// The optional fallback answers for roots no module claims; the root
/// itself is passed as the instance name (used for user variables).
#[derive(Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, Box<dyn Module>>,
    fallback: Option<Box<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Box<dyn Module>) {
        self.modules.insert(module.root().to_string(), module);
    }

    pub fn set_fallback(&mut self, module: Box<dyn Module>) {
        self.fallback = Some(module);
    }

    pub fn get(&self, root: &str) -> Option<&dyn Module> {
        self.modules.get(root).map(|m| m.as_ref())
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

type AttributeFn = Box<dyn Fn(&Handle, &GameStateSnapshot) -> Resolution>;

/// Phase 2 registry: `(type_tag, attribute)` -> resolver.
///
/// Wildcard resolvers are keyed on type tag `"*"` and match any handle
/// type; specific registrations win. Each handle type may declare a
/// default attribute tried when a chain ends while still holding a
/// handle (`"up"` if none is declared).
#[derive(Default)]
pub struct AttributeRegistry {
    resolvers: HashMap<(String, String), AttributeFn>,
    defaults: HashMap<String, String>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        type_tag: &str,
        attr: &str,
        f: impl Fn(&Handle, &GameStateSnapshot) -> Resolution + 'static,
    ) {
        self.resolvers
            .insert((type_tag.to_string(), attr.to_string()), Box::new(f));
    }

    pub fn register_wildcard(
        &mut self,
        attr: &str,
        f: impl Fn(&Handle, &GameStateSnapshot) -> Resolution + 'static,
    ) {
        self.register("*", attr, f);
    }

    /// Register plain data-bag readers: each attribute resolves to the
    /// handle's stored value, defaulting to 0.0 when absent (the
    /// empty-data "not found" handle case).
    pub fn register_data_attrs(&mut self, type_tag: &str, attrs: &[&str]) {
        for attr in attrs {
            let key = attr.to_string();
            self.register(type_tag, attr, move |handle, _| {
                Resolution::Value(handle.data.get(&key).copied().unwrap_or(0.0))
            });
        }
    }

    pub fn set_default(&mut self, type_tag: &str, attr: &str) {
        self.defaults
            .insert(type_tag.to_string(), attr.to_string());
    }

    pub fn default_for(&self, type_tag: &str) -> &str {
        self.defaults.get(type_tag).map(String::as_str).unwrap_or("up")
    }

    pub fn has(&self, type_tag: &str, attr: &str) -> bool {
        self.resolvers
            .contains_key(&(type_tag.to_string(), attr.to_string()))
            || self
                .resolvers
                .contains_key(&("*".to_string(), attr.to_string()))
    }

    fn resolve(
        &self,
        handle: &Handle,
        attr: &str,
        state: &GameStateSnapshot,
    ) -> Option<Resolution> {
        let specific = (handle.type_tag.clone(), attr.to_string());
        if let Some(f) = self.resolvers.get(&specific) {
            return Some(f(handle, state));
        }
        let wildcard = ("*".to_string(), attr.to_string());
        self.resolvers.get(&wildcard).map(|f| f(handle, state))
    }
}

/// Resolve a dotted identifier path to a number.
///
/// The loop consumes exactly one segment per step, so every chain
/// terminates. A terminal value ends resolution even if segments remain.
pub fn resolve_path(
    path: &IdentPath,
    modules: &ModuleRegistry,
    attributes: &AttributeRegistry,
    state: &GameStateSnapshot,
) -> f64 {
    let segments = path.segments();
    if segments.is_empty() {
        return 0.0;
    }
    let root = segments[0].as_str();

    let (module, name, rest): (&dyn Module, &str, &[String]) = match modules.get(root) {
        Some(module) if module.wants_name() => (
            module,
            segments.get(1).map(String::as_str).unwrap_or(""),
            segments.get(2..).unwrap_or(&[]),
        ),
        Some(module) => (module, "", &segments[1..]),
        None => match &modules.fallback {
            // The fallback consumes the root itself as the name
            Some(module) => (module.as_ref(), root, &segments[1..]),
            None => {
                trace!(%path, "unknown root module");
                return 0.0;
            }
        },
    };

    let mut handle = module.lookup(name, state);
    let mut remaining = rest;

    loop {
        let attr = match remaining.first() {
            Some(segment) => segment.as_str(),
            None => {
                // Chain exhausted while holding a handle: try the
                // handle type's default attribute.
                let default = attributes.default_for(&handle.type_tag);
                return match attributes.resolve(&handle, default, state) {
                    Some(Resolution::Value(v)) => v,
                    _ => 0.0,
                };
            }
        };
        match attributes.resolve(&handle, attr, state) {
            Some(Resolution::Value(v)) => return v,
            Some(Resolution::Chain(next)) => {
                handle = next;
                remaining = &remaining[1..];
            }
            None => {
                trace!(%path, attr, type_tag = %handle.type_tag, "no attribute resolver");
                return 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModule;

    impl Module for FixedModule {
        fn root(&self) -> &str {
            "pet"
        }
        fn type_tag(&self) -> &str {
            "pet"
        }
        fn lookup(&self, name: &str, _state: &GameStateSnapshot) -> Handle {
            if name == "wolf" {
                Handle::new("pet", name).with("stack", 3.0).with("up", 1.0)
            } else {
                Handle::new("pet", name)
            }
        }
    }

    fn env() -> (ModuleRegistry, AttributeRegistry) {
        let mut modules = ModuleRegistry::new();
        modules.register(Box::new(FixedModule));
        let mut attributes = AttributeRegistry::new();
        attributes.register_data_attrs("pet", &["stack", "up"]);
        (modules, attributes)
    }

    fn resolve(path: &str, modules: &ModuleRegistry, attributes: &AttributeRegistry) -> f64 {
        let state = GameStateSnapshot::new();
        resolve_path(&IdentPath::from(path), modules, attributes, &state)
    }

    #[test]
    fn test_registered_attribute_resolves() {
        let (modules, attributes) = env();
        assert_eq!(resolve("pet.wolf.stack", &modules, &attributes), 3.0);
    }

    #[test]
    fn test_unknown_attribute_is_zero() {
        let (modules, attributes) = env();
        assert_eq!(resolve("pet.wolf.unknown_attr", &modules, &attributes), 0.0);
    }

    #[test]
    fn test_unknown_root_is_zero() {
        let (modules, attributes) = env();
        assert_eq!(resolve("nosuch.wolf.stack", &modules, &attributes), 0.0);
    }

    #[test]
    fn test_unknown_name_uses_empty_handle() {
        let (modules, attributes) = env();
        assert_eq!(resolve("pet.bear.stack", &modules, &attributes), 0.0);
    }

    #[test]
    fn test_exhausted_chain_tries_default_attribute() {
        let (modules, attributes) = env();
        // default for an undeclared type is "up"
        assert_eq!(resolve("pet.wolf", &modules, &attributes), 1.0);
        assert_eq!(resolve("pet.bear", &modules, &attributes), 0.0);
    }

    #[test]
    fn test_wildcard_fallback() {
        let (modules, mut attributes) = env();
        attributes.register_wildcard("exists", |_, _| Resolution::Value(1.0));
        assert_eq!(resolve("pet.wolf.exists", &modules, &attributes), 1.0);
    }

    #[test]
    fn test_chaining_through_handles() {
        let (modules, mut attributes) = env();
        attributes.register("pet", "owner", |_, _| {
            Resolution::Chain(Handle::new("pet", "owner").with("stack", 7.0))
        });
        assert_eq!(resolve("pet.wolf.owner.stack", &modules, &attributes), 7.0);
    }
}
