//! Game state model
//!
//! The snapshot is the state-provider boundary: resources, buffs and
//! debuffs, cooldowns and the current target, plus free-form numeric
//! variables. It is read-only during a decision cycle; mutation happens
//! through the helpers here between cycles, and every helper records the
//! identifier root it touched so the evaluator can invalidate dependent
//! cache entries.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A pool resource such as mana or focus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub current: f64,
    pub max: f64,
    /// Regeneration per second
    #[serde(default)]
    pub regen: f64,
}

impl Default for Resource {
    fn default() -> Self {
        Self {
            current: 100.0,
            max: 100.0,
            regen: 0.0,
        }
    }
}

impl Resource {
    pub fn new(current: f64, max: f64, regen: f64) -> Self {
        Self {
            current,
            max,
            regen,
        }
    }

    /// Fill level as a percentage (0-100)
    pub fn pct(&self) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.current / self.max) * 100.0
    }

    /// Amount missing from maximum
    pub fn deficit(&self) -> f64 {
        (self.max - self.current).max(0.0)
    }

    /// Deficit as a percentage
    pub fn deficit_pct(&self) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.deficit() / self.max) * 100.0
    }
}

/// A buff or debuff instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aura {
    pub stacks: u32,
    /// Seconds until expiry; 0 means expired
    pub remains: f64,
    #[serde(default = "one")]
    pub max_stacks: u32,
}

fn one() -> u32 {
    1
}

impl Aura {
    pub fn new(stacks: u32, remains: f64, max_stacks: u32) -> Self {
        Self {
            stacks,
            remains,
            max_stacks,
        }
    }

    /// 1.0 while active, 0.0 otherwise
    pub fn up(&self) -> f64 {
        if self.stacks > 0 && self.remains > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    pub fn down(&self) -> f64 {
        1.0 - self.up()
    }
}

/// An ability cooldown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cooldown {
    /// Seconds until the next charge is available; 0 means ready
    pub remains: f64,
    pub duration: f64,
    #[serde(default = "one")]
    pub charges: u32,
    #[serde(default = "one")]
    pub max_charges: u32,
}

impl Cooldown {
    pub fn new(remains: f64, duration: f64) -> Self {
        Self {
            remains,
            duration,
            charges: if remains > 0.0 { 0 } else { 1 },
            max_charges: 1,
        }
    }

    /// 1.0 if a charge is available, 0.0 otherwise
    pub fn ready(&self) -> f64 {
        if self.charges > 0 || self.remains <= 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

/// The current target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub health: Resource,
    #[serde(default)]
    pub distance: f64,
    #[serde(default = "default_ttd")]
    pub time_to_die: f64,
    /// Additional enemies beyond the primary target
    #[serde(default)]
    pub adds: u32,
    #[serde(default = "one")]
    pub level: u32,
}

fn default_ttd() -> f64 {
    999.0
}

impl Default for Target {
    fn default() -> Self {
        Self {
            health: Resource::default(),
            distance: 0.0,
            time_to_die: default_ttd(),
            adds: 0,
            level: 1,
        }
    }
}

/// Full game state visible to one decision cycle.
///
/// `changed` accumulates the identifier roots mutated since the last
/// [`take_changed`](Self::take_changed) call. The engine drains it at the
/// start of each cycle to invalidate dependent cache entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    #[serde(default)]
    pub resources: IndexMap<String, Resource>,
    #[serde(default)]
    pub buffs: IndexMap<String, Aura>,
    #[serde(default)]
    pub debuffs: IndexMap<String, Aura>,
    #[serde(default)]
    pub cooldowns: IndexMap<String, Cooldown>,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub gcd_remains: f64,
    /// Simulation time in seconds, advanced by [`advance`](Self::advance)
    #[serde(default)]
    pub time: f64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub variables: IndexMap<String, f64>,
    #[serde(skip)]
    changed: HashSet<String>,
}

fn default_level() -> u32 {
    60
}

impl GameStateSnapshot {
    pub fn new() -> Self {
        Self {
            level: default_level(),
            ..Default::default()
        }
    }

    /// Drain the set of identifier roots mutated since the last call.
    pub fn take_changed(&mut self) -> HashSet<String> {
        std::mem::take(&mut self.changed)
    }

    fn touch(&mut self, root: impl Into<String>) {
        self.changed.insert(root.into());
    }

    pub fn set_resource(&mut self, name: &str, current: f64, max: f64, regen: f64) {
        self.resources
            .insert(name.to_string(), Resource::new(current, max, regen));
        self.touch(name);
    }

    /// Spend from a resource. Returns false without mutating if the pool
    /// cannot cover the amount.
    pub fn spend_resource(&mut self, name: &str, amount: f64) -> bool {
        let Some(resource) = self.resources.get_mut(name) else {
            return false;
        };
        if resource.current < amount {
            return false;
        }
        resource.current -= amount;
        self.touch(name);
        true
    }

    pub fn gain_resource(&mut self, name: &str, amount: f64) {
        if let Some(resource) = self.resources.get_mut(name) {
            resource.current = (resource.current + amount).min(resource.max);
            self.touch(name);
        }
    }

    pub fn apply_buff(&mut self, name: &str, duration: f64, stacks: u32, max_stacks: u32) {
        self.buffs
            .insert(name.to_string(), Aura::new(stacks, duration, max_stacks));
        self.touch(format!("buff.{name}"));
    }

    pub fn remove_buff(&mut self, name: &str) {
        if self.buffs.shift_remove(name).is_some() {
            self.touch(format!("buff.{name}"));
        }
    }

    pub fn apply_debuff(&mut self, name: &str, duration: f64, stacks: u32, max_stacks: u32) {
        self.debuffs
            .insert(name.to_string(), Aura::new(stacks, duration, max_stacks));
        self.touch(format!("debuff.{name}"));
    }

    pub fn remove_debuff(&mut self, name: &str) {
        if self.debuffs.shift_remove(name).is_some() {
            self.touch(format!("debuff.{name}"));
        }
    }

    pub fn set_cooldown(&mut self, name: &str, duration: f64) {
        self.cooldowns
            .insert(name.to_string(), Cooldown::new(duration, duration));
        self.touch(format!("cooldown.{name}"));
    }

    pub fn clear_cooldown(&mut self, name: &str) {
        if let Some(cd) = self.cooldowns.get_mut(name) {
            cd.remains = 0.0;
            cd.charges = cd.max_charges;
            self.touch(format!("cooldown.{name}"));
        }
    }

    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
        self.touch(name);
    }

    pub fn trigger_gcd(&mut self, duration: f64) {
        self.gcd_remains = duration;
        self.touch("gcd");
    }

    /// Advance all time-dependent state by `dt` seconds: resource regen,
    /// aura and cooldown countdowns, GCD decay. Records a changed root
    /// for everything that actually moved.
    pub fn advance(&mut self, dt: f64) {
        self.time += dt;
        let mut touched = Vec::new();

        for (name, resource) in &mut self.resources {
            if resource.regen > 0.0 && resource.current < resource.max {
                resource.current = (resource.current + resource.regen * dt).min(resource.max);
                touched.push(name.clone());
            }
        }

        for (name, aura) in &mut self.buffs {
            if aura.remains > 0.0 {
                aura.remains = (aura.remains - dt).max(0.0);
                if aura.remains == 0.0 {
                    aura.stacks = 0;
                }
                touched.push(format!("buff.{name}"));
            }
        }
        for (name, aura) in &mut self.debuffs {
            if aura.remains > 0.0 {
                aura.remains = (aura.remains - dt).max(0.0);
                if aura.remains == 0.0 {
                    aura.stacks = 0;
                }
                touched.push(format!("debuff.{name}"));
            }
        }

        for (name, cd) in &mut self.cooldowns {
            if cd.remains > 0.0 {
                cd.remains = (cd.remains - dt).max(0.0);
                if cd.remains == 0.0 {
                    cd.charges = cd.max_charges;
                }
                touched.push(format!("cooldown.{name}"));
            }
        }

        if self.gcd_remains > 0.0 {
            self.gcd_remains = (self.gcd_remains - dt).max(0.0);
            touched.push("gcd".to_string());
        }

        for root in touched {
            self.changed.insert(root);
        }
    }
}
