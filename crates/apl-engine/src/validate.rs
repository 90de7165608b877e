//! Static validation of a loaded action list
//!
//! Runs once at load time, never per cycle. Validation is advisory: it
//! reports issues but never blocks loading, matching the permissive
//! resolution semantics where misses evaluate to 0.0.

use std::fmt;

use apl_dsl::{ActionList, IdentPath};

use crate::registry::ActionRegistry;
use crate::resolve::ResolveEnv;

/// One advisory finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// 1-based source line of the offending action line
    pub line: u32,
    pub subject: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.subject, self.message)
    }
}

/// Check every action line against the registry and every referenced
/// identifier path against the resolution registries.
///
/// Only the first attribute segment is checked; deeper chains through
/// handle-returning resolvers are left to runtime.
pub fn validate_action_list(
    list: &ActionList,
    registry: &ActionRegistry,
    env: &ResolveEnv,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for line in &list.lines {
        if !registry.contains(&line.name) {
            issues.push(ValidationIssue {
                line: line.line,
                subject: line.name.clone(),
                message: "action not registered".to_string(),
            });
        }

        for dep in line.dependencies() {
            let path = IdentPath::from(dep.as_str());
            let segments = path.segments();
            let Some(module) = env.modules.get(path.root()) else {
                // Unclaimed roots fall through to the variable module
                // when one is installed; those are dynamic by nature.
                if !env.modules.has_fallback() {
                    issues.push(ValidationIssue {
                        line: line.line,
                        subject: dep.clone(),
                        message: format!("unknown root module '{}'", path.root()),
                    });
                }
                continue;
            };

            let attr_index = if module.wants_name() { 2 } else { 1 };
            if let Some(attr) = segments.get(attr_index) {
                if !env.attributes.has(module.type_tag(), attr) {
                    issues.push(ValidationIssue {
                        line: line.line,
                        subject: dep.clone(),
                        message: format!(
                            "no resolver for attribute '{attr}' on type '{}'",
                            module.type_tag()
                        ),
                    });
                }
            }
        }
    }

    issues
}
