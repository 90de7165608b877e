//! Expression evaluation with caching and dependency invalidation
//!
//! Operator semantics follow rotation-scripting convention: comparisons
//! yield 1.0/0.0, equality tolerates floating-point error with an
//! epsilon, `&` and `|` short-circuit, and modulo by zero is 0.0 rather
//! than an error.
//!
//! Each top-level evaluation is cached under the expression's canonical
//! text form. An entry stays valid while it is inside the TTL window and
//! none of its identifier dependencies appears in the changed-roots set
//! drained from the snapshot each cycle.

use std::collections::{BTreeSet, HashMap, HashSet};

use apl_dsl::{BinaryOp, Expr, UnaryOp};
use tracing::trace;

use crate::error::{Error, Result};
use crate::resolve::ResolveEnv;
use crate::state::GameStateSnapshot;

const EPSILON: f64 = 1e-9;

type CustomFn = Box<dyn Fn(&[f64]) -> f64>;

/// Caller-supplied functions for names the built-in set does not cover.
#[derive(Default)]
pub struct FunctionRegistry {
    fns: HashMap<String, CustomFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, f: impl Fn(&[f64]) -> f64 + 'static) {
        self.fns.insert(name.to_string(), Box::new(f));
    }

    pub fn call(&self, name: &str, args: &[f64]) -> Option<f64> {
        self.fns.get(name).map(|f| f(args))
    }
}

/// Everything one evaluation reads: the resolution registries, custom
/// functions, the state snapshot and the current simulation time.
pub struct EvalContext<'a> {
    pub env: &'a ResolveEnv,
    pub functions: &'a FunctionRegistry,
    pub state: &'a GameStateSnapshot,
    pub now: f64,
}

/// Evaluation performance counters
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalStats {
    pub evaluations: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl EvalStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.evaluations == 0 {
            return 0.0;
        }
        (self.cache_hits as f64 / self.evaluations as f64) * 100.0
    }
}

struct CacheEntry {
    value: f64,
    computed_at: f64,
    dependencies: BTreeSet<String>,
    hit_count: u64,
}

/// Caching expression evaluator.
///
/// Owns its cache exclusively; one evaluator per engine instance.
pub struct Evaluator {
    cache: HashMap<String, CacheEntry>,
    ttl: f64,
    max_entries: usize,
    caching: bool,
    stats: EvalStats,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            ttl: 0.1,
            max_entries: 1000,
            caching: true,
            stats: EvalStats::default(),
        }
    }

    pub fn set_ttl(&mut self, ttl: f64) {
        self.ttl = ttl;
    }

    pub fn set_max_entries(&mut self, max: usize) {
        self.max_entries = max;
    }

    pub fn set_caching(&mut self, enabled: bool) {
        self.caching = enabled;
    }

    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Evaluate an expression, consulting the cache first.
    pub fn evaluate(&mut self, expr: &Expr, ctx: &EvalContext) -> Result<f64> {
        self.stats.evaluations += 1;

        if !self.caching {
            return eval_expr(expr, ctx);
        }

        let key = expr.to_string();
        if let Some(entry) = self.cache.get_mut(&key) {
            if ctx.now - entry.computed_at <= self.ttl {
                entry.hit_count += 1;
                self.stats.cache_hits += 1;
                return Ok(entry.value);
            }
            self.cache.remove(&key);
        }

        let value = eval_expr(expr, ctx)?;
        self.stats.cache_misses += 1;
        self.cache.insert(
            key,
            CacheEntry {
                value,
                computed_at: ctx.now,
                dependencies: expr.dependencies(),
                hit_count: 0,
            },
        );
        if self.cache.len() > self.max_entries {
            self.evict();
        }
        Ok(value)
    }

    /// Drop every entry that depends on one of the changed identifier
    /// roots. A root matches a dependency exactly or as a dotted prefix,
    /// so `buff.steady_focus` invalidates `buff.steady_focus.stack`.
    pub fn invalidate_changed(&mut self, roots: &HashSet<String>) {
        if roots.is_empty() {
            return;
        }
        let before = self.cache.len();
        self.cache.retain(|_, entry| {
            !entry.dependencies.iter().any(|dep| {
                roots.iter().any(|root| {
                    dep == root
                        || (dep.len() > root.len()
                            && dep.starts_with(root.as_str())
                            && dep.as_bytes()[root.len()] == b'.')
                })
            })
        });
        let dropped = before - self.cache.len();
        if dropped > 0 {
            trace!(dropped, "invalidated cache entries");
        }
    }

    /// Evict lowest-hit-count entries until the cache fits again.
    fn evict(&mut self) {
        let excess = self.cache.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return;
        }
        let mut ranked: Vec<(String, u64)> = self
            .cache
            .iter()
            .map(|(k, e)| (k.clone(), e.hit_count))
            .collect();
        ranked.sort_by_key(|(_, hits)| *hits);
        for (key, _) in ranked.into_iter().take(excess) {
            self.cache.remove(&key);
        }
    }
}

fn truthy(v: f64) -> f64 {
    if v != 0.0 {
        1.0
    } else {
        0.0
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Floating modulo with sign following the divisor; 0.0 when the divisor
/// is zero.
fn modulo(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a - b * (a / b).floor()
    }
}

fn eval_expr(expr: &Expr, ctx: &EvalContext) -> Result<f64> {
    match expr {
        Expr::Literal(v) => Ok(*v),
        Expr::Path(path) => Ok(ctx.env.resolve(path, ctx.state)),
        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, ctx)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Neg => -v,
                UnaryOp::Not => {
                    if v == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
            })
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx),
        Expr::Call { name, args } => eval_call(name, args, ctx),
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<f64> {
    // & and | short-circuit: the right side is only evaluated when the
    // left side has not already decided the result.
    match op {
        BinaryOp::And => {
            let l = eval_expr(left, ctx)?;
            if l == 0.0 {
                return Ok(0.0);
            }
            return Ok(truthy(eval_expr(right, ctx)?));
        }
        BinaryOp::Or => {
            let l = eval_expr(left, ctx)?;
            if l != 0.0 {
                return Ok(1.0);
            }
            return Ok(truthy(eval_expr(right, ctx)?));
        }
        _ => {}
    }

    let l = eval_expr(left, ctx)?;
    let r = eval_expr(right, ctx)?;
    let bool_result = |b: bool| if b { 1.0 } else { 0.0 };

    Ok(match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Mod | BinaryOp::ModMod => modulo(l, r),
        BinaryOp::Eq | BinaryOp::Match => bool_result(approx_eq(l, r)),
        BinaryOp::Ne | BinaryOp::NotMatch => bool_result(!approx_eq(l, r)),
        BinaryOp::Lt => bool_result(l < r),
        BinaryOp::Le => bool_result(l <= r),
        BinaryOp::Gt => bool_result(l > r),
        BinaryOp::Ge => bool_result(l >= r),
        BinaryOp::Xor => bool_result((l != 0.0) != (r != 0.0)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    })
}

fn eval_call(name: &str, args: &[Expr], ctx: &EvalContext) -> Result<f64> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_expr(arg, ctx)?);
    }

    let arity = |expected: &'static str, ok: bool| -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(Error::FunctionArity {
                name: name.to_string(),
                expected,
                got: values.len(),
            })
        }
    };

    match name {
        "floor" => {
            arity("1", values.len() == 1)?;
            Ok(values[0].floor())
        }
        "ceil" => {
            arity("1", values.len() == 1)?;
            Ok(values[0].ceil())
        }
        "abs" => {
            arity("1", values.len() == 1)?;
            Ok(values[0].abs())
        }
        "min" => {
            arity("at least 1", !values.is_empty())?;
            Ok(values.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            arity("at least 1", !values.is_empty())?;
            Ok(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        "round" => {
            arity("1 or 2", values.len() == 1 || values.len() == 2)?;
            if values.len() == 1 {
                Ok(values[0].round())
            } else {
                let scale = 10f64.powi(values[1] as i32);
                Ok((values[0] * scale).round() / scale)
            }
        }
        _ => match ctx.functions.call(name, &values) {
            Some(v) => Ok(v),
            None => Err(Error::UnknownFunction(name.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use apl_dsl::parse_expression;

    use super::*;

    fn eval_with(source: &str, state: &GameStateSnapshot, functions: &FunctionRegistry) -> f64 {
        let env = ResolveEnv::standard(&["mana", "focus"]);
        let mut evaluator = Evaluator::new();
        let expr = parse_expression(source).unwrap();
        let ctx = EvalContext {
            env: &env,
            functions,
            state,
            now: state.time,
        };
        evaluator.evaluate(&expr, &ctx).unwrap()
    }

    fn eval(source: &str) -> f64 {
        let mut state = GameStateSnapshot::new();
        state.set_resource("mana", 75.0, 100.0, 0.0);
        eval_with(source, &state, &FunctionRegistry::new())
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        assert_eq!(eval("1+2*3"), 7.0);
        assert_eq!(eval("mana>50"), 1.0);
        assert_eq!(eval("mana.pct>=80"), 0.0);
        assert_eq!(eval("10%3"), 1.0);
        assert_eq!(eval("10%%0"), 0.0);
    }

    #[test]
    fn test_epsilon_equality() {
        assert_eq!(eval("0.1+0.2=0.3"), 1.0);
        assert_eq!(eval("0.1+0.2!=0.3"), 0.0);
    }

    #[test]
    fn test_logic_and_xor() {
        assert_eq!(eval("1&2"), 1.0);
        assert_eq!(eval("0|5"), 1.0);
        assert_eq!(eval("1^1"), 0.0);
        assert_eq!(eval("1^0"), 1.0);
        assert_eq!(eval("!0"), 1.0);
        assert_eq!(eval("!3"), 0.0);
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval("floor(2.7)"), 2.0);
        assert_eq!(eval("ceil(2.1)"), 3.0);
        assert_eq!(eval("abs(0-4)"), 4.0);
        assert_eq!(eval("min(3,1,2)"), 1.0);
        assert_eq!(eval("max(3,1,2)"), 3.0);
        assert_eq!(eval("round(2.456,2)"), 2.46);
    }

    #[test]
    fn test_and_short_circuits() {
        let state = GameStateSnapshot::new();
        let calls = Rc::new(Cell::new(0u32));
        let probe = calls.clone();
        let mut functions = FunctionRegistry::new();
        functions.register("probe", move |_| {
            probe.set(probe.get() + 1);
            1.0
        });
        assert_eq!(eval_with("0&probe()", &state, &functions), 0.0);
        assert_eq!(calls.get(), 0);
        assert_eq!(eval_with("1&probe()", &state, &functions), 1.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_or_short_circuits() {
        let state = GameStateSnapshot::new();
        let calls = Rc::new(Cell::new(0u32));
        let probe = calls.clone();
        let mut functions = FunctionRegistry::new();
        functions.register("probe", move |_| {
            probe.set(probe.get() + 1);
            1.0
        });
        assert_eq!(eval_with("1|probe()", &state, &functions), 1.0);
        assert_eq!(calls.get(), 0);
        assert_eq!(eval_with("0|probe()", &state, &functions), 1.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unknown_function_fails_expression() {
        let env = ResolveEnv::standard(&[]);
        let functions = FunctionRegistry::new();
        let state = GameStateSnapshot::new();
        let mut evaluator = Evaluator::new();
        let expr = parse_expression("nope(1)").unwrap();
        let ctx = EvalContext {
            env: &env,
            functions: &functions,
            state: &state,
            now: 0.0,
        };
        assert!(matches!(
            evaluator.evaluate(&expr, &ctx),
            Err(Error::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_cache_hit_within_ttl() {
        let env = ResolveEnv::standard(&["mana"]);
        let functions = FunctionRegistry::new();
        let mut state = GameStateSnapshot::new();
        state.set_resource("mana", 80.0, 100.0, 0.0);
        state.take_changed();

        let mut evaluator = Evaluator::new();
        let expr = parse_expression("mana>50").unwrap();
        let ctx = EvalContext {
            env: &env,
            functions: &functions,
            state: &state,
            now: 0.0,
        };
        assert_eq!(evaluator.evaluate(&expr, &ctx).unwrap(), 1.0);
        assert_eq!(evaluator.evaluate(&expr, &ctx).unwrap(), 1.0);
        let stats = evaluator.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let env = ResolveEnv::standard(&["mana"]);
        let functions = FunctionRegistry::new();
        let mut state = GameStateSnapshot::new();
        state.set_resource("mana", 80.0, 100.0, 0.0);

        let mut evaluator = Evaluator::new();
        let expr = parse_expression("mana>50").unwrap();
        let at = |now: f64| EvalContext {
            env: &env,
            functions: &functions,
            state: &state,
            now,
        };
        evaluator.evaluate(&expr, &at(0.0)).unwrap();
        evaluator.evaluate(&expr, &at(0.5)).unwrap();
        assert_eq!(evaluator.stats().cache_misses, 2);
    }

    #[test]
    fn test_dependency_invalidation() {
        let env = ResolveEnv::standard(&["mana"]);
        let functions = FunctionRegistry::new();
        let mut state = GameStateSnapshot::new();
        state.set_resource("mana", 80.0, 100.0, 0.0);
        state.take_changed();

        let mut evaluator = Evaluator::new();
        let expr = parse_expression("mana.pct>50").unwrap();
        let ctx = EvalContext {
            env: &env,
            functions: &functions,
            state: &state,
            now: 0.0,
        };
        assert_eq!(evaluator.evaluate(&expr, &ctx).unwrap(), 1.0);

        state.spend_resource("mana", 60.0);
        let changed = state.take_changed();
        evaluator.invalidate_changed(&changed);

        let ctx = EvalContext {
            env: &env,
            functions: &functions,
            state: &state,
            now: 0.0,
        };
        assert_eq!(evaluator.evaluate(&expr, &ctx).unwrap(), 0.0);
        let stats = evaluator.stats();
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.cache_misses, 2);
    }

    #[test]
    fn test_eviction_keeps_hot_entries() {
        let env = ResolveEnv::standard(&[]);
        let functions = FunctionRegistry::new();
        let state = GameStateSnapshot::new();
        let mut evaluator = Evaluator::new();
        evaluator.set_max_entries(2);

        let hot = parse_expression("1+1").unwrap();
        let warm = parse_expression("2+2").unwrap();
        let cold = parse_expression("3+3").unwrap();
        let ctx = EvalContext {
            env: &env,
            functions: &functions,
            state: &state,
            now: 0.0,
        };
        evaluator.evaluate(&hot, &ctx).unwrap();
        evaluator.evaluate(&hot, &ctx).unwrap();
        evaluator.evaluate(&warm, &ctx).unwrap();
        evaluator.evaluate(&warm, &ctx).unwrap();
        evaluator.evaluate(&cold, &ctx).unwrap();
        assert_eq!(evaluator.cache_len(), 2);
        evaluator.evaluate(&hot, &ctx).unwrap();
        assert_eq!(evaluator.stats().cache_hits, 3);
    }
}
