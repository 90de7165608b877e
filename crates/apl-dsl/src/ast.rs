//! AST for APL expressions and action lines.
//!
//! Expressions are owned trees; each action line owns the condition
//! expressions parsed from its options. The `Display` impls render a
//! canonical text form that re-parses to a structurally identical tree,
//! which the evaluator also uses as a structural cache key.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;

/// A dotted identifier path, e.g. `buff.steady_focus.stack`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentPath(pub Vec<String>);

impl IdentPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment (the module root)
    pub fn root(&self) -> &str {
        &self.0[0]
    }
}

impl fmt::Display for IdentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for IdentPath {
    fn from(s: &str) -> Self {
        Self(s.split('.').map(str::to_string).collect())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        };
        write!(f, "{s}")
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Mod,
    ModMod,
    Eq,
    Ne,
    Match,
    NotMatch,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Mod => "%",
            BinaryOp::ModMod => "%%",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Match => "~",
            BinaryOp::NotMatch => "!~",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
        };
        write!(f, "{s}")
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Literal(f64),
    /// Dotted identifier reference
    Path(IdentPath),
    /// Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Function call
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Collect the full dotted identifier paths this expression reads.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        self.collect_dependencies(&mut deps);
        deps
    }

    fn collect_dependencies(&self, deps: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Path(path) => {
                deps.insert(path.to_string());
            }
            Expr::Unary { operand, .. } => operand.collect_dependencies(deps),
            Expr::Binary { left, right, .. } => {
                left.collect_dependencies(deps);
                right.collect_dependencies(deps);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_dependencies(deps);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Path(p) => write!(f, "{p}"),
            Expr::Unary { op, operand } => write!(f, "({op}{operand})"),
            Expr::Binary { op, left, right } => write!(f, "({left}{op}{right})"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Scalar value of a non-expression option
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Number(n) => write!(f, "{n}"),
            OptionValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Option names whose values parse as full expressions
pub const EXPRESSION_OPTIONS: [&str; 5] =
    ["if", "interrupt_if", "target_if", "wait_on_ready", "line_cd"];

/// One action line of an APL: an action name plus guard options.
///
/// The registry entry is referenced by name only and resolved each cycle;
/// the registry remains the sole owner of action definitions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionLine {
    /// Normalized action name (lowercase, underscores)
    pub name: String,
    /// Opaque key/value options passed through unevaluated
    pub options: IndexMap<String, OptionValue>,
    /// `if=` guard; absence means always true
    pub if_expr: Option<Expr>,
    /// `interrupt_if=` condition, consumed by the casting collaborator
    pub interrupt_if_expr: Option<Expr>,
    /// `target_if=` target-selection condition
    pub target_if_expr: Option<Expr>,
    /// `wait_on_ready=` condition
    pub wait_on_ready_expr: Option<Expr>,
    /// `line_cd=` minimum seconds between uses of this line
    pub line_cd_expr: Option<Expr>,
    /// 1-based source line
    pub line: u32,
    /// Simulation time at which the line cooldown expires.
    /// Mutated by the executor after each use of the line.
    pub line_cooldown_expires: f64,
}

impl ActionLine {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            ..Default::default()
        }
    }

    /// Named condition expressions present on this line.
    pub fn conditions(&self) -> impl Iterator<Item = (&'static str, &Expr)> {
        [
            ("if", self.if_expr.as_ref()),
            ("interrupt_if", self.interrupt_if_expr.as_ref()),
            ("target_if", self.target_if_expr.as_ref()),
            ("wait_on_ready", self.wait_on_ready_expr.as_ref()),
            ("line_cd", self.line_cd_expr.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, expr)| expr.map(|e| (name, e)))
    }

    /// All identifier paths this line's conditions read.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        for (_, expr) in self.conditions() {
            deps.extend(expr.dependencies());
        }
        deps
    }
}

impl fmt::Display for ActionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name)?;
        for (key, value) in &self.options {
            write!(f, ",{key}={value}")?;
        }
        for (name, expr) in self.conditions() {
            write!(f, ",{name}={expr}")?;
        }
        Ok(())
    }
}

/// Normalize an action name: lowercase, spaces become underscores
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(' ', "_")
}

/// An ordered action list. Priority equals position; first match wins,
/// and the order is never implicitly changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionList {
    pub name: String,
    pub lines: Vec<ActionLine>,
}

impl Default for ActionList {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            lines: Vec::new(),
        }
    }
}

impl ActionList {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, line: ActionLine) {
        self.lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// All identifier paths referenced by any line.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        for line in &self.lines {
            deps.extend(line.dependencies());
        }
        deps
    }
}

impl fmt::Display for ActionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
