//! Expression evaluation and predicates
//!
//! Evaluation is synchronous: predicates only read the sensing facade.

use super::types::{Arg, ExecError, Expr, LogicalOp, Span, TraceEvent, UnaryOp, Val};
use super::Executor;
use crate::selector::Selector;
use crate::world::{normalize_id, BlockPos};

impl Executor {
    pub(crate) fn eval(&self, expr: &Expr) -> Result<Val, ExecError> {
        match expr {
            Expr::Number { value, .. } => Ok(Val::Num(*value)),
            Expr::Boolean { value, .. } => Ok(Val::Bool(*value)),
            Expr::String { value, .. } => Ok(Val::Str(value.clone())),
            Expr::Identifier { name, .. } => Ok(Val::Str(name.clone())),
            Expr::Logical {
                op, left, right, ..
            } => {
                let left = self.eval(left)?.is_truthy();
                let value = match op {
                    LogicalOp::And => left && self.eval(right)?.is_truthy(),
                    LogicalOp::Or => left || self.eval(right)?.is_truthy(),
                };
                Ok(Val::Bool(value))
            }
            Expr::Unary {
                op: UnaryOp::Not,
                arg,
                ..
            } => Ok(Val::Bool(!self.eval(arg)?.is_truthy())),
            Expr::PredicateCall { name, args, span } => {
                self.eval_predicate(name, args, *span).map(Val::Bool)
            }
            Expr::Selector { selector, .. } => Ok(Val::Selector(selector.clone())),
            Expr::World { x, y, z, .. } => Ok(Val::World(BlockPos::new(*x, *y, *z))),
            Expr::Waypoint { name, .. } => Ok(Val::Waypoint(name.clone())),
        }
    }

    /// Predicates. The four stance predicates look at the actor's current
    /// feet cell and ignore any selector argument.
    fn eval_predicate(&self, name: &str, args: &[Arg], span: Span) -> Result<bool, ExecError> {
        let sensing = &self.sensing;
        let value = match name {
            "safe_step_up" => sensing.safe_step_up(),
            "safe_step_down" => sensing.safe_step_down(),
            "can_stand" => sensing.can_stand(),
            "is_air" => sensing.is_air(),
            "has_item" => {
                let item = self.text(self.predicate_arg(name, args, 0, span)?, "item id")?;
                sensing.has_item(&item)
            }
            "is_hazard" => {
                let tag = self.text(self.predicate_arg(name, args, 0, span)?, "hazard tag")?;
                sensing
                    .hazards(self.options.default_scan_radius)
                    .iter()
                    .any(|hazard| hazard.as_str() == tag)
            }
            "block_is" => {
                let selector = self.selector(self.predicate_arg(name, args, 0, span)?)?;
                let id = self.text(self.predicate_arg(name, args, 1, span)?, "block id")?;
                sensing.block_at(sensing.resolve(&selector)).as_deref() == Some(normalize_id(&id).as_str())
            }
            _ => return Err(ExecError::compile(format!("unknown predicate: {}", name)).at(span)),
        };

        self.trace(TraceEvent::Predicate {
            name: name.to_string(),
            value,
            loc: span.location(),
        });
        Ok(value)
    }

    fn predicate_arg(&self, name: &str, args: &[Arg], index: usize, span: Span) -> Result<Val, ExecError> {
        let expr = args
            .iter()
            .filter_map(|arg| match arg {
                Arg::Positional(expr) => Some(expr),
                Arg::Named { .. } => None,
            })
            .nth(index)
            .ok_or_else(|| {
                ExecError::compile(format!("{} expects argument {}", name, index + 1)).at(span)
            })?;
        self.eval(expr)
    }

    /* ===================== Value Coercions ===================== */

    /// Item ids, tokens and tags: strings and bare identifiers. Whole
    /// numbers are accepted so that `turn 180` works.
    pub(crate) fn text(&self, val: Val, what: &str) -> Result<String, ExecError> {
        match val {
            Val::Str(s) => Ok(s),
            Val::Num(n) if n.fract() == 0.0 => Ok(format!("{}", n as i64)),
            other => Err(ExecError::compile(format!(
                "expected {}, got {}",
                what,
                other.type_name()
            ))),
        }
    }

    pub(crate) fn selector(&self, val: Val) -> Result<Selector, ExecError> {
        match val {
            Val::Selector(selector) => Ok(selector),
            other => Err(ExecError::compile(format!(
                "expected selector, got {}",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn integer(&self, val: Val, what: &str) -> Result<i64, ExecError> {
        match val {
            Val::Num(n) if n.is_finite() => Ok(n.floor() as i64),
            other => Err(ExecError::compile(format!(
                "expected {} (number), got {}",
                what,
                other.type_name()
            ))),
        }
    }

    /// A concrete cell: selectors resolve against the current pose
    pub(crate) fn cell(&self, val: Val) -> Result<BlockPos, ExecError> {
        match val {
            Val::Selector(selector) => Ok(self.sensing.resolve(&selector)),
            Val::World(pos) => Ok(pos),
            other => Err(ExecError::compile(format!(
                "expected selector or world position, got {}",
                other.type_name()
            ))),
        }
    }
}
