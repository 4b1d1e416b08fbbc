//! Runtime value types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::selector::Selector;
use crate::world::BlockPos;

/// Runtime value type. There is no variable storage; values only live
/// while a command's arguments or a condition are being evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Val {
    Bool(bool),
    Num(f64),
    Str(String),
    Selector(Selector),
    World(BlockPos),
    Waypoint(String),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            Val::Selector(_) | Val::World(_) | Val::Waypoint(_) => true,
        }
    }

    /// Short type name used in argument errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Selector(_) => "selector",
            Val::World(_) => "world position",
            Val::Waypoint(_) => "waypoint",
        }
    }
}

/// Plain text form used by `log`
impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Val::Num(n) => write!(f, "{}", n),
            Val::Str(s) => f.write_str(s),
            Val::Selector(selector) => write!(f, "{}", selector),
            Val::World(pos) => write!(f, "world({}, {}, {})", pos.x, pos.y, pos.z),
            Val::Waypoint(name) => write!(f, "waypoint({})", name),
        }
    }
}
