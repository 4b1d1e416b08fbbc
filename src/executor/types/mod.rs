//! Type definitions for the executor
//!
//! - AST nodes (Program, Statement, Expr)
//! - Runtime values (Val)
//! - Step results, failures and trace events

pub mod ast;
pub mod result;
pub mod values;

pub use ast::{Arg, Block, Command, Expr, Location, LogicalOp, Program, Span, Statement, UnaryOp};
pub use result::{CraftscriptResult, ErrorKind, ExecError, RunOutcome, StepFailure, StepSuccess, TraceEvent};
pub use values::Val;
