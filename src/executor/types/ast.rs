//! Abstract Syntax Tree node types

use serde::{Deserialize, Serialize};

use crate::selector::Selector;

/// Source location span for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column (0-indexed)
    pub start_col: usize,
    /// End line (0-indexed)
    pub end_line: usize,
    /// End column (0-indexed)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        let first = if self.start <= other.start { self } else { other };
        let tail = if self.end >= other.end { self } else { other };
        Span {
            start: first.start,
            end: tail.end,
            start_line: first.start_line,
            start_col: first.start_col,
            end_line: tail.end_line,
            end_col: tail.end_col,
        }
    }

    /// 1-indexed start position, as reported to users
    pub fn location(&self) -> Location {
        Location {
            line: self.start_line + 1,
            column: self.start_col + 1,
        }
    }
}

pub(crate) fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/// User-facing source position (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/* ===================== Program ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Statement>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

impl Program {
    /// Top-level macro declarations in source order
    pub fn macro_decls(&self) -> impl Iterator<Item = (&str, &Block, Span)> {
        self.body.iter().filter_map(|stmt| match stmt {
            Statement::MacroDecl { name, body, span } => Some((name.as_str(), body, *span)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub body: Vec<Statement>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/* ===================== Statements ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    Empty {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Block(Block),
    MacroDecl {
        name: String,
        body: Block,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Invocation of a declared macro, produced by the macro pre-pass
    MacroCall {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Assert {
        test: Expr,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    If {
        test: Expr,
        consequent: Block,
        #[serde(skip_serializing_if = "Option::is_none")]
        alternate: Option<Block>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Repeat {
        count: Expr,
        body: Block,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    While {
        test: Expr,
        body: Block,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Command(Command),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Empty { span }
            | Statement::MacroDecl { span, .. }
            | Statement::MacroCall { span, .. }
            | Statement::Assert { span, .. }
            | Statement::If { span, .. }
            | Statement::Repeat { span, .. }
            | Statement::While { span, .. } => *span,
            Statement::Block(block) => block.span,
            Statement::Command(cmd) => cmd.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub args: Vec<Arg>,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

impl Command {
    pub fn positional(&self) -> impl Iterator<Item = &Expr> {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Positional(expr) => Some(expr),
            Arg::Named { .. } => None,
        })
    }

    pub fn named(&self, key: &str) -> Option<&Expr> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Named { key: k, value, .. } if k == key => Some(value),
            _ => None,
        })
    }
}

/// Command or predicate argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Named {
        key: String,
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Positional(Expr),
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "!")]
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Number {
        value: f64,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Boolean {
        value: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    String {
        value: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Evaluates to its own name; used as an enum-like token
    Identifier {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    PredicateCall {
        name: String,
        args: Vec<Arg>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Selector {
        selector: Selector,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    World {
        x: i32,
        y: i32,
        z: i32,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Waypoint {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number { span, .. }
            | Expr::Boolean { span, .. }
            | Expr::String { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Unary { span, .. }
            | Expr::PredicateCall { span, .. }
            | Expr::Selector { span, .. }
            | Expr::World { span, .. }
            | Expr::Waypoint { span, .. } => *span,
        }
    }
}
