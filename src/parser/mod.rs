//! PEST-based parser for CraftScript
//!
//! Produces the executor AST with span information for error reporting.
//! After building the tree, the macro pre-pass collects declarations and
//! rewrites bare-identifier invocations into explicit `MacroCall` nodes.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::executor::types::ast::{
    Arg, Block, Command, Expr, Location, LogicalOp, Program, Span, Statement, UnaryOp,
};
use crate::selector::{Axis, SelTerm, Selector};

pub mod macros;

pub use macros::MacroTable;


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/craftscript.pest"]
struct CraftScriptParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    PestError(String, Option<Span>),
    #[error("{0}")]
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }

    /// 1-indexed line/column of the failure, when known
    pub fn location(&self) -> Option<Location> {
        self.span().map(|span| span.location())
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Span {
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
                ..Span::default()
            },
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Span {
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                    ..Span::default()
                }
            }
        };
        let span = match err.location {
            pest::error::InputLocation::Pos(pos) => Span {
                start: pos,
                end: pos,
                ..span
            },
            pest::error::InputLocation::Span((start, end)) => Span { start, end, ..span },
        };
        ParseError::PestError(err.variant.message().into_owned(), Some(span))
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>) -> Span {
    let pest_span = pair.as_span();
    let (start_line, start_col) = pest_span.start_pos().line_col();
    let (end_line, end_col) = pest_span.end_pos().line_col();

    Span::new(
        pest_span.start(),
        pest_span.end(),
        start_line - 1,
        start_col - 1,
        end_line - 1,
        end_col - 1,
    )
}

/// Take the next child pair, reporting a build error if the tree is malformed
fn next_pair<'i>(inner: &mut Pairs<'i, Rule>, what: &str, span: Span) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Missing {}", what), Some(span)))
}

/* ===================== Public API ===================== */

/// Parse CraftScript source into a program with macro calls resolved
pub fn parse(source: &str) -> ParseResult<Program> {
    let mut program = parse_tree(source)?;
    let table = MacroTable::collect(&program)?;
    macros::resolve_calls(&mut program, &table)?;
    Ok(program)
}

/// Parse without the macro pre-pass
pub fn parse_tree(source: &str) -> ParseResult<Program> {
    let mut pairs = CraftScriptParser::parse(Rule::program, source)?;
    let program = next_pair(&mut pairs, "program", Span::default())?;
    let span = pair_to_span(&program);

    let mut body = Vec::new();
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::statement => body.push(build_statement(pair)?),
            Rule::EOI => {}
            rule => {
                return Err(ParseError::BuildError(
                    format!("Unexpected program content: {:?}", rule),
                    Some(pair_to_span(&pair)),
                ))
            }
        }
    }

    Ok(Program { body, span })
}

/* ===================== Statement Builders ===================== */

fn build_statement(pair: Pair<Rule>) -> ParseResult<Statement> {
    let span = pair_to_span(&pair);

    match pair.as_rule() {
        Rule::statement => {
            let inner = next_pair(&mut pair.into_inner(), "statement body", span)?;
            build_statement(inner)
        }
        Rule::block => Ok(Statement::Block(build_block(pair)?)),
        Rule::macro_decl => build_macro_decl(pair),
        Rule::if_stmt => build_if_stmt(pair),
        Rule::repeat_stmt => {
            let mut inner = pair.into_inner();
            next_pair(&mut inner, "repeat keyword", span)?;
            let count = build_expression(next_pair(&mut inner, "repeat count", span)?)?;
            let body = build_block(next_pair(&mut inner, "repeat body", span)?)?;
            Ok(Statement::Repeat { count, body, span })
        }
        Rule::while_stmt => {
            let mut inner = pair.into_inner();
            next_pair(&mut inner, "while keyword", span)?;
            let test = build_expression(next_pair(&mut inner, "while condition", span)?)?;
            let body = build_block(next_pair(&mut inner, "while body", span)?)?;
            Ok(Statement::While { test, body, span })
        }
        Rule::assert_stmt => {
            let mut inner = pair.into_inner();
            next_pair(&mut inner, "assert keyword", span)?;
            let test = build_expression(next_pair(&mut inner, "assert condition", span)?)?;
            let message = match inner.next() {
                Some(msg) => Some(build_string(msg)?),
                None => None,
            };
            Ok(Statement::Assert {
                test,
                message,
                span,
            })
        }
        Rule::command => build_command(pair),
        rule => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", rule),
            Some(span),
        )),
    }
}

fn build_block(pair: Pair<Rule>) -> ParseResult<Block> {
    let span = pair_to_span(&pair);
    let body = pair
        .into_inner()
        .map(build_statement)
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(Block { body, span })
}

fn build_macro_decl(pair: Pair<Rule>) -> ParseResult<Statement> {
    let span = pair_to_span(&pair);
    let mut inner = pair.into_inner();
    next_pair(&mut inner, "macro keyword", span)?;
    let name = next_pair(&mut inner, "macro name", span)?.as_str().to_string();
    let body = build_block(next_pair(&mut inner, "macro body", span)?)?;
    Ok(Statement::MacroDecl { name, body, span })
}

fn build_if_stmt(pair: Pair<Rule>) -> ParseResult<Statement> {
    let span = pair_to_span(&pair);
    let mut inner = pair.into_inner();
    next_pair(&mut inner, "if keyword", span)?;

    let test = build_expression(next_pair(&mut inner, "if condition", span)?)?;
    let consequent = build_block(next_pair(&mut inner, "if body", span)?)?;

    let alternate = match inner.next() {
        Some(else_clause) => {
            let else_span = pair_to_span(&else_clause);
            let mut else_inner = else_clause.into_inner();
            next_pair(&mut else_inner, "else keyword", else_span)?;
            let target = next_pair(&mut else_inner, "else body", else_span)?;
            match target.as_rule() {
                Rule::block => Some(build_block(target)?),
                // `else if` becomes a block holding the nested if
                _ => {
                    let nested = build_if_stmt(target)?;
                    Some(Block {
                        span: nested.span(),
                        body: vec![nested],
                    })
                }
            }
        }
        None => None,
    };

    Ok(Statement::If {
        test,
        consequent,
        alternate,
        span,
    })
}

fn build_command(pair: Pair<Rule>) -> ParseResult<Statement> {
    let span = pair_to_span(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, "command name", span)?.as_str().to_string();
    let args = match inner.next() {
        Some(args_pair) => build_args(args_pair)?,
        None => Vec::new(),
    };
    Ok(Statement::Command(Command { name, args, span }))
}

/// Build the arguments of `call_args`, `bare_args` or `predicate_call`
fn build_args(pair: Pair<Rule>) -> ParseResult<Vec<Arg>> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::arg)
        .map(build_arg)
        .collect()
}

fn build_arg(pair: Pair<Rule>) -> ParseResult<Arg> {
    let span = pair_to_span(&pair);
    let inner = next_pair(&mut pair.into_inner(), "argument", span)?;

    match inner.as_rule() {
        Rule::named_arg => {
            let mut parts = inner.into_inner();
            let key = next_pair(&mut parts, "argument name", span)?.as_str().to_string();
            let value = build_expression(next_pair(&mut parts, "argument value", span)?)?;
            Ok(Arg::Named { key, value, span })
        }
        _ => Ok(Arg::Positional(build_expression(inner)?)),
    }
}

/* ===================== Expression Builders ===================== */

fn build_expression(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair_to_span(&pair);

    match pair.as_rule() {
        Rule::expression => {
            let inner = next_pair(&mut pair.into_inner(), "expression", span)?;
            build_expression(inner)
        }
        Rule::or_expr | Rule::and_expr => build_logical_chain(pair),
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, "operand", span)?;
            match first.as_rule() {
                Rule::op_not => {
                    let operand = build_expression(next_pair(&mut inner, "operand", span)?)?;
                    Ok(Expr::Unary {
                        op: UnaryOp::Not,
                        arg: Box::new(operand),
                        span,
                    })
                }
                _ => build_expression(first),
            }
        }
        Rule::number => {
            let value = pair.as_str().parse::<f64>().map_err(|e| {
                ParseError::BuildError(format!("Invalid number: {}", e), Some(span))
            })?;
            Ok(Expr::Number { value, span })
        }
        Rule::boolean => Ok(Expr::Boolean {
            value: pair.as_str() == "true",
            span,
        }),
        Rule::string => Ok(Expr::String {
            value: build_string(pair)?,
            span,
        }),
        Rule::identifier => Ok(Expr::Identifier {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::selector => Ok(Expr::Selector {
            selector: build_selector(pair)?,
            span,
        }),
        Rule::world_lit => {
            let mut coords = [0i32; 3];
            let mut inner = pair.into_inner();
            for coord in coords.iter_mut() {
                let num = next_pair(&mut inner, "coordinate", span)?;
                *coord = num
                    .as_str()
                    .parse::<f64>()
                    .map(|v| v.floor() as i32)
                    .map_err(|e| {
                        ParseError::BuildError(format!("Invalid coordinate: {}", e), Some(span))
                    })?;
            }
            let [x, y, z] = coords;
            Ok(Expr::World { x, y, z, span })
        }
        Rule::waypoint_lit => {
            let name = build_string(next_pair(&mut pair.into_inner(), "waypoint name", span)?)?;
            Ok(Expr::Waypoint { name, span })
        }
        Rule::predicate_call => {
            let mut inner = pair.clone().into_inner();
            let name = next_pair(&mut inner, "predicate name", span)?.as_str().to_string();
            let args = build_args(pair)?;
            Ok(Expr::PredicateCall { name, args, span })
        }
        rule => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", rule),
            Some(span),
        )),
    }
}

/// Left-associative `&&` / `||` chain
fn build_logical_chain(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair_to_span(&pair);
    let mut inner = pair.into_inner();
    let mut left = build_expression(next_pair(&mut inner, "left operand", span)?)?;

    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_rule() {
            Rule::op_and => LogicalOp::And,
            Rule::op_or => LogicalOp::Or,
            rule => {
                return Err(ParseError::BuildError(
                    format!("Expected logical operator, got {:?}", rule),
                    Some(span),
                ))
            }
        };
        let right = build_expression(next_pair(&mut inner, "right operand", span)?)?;
        let new_span = left.span().merge(&right.span());
        left = Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: new_span,
        };
    }

    Ok(left)
}

fn build_selector(pair: Pair<Rule>) -> ParseResult<Selector> {
    let mut terms = Vec::new();

    for term in pair.into_inner() {
        let span = pair_to_span(&term);
        let mut axis = None;
        let mut n = 1;
        let mut suffix = None;

        for part in term.into_inner() {
            match part.as_rule() {
                Rule::sel_axis => axis = part.as_str().chars().next().and_then(Axis::from_letter),
                Rule::sel_n => {
                    n = part.as_str().parse::<i32>().map_err(|e| {
                        ParseError::BuildError(format!("Invalid selector magnitude: {}", e), Some(span))
                    })?
                }
                Rule::sel_suffix => {
                    suffix = Some(match part.as_str() {
                        "^" => SelTerm::new(Axis::Up, 1),
                        _ => SelTerm::new(Axis::Down, 1),
                    })
                }
                _ => {}
            }
        }

        let axis = axis.ok_or_else(|| {
            ParseError::BuildError("Selector term without axis".to_string(), Some(span))
        })?;
        terms.push(SelTerm::new(axis, n));
        terms.extend(suffix);
    }

    Ok(Selector::new(terms))
}

fn build_string(pair: Pair<Rule>) -> ParseResult<String> {
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}
