//! Macro pre-pass
//!
//! Macros are parameterless named blocks declared at top level. The pre-pass
//! builds a name→body table before execution and rewrites every bare
//! command naming a macro into an explicit `MacroCall`. Bodies are looked up
//! at execution time, so a macro may call itself; only the operation budget
//! bounds such recursion.

use std::collections::HashMap;

use super::{ParseError, ParseResult};
use crate::executor::commands::CommandKind;
use crate::executor::types::ast::{Block, Program, Span, Statement};

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    bodies: HashMap<String, Block>,
}

impl MacroTable {
    /// Collect top-level declarations, rejecting duplicates, nested
    /// declarations and names that shadow built-in commands
    pub fn collect(program: &Program) -> ParseResult<MacroTable> {
        let mut bodies = HashMap::new();

        for stmt in &program.body {
            match stmt {
                Statement::MacroDecl { name, body, span } => {
                    if CommandKind::from_name(name).is_some() {
                        return Err(ParseError::BuildError(
                            format!("macro `{}` shadows a built-in command", name),
                            Some(*span),
                        ));
                    }
                    if bodies.insert(name.clone(), body.clone()).is_some() {
                        return Err(ParseError::BuildError(
                            format!("duplicate macro `{}`", name),
                            Some(*span),
                        ));
                    }
                    reject_nested_decls(&body.body)?;
                }
                other => reject_nested_decls(children(other))?,
            }
        }

        Ok(MacroTable { bodies })
    }

    pub fn get(&self, name: &str) -> Option<&Block> {
        self.bodies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Rewrite bare commands that name a declared macro into `MacroCall`s
pub fn resolve_calls(program: &mut Program, table: &MacroTable) -> ParseResult<()> {
    rewrite_all(&mut program.body, table)
}

fn rewrite_all(stmts: &mut [Statement], table: &MacroTable) -> ParseResult<()> {
    for stmt in stmts.iter_mut() {
        rewrite(stmt, table)?;
    }
    Ok(())
}

fn rewrite(stmt: &mut Statement, table: &MacroTable) -> ParseResult<()> {
    match stmt {
        Statement::Command(cmd) if table.contains(&cmd.name) => {
            if !cmd.args.is_empty() {
                return Err(ParseError::BuildError(
                    format!("macro `{}` takes no arguments", cmd.name),
                    Some(cmd.span),
                ));
            }
            let name = std::mem::take(&mut cmd.name);
            let span = cmd.span;
            *stmt = Statement::MacroCall { name, span };
            Ok(())
        }
        Statement::Block(block)
        | Statement::MacroDecl { body: block, .. }
        | Statement::Repeat { body: block, .. }
        | Statement::While { body: block, .. } => rewrite_all(&mut block.body, table),
        Statement::If {
            consequent,
            alternate,
            ..
        } => {
            rewrite_all(&mut consequent.body, table)?;
            if let Some(alt) = alternate {
                rewrite_all(&mut alt.body, table)?;
            }
            Ok(())
        }
        Statement::Empty { .. }
        | Statement::MacroCall { .. }
        | Statement::Assert { .. }
        | Statement::Command(_) => Ok(()),
    }
}

/// Direct child statements of a compound statement
fn children(stmt: &Statement) -> Vec<&Statement> {
    match stmt {
        Statement::Block(block)
        | Statement::MacroDecl { body: block, .. }
        | Statement::Repeat { body: block, .. }
        | Statement::While { body: block, .. } => block.body.iter().collect(),
        Statement::If {
            consequent,
            alternate,
            ..
        } => consequent
            .body
            .iter()
            .chain(alternate.iter().flat_map(|alt| alt.body.iter()))
            .collect(),
        Statement::Empty { .. }
        | Statement::MacroCall { .. }
        | Statement::Assert { .. }
        | Statement::Command(_) => Vec::new(),
    }
}

fn reject_nested_decls<'a>(stmts: impl IntoIterator<Item = &'a Statement>) -> ParseResult<()> {
    for stmt in stmts {
        if let Statement::MacroDecl { name, span, .. } = stmt {
            return Err(nested_error(name, *span));
        }
        reject_nested_decls(children(stmt))?;
    }
    Ok(())
}

fn nested_error(name: &str, span: Span) -> ParseError {
    ParseError::BuildError(
        format!("macro `{}` must be declared at top level", name),
        Some(span),
    )
}
