//! Statement execution

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use super::types::{ErrorKind, ExecError, Statement, TraceEvent, Val};
use super::{ExecResult, Executor, Interrupt};

impl Executor {
    /// Execute statements in order, stopping at the first failure
    pub(crate) fn exec_statements<'a>(
        &'a mut self,
        stmts: &'a [Statement],
    ) -> BoxFuture<'a, ExecResult> {
        async move {
            for stmt in stmts {
                self.exec_statement(stmt).await?;
            }
            Ok(())
        }
        .boxed()
    }

    pub(crate) fn exec_statement<'a>(&'a mut self, stmt: &'a Statement) -> BoxFuture<'a, ExecResult> {
        async move {
            // declarations were hoisted by the pre-pass
            if let Statement::MacroDecl { .. } = stmt {
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                return Err(Interrupt::Canceled);
            }
            let span = stmt.span();
            self.bump_ops().map_err(|e| e.at(span))?;

            match stmt {
                Statement::Empty { .. } | Statement::MacroDecl { .. } => Ok(()),
                Statement::Block(block) => self.exec_statements(&block.body).await,
                Statement::MacroCall { name, span } => {
                    let macros = Arc::clone(&self.macros);
                    let body = macros.get(name).ok_or_else(|| {
                        ExecError::compile(format!("unknown macro: {}", name)).at(*span)
                    })?;
                    self.trace(TraceEvent::Macro {
                        name: name.clone(),
                        loc: span.location(),
                    });
                    self.exec_statements(&body.body).await
                }
                Statement::Assert {
                    test,
                    message,
                    span,
                } => {
                    if self.eval(test)?.is_truthy() {
                        return Ok(());
                    }
                    let message = message.clone().unwrap_or_else(|| "assertion_failed".to_string());
                    Err(ExecError::runtime(message).at(*span).into())
                }
                Statement::If {
                    test,
                    consequent,
                    alternate,
                    span,
                } => {
                    let value = self.eval(test)?.is_truthy();
                    self.trace(TraceEvent::If {
                        value,
                        loc: span.location(),
                    });
                    match (value, alternate) {
                        (true, _) => self.exec_statements(&consequent.body).await,
                        (false, Some(alt)) => self.exec_statements(&alt.body).await,
                        (false, None) => Ok(()),
                    }
                }
                Statement::Repeat { count, body, span } => {
                    let times = match self.eval(count)? {
                        Val::Num(n) if n.is_finite() => n.floor().max(0.0) as u64,
                        other => {
                            return Err(ExecError::compile(format!(
                                "repeat count must be a number, got {}",
                                other.type_name()
                            ))
                            .at(count.span())
                            .into())
                        }
                    };
                    self.trace(TraceEvent::Repeat {
                        count: times,
                        loc: span.location(),
                    });
                    for _ in 0..times {
                        self.exec_statements(&body.body).await?;
                    }
                    Ok(())
                }
                Statement::While { test, body, span } => {
                    let limit = self.options.op_limit as u64;
                    let mut iterations: u64 = 0;
                    while self.eval(test)?.is_truthy() {
                        iterations += 1;
                        if iterations > limit {
                            return Err(ExecError::new(
                                ErrorKind::LoopLimitExceeded,
                                format!("loop_limit_exceeded: more than {} iterations", limit),
                            )
                            .at(*span)
                            .into());
                        }
                        self.trace(TraceEvent::WhileIter {
                            iteration: iterations,
                            loc: span.location(),
                        });
                        self.exec_statements(&body.body).await?;
                    }
                    Ok(())
                }
                Statement::Command(cmd) => self.exec_command(cmd).await,
            }
        }
        .boxed()
    }
}
