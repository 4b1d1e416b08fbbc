//! Tests for control flow: if/else, repeat, while, assert and macros

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::helpers::*;
use crate::executor::types::{Arg, Command, Expr, Program, Span, Statement};
use crate::executor::{ErrorKind, ExecutorOptions};
use crate::selector::Heading;
use crate::waypoints::MemoryWaypoints;
use crate::world::{BlockPos, World, WorldAction};

/* ===================== Repeat ===================== */

#[tokio::test]
async fn test_repeat_zero_executes_nothing() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 64, 1), "stone"));
    let outcome = run_script(&world, "repeat(0) { dig F1 }").await;

    assert!(outcome.ok);
    assert!(outcome.results.is_empty());
    assert!(world.mutations().is_empty());
}

#[tokio::test]
async fn test_repeat_floors_count() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "repeat(2.7) { turn r90 }").await;

    assert!(outcome.ok);
    assert_eq!(ops(&outcome), vec!["turn", "turn"]);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::South);
}

#[tokio::test]
async fn test_repeat_negative_count() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "repeat(-3) { turn r90 }").await;

    assert!(outcome.ok);
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn test_repeat_non_numeric_count() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, r#"repeat("twice") { turn r90 }"#).await;

    assert!(!outcome.ok);
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError));
}

/* ===================== If / Else ===================== */

#[tokio::test]
async fn test_if_takes_consequent() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 64, 1), "stone"));
    let source = r#"
        if (block_is(F1, "stone")) {
            turn r90
        } else {
            turn l90
        }
    "#;
    let outcome = run_script(&world, source).await;

    assert!(outcome.ok);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::East);
}

#[tokio::test]
async fn test_if_takes_alternate() {
    let world = Arc::new(flat_world());
    let source = r#"
        if (block_is(F1, "stone")) {
            turn r90
        } else {
            turn l90
        }
    "#;
    let outcome = run_script(&world, source).await;

    assert!(outcome.ok);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::West);
}

#[tokio::test]
async fn test_else_if_chain() {
    let world = Arc::new(flat_world().with_item("torch", 1));
    let source = r#"
        if (has_item("diamond")) {
            turn r90
        } else if (has_item("torch")) {
            turn 180
        } else {
            turn l90
        }
    "#;
    let outcome = run_script(&world, source).await;

    assert!(outcome.ok);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::South);
}

/* ===================== While ===================== */

#[tokio::test]
async fn test_while_true_hits_loop_limit() {
    let world = Arc::new(flat_world());
    let outcome = run_with_options(&world, "while (true) {}", options_with_limit(50)).await;

    assert!(!outcome.ok);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::LoopLimitExceeded));
}

#[tokio::test]
async fn test_while_with_body_hits_op_limit() {
    let world = Arc::new(flat_world());
    let outcome = run_with_options(&world, "while (true) { turn r90 }", options_with_limit(5)).await;

    assert!(!outcome.ok);
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::OpLimitExceeded));
    // while itself used one op, four turns used the rest
    assert_eq!(ops(&outcome).len(), 4);
}

#[tokio::test]
async fn test_while_false_never_runs() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "while (!can_stand()) { turn r90 }").await;

    assert!(outcome.ok);
    assert!(outcome.results.is_empty());
}

/* ===================== Assert ===================== */

#[tokio::test]
async fn test_assert_custom_message() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, r#"assert has_item("iron_pickaxe"), "need a pickaxe""#).await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::RuntimeError);
    assert_eq!(failure.message, "need a pickaxe");
    assert_eq!(failure.loc.unwrap().line, 1);
}

#[tokio::test]
async fn test_assert_default_message() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "assert(false)").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::RuntimeError);
    assert_eq!(failure.message, "assertion_failed");
}

#[tokio::test]
async fn test_assert_passes() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "assert can_stand()\nturn r90").await;

    assert!(outcome.ok);
    assert_eq!(ops(&outcome), vec!["turn"]);
}

/* ===================== Macros ===================== */

#[tokio::test]
async fn test_macro_expands_in_place() {
    let world = Arc::new(flat_world());
    let source = r#"
        macro spin {
            turn r90
            turn r90
        }
        spin
        spin
    "#;
    let outcome = run_script(&world, source).await;

    assert!(outcome.ok);
    assert_eq!(ops(&outcome), vec!["turn"; 4]);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::North);
}

#[tokio::test]
async fn test_recursive_macro_stopped_by_op_budget() {
    let world = Arc::new(flat_world());
    let source = "macro forever { turn r90; forever }\nforever";
    let outcome = run_with_options(&world, source, options_with_limit(20)).await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::OpLimitExceeded);
    assert_eq!(failure.op_index, 20);
}

#[tokio::test]
async fn test_unknown_command_is_compile_error() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "fly F1").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::CompileError);
    assert_eq!(failure.message, "unknown command: fly");
    assert_eq!(failure.loc.map(|l| (l.line, l.column)), Some((1, 1)));
}

/* ===================== Constructed Programs ===================== */

#[tokio::test]
async fn test_empty_statement_is_a_no_op() {
    let world = Arc::new(flat_world());
    let program = Program {
        body: vec![
            Statement::Empty {
                span: Span::default(),
            },
            Statement::Command(Command {
                name: "turn".to_string(),
                args: vec![Arg::Positional(Expr::Identifier {
                    name: "r90".to_string(),
                    span: Span::default(),
                })],
                span: Span::default(),
            }),
        ],
        span: Span::default(),
    };

    let mut executor = build_executor(&world, ExecutorOptions::default(), MemoryWaypoints::new());
    let outcome = executor.run(&program).await;

    assert!(outcome.ok);
    assert_eq!(ops(&outcome), vec!["turn"]);
}

#[tokio::test]
async fn test_deserialized_macro_invocation_is_resolved() {
    // a remote caller sends a plain command naming the macro
    let json = r#"{
        "body": [
            {"type": "MacroDecl", "name": "twist", "body": {"body": [
                {"type": "Command", "name": "turn", "args": [{"type": "Identifier", "name": "l90"}]}
            ]}},
            {"type": "Command", "name": "twist", "args": []}
        ]
    }"#;
    let program: Program = serde_json::from_str(json).unwrap();
    let world = Arc::new(flat_world());

    let mut executor = build_executor(&world, ExecutorOptions::default(), MemoryWaypoints::new());
    let outcome = executor.run(&program).await;

    assert!(outcome.ok);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::West);
}

/* ===================== Cancellation ===================== */

#[tokio::test]
async fn test_cancelled_run_stops_at_statement_boundary() {
    let world = Arc::new(flat_world());
    let token = CancellationToken::new();
    token.cancel();

    let mut executor = build_executor(&world, ExecutorOptions::default(), MemoryWaypoints::new())
        .with_cancellation(token);
    let outcome = executor.run(&parse_program("turn r90; turn r90")).await;

    assert!(!outcome.ok);
    assert!(outcome.results.is_empty());
    assert!(!world
        .actions()
        .iter()
        .any(|a| matches!(a, WorldAction::Look { .. })));
}
