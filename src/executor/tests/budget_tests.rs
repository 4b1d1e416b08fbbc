//! Tests for the operation budget

use std::sync::Arc;

use super::helpers::*;
use crate::executor::ErrorKind;
use crate::waypoints::MemoryWaypoints;

#[tokio::test]
async fn test_n_plus_one_commands_exceed_budget_of_n() {
    let world = Arc::new(flat_world());
    let mut executor = build_executor(&world, options_with_limit(3), MemoryWaypoints::new());
    let outcome = executor
        .run(&parse_program("turn r90; turn r90; turn r90; turn r90"))
        .await;

    assert!(!outcome.ok);
    assert_eq!(outcome.results.len(), 4);
    assert!(outcome.results[..3].iter().all(|r| r.is_ok()));

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::OpLimitExceeded);
    assert_eq!(failure.op_index, 3);
    assert_eq!(failure.loc.map(|l| l.column), Some(31));
    assert_eq!(executor.ops(), 3);
}

#[tokio::test]
async fn test_exactly_n_commands_fit() {
    let world = Arc::new(flat_world());
    let outcome = run_with_options(&world, "turn r90; turn r90; turn r90", options_with_limit(3)).await;

    assert!(outcome.ok);
    assert_eq!(outcome.results.len(), 3);
}

#[tokio::test]
async fn test_control_statements_count() {
    let world = Arc::new(flat_world());

    // repeat takes one op, the turn takes the other
    let outcome = run_with_options(&world, "repeat(1) { turn r90 }", options_with_limit(2)).await;
    assert!(outcome.ok);

    let outcome = run_with_options(&world, "repeat(1) { turn r90 }", options_with_limit(1)).await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::OpLimitExceeded));
    assert!(world.mutations().is_empty());
}

#[tokio::test]
async fn test_macro_declarations_are_free() {
    let world = Arc::new(flat_world());
    let source = "macro wiggle { turn r90; turn l90 }\nturn r90";
    let outcome = run_with_options(&world, source, options_with_limit(1)).await;

    assert!(outcome.ok);
    assert_eq!(ops(&outcome), vec!["turn"]);
}

#[tokio::test]
async fn test_budget_resets_between_runs() {
    let world = Arc::new(flat_world());
    let mut executor = build_executor(&world, options_with_limit(2), MemoryWaypoints::new());
    let program = parse_program("turn r90; turn r90");

    assert!(executor.run(&program).await.ok);
    assert!(executor.run(&program).await.ok);
    assert_eq!(executor.ops(), 2);
}
