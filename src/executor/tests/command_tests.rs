//! Tests for command dispatch and the safety checks before world actions

use std::sync::Arc;

use super::helpers::*;
use crate::executor::types::CraftscriptResult;
use crate::executor::{ErrorKind, ExecEvent, Executor, ExecutorOptions, TraceEvent};
use crate::selector::Heading;
use crate::waypoints::MemoryWaypoints;
use crate::world::{BlockPos, Goal, Sensing, World, WorldAction};

fn has_dig(world: &crate::world::InMemoryWorld) -> bool {
    world
        .actions()
        .iter()
        .any(|a| matches!(a, WorldAction::Dig { .. }))
}

fn goals(world: &crate::world::InMemoryWorld) -> Vec<Goal> {
    world
        .actions()
        .into_iter()
        .filter_map(|a| match a {
            WorldAction::SetGoal { goal } => Some(goal),
            _ => None,
        })
        .collect()
}

/* ===================== End to End ===================== */

#[tokio::test]
async fn test_move_turn_dig() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(1, 64, 0), "dirt"));
    let outcome = run_script(&world, "move F1; turn r90; dig F1").await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(ops(&outcome), vec!["move", "turn", "dig"]);
    assert!(outcome.results.iter().all(CraftscriptResult::is_ok));

    assert_eq!(goals(&world), vec![Goal::new(BlockPos::new(0, 64, 1), 0)]);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::East);
    assert_eq!(world.block_at(BlockPos::new(1, 64, 0)).as_deref(), Some("air"));
}

/* ===================== Move ===================== */

#[tokio::test]
async fn test_move_up_requires_headroom() {
    // ceiling two above the feet
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 66, 0), "stone"));
    let outcome = run_script(&world, "move F1+U1").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::InvariantViolation);
    assert_eq!(failure.op.as_deref(), Some("move"));
    assert!(goals(&world).is_empty());
}

#[tokio::test]
async fn test_move_down_refuses_falling_ground() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 63, 0), "sand"));
    let outcome = run_script(&world, "move F1+D1").await;

    assert_eq!(failure_kind(&outcome), Some(ErrorKind::InvariantViolation));
    assert!(goals(&world).is_empty());
}

#[tokio::test]
async fn test_move_level_ignores_step_checks() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 66, 0), "stone"));
    let outcome = run_script(&world, "move B2").await;

    assert!(outcome.ok);
    assert_eq!(goals(&world), vec![Goal::new(BlockPos::new(0, 64, -2), 0)]);
}

#[tokio::test]
async fn test_move_unreachable_is_no_path() {
    let world = Arc::new(flat_world().with_unreachable(BlockPos::new(0, 64, 1)));
    let outcome = run_script(&world, "move F1").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::NoPath);
    assert!(failure.notes.is_some());
}

/* ===================== Turn ===================== */

#[tokio::test]
async fn test_turn_tokens() {
    let world = Arc::new(flat_world());

    assert!(run_script(&world, "turn right").await.ok);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::East);

    assert!(run_script(&world, "turn 180").await.ok);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::West);

    assert!(run_script(&world, "turn_face south").await.ok);
    assert_eq!(Heading::from_yaw(world.yaw()), Heading::South);
}

#[tokio::test]
async fn test_invalid_turn_is_compile_error() {
    let world = Arc::new(flat_world());

    let outcome = run_script(&world, "turn r45").await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError));

    let outcome = run_script(&world, "turn_face up").await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError));

    assert_eq!(Heading::from_yaw(world.yaw()), Heading::North);
}

/* ===================== Dig ===================== */

#[tokio::test]
async fn test_dig_under_gravel_is_refused() {
    let world = Arc::new(
        flat_world()
            .with_block(BlockPos::new(0, 64, 1), "stone")
            .with_block(BlockPos::new(0, 65, 1), "gravel"),
    );
    let outcome = run_script(&world, "dig F1").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::InvariantViolation);
    assert_eq!(failure.message, "gravity_block_overhead");
    assert!(!has_dig(&world));
    assert_eq!(world.block_at(BlockPos::new(0, 64, 1)).as_deref(), Some("stone"));
}

#[tokio::test]
async fn test_dig_with_sand_two_above_is_refused() {
    let world = Arc::new(
        flat_world()
            .with_block(BlockPos::new(0, 64, 1), "stone")
            .with_block(BlockPos::new(0, 66, 1), "minecraft:sand"),
    );
    let outcome = run_script(&world, "dig F1").await;

    assert_eq!(failure_kind(&outcome), Some(ErrorKind::InvariantViolation));
    assert!(!has_dig(&world));
}

#[tokio::test]
async fn test_dig_air_is_move_blocked() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "dig F1").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::MoveBlocked);
    assert_eq!(failure.message, "no_target");
}

#[tokio::test]
async fn test_dig_out_of_reach() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 64, 6), "stone"));
    let outcome = run_script(&world, "dig F6").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::MoveBlocked);
    assert_eq!(failure.message, "out_of_reach");
    assert!(!has_dig(&world));
}

#[tokio::test]
async fn test_dig_world_target() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(-1, 64, 0), "oak_log"));
    let outcome = run_script(&world, "dig world(-1, 64, 0)").await;

    assert!(outcome.ok);
    assert_eq!(world.mutations(), vec![WorldAction::Dig {
        pos: BlockPos::new(-1, 64, 0)
    }]);
}

/* ===================== Place ===================== */

#[tokio::test]
async fn test_place_checks_inventory_before_reference() {
    let world = Arc::new(void_world());
    let outcome = run_script(&world, r#"place "cobblestone" D1"#).await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::Unavailable));

    let world = Arc::new(void_world().with_item("cobblestone", 4));
    let outcome = run_script(&world, r#"place "cobblestone" D1"#).await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::Blocked));
    assert!(world.mutations().is_empty());
}

#[tokio::test]
async fn test_place_on_floor() {
    let world = Arc::new(flat_world().with_item("cobblestone", 4));
    let outcome = run_script(&world, "place cobblestone F1").await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(
        world.block_at(BlockPos::new(0, 64, 1)).as_deref(),
        Some("cobblestone")
    );
    assert_eq!(world.held().as_deref(), Some("cobblestone"));
}

#[tokio::test]
async fn test_place_against_side_face() {
    // wall to the north, place on its south face from the actor's side
    let world = Arc::new(
        flat_world()
            .with_item("torch", 1)
            .with_block(BlockPos::new(0, 65, 2), "stone"),
    );
    let outcome = run_script(&world, "place torch F1+U1 face=south").await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(world.block_at(BlockPos::new(0, 65, 1)).as_deref(), Some("torch"));
}

#[tokio::test]
async fn test_place_into_occupied_cell_is_blocked() {
    let world = Arc::new(
        flat_world()
            .with_item("cobblestone", 4)
            .with_block(BlockPos::new(0, 64, 1), "dirt"),
    );
    let outcome = run_script(&world, "place cobblestone F1").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::Blocked);
    assert_eq!(failure.message, "target_occupied");
}

#[tokio::test]
async fn test_place_invalid_face() {
    let world = Arc::new(flat_world().with_item("cobblestone", 4));
    let outcome = run_script(&world, "place cobblestone F1 face=sideways").await;

    assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError));
}

/* ===================== Inventory ===================== */

#[tokio::test]
async fn test_equip_drop_eat() {
    let world = Arc::new(
        flat_world()
            .with_item("bread", 3)
            .with_item("cobblestone", 10),
    );
    let outcome = run_script(&world, "equip cobblestone; drop cobblestone count=4; eat bread").await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(
        world.mutations(),
        vec![
            WorldAction::Equip {
                item: "cobblestone".to_string()
            },
            WorldAction::Toss {
                item: "cobblestone".to_string(),
                count: 4
            },
            WorldAction::Equip {
                item: "bread".to_string()
            },
            WorldAction::Consume {
                item: "bread".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_drop_defaults_to_whole_stack() {
    let world = Arc::new(flat_world().with_item("dirt", 12));
    let outcome = run_script(&world, "drop dirt").await;

    assert!(outcome.ok);
    assert!(world.inventory().is_empty());
}

#[tokio::test]
async fn test_missing_items_are_unavailable() {
    let world = Arc::new(flat_world());
    for source in ["equip iron_pickaxe", "drop dirt", "eat bread"] {
        let outcome = run_script(&world, source).await;
        assert_eq!(failure_kind(&outcome), Some(ErrorKind::Unavailable), "{}", source);
    }
    assert!(world.mutations().is_empty());
}

/* ===================== Scan ===================== */

#[tokio::test]
async fn test_scan_never_mutates_or_fails() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 66, 0), "gravel"));
    let outcome = run_script(&world, "scan; scan r=100; scan -4").await;

    assert!(outcome.ok);
    assert!(world.actions().is_empty());

    let sizes: Vec<_> = outcome
        .results
        .iter()
        .map(|r| match r {
            CraftscriptResult::Success(s) => s.notes.as_ref().unwrap()["size"].clone(),
            CraftscriptResult::Failure(f) => panic!("unexpected failure: {:?}", f),
        })
        .collect();
    assert_eq!(
        sizes,
        vec![
            serde_json::json!([5, 5, 5]),
            serde_json::json!([17, 17, 17]),
            serde_json::json!([1, 1, 1]),
        ]
    );
}

/* ===================== Goto ===================== */

#[tokio::test]
async fn test_goto_waypoint() {
    let world = Arc::new(flat_world());
    let waypoints = MemoryWaypoints::new().with("home", BlockPos::new(3, 64, 3));
    let mut executor = build_executor(&world, ExecutorOptions::default(), waypoints);

    let outcome = executor.run(&parse_program(r#"goto waypoint("home")"#)).await;

    assert!(outcome.ok);
    assert_eq!(goals(&world), vec![Goal::new(BlockPos::new(3, 64, 3), 1)]);
}

#[tokio::test]
async fn test_goto_unknown_waypoint_is_no_path() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, r#"goto waypoint("nowhere")"#).await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::NoPath);
    assert_eq!(failure.message, "unknown waypoint nowhere");
    assert!(goals(&world).is_empty());
}

#[tokio::test]
async fn test_goto_coordinates_and_world_literal() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "goto(5, 64, -2, tol=2)\ngoto world(1, 64, 1)\ngoto F3 tol=0").await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(
        goals(&world),
        vec![
            Goal::new(BlockPos::new(5, 64, -2), 2),
            Goal::new(BlockPos::new(1, 64, 1), 1),
            Goal::new(BlockPos::new(0, 64, 3), 0),
        ]
    );
}

#[tokio::test]
async fn test_goto_coordinates_out_of_range() {
    let world = Arc::new(flat_world());
    for source in ["goto(3000000000, 64, 0)", "goto(0, -2147483649, 0)"] {
        let outcome = run_script(&world, source).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.error, ErrorKind::CompileError, "{}", source);
        assert!(failure.message.contains("out of range"), "{}", failure.message);
    }
    assert!(goals(&world).is_empty());
}

#[tokio::test]
async fn test_finished_navigation_sessions_are_released() {
    let world = Arc::new(flat_world());
    let options = ExecutorOptions::default();
    let sensing = Sensing::new(world.clone(), options.nav_timeout);
    let mut executor = Executor::new(sensing.clone(), Arc::new(MemoryWaypoints::new()), options);

    let outcome = executor
        .run(&parse_program("repeat(50) { move F1 }
goto world(2, 64, 2)"))
        .await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(goals(&world).len(), 51);
    assert_eq!(sensing.navigator().session_count(), 0);
}

/* ===================== Extreme Selectors ===================== */

#[tokio::test]
async fn test_huge_selector_fails_without_panicking() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "dig U2147483647").await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error, ErrorKind::MoveBlocked);
    assert_eq!(failure.notes.as_ref().unwrap()["target"]["y"], i32::MAX);

    let outcome = run_script(&world, "dig F2147483647+F1").await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::MoveBlocked));
    assert!(world.mutations().is_empty());
}

/* ===================== Engine Commands ===================== */

#[tokio::test]
async fn test_break_is_dig() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 64, 1), "dirt"));
    let outcome = run_script(&world, "break F1").await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(ops(&outcome), vec!["break"]);
    assert_eq!(world.block_at(BlockPos::new(0, 64, 1)).as_deref(), Some("air"));

    let outcome = run_script(&world, "break F1").await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::MoveBlocked));
}

#[tokio::test]
async fn test_wait_is_bounded() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "wait 5; wait ms=0").await;
    assert!(outcome.ok, "{:?}", outcome.failure());
    assert_eq!(ops(&outcome), vec!["wait", "wait"]);

    for source in ["wait -1", "wait 300001", "wait", r#"wait "soon""#] {
        let outcome = run_script(&world, source).await;
        assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError), "{}", source);
    }
    assert!(world.actions().is_empty());
}

#[tokio::test]
async fn test_log_traces_text() {
    let world = Arc::new(flat_world());
    let (outcome, events) = run_collecting(&world, r#"log "mined" 3 F1+U1 true"#).await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    let CraftscriptResult::Success(step) = &outcome.results[0] else {
        panic!("expected success");
    };
    assert_eq!(step.notes.as_ref().unwrap()["text"], "mined 3 F1+U1 true");

    let logged: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            ExecEvent::Trace(TraceEvent::Log { text, .. }) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(logged, vec!["mined 3 F1+U1 true"]);
    assert!(world.actions().is_empty());

    let outcome = run_script(&world, r#"log text="no names""#).await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError));
}

#[tokio::test]
async fn test_block_info_by_selector_and_coordinates() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(2, 64, 2), "minecraft:gravel"));
    let outcome = run_script(&world, "block_info D1
block_info(2, 64, 2)").await;

    assert!(outcome.ok, "{:?}", outcome.failure());
    let infos: Vec<_> = outcome
        .results
        .iter()
        .map(|r| match r {
            CraftscriptResult::Success(s) => s.notes.as_ref().unwrap()["info"].clone(),
            CraftscriptResult::Failure(f) => panic!("unexpected failure: {:?}", f),
        })
        .collect();
    assert_eq!(infos[0]["id"], "stone");
    assert_eq!(infos[1]["id"], "gravel");
    assert_eq!(infos[1]["falls"], true);
    assert!(world.actions().is_empty());

    let outcome = run_script(&world, "block_info(2, 64)").await;
    assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError));
}

/* ===================== Arguments ===================== */

#[tokio::test]
async fn test_argument_errors_are_compile_errors() {
    let world = Arc::new(flat_world().with_block(BlockPos::new(0, 64, 1), "stone"));
    for source in ["dig F1 F2", "scan radius=3", "dig", "move 12"] {
        let outcome = run_script(&world, source).await;
        assert_eq!(failure_kind(&outcome), Some(ErrorKind::CompileError), "{}", source);
    }
    assert!(world.mutations().is_empty());
}

#[tokio::test]
async fn test_failure_carries_op_and_location() {
    let world = Arc::new(flat_world());
    let outcome = run_script(&world, "turn r90\ndig F1").await;

    assert_eq!(outcome.results.len(), 2);
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.op.as_deref(), Some("dig"));
    assert_eq!(failure.op_index, 2);
    assert_eq!(failure.loc.map(|l| (l.line, l.column)), Some((2, 1)));
    assert!(failure.ts > 0);
}
