//! Test helpers for executor tests
//!
//! Worlds, program parsing and run shortcuts shared by the test modules

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::executor::types::Program;
use crate::executor::{ErrorKind, ExecEvent, Executor, ExecutorOptions, RunOutcome};
use crate::selector::Heading;
use crate::waypoints::MemoryWaypoints;
use crate::world::{BlockPos, InMemoryWorld, Sensing};

/// Where every test actor starts
pub const ORIGIN: BlockPos = BlockPos::new(0, 64, 0);

/// Actor at [`ORIGIN`] facing north on a stone floor
pub fn flat_world() -> InMemoryWorld {
    InMemoryWorld::new(ORIGIN, Heading::North).with_fill(
        BlockPos::new(-8, 63, -8),
        BlockPos::new(8, 63, 8),
        "stone",
    )
}

/// Actor at [`ORIGIN`] facing north with nothing around it
pub fn void_world() -> InMemoryWorld {
    InMemoryWorld::new(ORIGIN, Heading::North)
}

/// Parse source, then serialize and deserialize the program to make sure
/// the executor runs the same tree a remote caller would send
pub fn parse_program(source: &str) -> Program {
    let program = crate::parser::parse(source).expect("Parse failed");
    let json = serde_json::to_string(&program).expect("Program serialization failed");
    serde_json::from_str(&json).expect("Program deserialization failed")
}

pub fn build_executor(
    world: &Arc<InMemoryWorld>,
    options: ExecutorOptions,
    waypoints: MemoryWaypoints,
) -> Executor {
    let sensing = Sensing::new(world.clone(), options.nav_timeout);
    Executor::new(sensing, Arc::new(waypoints), options)
}

pub async fn run_script(world: &Arc<InMemoryWorld>, source: &str) -> RunOutcome {
    run_with_options(world, source, ExecutorOptions::default()).await
}

pub async fn run_with_options(
    world: &Arc<InMemoryWorld>,
    source: &str,
    options: ExecutorOptions,
) -> RunOutcome {
    let mut executor = build_executor(world, options, MemoryWaypoints::new());
    executor.run(&parse_program(source)).await
}

/// Run and collect every streamed event
pub async fn run_collecting(world: &Arc<InMemoryWorld>, source: &str) -> (RunOutcome, Vec<ExecEvent>) {
    let mut executor = build_executor(world, ExecutorOptions::default(), MemoryWaypoints::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = executor.run_streaming(&parse_program(source), tx).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (outcome, events)
}

pub fn options_with_limit(op_limit: usize) -> ExecutorOptions {
    ExecutorOptions {
        op_limit,
        ..ExecutorOptions::default()
    }
}

/// Kind of the failure that aborted the run
pub fn failure_kind(outcome: &RunOutcome) -> Option<ErrorKind> {
    outcome.failure().map(|f| f.error)
}

pub fn ops(outcome: &RunOutcome) -> Vec<&str> {
    outcome.results.iter().filter_map(|r| r.op()).collect()
}
