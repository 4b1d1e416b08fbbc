//! CraftScript: a small scripting language for driving a block-world agent
//!
//! Scripts are parsed into an AST ([`parser`]), executed statement by
//! statement against a sensing facade over the world ([`executor`],
//! [`world`]), and run as observable jobs ([`jobs`]).

pub mod cli;
pub mod config;
pub mod executor;
pub mod jobs;
pub mod parser;
pub mod selector;
pub mod types;
pub mod waypoints;
pub mod world;

pub use executor::{CraftscriptResult, ErrorKind, Executor, ExecutorOptions, RunOutcome};
pub use jobs::{JobError, JobManager};
pub use parser::{parse, ParseError};
pub use selector::{Heading, Selector};
pub use types::{Job, JobEvent, JobFailure, JobState, StatusEvent};
pub use world::{InMemoryWorld, Sensing, World};
