use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

#[derive(Parser)]
#[command(name = "craftscript")]
#[command(about = "CraftScript - parse, check and run block-world scripts", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a script and report syntax or macro errors
    Check {
        /// Script file
        file: PathBuf,

        /// Print the parsed program as JSON
        #[arg(long)]
        emit_ast: bool,
    },

    /// Run a script as a job against an in-memory world
    Run {
        /// Script file
        file: PathBuf,

        /// World fixture (TOML); defaults to a flat stone floor
        #[arg(long)]
        world: Option<PathBuf>,

        /// Operation budget (overrides config)
        #[arg(long)]
        op_limit: Option<usize>,

        /// Directory holding <bot>_waypoints.json (overrides config)
        #[arg(long)]
        waypoints: Option<PathBuf>,
    },

    /// Resolve a selector to a world offset
    Resolve {
        /// Selector text, e.g. F2+R1 or F^
        selector: String,

        /// Facing direction: north, east, south or west
        #[arg(long, default_value = "north")]
        heading: String,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

/// Internal function that handles CLI commands
async fn run_cli_with_args(cli: Cli) -> Result<()> {
    use crate::config::Config;

    match cli.command {
        Commands::Check { file, emit_ast } => check(&file, emit_ast),

        Commands::Run {
            file,
            world,
            op_limit,
            waypoints,
        } => {
            // Eagerly load and validate configuration before touching the world
            let config = Config::builder()
                .config_path(cli.config)
                .op_limit(op_limit)
                .waypoints_dir(waypoints)
                .build()
                .context("Failed to load configuration")?;
            run(&file, world.as_deref(), &config).await
        }

        Commands::Resolve { selector, heading } => {
            use crate::selector::{offset_key, Heading, Selector};

            let parsed = Selector::parse(&selector)
                .ok_or_else(|| anyhow!("invalid selector: {}", selector))?;
            let heading = Heading::parse(&heading)
                .ok_or_else(|| anyhow!("invalid heading: {}", heading))?;
            let offset = parsed.resolve(heading);

            println!(
                "{}",
                json!({
                    "selector": parsed.to_string(),
                    "heading": heading.as_str(),
                    "offset": offset,
                    "key": offset_key(offset, heading),
                })
            );
            Ok(())
        }
    }
}

fn read_script(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn check(file: &Path, emit_ast: bool) -> Result<()> {
    let source = read_script(file)?;

    match crate::parser::parse(&source) {
        Ok(program) => {
            if emit_ast {
                println!("{}", serde_json::to_string_pretty(&program)?);
            } else {
                println!("✓ {}: {} statement(s)", file.display(), program.body.len());
            }
            Ok(())
        }
        Err(err) => match err.location() {
            Some(loc) => bail!(
                "{}:{}:{}: {}",
                file.display(),
                loc.line,
                loc.column,
                err.message()
            ),
            None => bail!("{}: {}", file.display(), err.message()),
        },
    }
}

async fn run(file: &Path, fixture: Option<&Path>, config: &crate::config::Config) -> Result<()> {
    use crate::jobs::JobManager;
    use crate::types::{JobEvent, JobState};
    use crate::waypoints::FileWaypointStore;
    use crate::world::{InMemoryWorld, Sensing, WorldFixture};

    let source = read_script(file)?;
    let fixture = match fixture {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read world fixture {}", path.display()))?;
            WorldFixture::from_toml(&text)
                .with_context(|| format!("Invalid world fixture {}", path.display()))?
        }
        None => WorldFixture::default(),
    };

    let world = Arc::new(InMemoryWorld::from_fixture(&fixture));
    let sensing = Sensing::new(world, config.nav_timeout());
    let waypoints = FileWaypointStore::new(&config.waypoints.directory, &config.waypoints.bot);
    let manager = JobManager::new(sensing, Arc::new(waypoints), config.executor_options())
        .with_event_capacity(config.jobs.event_capacity);

    let (id, mut events) = manager.create_with_events(source);
    loop {
        match events.recv().await {
            Ok(event) => {
                println!("{}", serde_json::to_string(&event)?);
                if matches!(event, JobEvent::Status(_)) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(job_id = %id, skipped, "Event stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }

    let job = manager.wait(&id).await?;
    match job.state {
        JobState::Completed => Ok(()),
        state => {
            let reason = job
                .error
                .map(|e| format!(": {}: {}", e.kind, e.message))
                .unwrap_or_default();
            bail!("job {} {:?}{}", id, state, reason)
        }
    }
}
