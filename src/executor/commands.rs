//! Command dispatch
//!
//! Every command checks its preconditions against the sensing facade before
//! the irreversible world action is issued. A handler returns the optional
//! `notes` for its success result; failures are mapped onto the closed
//! [`ErrorKind`] taxonomy.

use serde_json::{json, Value as JsonValue};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{Command, ErrorKind, ExecError, Expr, StepSuccess, TraceEvent, Val};
use super::{ExecResult, Executor};
use crate::executor::types::CraftscriptResult;
use crate::selector::Heading;
use crate::world::sensing::SnapshotOptions;
use crate::world::{block_info, is_air, is_solid, BlockPos, Face, Goal, NavState};

/* ===================== Command Kinds ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Move,
    Turn,
    TurnFace,
    Dig,
    Place,
    Equip,
    Scan,
    Goto,
    Drop,
    Eat,
    Break,
    Wait,
    Log,
    BlockInfo,
}

/// Upper bound for `wait`, in milliseconds
pub const MAX_WAIT_MS: i64 = 300_000;

impl CommandKind {
    pub const ALL: [CommandKind; 14] = [
        CommandKind::Move,
        CommandKind::Turn,
        CommandKind::TurnFace,
        CommandKind::Dig,
        CommandKind::Place,
        CommandKind::Equip,
        CommandKind::Scan,
        CommandKind::Goto,
        CommandKind::Drop,
        CommandKind::Eat,
        CommandKind::Break,
        CommandKind::Wait,
        CommandKind::Log,
        CommandKind::BlockInfo,
    ];

    pub fn from_name(name: &str) -> Option<CommandKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Move => "move",
            CommandKind::Turn => "turn",
            CommandKind::TurnFace => "turn_face",
            CommandKind::Dig => "dig",
            CommandKind::Place => "place",
            CommandKind::Equip => "equip",
            CommandKind::Scan => "scan",
            CommandKind::Goto => "goto",
            CommandKind::Drop => "drop",
            CommandKind::Eat => "eat",
            CommandKind::Break => "break",
            CommandKind::Wait => "wait",
            CommandKind::Log => "log",
            CommandKind::BlockInfo => "block_info",
        }
    }

    /// Parameter names in positional order; each may also be passed by name
    fn params(self) -> &'static [&'static str] {
        match self {
            CommandKind::Move => &["target", "tol"],
            CommandKind::Turn => &["token"],
            CommandKind::TurnFace => &["direction"],
            CommandKind::Dig | CommandKind::Break | CommandKind::BlockInfo => &["target"],
            CommandKind::Place => &["item", "target", "face"],
            CommandKind::Equip | CommandKind::Eat => &["item"],
            CommandKind::Scan => &["r"],
            CommandKind::Goto => &["target", "tol"],
            CommandKind::Drop => &["item", "count"],
            CommandKind::Wait => &["ms"],
            CommandKind::Log => &[],
        }
    }

    fn max_positional(self) -> usize {
        match self {
            // goto x, y, z [, tol]
            CommandKind::Goto => 4,
            CommandKind::BlockInfo => 3,
            CommandKind::Log => usize::MAX,
            kind => kind.params().len(),
        }
    }
}

/* ===================== Argument Binding ===================== */

struct Args<'c> {
    kind: CommandKind,
    positional: Vec<&'c Expr>,
    command: &'c Command,
}

impl<'c> Args<'c> {
    fn bind(kind: CommandKind, command: &'c Command) -> Result<Self, ExecError> {
        let positional: Vec<&Expr> = command.positional().collect();
        if positional.len() > kind.max_positional() {
            return Err(ExecError::compile(format!(
                "{} takes at most {} arguments, got {}",
                kind.name(),
                kind.max_positional(),
                positional.len()
            )));
        }
        for arg in &command.args {
            if let super::types::Arg::Named { key, span, .. } = arg {
                if !kind.params().contains(&key.as_str()) {
                    return Err(ExecError::compile(format!(
                        "{} has no argument named {}",
                        kind.name(),
                        key
                    ))
                    .at(*span));
                }
            }
        }
        Ok(Self {
            kind,
            positional,
            command,
        })
    }

    /// Named value wins over the positional slot
    fn get(&self, index: usize) -> Option<&'c Expr> {
        let name = self.kind.params().get(index)?;
        self.command
            .named(name)
            .or_else(|| self.positional.get(index).copied())
    }
}

impl Executor {
    fn optional(&self, args: &Args<'_>, index: usize) -> Result<Option<Val>, ExecError> {
        args.get(index).map(|expr| self.eval(expr)).transpose()
    }

    fn required(&self, args: &Args<'_>, index: usize) -> Result<Val, ExecError> {
        self.optional(args, index)?.ok_or_else(|| {
            let param = args.kind.params().get(index).copied().unwrap_or("argument");
            ExecError::compile(format!("{} expects {}", args.kind.name(), param))
        })
    }

    /* ===================== Dispatch ===================== */

    pub(crate) async fn exec_command(&mut self, cmd: &Command) -> ExecResult {
        let Some(kind) = CommandKind::from_name(&cmd.name) else {
            return Err(ExecError::compile(format!("unknown command: {}", cmd.name))
                .at(cmd.span)
                .into());
        };

        self.trace(TraceEvent::Command {
            op: cmd.name.clone(),
            op_index: self.ops,
            loc: cmd.span.location(),
        });
        debug!(op = %cmd.name, op_index = self.ops, "Executing command");

        let started = Instant::now();
        let notes = self
            .dispatch(kind, cmd)
            .await
            .map_err(|err| err.at(cmd.span).for_op(kind.name()))?;

        self.push(CraftscriptResult::Success(StepSuccess {
            op: kind.name().to_string(),
            ms: started.elapsed().as_millis() as u64,
            notes,
        }));
        Ok(())
    }

    async fn dispatch(&self, kind: CommandKind, cmd: &Command) -> Result<Option<JsonValue>, ExecError> {
        let args = Args::bind(kind, cmd)?;
        match kind {
            CommandKind::Move => self.cmd_move(&args).await,
            CommandKind::Turn => self.cmd_turn(&args).await,
            CommandKind::TurnFace => self.cmd_turn_face(&args).await,
            CommandKind::Dig | CommandKind::Break => self.cmd_dig(&args).await,
            CommandKind::Place => self.cmd_place(&args).await,
            CommandKind::Equip => self.cmd_equip(&args).await,
            CommandKind::Scan => self.cmd_scan(&args),
            CommandKind::Goto => self.cmd_goto(&args).await,
            CommandKind::Drop => self.cmd_drop(&args).await,
            CommandKind::Eat => self.cmd_eat(&args).await,
            CommandKind::Wait => self.cmd_wait(&args).await,
            CommandKind::Log => self.cmd_log(&args, cmd),
            CommandKind::BlockInfo => self.cmd_block_info(&args),
        }
    }

    /* ===================== Helpers ===================== */

    /// Distance from the actor's eyes to a cell
    fn reach_to(&self, pos: BlockPos) -> f64 {
        self.sensing.world().position().up(1).distance_to(pos)
    }

    fn check_reach(&self, pos: BlockPos) -> Result<(), ExecError> {
        let distance = self.reach_to(pos);
        if distance > self.options.reach {
            return Err(ExecError::new(ErrorKind::MoveBlocked, "out_of_reach").with_notes(json!({
                "target": pos,
                "distance": distance,
                "reach": self.options.reach,
            })));
        }
        Ok(())
    }

    fn require_item(&self, item: &str) -> Result<(), ExecError> {
        if self.sensing.has_item(item) {
            return Ok(());
        }
        Err(ExecError::new(
            ErrorKind::Unavailable,
            format!("missing item: {}", item),
        ))
    }

    fn trace_hazards(&self, op: &str) {
        if !self.options.auto_scan {
            return;
        }
        let hazards = self.sensing.hazards(self.options.default_scan_radius);
        if !hazards.is_empty() {
            self.trace(TraceEvent::Hazards {
                op: op.to_string(),
                hazards,
            });
        }
    }

    fn tolerance(&self, val: Option<Val>, default: i32) -> Result<i32, ExecError> {
        match val {
            Some(val) => Ok(self.integer(val, "tol")?.clamp(0, i64::from(i32::MAX)) as i32),
            None => Ok(default),
        }
    }

    fn coordinate(&self, val: Val, what: &str) -> Result<i32, ExecError> {
        let n = self.integer(val, what)?;
        i32::try_from(n).map_err(|_| ExecError::compile(format!("{} out of range: {}", what, n)))
    }

    /// `x, y, z` from the positional arguments, `x` already evaluated
    fn coordinates(&self, args: &Args<'_>, x: Val) -> Result<BlockPos, ExecError> {
        let axis = |index: usize, what: &str| -> Result<i32, ExecError> {
            let val = args
                .positional
                .get(index)
                .map(|expr| self.eval(expr))
                .transpose()?
                .ok_or_else(|| {
                    ExecError::compile(format!("{} expects x, y, z", args.kind.name()))
                })?;
            self.coordinate(val, what)
        };
        Ok(BlockPos::new(self.coordinate(x, "x")?, axis(1, "y")?, axis(2, "z")?))
    }

    async fn navigate(&self, op: &str, goal: Goal) -> Result<Option<JsonValue>, ExecError> {
        let navigator = self.sensing.navigator();
        let status = navigator.goto(goal, Some(self.options.nav_timeout)).await;
        let notes = serde_json::to_value(&status).ok();

        if status.state != NavState::Arrived {
            let reason = status.reason.clone().unwrap_or_else(|| "no_path".to_string());
            warn!(op, nav_id = %status.id, state = ?status.state, %reason, "Navigation did not arrive");
            let err = ExecError::new(ErrorKind::NoPath, format!("{}: {}", op, reason));
            return Err(match notes {
                Some(notes) => err.with_notes(notes),
                None => err,
            });
        }
        Ok(notes)
    }

    /* ===================== Movement ===================== */

    async fn cmd_move(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let target = self.required(args, 0)?;
        let tolerance = self.tolerance(self.optional(args, 1)?, 0)?;
        let dest = self.cell(target)?;
        let dy = dest.y.saturating_sub(self.sensing.world().position().y);

        if dy > 0 && !self.sensing.safe_step_up() {
            return Err(ExecError::invariant("safe_step_up failed").with_notes(json!({ "dy": dy })));
        }
        if dy < 0 && !self.sensing.safe_step_down() {
            return Err(ExecError::invariant("safe_step_down failed").with_notes(json!({ "dy": dy })));
        }

        self.trace_hazards("move");
        self.navigate("move", Goal::new(dest, tolerance)).await
    }

    async fn cmd_goto(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let first = self.required(args, 0)?;
        let (dest, tol) = match first {
            x @ Val::Num(_) => {
                let dest = self.coordinates(args, x)?;
                let tol = match args.command.named("tol") {
                    Some(expr) => Some(self.eval(expr)?),
                    None => args.positional.get(3).map(|expr| self.eval(expr)).transpose()?,
                };
                (dest, tol)
            }
            Val::Waypoint(name) | Val::Str(name) => {
                let waypoint = self
                    .waypoints
                    .lookup(&name)
                    .await
                    .map_err(|e| ExecError::runtime(e.to_string()))?
                    .ok_or_else(|| {
                        ExecError::new(ErrorKind::NoPath, format!("unknown waypoint {}", name))
                    })?;
                (waypoint.position(), self.optional(args, 1)?)
            }
            other => (self.cell(other)?, self.optional(args, 1)?),
        };

        let tolerance = self.tolerance(tol, self.options.default_tolerance)?;
        self.navigate("goto", Goal::new(dest, tolerance)).await
    }

    async fn cmd_turn(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let token = self.text(self.required(args, 0)?, "turn token")?;
        let current = self.sensing.heading();
        let heading = match token.to_ascii_lowercase().as_str() {
            "r90" | "right" => current.turn_right(),
            "l90" | "left" => current.turn_left(),
            "180" | "around" => current.reverse(),
            _ => return Err(ExecError::compile(format!("invalid turn token: {}", token))),
        };
        self.sensing.world().look(heading.yaw()).await?;
        Ok(Some(json!({ "from": current, "to": heading })))
    }

    async fn cmd_turn_face(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let direction = self.text(self.required(args, 0)?, "direction")?;
        let heading = Heading::parse(&direction)
            .ok_or_else(|| ExecError::compile(format!("invalid direction: {}", direction)))?;
        self.sensing.world().look(heading.yaw()).await?;
        Ok(Some(json!({ "to": heading })))
    }

    /* ===================== Blocks ===================== */

    async fn cmd_dig(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let target = self.cell(self.required(args, 0)?)?;

        for above in [target.up(1), target.up(2)] {
            if let Some(id) = self.sensing.block_at(above) {
                if block_info(&id).falls {
                    return Err(ExecError::invariant("gravity_block_overhead")
                        .with_notes(json!({ "block": id, "at": above })));
                }
            }
        }

        let block = self.sensing.block_at(target);
        let Some(id) = block.filter(|id| !is_air(Some(id.as_str()))) else {
            return Err(ExecError::new(ErrorKind::MoveBlocked, "no_target")
                .with_notes(json!({ "target": target })));
        };
        self.check_reach(target)?;

        self.trace_hazards("dig");
        self.sensing.world().dig(target).await?;
        Ok(Some(json!({ "block": id, "at": target })))
    }

    async fn cmd_place(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let item = self.text(self.required(args, 0)?, "item id")?;
        self.require_item(&item)?;

        let target = self.cell(self.required(args, 1)?)?;
        let face = match self.optional(args, 2)? {
            Some(val) => {
                let name = self.text(val, "face")?;
                Face::parse(&name).ok_or_else(|| ExecError::compile(format!("invalid face: {}", name)))?
            }
            None => Face::Up,
        };

        let reference = target - face.vector();
        if !is_solid(self.sensing.block_at(reference).as_deref()) {
            return Err(ExecError::new(ErrorKind::Blocked, "no_reference")
                .with_notes(json!({ "reference": reference, "face": face })));
        }
        self.check_reach(reference)?;
        if let Some(occupant) = self.sensing.block_at(target).filter(|id| !is_air(Some(id.as_str()))) {
            return Err(ExecError::new(ErrorKind::Blocked, "target_occupied")
                .with_notes(json!({ "target": target, "block": occupant })));
        }

        self.trace_hazards("place");
        let world = self.sensing.world();
        world.equip(&item).await?;
        world.place(reference, face).await?;
        Ok(Some(json!({ "item": item, "at": target, "face": face })))
    }

    /* ===================== Inventory ===================== */

    async fn cmd_equip(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let item = self.text(self.required(args, 0)?, "item id")?;
        self.require_item(&item)?;
        self.sensing.world().equip(&item).await?;
        Ok(Some(json!({ "item": item })))
    }

    async fn cmd_drop(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let item = self.text(self.required(args, 0)?, "item id")?;
        self.require_item(&item)?;

        let available = self.sensing.item_count(&item);
        let count = match self.optional(args, 1)? {
            Some(val) => {
                let count = self.integer(val, "count")?;
                if count < 1 {
                    return Err(ExecError::compile(format!("drop count must be positive, got {}", count)));
                }
                (count.min(i64::from(available))) as u32
            }
            None => available,
        };

        self.sensing.world().toss(&item, count).await?;
        Ok(Some(json!({ "item": item, "count": count })))
    }

    async fn cmd_eat(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let item = self.text(self.required(args, 0)?, "item id")?;
        self.require_item(&item)?;
        let world = self.sensing.world();
        world.equip(&item).await?;
        world.consume().await?;
        Ok(Some(json!({ "item": item })))
    }

    /* ===================== Engine ===================== */

    async fn cmd_wait(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let ms = self.integer(self.required(args, 0)?, "ms")?;
        if !(0..=MAX_WAIT_MS).contains(&ms) {
            return Err(ExecError::compile(format!(
                "wait must be between 0 and {} ms, got {}",
                MAX_WAIT_MS, ms
            )));
        }
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        Ok(Some(json!({ "ms": ms })))
    }

    fn cmd_log(&self, args: &Args<'_>, cmd: &Command) -> Result<Option<JsonValue>, ExecError> {
        let parts = args
            .positional
            .iter()
            .map(|expr| self.eval(expr).map(|val| val.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        let text = parts.join(" ");

        info!(target: "craftscript::log", %text, "Script log");
        self.trace(TraceEvent::Log {
            text: text.clone(),
            loc: cmd.span.location(),
        });
        Ok(Some(json!({ "text": text })))
    }

    fn cmd_block_info(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let at = match self.required(args, 0)? {
            x @ Val::Num(_) => self.coordinates(args, x)?,
            other => self.cell(other)?,
        };
        let Some(id) = self.sensing.block_at(at) else {
            return Err(ExecError::new(ErrorKind::MoveBlocked, "no_target")
                .with_notes(json!({ "target": at })));
        };

        let info = block_info(&id);
        self.trace(TraceEvent::BlockInfo {
            at,
            info: info.clone(),
        });
        Ok(Some(json!({ "at": at, "info": info })))
    }

    /* ===================== Sensing ===================== */

    fn cmd_scan(&self, args: &Args<'_>) -> Result<Option<JsonValue>, ExecError> {
        let radius = match self.optional(args, 0)? {
            Some(val) => self.integer(val, "r")?,
            None => i64::from(self.options.default_scan_radius),
        };
        let radius = radius.clamp(0, i64::from(self.options.max_scan_radius)) as i32;

        let snapshot = self.sensing.snapshot(radius, &SnapshotOptions::default());
        Ok(Some(json!({
            "size": snapshot.window.shape,
            "radius": snapshot.window.radius,
            "blocks": snapshot.vox.len(),
            "hazards": snapshot.hazards,
            "predicates": snapshot.predicates,
        })))
    }
}
