//! In-memory world
//!
//! A self-contained [`World`] used by the CLI and the test suites. Blocks
//! live in a sparse map, actions are recorded in order, and the pathfinder
//! answers immediately: goals are reached unless the target is marked
//! unreachable or the world is stalled. By default the actor does not move
//! when a goal is reached; [`InMemoryWorld::walking`] makes it teleport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::{
    normalize_id, BlockPos, EntitySighting, Face, Goal, ItemStack, PathEvent, World, WorldError,
};
use crate::selector::Heading;

/// A recorded world mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorldAction {
    Look { yaw: f64 },
    Dig { pos: BlockPos },
    Place { pos: BlockPos, item: String },
    Equip { item: String },
    Toss { item: String, count: u32 },
    Consume { item: String },
    SetGoal { goal: Goal },
    ClearGoal,
}

#[derive(Default)]
struct State {
    position: BlockPos,
    yaw: f64,
    blocks: HashMap<BlockPos, String>,
    inventory: Vec<ItemStack>,
    held: Option<String>,
    entities: Vec<EntitySighting>,
    unreachable: HashSet<BlockPos>,
    walking: bool,
    stalled: bool,
    goal_tx: Option<mpsc::UnboundedSender<PathEvent>>,
    actions: Vec<WorldAction>,
}

#[derive(Default)]
pub struct InMemoryWorld {
    state: Mutex<State>,
}

impl InMemoryWorld {
    pub fn new(position: BlockPos, heading: Heading) -> Self {
        Self {
            state: Mutex::new(State {
                position,
                yaw: heading.yaw(),
                ..State::default()
            }),
        }
    }

    pub fn with_block(self, pos: BlockPos, id: impl Into<String>) -> Self {
        self.set_block(pos, id);
        self
    }

    /// Fill the inclusive box between two corners
    pub fn with_fill(self, from: BlockPos, to: BlockPos, id: &str) -> Self {
        for x in from.x.min(to.x)..=from.x.max(to.x) {
            for y in from.y.min(to.y)..=from.y.max(to.y) {
                for z in from.z.min(to.z)..=from.z.max(to.z) {
                    self.set_block(BlockPos::new(x, y, z), id);
                }
            }
        }
        self
    }

    pub fn with_item(self, name: impl Into<String>, count: u32) -> Self {
        self.lock().inventory.push(ItemStack {
            name: name.into(),
            count,
        });
        self
    }

    pub fn with_entity(self, name: impl Into<String>, position: BlockPos) -> Self {
        self.lock().entities.push(EntitySighting {
            name: name.into(),
            position,
        });
        self
    }

    /// Goals targeting this cell fail with `no_path`
    pub fn with_unreachable(self, pos: BlockPos) -> Self {
        self.lock().unreachable.insert(pos);
        self
    }

    /// Move the actor onto the goal when it is reached
    pub fn walking(self) -> Self {
        self.lock().walking = true;
        self
    }

    /// Report a path but never arrive
    pub fn stalled(self) -> Self {
        self.lock().stalled = true;
        self
    }

    pub fn set_block(&self, pos: BlockPos, id: impl Into<String>) {
        let id = normalize_id(&id.into());
        let mut state = self.lock();
        if id == "air" {
            state.blocks.remove(&pos);
        } else {
            state.blocks.insert(pos, id);
        }
    }

    pub fn set_position(&self, pos: BlockPos) {
        self.lock().position = pos;
    }

    pub fn actions(&self) -> Vec<WorldAction> {
        self.lock().actions.clone()
    }

    /// Recorded actions that change blocks, inventory or position
    pub fn mutations(&self) -> Vec<WorldAction> {
        self.actions()
            .into_iter()
            .filter(|a| !matches!(a, WorldAction::Look { .. } | WorldAction::ClearGoal))
            .collect()
    }

    pub fn held(&self) -> Option<String> {
        self.lock().held.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn from_fixture(fixture: &WorldFixture) -> Self {
        let [x, y, z] = fixture.position;
        let mut world = InMemoryWorld::new(BlockPos::new(x, y, z), fixture.heading);
        for fill in &fixture.fills {
            world = world.with_fill(pos(fill.from), pos(fill.to), &fill.id);
        }
        for block in &fixture.blocks {
            world = world.with_block(pos(block.pos), block.id.clone());
        }
        for item in &fixture.inventory {
            world = world.with_item(item.name.clone(), item.count);
        }
        for entity in &fixture.entities {
            world = world.with_entity(entity.name.clone(), pos(entity.pos));
        }
        for cell in &fixture.unreachable {
            world = world.with_unreachable(pos(*cell));
        }
        if fixture.walking {
            world = world.walking();
        }
        world
    }
}

fn pos([x, y, z]: [i32; 3]) -> BlockPos {
    BlockPos::new(x, y, z)
}

fn take_item(inventory: &mut Vec<ItemStack>, item: &str, count: u32) -> bool {
    let Some(idx) = inventory.iter().position(|s| normalize_id(&s.name) == item) else {
        return false;
    };
    let stack = &mut inventory[idx];
    stack.count = stack.count.saturating_sub(count);
    if stack.count == 0 {
        inventory.remove(idx);
    }
    true
}

#[async_trait]
impl World for InMemoryWorld {
    fn position(&self) -> BlockPos {
        self.lock().position
    }

    fn yaw(&self) -> f64 {
        self.lock().yaw
    }

    fn block_at(&self, pos: BlockPos) -> Option<String> {
        Some(
            self.lock()
                .blocks
                .get(&pos)
                .cloned()
                .unwrap_or_else(|| "air".to_string()),
        )
    }

    fn entities(&self) -> Vec<EntitySighting> {
        self.lock().entities.clone()
    }

    fn inventory(&self) -> Vec<ItemStack> {
        self.lock().inventory.clone()
    }

    async fn look(&self, yaw: f64) -> Result<(), WorldError> {
        let mut state = self.lock();
        state.yaw = yaw;
        state.actions.push(WorldAction::Look { yaw });
        Ok(())
    }

    async fn dig(&self, pos: BlockPos) -> Result<(), WorldError> {
        let mut state = self.lock();
        if state.blocks.remove(&pos).is_none() {
            return Err(WorldError::ActionFailed(format!("nothing to dig at {}", pos)));
        }
        state.actions.push(WorldAction::Dig { pos });
        Ok(())
    }

    async fn place(&self, reference: BlockPos, face: Face) -> Result<(), WorldError> {
        let mut state = self.lock();
        let item = state
            .held
            .clone()
            .ok_or_else(|| WorldError::ActionFailed("nothing held".to_string()))?;
        let target = reference + face.vector();
        if state.blocks.contains_key(&target) {
            return Err(WorldError::ActionFailed(format!("{} is occupied", target)));
        }
        if !take_item(&mut state.inventory, &item, 1) {
            return Err(WorldError::ActionFailed(format!("no {} left", item)));
        }
        state.blocks.insert(target, item.clone());
        state.actions.push(WorldAction::Place { pos: target, item });
        Ok(())
    }

    async fn equip(&self, item: &str) -> Result<(), WorldError> {
        let item = normalize_id(item);
        let mut state = self.lock();
        if !state.inventory.iter().any(|s| normalize_id(&s.name) == item) {
            return Err(WorldError::ActionFailed(format!("no {} in inventory", item)));
        }
        state.held = Some(item.clone());
        state.actions.push(WorldAction::Equip { item });
        Ok(())
    }

    async fn toss(&self, item: &str, count: u32) -> Result<(), WorldError> {
        let item = normalize_id(item);
        let mut state = self.lock();
        if !take_item(&mut state.inventory, &item, count) {
            return Err(WorldError::ActionFailed(format!("no {} in inventory", item)));
        }
        state.actions.push(WorldAction::Toss { item, count });
        Ok(())
    }

    async fn consume(&self) -> Result<(), WorldError> {
        let mut state = self.lock();
        let item = state
            .held
            .clone()
            .ok_or_else(|| WorldError::ActionFailed("nothing held".to_string()))?;
        if !take_item(&mut state.inventory, &item, 1) {
            return Err(WorldError::ActionFailed(format!("no {} left", item)));
        }
        state.actions.push(WorldAction::Consume { item });
        Ok(())
    }

    fn set_goal(&self, goal: Goal) -> mpsc::UnboundedReceiver<PathEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.actions.push(WorldAction::SetGoal { goal });

        if state.unreachable.contains(&goal.target) {
            let _ = tx.send(PathEvent::NoPath);
        } else {
            let _ = tx.send(PathEvent::PathUpdate);
            if !state.stalled {
                if state.walking {
                    state.position = goal.target;
                }
                let _ = tx.send(PathEvent::GoalReached);
            }
        }
        state.goal_tx = Some(tx);
        rx
    }

    fn clear_goal(&self) {
        let mut state = self.lock();
        if let Some(tx) = state.goal_tx.take() {
            let _ = tx.send(PathEvent::GoalReset);
        }
        state.actions.push(WorldAction::ClearGoal);
    }

    async fn path_exists(&self, goal: Goal) -> bool {
        !self.lock().unreachable.contains(&goal.target)
    }
}

/* ===================== Fixtures ===================== */

/// TOML description of an in-memory world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldFixture {
    pub position: [i32; 3],
    #[serde(default = "default_heading")]
    pub heading: Heading,
    #[serde(default)]
    pub walking: bool,
    #[serde(default)]
    pub fills: Vec<FixtureFill>,
    #[serde(default)]
    pub blocks: Vec<FixtureBlock>,
    #[serde(default)]
    pub inventory: Vec<ItemStack>,
    #[serde(default)]
    pub entities: Vec<FixtureEntity>,
    #[serde(default)]
    pub unreachable: Vec<[i32; 3]>,
}

fn default_heading() -> Heading {
    Heading::North
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureFill {
    pub from: [i32; 3],
    pub to: [i32; 3],
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureBlock {
    pub pos: [i32; 3],
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureEntity {
    pub name: String,
    pub pos: [i32; 3],
}

impl WorldFixture {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

impl Default for WorldFixture {
    fn default() -> Self {
        Self {
            position: [0, 64, 0],
            heading: Heading::North,
            walking: false,
            // a flat stone floor under the actor
            fills: vec![FixtureFill {
                from: [-8, 63, -8],
                to: [8, 63, 8],
                id: "stone".to_string(),
            }],
            blocks: Vec::new(),
            inventory: Vec::new(),
            entities: Vec::new(),
            unreachable: Vec::new(),
        }
    }
}
