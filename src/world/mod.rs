//! World collaborator interface and the sensing facade built on it
//!
//! The engine never talks to the game protocol directly. Everything it
//! needs from the live world goes through the [`World`] trait: block and
//! entity queries, inventory, orientation, the handful of mutating actions
//! and the external pathfinder's "go to goal" primitive.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use tokio::sync::mpsc;

use crate::selector::Offset;

pub mod blocks;
pub mod memory;
pub mod navigation;
pub mod sensing;

pub use blocks::{block_info, BlockInfo};
pub use memory::{InMemoryWorld, WorldAction, WorldFixture};
pub use navigation::{NavState, NavStatus, Navigator};
pub use sensing::{Hazard, Sensing};


/* ===================== Positions ===================== */

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn up(self, n: i32) -> BlockPos {
        BlockPos::new(self.x, self.y.saturating_add(n), self.z)
    }

    pub fn down(self, n: i32) -> BlockPos {
        BlockPos::new(self.x, self.y.saturating_sub(n), self.z)
    }

    /// Euclidean distance between block corners
    pub fn distance_to(self, other: BlockPos) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Offsets saturate at the edge of the coordinate space
impl Add<Offset> for BlockPos {
    type Output = BlockPos;

    fn add(self, rhs: Offset) -> BlockPos {
        BlockPos::new(
            self.x.saturating_add(rhs.dx),
            self.y.saturating_add(rhs.dy),
            self.z.saturating_add(rhs.dz),
        )
    }
}

impl Sub<Offset> for BlockPos {
    type Output = BlockPos;

    fn sub(self, rhs: Offset) -> BlockPos {
        self + (-rhs)
    }
}

impl Sub for BlockPos {
    type Output = Offset;

    fn sub(self, rhs: BlockPos) -> Offset {
        Offset::new(
            self.x.saturating_sub(rhs.x),
            self.y.saturating_sub(rhs.y),
            self.z.saturating_sub(rhs.z),
        )
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Navigation goal: reach within `tolerance` blocks of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub target: BlockPos,
    pub tolerance: i32,
}

impl Goal {
    pub fn new(target: BlockPos, tolerance: i32) -> Self {
        Self {
            target,
            tolerance: tolerance.max(0),
        }
    }
}

/// Events emitted by the external pathfinder while pursuing a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PathEvent {
    /// A (re)computed path; the actor is moving
    PathUpdate,
    GoalReached,
    /// The goal was replaced or cleared
    GoalReset,
    /// No progress is being made
    Stuck,
    NoPath,
}

/* ===================== Inventory & Entities ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySighting {
    pub name: String,
    pub position: BlockPos,
}

/// Face of a reference block that a placed block attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Up,
    Down,
    North,
    South,
    East,
    West,
}

impl Face {
    pub fn parse(name: &str) -> Option<Face> {
        match name.to_ascii_lowercase().as_str() {
            "up" | "top" => Some(Face::Up),
            "down" | "bottom" => Some(Face::Down),
            "north" => Some(Face::North),
            "south" => Some(Face::South),
            "east" => Some(Face::East),
            "west" => Some(Face::West),
            _ => None,
        }
    }

    /// Unit vector pointing out of the face, in the same frame as headings
    pub fn vector(self) -> Offset {
        match self {
            Face::Up => Offset::new(0, 1, 0),
            Face::Down => Offset::new(0, -1, 0),
            Face::North => Offset::new(0, 0, 1),
            Face::South => Offset::new(0, 0, -1),
            Face::East => Offset::new(1, 0, 0),
            Face::West => Offset::new(-1, 0, 0),
        }
    }
}

/* ===================== Block Ids ===================== */

/// Strip the `minecraft:` namespace and lowercase
pub fn normalize_id(id: &str) -> String {
    let id = id.trim();
    id.strip_prefix("minecraft:").unwrap_or(id).to_ascii_lowercase()
}

/// Air, or an unloaded cell
pub fn is_air(block: Option<&str>) -> bool {
    match block {
        None => true,
        Some(name) => matches!(name, "air" | "cave_air" | "void_air"),
    }
}

/// Occupies its cell and can bear weight
pub fn is_solid(block: Option<&str>) -> bool {
    match block {
        None => false,
        Some(name) => !is_air(Some(name)) && !block_info(name).liquid,
    }
}

/* ===================== World Trait ===================== */

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("world action failed: {0}")]
    ActionFailed(String),
    #[error("world connection closed")]
    Disconnected,
}

/// The live world as seen through the game connection
#[async_trait]
pub trait World: Send + Sync {
    /// Cell containing the actor's feet
    fn position(&self) -> BlockPos;

    /// Raw yaw in radians (south = 0, clockwise)
    fn yaw(&self) -> f64;

    /// Block id at a cell, `None` when not loaded
    fn block_at(&self, pos: BlockPos) -> Option<String>;

    fn entities(&self) -> Vec<EntitySighting>;

    fn inventory(&self) -> Vec<ItemStack>;

    async fn look(&self, yaw: f64) -> Result<(), WorldError>;

    async fn dig(&self, pos: BlockPos) -> Result<(), WorldError>;

    /// Place the held item against `face` of `reference`
    async fn place(&self, reference: BlockPos, face: Face) -> Result<(), WorldError>;

    async fn equip(&self, item: &str) -> Result<(), WorldError>;

    async fn toss(&self, item: &str, count: u32) -> Result<(), WorldError>;

    /// Consume the held item
    async fn consume(&self) -> Result<(), WorldError>;

    /// Start pursuing `goal`; progress arrives on the returned channel.
    /// A new goal replaces the previous one.
    fn set_goal(&self, goal: Goal) -> mpsc::UnboundedReceiver<PathEvent>;

    fn clear_goal(&self);

    /// Whether the pathfinder can find a route to `goal`
    async fn path_exists(&self, goal: Goal) -> bool;
}
