//! Read-only sensing facade
//!
//! Everything the interpreter asks about the world before acting goes
//! through [`Sensing`]: local voxel snapshots, hazards, block metadata,
//! nearest-match search, topography and the boolean safety predicates.
//! The only state it owns is the navigation session table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::navigation::Navigator;
use super::{block_info, is_air, is_solid, normalize_id, BlockInfo, BlockPos, Goal, World};
use crate::selector::{offset_key, Heading, Offset, Selector};

/* ===================== Types ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    /// Sand or gravel somewhere above the actor's head
    GravelOverhead,
    LavaNear,
}

impl Hazard {
    pub fn as_str(self) -> &'static str {
        match self {
            Hazard::GravelOverhead => "gravel_overhead",
            Hazard::LavaNear => "lava_near",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub position: BlockPos,
    pub heading: Heading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxWindow {
    pub radius: i32,
    pub shape: [i32; 3],
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    pub include_air: bool,
    /// Keep only block ids containing this substring
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxSnapshot {
    pub window: VoxWindow,
    pub pose: Pose,
    /// Block ids keyed by selector key relative to the actor
    pub vox: BTreeMap<String, String>,
    pub predicates: BTreeMap<String, bool>,
    pub hazards: Vec<Hazard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NearestTarget {
    Block(String),
    Entity(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearestQuery {
    pub target: NearestTarget,
    pub radius: i32,
    pub limit: usize,
    /// Ask the pathfinder whether each match can be reached
    pub reachable: bool,
}

impl NearestQuery {
    pub const DEFAULT_RADIUS: i32 = 48;

    pub fn block(id: impl Into<String>) -> Self {
        Self {
            target: NearestTarget::Block(id.into()),
            radius: Self::DEFAULT_RADIUS,
            limit: 1,
            reachable: false,
        }
    }

    pub fn entity(id: impl Into<String>) -> Self {
        Self {
            target: NearestTarget::Entity(id.into()),
            ..Self::block("")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestMatch {
    pub id: String,
    pub position: BlockPos,
    pub distance: f64,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slope {
    GentleUp,
    GentleDown,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopographySummary {
    pub min: i32,
    pub max: i32,
    pub flat_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topography {
    pub radius: i32,
    /// Surface height relative to the actor's feet, keyed by column selector
    pub heightmap: BTreeMap<String, i32>,
    pub slope: Slope,
    pub summary: TopographySummary,
}

/* ===================== Facade ===================== */

#[derive(Clone)]
pub struct Sensing {
    world: Arc<dyn World>,
    navigator: Navigator,
}

impl Sensing {
    pub fn new(world: Arc<dyn World>, nav_timeout: Duration) -> Self {
        let navigator = Navigator::new(world.clone(), nav_timeout);
        Self { world, navigator }
    }

    pub fn world(&self) -> &Arc<dyn World> {
        &self.world
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.world.position(),
            heading: Heading::from_yaw(self.world.yaw()),
        }
    }

    pub fn heading(&self) -> Heading {
        Heading::from_yaw(self.world.yaw())
    }

    /// Normalized block id at a cell
    pub fn block_at(&self, pos: BlockPos) -> Option<String> {
        self.world.block_at(pos).map(|id| normalize_id(&id))
    }

    /// World cell named by a selector from the current pose
    pub fn resolve(&self, selector: &Selector) -> BlockPos {
        let pose = self.pose();
        pose.position + selector.resolve(pose.heading)
    }

    pub fn block_info(&self, id: &str) -> BlockInfo {
        block_info(id)
    }

    /* ----- predicates, all evaluated at the current feet cell ----- */

    /// Feet cell is empty
    pub fn is_air(&self) -> bool {
        let feet = self.world.position();
        is_air(self.block_at(feet).as_deref())
    }

    /// Solid ground below with room for feet and head
    pub fn can_stand(&self) -> bool {
        let feet = self.world.position();
        is_solid(self.block_at(feet.down(1)).as_deref())
            && is_air(self.block_at(feet).as_deref())
            && is_air(self.block_at(feet.up(1)).as_deref())
    }

    /// Standing, with clearance above the head to rise one block
    pub fn safe_step_up(&self) -> bool {
        let feet = self.world.position();
        self.can_stand() && is_air(self.block_at(feet.up(2)).as_deref())
    }

    /// Standing on ground that will not collapse when stepped off
    pub fn safe_step_down(&self) -> bool {
        let feet = self.world.position();
        let ground = self.block_at(feet.down(1));
        self.can_stand() && !ground.as_deref().map(|id| block_info(id).falls).unwrap_or(false)
    }

    pub fn predicates(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([
            ("can_stand".to_string(), self.can_stand()),
            ("is_air".to_string(), self.is_air()),
            ("safe_step_up".to_string(), self.safe_step_up()),
            ("safe_step_down".to_string(), self.safe_step_down()),
        ])
    }

    /* ----- inventory ----- */

    pub fn item_count(&self, id: &str) -> u32 {
        let id = normalize_id(id);
        self.world
            .inventory()
            .iter()
            .filter(|stack| normalize_id(&stack.name) == id)
            .map(|stack| stack.count)
            .sum()
    }

    pub fn has_item(&self, id: &str) -> bool {
        self.item_count(id) > 0
    }

    /* ----- hazards & snapshots ----- */

    pub fn hazards(&self, radius: i32) -> Vec<Hazard> {
        let feet = self.world.position();
        let radius = radius.max(1);
        let mut found = Vec::new();

        let overhead = (-1..=1).any(|dx| {
            (-1..=1).any(|dz| {
                (2..=radius + 2).any(|dy| {
                    let pos = feet + Offset::new(dx, dy, dz);
                    self.block_at(pos).map(|id| block_info(&id).falls).unwrap_or(false)
                })
            })
        });
        if overhead {
            found.push(Hazard::GravelOverhead);
        }

        let lava = (-radius..=radius).any(|dx| {
            (-radius..=radius).any(|dz| {
                (-1..=1).any(|dy| {
                    self.block_at(feet + Offset::new(dx, dy, dz)).as_deref() == Some("lava")
                })
            })
        });
        if lava {
            found.push(Hazard::LavaNear);
        }

        found
    }

    /// Local cube of blocks around the feet, keyed by selector
    pub fn snapshot(&self, radius: i32, options: &SnapshotOptions) -> VoxSnapshot {
        let radius = radius.max(0);
        let pose = self.pose();
        let side = 2 * radius + 1;
        let mut vox = BTreeMap::new();

        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for dz in -radius..=radius {
                    let offset = Offset::new(dx, dy, dz);
                    let block = self.block_at(pose.position + offset);
                    if !options.include_air && is_air(block.as_deref()) {
                        continue;
                    }
                    let id = block.unwrap_or_else(|| "air".to_string());
                    if let Some(filter) = &options.filter {
                        if !id.contains(filter.as_str()) {
                            continue;
                        }
                    }
                    vox.insert(offset_key(offset, pose.heading), id);
                }
            }
        }

        VoxSnapshot {
            window: VoxWindow {
                radius,
                shape: [side, side, side],
            },
            pose,
            vox,
            predicates: self.predicates(),
            hazards: self.hazards(radius),
        }
    }

    /* ----- search ----- */

    /// Closest matches for a block or entity id, nearest first
    pub async fn nearest(&self, query: &NearestQuery) -> Vec<NearestMatch> {
        let pose = self.pose();
        let radius = query.radius.max(0);
        let mut matches = Vec::new();

        match &query.target {
            NearestTarget::Block(id) => {
                let id = normalize_id(id);
                for dx in -radius..=radius {
                    for dy in -radius..=radius {
                        for dz in -radius..=radius {
                            let pos = pose.position + Offset::new(dx, dy, dz);
                            if self.block_at(pos).as_deref() == Some(id.as_str()) {
                                matches.push((id.clone(), pos));
                            }
                        }
                    }
                }
            }
            NearestTarget::Entity(id) => {
                let id = normalize_id(id);
                for entity in self.world.entities() {
                    let within = entity.position.distance_to(pose.position) <= f64::from(radius);
                    if normalize_id(&entity.name) == id && within {
                        matches.push((id.clone(), entity.position));
                    }
                }
            }
        }

        let mut found: Vec<NearestMatch> = matches
            .into_iter()
            .map(|(id, position)| NearestMatch {
                distance: position.distance_to(pose.position),
                selector: offset_key(position - pose.position, pose.heading),
                id,
                position,
                reachable: None,
            })
            .collect();
        found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        found.truncate(query.limit.max(1));

        if query.reachable {
            for m in found.iter_mut() {
                m.reachable = Some(self.world.path_exists(Goal::new(m.position, 1)).await);
            }
        }

        found
    }

    /// Surface heightmap around the actor
    pub fn topography(&self, radius: i32) -> Topography {
        let radius = radius.max(1);
        let pose = self.pose();
        let forward = pose.heading.forward();
        let mut heightmap = BTreeMap::new();
        let (mut ahead, mut behind) = (Vec::new(), Vec::new());

        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let column = Offset::new(dx, 0, dz);
                let Some(height) = self.surface_height(pose.position + column, radius) else {
                    continue;
                };
                heightmap.insert(offset_key(column, pose.heading), height);

                let along = dx * forward.dx + dz * forward.dz;
                if along > 0 {
                    ahead.push(height);
                } else if along < 0 {
                    behind.push(height);
                }
            }
        }

        let mean = |v: &[i32]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().map(|h| f64::from(*h)).sum::<f64>() / v.len() as f64
            }
        };
        let rise = mean(&ahead) - mean(&behind);
        let slope = if rise > 0.5 {
            Slope::GentleUp
        } else if rise < -0.5 {
            Slope::GentleDown
        } else {
            Slope::Flat
        };

        let summary = TopographySummary {
            min: heightmap.values().copied().min().unwrap_or(0),
            max: heightmap.values().copied().max().unwrap_or(0),
            flat_cells: heightmap.values().filter(|h| **h == 0).count(),
        };

        Topography {
            radius,
            heightmap,
            slope,
            summary,
        }
    }

    /// Height of the first standable surface in a column, relative to `base`
    fn surface_height(&self, base: BlockPos, span: i32) -> Option<i32> {
        (-span..=span).rev().find_map(|dy| {
            let ground = self.block_at(base.up(dy - 1));
            let above = self.block_at(base.up(dy));
            (is_solid(ground.as_deref()) && is_air(above.as_deref())).then_some(dy)
        })
    }
}
