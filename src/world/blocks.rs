//! Static block metadata

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    Air,
    Gravity,
    Liquid,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Hand,
    Pickaxe,
    Shovel,
    Axe,
    Shears,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub id: String,
    pub category: BlockCategory,
    pub preferred_tool: Tool,
    pub hardness: f32,
    pub drops: Vec<String>,
    /// Falls when unsupported (sand, gravel)
    pub falls: bool,
    pub liquid: bool,
}

struct Entry {
    ids: &'static [&'static str],
    category: BlockCategory,
    tool: Tool,
    hardness: f32,
    /// `None` drops the block itself
    drops: Option<&'static [&'static str]>,
}

const CATALOG: &[Entry] = &[
    Entry {
        ids: &["air", "cave_air", "void_air"],
        category: BlockCategory::Air,
        tool: Tool::Hand,
        hardness: 0.0,
        drops: Some(&[]),
    },
    Entry {
        ids: &["sand", "red_sand", "gravel"],
        category: BlockCategory::Gravity,
        tool: Tool::Shovel,
        hardness: 0.6,
        drops: None,
    },
    Entry {
        ids: &["water", "lava"],
        category: BlockCategory::Liquid,
        tool: Tool::Hand,
        hardness: 100.0,
        drops: Some(&[]),
    },
    Entry {
        ids: &["stone"],
        category: BlockCategory::Solid,
        tool: Tool::Pickaxe,
        hardness: 1.5,
        drops: Some(&["cobblestone"]),
    },
    Entry {
        ids: &["cobblestone", "stone_bricks", "andesite", "diorite", "granite", "deepslate"],
        category: BlockCategory::Solid,
        tool: Tool::Pickaxe,
        hardness: 2.0,
        drops: None,
    },
    Entry {
        ids: &["coal_ore"],
        category: BlockCategory::Solid,
        tool: Tool::Pickaxe,
        hardness: 3.0,
        drops: Some(&["coal"]),
    },
    Entry {
        ids: &["iron_ore"],
        category: BlockCategory::Solid,
        tool: Tool::Pickaxe,
        hardness: 3.0,
        drops: Some(&["raw_iron"]),
    },
    Entry {
        ids: &["dirt", "coarse_dirt", "clay", "farmland"],
        category: BlockCategory::Solid,
        tool: Tool::Shovel,
        hardness: 0.5,
        drops: None,
    },
    Entry {
        ids: &["grass_block"],
        category: BlockCategory::Solid,
        tool: Tool::Shovel,
        hardness: 0.6,
        drops: Some(&["dirt"]),
    },
    Entry {
        ids: &["oak_log", "birch_log", "spruce_log", "oak_planks", "crafting_table"],
        category: BlockCategory::Solid,
        tool: Tool::Axe,
        hardness: 2.0,
        drops: None,
    },
    Entry {
        ids: &["oak_leaves", "birch_leaves", "spruce_leaves"],
        category: BlockCategory::Solid,
        tool: Tool::Shears,
        hardness: 0.2,
        drops: Some(&[]),
    },
    Entry {
        ids: &["bedrock"],
        category: BlockCategory::Solid,
        tool: Tool::Pickaxe,
        hardness: -1.0,
        drops: Some(&[]),
    },
];

/// Metadata for a block id. Unknown ids get a generic solid entry.
pub fn block_info(id: &str) -> BlockInfo {
    let id = super::normalize_id(id);
    let entry = CATALOG.iter().find(|e| e.ids.contains(&id.as_str()));

    match entry {
        Some(entry) => BlockInfo {
            category: entry.category,
            preferred_tool: entry.tool,
            hardness: entry.hardness,
            drops: match entry.drops {
                Some(drops) => drops.iter().map(|d| d.to_string()).collect(),
                None => vec![id.clone()],
            },
            falls: entry.category == BlockCategory::Gravity,
            liquid: entry.category == BlockCategory::Liquid,
            id,
        },
        None => BlockInfo {
            category: BlockCategory::Solid,
            preferred_tool: Tool::Pickaxe,
            hardness: 1.0,
            drops: vec![id.clone()],
            falls: false,
            liquid: false,
            id,
        },
    }
}
