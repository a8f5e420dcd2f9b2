//! Closed kind tables for world objects, monsters, items and recipes.
//!
//! Type names arrive as strings on the wire and in save files; they are
//! resolved to these enums once, at the boundary, and everything downstream
//! (hp defaults, drop tables, placement rules) matches on the enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolError;

/// Opaque item identifiers the core knows by name.
pub mod items {
    pub const WOOD: &str = "Wood";
    pub const STONE: &str = "Stone";
    pub const ROPE: &str = "Rope";
    pub const PICKAXE: &str = "Pickaxe";
    pub const HOE: &str = "Hoe";
    pub const CRAFTING_TABLE: &str = "Crafting Table";
    pub const BONFIRE: &str = "Bonfire";
    pub const FENCE: &str = "Fence";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCategory {
    Material,
    /// Carries its mining power.
    Tool(u32),
    Placeable,
}

/// Catalog entry for a known item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemInfo {
    pub category: ItemCategory,
    pub max_stack: u32,
}

/// Catalog lookup. Items outside the catalog are still valid inventory
/// entries, they just carry no stack limit or tool power.
pub fn item_info(item: &str) -> Option<ItemInfo> {
    let (category, max_stack) = match item {
        items::WOOD | items::STONE | items::ROPE => (ItemCategory::Material, 99),
        items::PICKAXE => (ItemCategory::Tool(2), 1),
        items::HOE => (ItemCategory::Tool(1), 1),
        items::CRAFTING_TABLE => (ItemCategory::Placeable, 1),
        items::BONFIRE => (ItemCategory::Placeable, 10),
        items::FENCE => (ItemCategory::Placeable, 100),
        _ => return None,
    };
    Some(ItemInfo {
        category,
        max_stack,
    })
}

/// Mining power of a tool item, or `None` for anything that isn't a tool.
pub fn tool_power(item: &str) -> Option<u32> {
    match item_info(item)?.category {
        ItemCategory::Tool(power) => Some(power),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Tree,
    #[serde(rename = "Snow Tree")]
    SnowTree,
    #[serde(rename = "Palm Tree")]
    PalmTree,
    Stone,
    #[serde(rename = "Snow Rock")]
    SnowRock,
    #[serde(rename = "Sand Rock")]
    SandRock,
    Cactus,
    Trunk,
    #[serde(rename = "Crafting Table")]
    CraftingTable,
    Bonfire,
    Fence,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 11] = [
        ObjectKind::Tree,
        ObjectKind::SnowTree,
        ObjectKind::PalmTree,
        ObjectKind::Stone,
        ObjectKind::SnowRock,
        ObjectKind::SandRock,
        ObjectKind::Cactus,
        ObjectKind::Trunk,
        ObjectKind::CraftingTable,
        ObjectKind::Bonfire,
        ObjectKind::Fence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Tree => "Tree",
            ObjectKind::SnowTree => "Snow Tree",
            ObjectKind::PalmTree => "Palm Tree",
            ObjectKind::Stone => "Stone",
            ObjectKind::SnowRock => "Snow Rock",
            ObjectKind::SandRock => "Sand Rock",
            ObjectKind::Cactus => "Cactus",
            ObjectKind::Trunk => "Trunk",
            ObjectKind::CraftingTable => items::CRAFTING_TABLE,
            ObjectKind::Bonfire => items::BONFIRE,
            ObjectKind::Fence => items::FENCE,
        }
    }

    pub fn is_tree(self) -> bool {
        matches!(
            self,
            ObjectKind::Tree | ObjectKind::SnowTree | ObjectKind::PalmTree
        )
    }

    pub fn is_rock(self) -> bool {
        matches!(
            self,
            ObjectKind::Stone | ObjectKind::SnowRock | ObjectKind::SandRock
        )
    }

    /// Player-placed structures. Only these can be placed or picked up;
    /// natural resources are harvested through combat.
    pub fn is_structure(self) -> bool {
        matches!(
            self,
            ObjectKind::CraftingTable | ObjectKind::Bonfire | ObjectKind::Fence
        )
    }

    /// Starting hit points.
    pub fn max_hp(self) -> i32 {
        if self.is_tree() {
            5
        } else {
            3
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectKind {
    type Err = ProtocolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ProtocolError::UnknownObjectKind(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonsterKind {
    Slime,
}

impl MonsterKind {
    pub fn name(self) -> &'static str {
        match self {
            MonsterKind::Slime => "Slime",
        }
    }

    pub fn max_hp(self) -> i32 {
        match self {
            MonsterKind::Slime => 10,
        }
    }
}

/// Temperament rolled at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Personality {
    Normal,
    Aggressive,
    Shy,
    Lazy,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Normal,
        Personality::Aggressive,
        Personality::Shy,
        Personality::Lazy,
    ];

    /// Movement per simulation tick, in world units.
    pub fn base_speed(self) -> f64 {
        match self {
            Personality::Normal => 1.8,
            Personality::Aggressive => 2.4,
            Personality::Shy => 2.0,
            Personality::Lazy => 1.2,
        }
    }

    /// Aggravation a monster falls back to once it loses its target.
    pub fn baseline_aggravated(self) -> bool {
        self == Personality::Aggressive
    }
}

/// Monster AI states. The wire name is the SCREAMING_SNAKE_CASE variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonsterState {
    #[default]
    Idle,
    Wander,
    Chase,
    Attack,
    Retreat,
    Hurt,
    Dash,
    Evade,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Down,
    Up,
    Left,
    Right,
}

impl Facing {
    /// Dominant-axis facing for a movement or aim delta. `None` for a zero delta.
    pub fn from_delta(dx: f64, dy: f64) -> Option<Facing> {
        if dx == 0.0 && dy == 0.0 {
            None
        } else if dx.abs() > dy.abs() {
            Some(if dx > 0.0 { Facing::Right } else { Facing::Left })
        } else {
            Some(if dy > 0.0 { Facing::Down } else { Facing::Up })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipe {
    Pickaxe,
    Bonfire,
}

impl Recipe {
    pub fn name(self) -> &'static str {
        match self {
            Recipe::Pickaxe => items::PICKAXE,
            Recipe::Bonfire => items::BONFIRE,
        }
    }

    pub fn ingredients(self) -> &'static [(&'static str, u32)] {
        match self {
            Recipe::Pickaxe => &[(items::WOOD, 3), (items::STONE, 2), (items::ROPE, 1)],
            Recipe::Bonfire => &[(items::WOOD, 10), (items::STONE, 5)],
        }
    }

    /// Item produced, one unit per craft.
    pub fn output(self) -> &'static str {
        self.name()
    }
}

impl FromStr for Recipe {
    type Err = ProtocolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        [Recipe::Pickaxe, Recipe::Bonfire]
            .into_iter()
            .find(|recipe| recipe.name() == name)
            .ok_or_else(|| ProtocolError::UnknownRecipe(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kind_names_round_trip() {
        for kind in ObjectKind::ALL {
            assert_eq!(kind.name().parse::<ObjectKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
        assert!("Diamond".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn test_hp_defaults() {
        assert_eq!(ObjectKind::Tree.max_hp(), 5);
        assert_eq!(ObjectKind::PalmTree.max_hp(), 5);
        assert_eq!(ObjectKind::Stone.max_hp(), 3);
        assert_eq!(ObjectKind::Bonfire.max_hp(), 3);
        assert_eq!(MonsterKind::Slime.max_hp(), 10);
    }

    #[test]
    fn test_structures() {
        let structures: Vec<ObjectKind> = ObjectKind::ALL
            .into_iter()
            .filter(|k| k.is_structure())
            .collect();
        assert_eq!(
            structures,
            vec![ObjectKind::CraftingTable, ObjectKind::Bonfire, ObjectKind::Fence]
        );
    }

    #[test]
    fn test_personality_baseline() {
        assert!(Personality::Aggressive.baseline_aggravated());
        assert!(!Personality::Shy.baseline_aggravated());
        assert!(Personality::Aggressive.base_speed() > Personality::Normal.base_speed());
        assert!(Personality::Lazy.base_speed() < Personality::Normal.base_speed());
    }

    #[test]
    fn test_monster_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&MonsterState::Hurt).unwrap(),
            "\"HURT\""
        );
        assert_eq!(
            serde_json::to_string(&MonsterState::Jump).unwrap(),
            "\"JUMP\""
        );
    }

    #[test]
    fn test_facing_from_delta() {
        assert_eq!(Facing::from_delta(5.0, 1.0), Some(Facing::Right));
        assert_eq!(Facing::from_delta(-5.0, 1.0), Some(Facing::Left));
        assert_eq!(Facing::from_delta(0.0, -2.0), Some(Facing::Up));
        assert_eq!(Facing::from_delta(0.0, 0.0), None);
    }

    #[test]
    fn test_recipes() {
        assert_eq!("Pickaxe".parse::<Recipe>().unwrap(), Recipe::Pickaxe);
        assert!("Sword".parse::<Recipe>().is_err());
        assert_eq!(Recipe::Bonfire.ingredients(), &[("Wood", 10), ("Stone", 5)]);
        assert_eq!(tool_power(items::PICKAXE), Some(2));
        assert_eq!(tool_power(items::WOOD), None);
    }

    #[test]
    fn test_item_catalog() {
        let pickaxe = item_info(items::PICKAXE).unwrap();
        assert_eq!(pickaxe.category, ItemCategory::Tool(2));
        assert_eq!(pickaxe.max_stack, 1);
        assert_eq!(tool_power(items::HOE), Some(1));
        assert_eq!(item_info(items::FENCE).unwrap().category, ItemCategory::Placeable);
        assert_eq!(item_info(items::WOOD).unwrap().max_stack, 99);
        assert_eq!(item_info("Feather"), None);
        assert_eq!(tool_power("Feather"), None);
    }
}
