//! Types the authoritative server and its clients must agree on: world
//! geometry, terrain, kind tables and the wire protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod kinds;
pub mod protocol;
pub mod terrain;

pub use kinds::{
    item_info, items, tool_power, Facing, ItemCategory, ItemInfo, MonsterKind, MonsterState,
    ObjectKind, Personality, Recipe,
};
pub use protocol::{
    decode, Action, ClientMessage, Inbound, ItemDrop, MonsterView, ObjectView, ProtocolError,
    ServerEvent,
};
pub use terrain::{Biome, Terrain};

/// Edge length of one tile, in world units.
pub const TILE_SIZE: f64 = 64.0;
/// Radius of the playable disc, in tiles.
pub const MAP_RADIUS: i32 = 100;
pub const TERRAIN_SEED: i64 = 12345;

/// Tile coordinate containing a world coordinate.
pub fn tile_of(world: f64) -> i32 {
    (world / TILE_SIZE).floor() as i32
}

/// World coordinate of the centre of a tile.
pub fn tile_center(tile: i32) -> f64 {
    f64::from(tile) * TILE_SIZE + TILE_SIZE / 2.0
}

/// Integer tile coordinate used as the key for static world objects.
/// Displays as `x_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub x: i32,
    pub y: i32,
}

impl TileKey {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile under a world-space point.
    pub fn at_world(x: f64, y: f64) -> Self {
        Self::new(tile_of(x), tile_of(y))
    }

    pub fn center(self) -> (f64, f64) {
        (tile_center(self.x), tile_center(self.y))
    }

    /// This tile and its eight neighbours.
    pub fn neighborhood(self) -> impl Iterator<Item = TileKey> {
        (-1..=1).flat_map(move |dx| (-1..=1).map(move |dy| TileKey::new(self.x + dx, self.y + dy)))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_tile_of_floors_negative_coordinates() {
        assert_eq!(tile_of(0.0), 0);
        assert_eq!(tile_of(63.9), 0);
        assert_eq!(tile_of(64.0), 1);
        assert_eq!(tile_of(-0.5), -1);
        assert_eq!(tile_of(-64.0), -1);
        assert_eq!(tile_of(-64.1), -2);
    }

    #[test]
    fn test_tile_center() {
        assert_approx_eq!(tile_center(0), 32.0);
        assert_approx_eq!(tile_center(-1), -32.0);
        let key = TileKey::at_world(100.0, -10.0);
        assert_eq!(key, TileKey::new(1, -1));
        let (cx, cy) = key.center();
        assert_approx_eq!(cx, 96.0);
        assert_approx_eq!(cy, -32.0);
    }

    #[test]
    fn test_tile_key_display() {
        assert_eq!(TileKey::new(-3, 7).to_string(), "-3_7");
    }

    #[test]
    fn test_neighborhood() {
        let keys: Vec<TileKey> = TileKey::new(0, 0).neighborhood().collect();
        assert_eq!(keys.len(), 9);
        assert!(keys.contains(&TileKey::new(0, 0)));
        assert!(keys.contains(&TileKey::new(-1, 1)));
        assert!(!keys.contains(&TileKey::new(2, 0)));
    }
}
