//! Deterministic terrain classification.
//!
//! The same [`Terrain`] value answers both the server's collision and
//! placement checks and the chunk queries used to paint the client map, so
//! the two can never disagree about where the void or a biome boundary is.

use serde::Serialize;

use crate::{MAP_RADIUS, TERRAIN_SEED};

/// Biome classification of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i8")]
pub enum Biome {
    /// Outside the playable disc. Always blocked.
    Void,
    Grass,
    Sand,
    Snow,
}

impl Biome {
    /// Numeric tile id used by the chunk renderer.
    pub fn tile_id(self) -> i8 {
        match self {
            Biome::Void => -1,
            Biome::Grass => 0,
            Biome::Sand => 1,
            Biome::Snow => 2,
        }
    }

    pub fn is_void(self) -> bool {
        self == Biome::Void
    }
}

impl From<Biome> for i8 {
    fn from(biome: Biome) -> Self {
        biome.tile_id()
    }
}

/// Seeded terrain oracle. Pure and `Copy`; safe to call from any thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Terrain {
    pub seed: i64,
    /// Radius of the playable disc, in tiles.
    pub radius: i32,
    /// Tiles with `y` below this band edge are snow.
    pub snow_limit: i32,
    /// Tiles with `y` above this band edge are sand.
    pub sand_limit: i32,
    /// Peak-to-peak wobble applied to both band edges.
    pub boundary_amplitude: f64,
}

impl Default for Terrain {
    fn default() -> Self {
        Self {
            seed: TERRAIN_SEED,
            radius: MAP_RADIUS,
            snow_limit: -30,
            sand_limit: 30,
            boundary_amplitude: 10.0,
        }
    }
}

impl Terrain {
    pub fn with_seed(seed: i64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Integer hash of a tile coordinate mapped into `[0, 1]`.
    ///
    /// All arithmetic wraps on 64 bits, which keeps the value stable across
    /// platforms and matches the generator the map renderer uses.
    pub fn hash_noise(&self, x: i32, y: i32) -> f64 {
        let mut n = i64::from(x)
            .wrapping_mul(331)
            .wrapping_add(i64::from(y).wrapping_mul(433))
            .wrapping_add(self.seed);
        n = n.wrapping_shl(13) ^ n;
        n = n
            .wrapping_mul(
                n.wrapping_mul(n)
                    .wrapping_mul(15731)
                    .wrapping_add(789_221),
            )
            .wrapping_add(1_376_312_589)
            & 0x7fff_ffff;
        n as f64 / 2_147_483_647.0
    }

    /// Classifies the tile at `(x, y)`.
    pub fn classify(&self, x: i32, y: i32) -> Biome {
        let (x64, y64, r64) = (i64::from(x), i64::from(y), i64::from(self.radius));
        if x64 * x64 + y64 * y64 > r64 * r64 {
            return Biome::Void;
        }

        let wobble = (self.hash_noise(x, 0) - 0.5) * self.boundary_amplitude;
        let y = f64::from(y);
        if y < f64::from(self.snow_limit) + wobble {
            Biome::Snow
        } else if y > f64::from(self.sand_limit) + wobble {
            Biome::Sand
        } else {
            Biome::Grass
        }
    }

    pub fn is_void(&self, x: i32, y: i32) -> bool {
        self.classify(x, y).is_void()
    }

    /// Classifies a `width` x `height` block of tiles starting at the origin.
    ///
    /// Rows are indexed by `y`, columns by `x`.
    pub fn chunk(&self, origin_x: i32, origin_y: i32, width: u32, height: u32) -> Vec<Vec<Biome>> {
        (0..height as i32)
            .map(|dy| {
                (0..width as i32)
                    .map(|dx| self.classify(origin_x + dx, origin_y + dy))
                    .collect()
            })
            .collect()
    }
}
