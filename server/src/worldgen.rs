//! Deterministic population of natural resources from the terrain hash.

use log::info;
use shared::{Biome, ObjectKind, Terrain};

use crate::entity::{ObjectMap, WorldObject};

/// Half-width, in tiles, of the square around the origin left clear for spawning.
const SPAWN_CLEARING: i32 = 5;

fn resource_for(biome: Biome, roll: f64) -> Option<ObjectKind> {
    let thresholds: &[(f64, ObjectKind)] = match biome {
        Biome::Void => &[],
        Biome::Grass => &[
            (0.025, ObjectKind::Tree),
            (0.035, ObjectKind::Stone),
            (0.045, ObjectKind::Trunk),
        ],
        Biome::Snow => &[(0.025, ObjectKind::SnowTree), (0.035, ObjectKind::SnowRock)],
        Biome::Sand => &[
            (0.008, ObjectKind::PalmTree),
            (0.018, ObjectKind::SandRock),
            (0.035, ObjectKind::Cactus),
        ],
    };
    thresholds
        .iter()
        .find(|(limit, _)| roll < *limit)
        .map(|(_, kind)| *kind)
}

/// Places natural objects on every non-void tile whose hash roll falls
/// under its biome's thresholds. Same terrain, same world.
pub fn generate(terrain: &Terrain) -> ObjectMap {
    let mut objects = ObjectMap::new();
    let radius = terrain.radius;

    for x in -radius..=radius {
        for y in -radius..=radius {
            if x.abs() < SPAWN_CLEARING && y.abs() < SPAWN_CLEARING {
                continue;
            }
            let biome = terrain.classify(x, y);
            if let Some(kind) = resource_for(biome, terrain.hash_noise(x, y)) {
                let object = WorldObject::new(kind, x, y);
                objects.insert(object.key(), object);
            }
        }
    }

    info!("Generated {} world objects", objects.len());
    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::TileKey;

    #[test]
    fn test_generation_is_deterministic() {
        let terrain = Terrain::default();
        let first = generate(&terrain);
        let second = generate(&terrain);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_spawn_area_and_void_stay_clear() {
        let terrain = Terrain::default();
        let objects = generate(&terrain);
        for key in objects.keys() {
            assert!(key.x.abs() >= SPAWN_CLEARING || key.y.abs() >= SPAWN_CLEARING);
            assert!(!terrain.is_void(key.x, key.y));
        }
        assert!(!objects.contains_key(&TileKey::new(0, 0)));
    }

    #[test]
    fn test_objects_match_their_biome() {
        let terrain = Terrain::default();
        for object in generate(&terrain).values() {
            let biome = terrain.classify(object.x, object.y);
            let allowed = match biome {
                Biome::Grass => [ObjectKind::Tree, ObjectKind::Stone, ObjectKind::Trunk].contains(&object.kind),
                Biome::Snow => [ObjectKind::SnowTree, ObjectKind::SnowRock].contains(&object.kind),
                Biome::Sand => [ObjectKind::PalmTree, ObjectKind::SandRock, ObjectKind::Cactus]
                    .contains(&object.kind),
                Biome::Void => false,
            };
            assert!(allowed, "{:?} on {:?}", object.kind, biome);
            assert_eq!(object.hp, object.kind.max_hp());
            assert!(object.owner.is_none());
        }
    }

    #[test]
    fn test_resource_thresholds() {
        assert_eq!(resource_for(Biome::Grass, 0.01), Some(ObjectKind::Tree));
        assert_eq!(resource_for(Biome::Grass, 0.04), Some(ObjectKind::Trunk));
        assert_eq!(resource_for(Biome::Grass, 0.5), None);
        assert_eq!(resource_for(Biome::Sand, 0.02), Some(ObjectKind::Cactus));
        assert_eq!(resource_for(Biome::Void, 0.0), None);
    }
}
