//! Collision queries and movement resolution.
//!
//! A tile blocks when its terrain is void or a world object occupies it.
//! Players test their centre plus four cardinal offsets; monsters test a
//! single point and steer around obstacles.

use log::debug;
use shared::{Facing, Terrain, TileKey};

use crate::config::Tuning;
use crate::entity::{ObjectMap, PlayerState};
use crate::utils::heading;

/// Read-only view of everything that can block movement.
#[derive(Clone, Copy)]
pub struct CollisionWorld<'a> {
    pub terrain: &'a Terrain,
    pub objects: &'a ObjectMap,
}

impl<'a> CollisionWorld<'a> {
    pub fn new(terrain: &'a Terrain, objects: &'a ObjectMap) -> Self {
        Self { terrain, objects }
    }

    pub fn is_tile_blocked(&self, key: TileKey) -> bool {
        self.terrain.is_void(key.x, key.y) || self.objects.contains_key(&key)
    }

    /// Whether the tile under a world-space point blocks.
    pub fn is_blocked(&self, x: f64, y: f64) -> bool {
        self.is_tile_blocked(TileKey::at_world(x, y))
    }

    pub fn is_player_blocked(&self, x: f64, y: f64, radius: f64) -> bool {
        self.is_blocked(x, y)
            || self.is_blocked(x + radius, y)
            || self.is_blocked(x - radius, y)
            || self.is_blocked(x, y + radius)
            || self.is_blocked(x, y - radius)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Full,
    SlideX,
    SlideY,
    /// Every candidate position blocked, or the step was implausibly long.
    Rejected,
}

/// Resolves a requested player position with axis sliding. Out-of-order
/// requests are still resolved; the recorded sequence number only ever
/// increases.
pub fn attempt_move(
    world: &CollisionWorld<'_>,
    player: &mut PlayerState,
    req_x: f64,
    req_y: f64,
    seq_id: u64,
    tuning: &Tuning,
) -> MoveOutcome {
    if seq_id < player.last_seq_id {
        debug!(
            "Out-of-order move {} from {} (last {})",
            seq_id, player.id, player.last_seq_id
        );
    }
    player.last_seq_id = player.last_seq_id.max(seq_id);

    let (old_x, old_y) = (player.x, player.y);
    let step = (req_x - old_x).hypot(req_y - old_y);
    if step > tuning.max_move_step {
        debug!("Rejecting {:.1} unit step from {}", step, player.id);
        return MoveOutcome::Rejected;
    }

    let radius = tuning.player_radius;
    let outcome = if !world.is_player_blocked(req_x, req_y, radius) {
        player.x = req_x;
        player.y = req_y;
        MoveOutcome::Full
    } else if !world.is_player_blocked(req_x, old_y, radius) {
        player.x = req_x;
        MoveOutcome::SlideX
    } else if !world.is_player_blocked(old_x, req_y, radius) {
        player.y = req_y;
        MoveOutcome::SlideY
    } else {
        MoveOutcome::Rejected
    };

    if let Some(facing) = Facing::from_delta(player.x - old_x, player.y - old_y) {
        player.facing = facing;
    }
    outcome
}

/// Steps `speed` units along `angle`, falling back to two headings offset
/// by `±offset`. Returns the new position, or `None` when all three block.
pub fn steer(
    world: &CollisionWorld<'_>,
    x: f64,
    y: f64,
    angle: f64,
    speed: f64,
    offset: f64,
) -> Option<(f64, f64)> {
    [angle, angle - offset, angle + offset]
        .into_iter()
        .map(|a| (x + a.cos() * speed, y + a.sin() * speed))
        .find(|&(nx, ny)| !world.is_blocked(nx, ny))
}

/// Destination of a push of `distance` units directly away from a source
/// point, or `None` if that destination blocks.
pub fn knockback(
    world: &CollisionWorld<'_>,
    x: f64,
    y: f64,
    from_x: f64,
    from_y: f64,
    distance: f64,
) -> Option<(f64, f64)> {
    let angle = heading(from_x, from_y, x, y);
    let nx = x + angle.cos() * distance;
    let ny = y + angle.sin() * distance;
    (!world.is_blocked(nx, ny)).then_some((nx, ny))
}

/// Pushes a player away from a source point and locks their interactions
/// for the knockback window. Blocked pushes still lock but do not move.
pub fn knock_back_player(
    world: &CollisionWorld<'_>,
    player: &mut PlayerState,
    from_x: f64,
    from_y: f64,
    distance: f64,
    now: u64,
    tuning: &Tuning,
) {
    let angle = heading(from_x, from_y, player.x, player.y);
    let nx = player.x + angle.cos() * distance;
    let ny = player.y + angle.sin() * distance;
    if !world.is_player_blocked(nx, ny, tuning.player_radius) {
        player.x = nx;
        player.y = ny;
    }
    player.lock_knockback(now, tuning.knockback_lock_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::WorldObject;
    use assert_approx_eq::assert_approx_eq;
    use shared::ObjectKind;

    fn objects_at(tiles: &[(i32, i32)]) -> ObjectMap {
        tiles
            .iter()
            .map(|&(x, y)| {
                let object = WorldObject::new(ObjectKind::Stone, x, y);
                (object.key(), object)
            })
            .collect()
    }

    #[test]
    fn test_blocked_by_object_and_void() {
        let terrain = Terrain::default();
        let objects = objects_at(&[(1, 0)]);
        let world = CollisionWorld::new(&terrain, &objects);

        assert!(world.is_blocked(70.0, 10.0));
        assert!(!world.is_blocked(10.0, 10.0));
        assert!(world.is_blocked(101.0 * 64.0, 0.0));
        assert!(world.is_player_blocked(60.0, 10.0, 10.0));
        assert!(!world.is_player_blocked(40.0, 10.0, 10.0));
    }

    #[test]
    fn test_full_move() {
        let terrain = Terrain::default();
        let objects = ObjectMap::new();
        let world = CollisionWorld::new(&terrain, &objects);
        let tuning = Tuning::default();
        let mut player = PlayerState::new("ana", 32.0, 32.0, 100);

        let outcome = attempt_move(&world, &mut player, 40.0, 20.0, 1, &tuning);
        assert_eq!(outcome, MoveOutcome::Full);
        assert_approx_eq!(player.x, 40.0);
        assert_approx_eq!(player.y, 20.0);
        assert_eq!(player.facing, Facing::Right);
        assert_eq!(player.last_seq_id, 1);
    }

    #[test]
    fn test_slides_along_free_axis() {
        let terrain = Terrain::default();
        // Wall on the row below the player.
        let objects = objects_at(&[(0, 1), (1, 1)]);
        let world = CollisionWorld::new(&terrain, &objects);
        let tuning = Tuning::default();
        let mut player = PlayerState::new("ana", 32.0, 40.0, 100);

        let outcome = attempt_move(&world, &mut player, 80.0, 70.0, 1, &tuning);
        assert_eq!(outcome, MoveOutcome::SlideX);
        assert_approx_eq!(player.x, 80.0);
        assert_approx_eq!(player.y, 40.0);
    }

    #[test]
    fn test_slides_along_y() {
        let terrain = Terrain::default();
        let objects = objects_at(&[(1, 0), (1, 1)]);
        let world = CollisionWorld::new(&terrain, &objects);
        let tuning = Tuning::default();
        let mut player = PlayerState::new("ana", 32.0, 20.0, 100);

        let outcome = attempt_move(&world, &mut player, 70.0, 40.0, 1, &tuning);
        assert_eq!(outcome, MoveOutcome::SlideY);
        assert_approx_eq!(player.x, 32.0);
        assert_approx_eq!(player.y, 40.0);
    }

    #[test]
    fn test_blocked_move_is_idempotent() {
        let terrain = Terrain::default();
        let objects = objects_at(&[(1, 0), (0, 1), (1, 1)]);
        let world = CollisionWorld::new(&terrain, &objects);
        let tuning = Tuning::default();
        let mut player = PlayerState::new("ana", 32.0, 32.0, 100);

        for seq in [1, 2] {
            let outcome = attempt_move(&world, &mut player, 90.0, 90.0, seq, &tuning);
            assert_eq!(outcome, MoveOutcome::Rejected);
            assert_approx_eq!(player.x, 32.0);
            assert_approx_eq!(player.y, 32.0);
        }
        assert_eq!(player.last_seq_id, 2);
    }

    #[test]
    fn test_out_of_order_move_applied() {
        let terrain = Terrain::default();
        let objects = ObjectMap::new();
        let world = CollisionWorld::new(&terrain, &objects);
        let tuning = Tuning::default();
        let mut player = PlayerState::new("ana", 0.0, 0.0, 100);

        attempt_move(&world, &mut player, 10.0, 0.0, 5, &tuning);
        let outcome = attempt_move(&world, &mut player, 50.0, 0.0, 3, &tuning);
        assert_eq!(outcome, MoveOutcome::Full);
        assert_approx_eq!(player.x, 50.0);
        assert_eq!(player.last_seq_id, 5);
    }

    #[test]
    fn test_teleport_rejected_but_sequence_recorded() {
        let terrain = Terrain::default();
        let objects = ObjectMap::new();
        let world = CollisionWorld::new(&terrain, &objects);
        let tuning = Tuning::default();
        let mut player = PlayerState::new("ana", 0.0, 0.0, 100);

        let outcome = attempt_move(&world, &mut player, 1000.0, 0.0, 9, &tuning);
        assert_eq!(outcome, MoveOutcome::Rejected);
        assert_approx_eq!(player.x, 0.0);
        assert_eq!(player.last_seq_id, 9);
    }

    #[test]
    fn test_steer_around_obstacle() {
        let terrain = Terrain::default();
        let objects = objects_at(&[(1, 0)]);
        let world = CollisionWorld::new(&terrain, &objects);

        // Straight right is blocked, the offset heading is not.
        let (nx, ny) = steer(&world, 61.0, 63.0, 0.0, 5.0, 0.6).unwrap();
        assert!(nx > 61.0);
        assert!(ny > 64.0);

        let objects = objects_at(&[(1, 0), (1, 1), (1, -1)]);
        let world = CollisionWorld::new(&terrain, &objects);
        assert!(steer(&world, 62.0, 32.0, 0.0, 5.0, 0.6).is_none());
    }

    #[test]
    fn test_knockback_respects_blocking() {
        let terrain = Terrain::default();
        let objects = objects_at(&[(1, 0)]);
        let world = CollisionWorld::new(&terrain, &objects);

        let (nx, ny) = knockback(&world, 32.0, 32.0, 42.0, 32.0, 15.0).unwrap();
        assert_approx_eq!(nx, 17.0);
        assert_approx_eq!(ny, 32.0);
        assert!(knockback(&world, 60.0, 32.0, 40.0, 32.0, 15.0).is_none());
    }

    #[test]
    fn test_player_knockback_locks_interaction() {
        let terrain = Terrain::default();
        let objects = ObjectMap::new();
        let world = CollisionWorld::new(&terrain, &objects);
        let tuning = Tuning::default();
        let mut player = PlayerState::new("ana", 100.0, 32.0, 100);

        knock_back_player(&world, &mut player, 80.0, 32.0, 30.0, 1_000, &tuning);
        assert_approx_eq!(player.x, 130.0);
        assert!(player.is_knocked_back(1_200));
        assert!(!player.can_interact(1_200, tuning.interaction_cooldown_ms));
    }
}
