//! Player interactions: melee against monsters first, then world objects.

use log::debug;
use rand::Rng;
use shared::{
    items, tool_power, Facing, ItemDrop, MonsterKind, MonsterState, ObjectKind, ServerEvent,
    TileKey,
};

use crate::entity::{MonsterId, WorldObject};
use crate::error::ActionError;
use crate::game::GameState;
use crate::physics::{knockback, CollisionWorld};
use crate::utils::distance;

/// What a drop table is being evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropSource {
    Object(ObjectKind),
    Monster(MonsterKind),
}

/// Drops for a hit or kill. Item types depend only on the source; natural
/// resources roll a bonus amount in `3..=5` when destroyed and give 1 per
/// non-lethal hit. Structures and monsters drop only on destruction.
pub fn calculate_drops<R: Rng + ?Sized>(
    source: DropSource,
    destroyed: bool,
    rng: &mut R,
) -> Vec<ItemDrop> {
    let kind = match source {
        DropSource::Monster(MonsterKind::Slime) => {
            return if destroyed {
                vec![ItemDrop::new(items::ROPE, 1)]
            } else {
                Vec::new()
            };
        }
        DropSource::Object(kind) if kind.is_structure() => {
            return if destroyed {
                vec![ItemDrop::new(kind.name(), 1)]
            } else {
                Vec::new()
            };
        }
        DropSource::Object(kind) => kind,
    };

    let amount = if destroyed { rng.gen_range(3..6) } else { 1 };
    match kind {
        ObjectKind::Cactus => vec![ItemDrop::new(items::WOOD, 1)],
        ObjectKind::Trunk => vec![
            ItemDrop::new(items::WOOD, amount),
            ItemDrop::new(items::ROPE, amount),
        ],
        k if k.is_tree() => vec![ItemDrop::new(items::WOOD, amount)],
        k if k.is_rock() => vec![ItemDrop::new(items::STONE, amount)],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonsterStrike {
    pub id: MonsterId,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub destroyed: bool,
    pub drops: Vec<ItemDrop>,
}

impl MonsterStrike {
    fn event(&self) -> ServerEvent {
        ServerEvent::MonsterHit {
            id: self.id.to_string(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            destroyed: self.destroyed,
            drops: self.drops.clone(),
        }
    }
}

/// The entity an interaction landed on.
#[derive(Debug, Clone, PartialEq)]
pub enum Struck {
    Monster {
        hit: MonsterStrike,
        splash: Option<MonsterStrike>,
    },
    Object {
        object: WorldObject,
        destroyed: bool,
        drops: Vec<ItemDrop>,
    },
}

impl Struck {
    /// Events announcing the outcome to every session.
    pub fn events(&self) -> Vec<ServerEvent> {
        match self {
            Struck::Monster { hit, splash } => std::iter::once(hit)
                .chain(splash.as_ref())
                .map(MonsterStrike::event)
                .collect(),
            Struck::Object {
                object,
                destroyed: true,
                drops,
            } => vec![ServerEvent::ObjectRemoved {
                x: object.x,
                y: object.y,
                drops: drops.clone(),
            }],
            Struck::Object { object, drops, .. } => vec![ServerEvent::ObjectHit {
                x: object.x,
                y: object.y,
                hp: object.hp,
                drops: drops.clone(),
            }],
        }
    }
}

impl GameState {
    /// Resolves a player's interaction aimed at a tile.
    ///
    /// The monster closest to the tile centre within the strike radius is
    /// hit first. Otherwise the object on the tile, or failing that the
    /// nearest object in the surrounding 3x3 within the fuzzy radius.
    pub fn resolve_interaction(
        &mut self,
        session: &str,
        tile_x: i32,
        tile_y: i32,
        now: u64,
    ) -> Result<Struck, ActionError> {
        let tuning = &self.tuning;
        let player = self
            .players
            .get_mut(session)
            .ok_or_else(|| ActionError::UnknownSession(session.to_string()))?;
        if !player.can_interact(now, tuning.interaction_cooldown_ms) {
            return Err(ActionError::Cooldown);
        }

        let target = TileKey::new(tile_x, tile_y);
        let (cx, cy) = target.center();
        player.begin_interaction(now, tuning.attacking_ms);
        if let Some(facing) = Facing::from_delta(cx - player.x, cy - player.y) {
            player.facing = facing;
        }
        let damage = player
            .inventory
            .keys()
            .filter_map(|item| tool_power(item))
            .max()
            .unwrap_or(1)
            .max(1) as i32;
        let attacker = (player.x, player.y);

        let monster = self.nearest_monster(cx, cy, self.tuning.strike_radius, None);
        if let Some(struck) =
            monster.and_then(|id| self.strike_monster(id, session, damage, attacker, now))
        {
            return Ok(struck);
        }

        self.find_object(target)
            .and_then(|key| self.strike_object(key, damage))
            .ok_or_else(|| ActionError::NoTarget(target.to_string()))
    }

    fn nearest_monster(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        exclude: Option<MonsterId>,
    ) -> Option<MonsterId> {
        self.monster_grid
            .query(x, y, radius)
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| self.monsters.get(&id))
            .map(|m| (m.id, distance(x, y, m.x, m.y)))
            .filter(|(_, d)| *d < radius)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    /// Exact tile first, then the closest neighbour within the fuzzy radius.
    fn find_object(&self, target: TileKey) -> Option<TileKey> {
        if self.objects.contains_key(&target) {
            return Some(target);
        }
        let (cx, cy) = target.center();
        let radius = self.tuning.fuzzy_radius;
        target
            .neighborhood()
            .filter(|key| self.objects.contains_key(key))
            .map(|key| {
                let (ox, oy) = key.center();
                (key, distance(cx, cy, ox, oy))
            })
            .filter(|(_, d)| *d < radius)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(key, _)| key)
    }

    /// Damages a monster, aggravates it toward the attacker, staggers it and
    /// pushes it away from the attacker if the destination is open.
    fn strike_monster(
        &mut self,
        id: MonsterId,
        attacker: &str,
        damage: i32,
        (from_x, from_y): (f64, f64),
        now: u64,
    ) -> Option<Struck> {
        let world = CollisionWorld::new(&self.terrain, &self.objects);
        let tuning = &self.tuning;
        let m = self.monsters.get_mut(&id)?;

        m.hp -= damage;
        m.target = Some(attacker.to_string());
        m.aggravated = true;
        m.jump_to = None;
        m.enter(MonsterState::Hurt, now, tuning.hurt_ms);
        if let Some((nx, ny)) = knockback(&world, m.x, m.y, from_x, from_y, tuning.hit_knockback) {
            m.x = nx;
            m.y = ny;
        }
        let (mx, my, hp, kind) = (m.x, m.y, m.hp, m.kind);
        debug!("{} hit {} for {} (hp {})", attacker, id, damage, hp);

        let hit = self.settle_monster(id, mx, my, hp, kind);
        let splash = self.splash(id, mx, my);
        Some(Struck::Monster { hit, splash })
    }

    /// Knocks the nearest other monster away from the knockback destination
    /// and applies splash damage to it.
    fn splash(&mut self, origin: MonsterId, x: f64, y: f64) -> Option<MonsterStrike> {
        let id = self.nearest_monster(x, y, self.tuning.splash_radius, Some(origin))?;
        let world = CollisionWorld::new(&self.terrain, &self.objects);
        let tuning = &self.tuning;
        let m = self.monsters.get_mut(&id)?;

        m.hp -= tuning.splash_damage_at(distance(x, y, m.x, m.y)).max(0);
        if let Some((nx, ny)) = knockback(&world, m.x, m.y, x, y, tuning.splash_knockback) {
            m.x = nx;
            m.y = ny;
        }
        let (mx, my, hp, kind) = (m.x, m.y, m.hp, m.kind);
        Some(self.settle_monster(id, mx, my, hp, kind))
    }

    /// Syncs the grid after a hit, removes the monster if it died and rolls
    /// its drops.
    fn settle_monster(
        &mut self,
        id: MonsterId,
        x: f64,
        y: f64,
        hp: i32,
        kind: MonsterKind,
    ) -> MonsterStrike {
        let destroyed = hp <= 0;
        if destroyed {
            self.remove_monster(id);
            debug!("{} destroyed", id);
        } else {
            self.monster_grid.update(id, x, y);
        }
        MonsterStrike {
            id,
            x: x as i32,
            y: y as i32,
            hp: hp.max(0),
            destroyed,
            drops: calculate_drops(DropSource::Monster(kind), destroyed, &mut self.rng),
        }
    }

    fn strike_object(&mut self, key: TileKey, damage: i32) -> Option<Struck> {
        let object = self.objects.get_mut(&key)?;
        object.hp -= damage;
        let destroyed = object.hp <= 0;

        let mut object = if destroyed {
            self.objects.remove(&key)?
        } else {
            object.clone()
        };
        object.hp = object.hp.max(0);
        debug!(
            "{} at {} hit for {} (hp {}, destroyed {})",
            object.kind, key, damage, object.hp, destroyed
        );
        let drops = calculate_drops(DropSource::Object(object.kind), destroyed, &mut self.rng);
        Some(Struck::Object {
            object,
            destroyed,
            drops,
        })
    }
}
