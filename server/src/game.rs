use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{MonsterKind, ObjectView, Personality, ServerEvent, Terrain, TileKey};

use crate::ai::{self, AiContext};
use crate::config::Tuning;
use crate::entity::{
    Monster, MonsterId, ObjectMap, PlayerRecord, PlayerState, SessionId, WorldObject,
};
use crate::persistence::{Snapshot, SNAPSHOT_VERSION};
use crate::physics::CollisionWorld;
use crate::spatial::SpatialGrid;
use crate::utils::DayClock;
use crate::worldgen;

/// Objects per `world_objects` event, so one sync datagram stays a few
/// kilobytes.
pub const WORLD_SYNC_BATCH: usize = 100;

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    Session(SessionId),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn to_session(id: &str, event: ServerEvent) -> Self {
        Self {
            to: Recipient::Session(id.to_string()),
            event,
        }
    }

    pub fn to_all(event: ServerEvent) -> Self {
        Self {
            to: Recipient::All,
            event,
        }
    }
}

/// The authoritative world. Owned by a single task; every mutation goes
/// through a method on this type.
pub struct GameState {
    pub tick: u64,
    pub terrain: Terrain,
    pub tuning: Tuning,
    pub players: HashMap<SessionId, PlayerState>,
    /// Durable records of players that disconnected, resumed on reconnect.
    pub offline_players: HashMap<SessionId, PlayerRecord>,
    pub objects: ObjectMap,
    pub monsters: BTreeMap<MonsterId, Monster>,
    pub monster_grid: SpatialGrid<MonsterId>,
    pub rng: StdRng,
    pub clock: DayClock,
    next_monster_id: u64,
}

impl GameState {
    pub fn new(terrain: Terrain, tuning: Tuning, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let monster_grid = SpatialGrid::new(tuning.grid_cell_size);
        Self {
            tick: 0,
            terrain,
            tuning,
            players: HashMap::new(),
            offline_players: HashMap::new(),
            objects: ObjectMap::new(),
            monsters: BTreeMap::new(),
            monster_grid,
            rng,
            clock: DayClock::new(),
            next_monster_id: 1,
        }
    }

    /// Populates natural resources if the world holds no objects yet.
    pub fn generate_world(&mut self) {
        if self.objects.is_empty() {
            self.objects = worldgen::generate(&self.terrain);
        }
    }

    pub fn collision(&self) -> CollisionWorld<'_> {
        CollisionWorld::new(&self.terrain, &self.objects)
    }

    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    /// Brings a session into the world, resuming its parked record if one
    /// exists. Returns the initial sync for that session.
    pub fn connect(&mut self, id: &str) -> Vec<Outbound> {
        if !self.players.contains_key(id) {
            let player = match self.offline_players.remove(id) {
                Some(record) => {
                    info!("Player {} resumed at ({:.0}, {:.0})", id, record.x, record.y);
                    PlayerState::from_record(record)
                }
                None => {
                    let mut player = PlayerState::new(id, 0.0, 0.0, self.tuning.player_max_hp);
                    player.add_item(shared::items::CRAFTING_TABLE, 1);
                    info!("Player {} joined", id);
                    player
                }
            };
            self.players.insert(id.to_string(), player);
        }

        let mut sync = vec![Outbound::to_session(
            id,
            ServerEvent::Connected {
                session_id: id.to_string(),
            },
        )];
        if let Some(inventory) = self.inventory_update(id) {
            sync.push(Outbound::to_session(id, inventory));
        }
        sync.extend(
            self.world_objects()
                .into_iter()
                .map(|event| Outbound::to_session(id, event)),
        );
        sync
    }

    /// Removes a session from the world and parks its durable fields.
    pub fn disconnect(&mut self, id: &str) -> bool {
        match self.players.remove(id) {
            Some(player) => {
                info!("Player {} left", id);
                self.offline_players.insert(id.to_string(), player.record());
                true
            }
            None => false,
        }
    }

    pub fn spawn_monster(
        &mut self,
        kind: MonsterKind,
        personality: Personality,
        x: f64,
        y: f64,
    ) -> MonsterId {
        let id = MonsterId(self.next_monster_id);
        self.next_monster_id += 1;
        self.monster_grid.insert(id, x, y);
        self.monsters
            .insert(id, Monster::new(id, kind, personality, x, y));
        debug!(
            "Spawned {} {} ({:?}) at ({:.0}, {:.0})",
            kind.name(),
            id,
            personality,
            x,
            y
        );
        id
    }

    /// Tries a few random tiles inside the spawn disc and spawns a slime at
    /// the centre of the first unblocked one.
    pub fn try_spawn(&mut self) -> Option<MonsterId> {
        let bound = self.tuning.spawn_radius_tiles;
        for _ in 0..self.tuning.spawn_attempts {
            let rx = self.rng.gen_range(-bound..bound);
            let ry = self.rng.gen_range(-bound..bound);
            if rx * rx + ry * ry > bound * bound {
                continue;
            }
            let (x, y) = TileKey::new(rx, ry).center();
            if self.collision().is_blocked(x, y) {
                continue;
            }
            let personality = Personality::ALL[self.rng.gen_range(0..Personality::ALL.len())];
            return Some(self.spawn_monster(MonsterKind::Slime, personality, x, y));
        }
        None
    }

    pub fn remove_monster(&mut self, id: MonsterId) -> Option<Monster> {
        self.monster_grid.remove(id);
        self.monsters.remove(&id)
    }

    /// Runs the decision function for every live monster.
    pub fn update_monsters(&mut self, now: u64) {
        let GameState {
            terrain,
            objects,
            players,
            monsters,
            monster_grid,
            rng,
            tuning,
            ..
        } = self;
        let mut ctx = AiContext {
            world: CollisionWorld::new(terrain, objects),
            players,
            rng,
            tuning,
        };
        for monster in monsters.values_mut() {
            if monster.is_dead() {
                continue;
            }
            ai::update_monster(monster, &mut ctx, now);
            monster_grid.update(monster.id, monster.x, monster.y);
        }
    }

    /// One simulation tick: a spawn roll, then every monster's update.
    pub fn step(&mut self, now: u64) {
        if self.monsters.len() < self.tuning.max_monsters
            && self.rng.gen::<f64>() < self.tuning.spawn_chance
        {
            self.try_spawn();
        }
        self.update_monsters(now);
        self.tick += 1;
    }

    pub fn inventory_update(&self, id: &str) -> Option<ServerEvent> {
        self.players.get(id).map(|p| ServerEvent::InventoryUpdate {
            items: p.inventory.clone(),
        })
    }

    /// The object map as `world_objects` events of at most
    /// [`WORLD_SYNC_BATCH`] objects each. An empty world still yields one
    /// empty batch.
    pub fn world_objects(&self) -> Vec<ServerEvent> {
        let mut objects: Vec<ObjectView> = self.objects.values().map(WorldObject::view).collect();
        objects.sort_by_key(|o| (o.x, o.y));
        if objects.is_empty() {
            return vec![ServerEvent::WorldObjects { objects }];
        }
        objects
            .chunks(WORLD_SYNC_BATCH)
            .map(|batch| ServerEvent::WorldObjects {
                objects: batch.to_vec(),
            })
            .collect()
    }

    /// Position update for one session, listing monsters within the
    /// broadcast radius on both axes.
    pub fn position_update(&self, id: &str) -> Option<ServerEvent> {
        let player = self.players.get(id)?;
        let radius = self.tuning.broadcast_radius;
        let mut ids = self.monster_grid.query(player.x, player.y, radius);
        ids.sort();
        let monsters = ids
            .iter()
            .filter_map(|id| self.monsters.get(id))
            .filter(|m| (m.x - player.x).abs() < radius && (m.y - player.y).abs() < radius)
            .map(Monster::view)
            .collect();

        Some(ServerEvent::PositionUpdate {
            x: player.x,
            y: player.y,
            time: self.clock.time_of_day(),
            hp: player.hp,
            max_hp: player.max_hp,
            last_seq_id: player.last_seq_id,
            monsters,
        })
    }

    pub fn broadcast(&self) -> Vec<Outbound> {
        self.players
            .keys()
            .filter_map(|id| {
                self.position_update(id)
                    .map(|event| Outbound::to_session(id, event))
            })
            .collect()
    }

    /// Durable copy of the whole world: objects, online and parked players,
    /// and monsters.
    pub fn snapshot(&self, now: u64) -> Snapshot {
        let mut objects: Vec<WorldObject> = self.objects.values().cloned().collect();
        objects.sort_by_key(WorldObject::key);

        let mut players: Vec<PlayerRecord> = self
            .players
            .values()
            .map(PlayerState::record)
            .chain(self.offline_players.values().cloned())
            .collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));

        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            next_monster_id: self.next_monster_id,
            objects,
            players,
            monsters: self.monsters.values().map(Monster::record).collect(),
        }
    }

    /// Replaces the world with a snapshot's contents. Every restored player
    /// starts parked until its session connects. A snapshot without objects
    /// gets a freshly generated world.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.objects = snapshot
            .objects
            .into_iter()
            .map(|object| (object.key(), object))
            .collect();
        self.generate_world();

        self.players.clear();
        self.offline_players = snapshot
            .players
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        self.monsters.clear();
        self.monster_grid.clear();
        let mut next_id = snapshot.next_monster_id.max(1);
        for record in snapshot.monsters {
            let monster = Monster::from_record(record);
            next_id = next_id.max(monster.id.0 + 1);
            self.monster_grid.insert(monster.id, monster.x, monster.y);
            self.monsters.insert(monster.id, monster);
        }
        self.next_monster_id = next_id;

        info!(
            "Restored {} objects, {} players, {} monsters",
            self.objects.len(),
            self.offline_players.len(),
            self.monsters.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MonsterState, ObjectKind};

    fn empty_world() -> GameState {
        GameState::new(Terrain::default(), Tuning::default(), Some(42))
    }

    #[test]
    fn test_connect_sends_initial_sync() {
        let mut game = empty_world();
        game.objects
            .insert(TileKey::new(9, 9), WorldObject::new(ObjectKind::Tree, 9, 9));

        let sync = game.connect("ana");
        assert_eq!(sync.len(), 3);
        assert!(sync
            .iter()
            .all(|o| o.to == Recipient::Session("ana".to_string())));
        assert!(matches!(sync[0].event, ServerEvent::Connected { .. }));
        match &sync[1].event {
            ServerEvent::InventoryUpdate { items } => {
                assert_eq!(items.get("Crafting Table"), Some(&1));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &sync[2].event {
            ServerEvent::WorldObjects { objects } => assert_eq!(objects.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_world_objects_split_into_batches() {
        let mut game = empty_world();
        assert_eq!(game.world_objects().len(), 1);

        for x in 0..(WORLD_SYNC_BATCH as i32 * 2 + 5) {
            game.objects
                .insert(TileKey::new(x, 3), WorldObject::new(ObjectKind::Fence, x, 3));
        }
        let batches = game.world_objects();
        assert_eq!(batches.len(), 3);

        let mut seen = Vec::new();
        for batch in &batches {
            match batch {
                ServerEvent::WorldObjects { objects } => {
                    assert!(objects.len() <= WORLD_SYNC_BATCH);
                    seen.extend(objects.iter().map(|o| o.x));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        seen.sort();
        assert_eq!(seen, (0..(WORLD_SYNC_BATCH as i32 * 2 + 5)).collect::<Vec<_>>());
        assert_eq!(game.connect("ana").len(), 2 + batches.len());
    }

    #[test]
    fn test_disconnect_parks_and_reconnect_resumes() {
        let mut game = empty_world();
        game.connect("ana");
        {
            let player = game.player_mut("ana").unwrap();
            player.x = 250.0;
            player.add_item("Wood", 4);
        }
        assert!(game.disconnect("ana"));
        assert!(game.player("ana").is_none());
        assert!(!game.disconnect("ana"));

        game.connect("ana");
        let player = game.player("ana").unwrap();
        assert_eq!(player.x, 250.0);
        assert_eq!(player.item_count("Wood"), 4);
        assert_eq!(player.item_count("Crafting Table"), 1);
        assert!(game.offline_players.is_empty());
    }

    #[test]
    fn test_spawner_respects_population_cap() {
        let mut game = empty_world();
        game.tuning.spawn_chance = 1.0;
        for tick in 0..200 {
            game.step(tick * 50);
        }
        assert!(!game.monsters.is_empty());
        assert!(game.monsters.len() <= game.tuning.max_monsters);
        assert_eq!(game.monster_grid.len(), game.monsters.len());
        assert_eq!(game.tick, 200);
    }

    #[test]
    fn test_spawned_monsters_start_on_open_tiles() {
        let mut game = empty_world();
        game.generate_world();
        for _ in 0..50 {
            if let Some(id) = game.try_spawn() {
                let m = &game.monsters[&id];
                assert!(!game.collision().is_blocked(m.x, m.y));
                assert_eq!(m.hp, MonsterKind::Slime.max_hp());
                game.remove_monster(id);
            }
        }
    }

    #[test]
    fn test_monster_ids_are_monotonic() {
        let mut game = empty_world();
        let a = game.spawn_monster(MonsterKind::Slime, Personality::Normal, 0.0, 0.0);
        game.remove_monster(a);
        let b = game.spawn_monster(MonsterKind::Slime, Personality::Normal, 0.0, 0.0);
        assert!(b > a);
        assert_eq!(b.to_string(), "monster_2");
    }

    #[test]
    fn test_position_update_filters_by_radius() {
        let mut game = empty_world();
        game.connect("ana");
        let near = game.spawn_monster(MonsterKind::Slime, Personality::Lazy, 900.0, -900.0);
        game.spawn_monster(MonsterKind::Slime, Personality::Lazy, 1100.0, 0.0);

        match game.position_update("ana").unwrap() {
            ServerEvent::PositionUpdate {
                monsters, hp, time, ..
            } => {
                assert_eq!(hp, 100);
                assert!((0.0..1.0).contains(&time));
                assert_eq!(monsters.len(), 1);
                assert_eq!(monsters[0].id, near.to_string());
                assert_eq!(monsters[0].state, MonsterState::Idle);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(game.position_update("bob").is_none());
        assert_eq!(game.broadcast().len(), 1);
    }

    #[test]
    fn test_monster_updates_keep_grid_in_sync() {
        let mut game = empty_world();
        let id = game.spawn_monster(MonsterKind::Slime, Personality::Aggressive, 32.0, 32.0);
        for tick in 0..100 {
            game.update_monsters(tick * 50);
        }
        let m = &game.monsters[&id];
        assert!(game.monster_grid.nearby(m.x, m.y).contains(&id));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut game = empty_world();
        game.objects
            .insert(TileKey::new(6, 2), WorldObject::new(ObjectKind::Stone, 6, 2));
        game.connect("ana");
        game.connect("bob");
        game.player_mut("bob").unwrap().add_item("Rope", 2);
        game.disconnect("bob");
        let id = game.spawn_monster(MonsterKind::Slime, Personality::Shy, 100.7, -40.2);
        game.monsters.get_mut(&id).unwrap().hp = 4;

        let snapshot = game.snapshot(1234);
        let mut restored = empty_world();
        restored.restore(snapshot.clone());

        assert_eq!(restored.snapshot(1234), snapshot);
        assert_eq!(restored.offline_players.len(), 2);
        assert_eq!(restored.monsters[&id].hp, 4);
        assert_eq!(restored.monsters[&id].x, 100.0);
        let next = restored.spawn_monster(MonsterKind::Slime, Personality::Normal, 0.0, 0.0);
        assert!(next > id);
    }

    #[test]
    fn test_restore_without_objects_generates_world() {
        let mut game = empty_world();
        game.restore(Snapshot::default());
        assert!(!game.objects.is_empty());
        assert_eq!(game.objects, worldgen::generate(&game.terrain));
    }
}
