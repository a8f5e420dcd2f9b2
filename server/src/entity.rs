use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use shared::{
    Facing, MonsterKind, MonsterState, MonsterView, ObjectKind, ObjectView, Personality, TileKey,
};

/// Stable per-player identifier. Sessions are named, so a reconnect with the
/// same name resumes the same player.
pub type SessionId = String;

/// Static world objects keyed by tile. At most one object per tile.
pub type ObjectMap = HashMap<TileKey, WorldObject>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldObject {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<SessionId>,
}

impl WorldObject {
    pub fn new(kind: ObjectKind, x: i32, y: i32) -> Self {
        let max_hp = kind.max_hp();
        Self {
            kind,
            x,
            y,
            hp: max_hp,
            max_hp,
            owner: None,
        }
    }

    pub fn placed_by(kind: ObjectKind, x: i32, y: i32, owner: &str) -> Self {
        Self {
            owner: Some(owner.to_string()),
            ..Self::new(kind, x, y)
        }
    }

    pub fn key(&self) -> TileKey {
        TileKey::new(self.x, self.y)
    }

    pub fn view(&self) -> ObjectView {
        ObjectView {
            kind: self.kind,
            x: self.x,
            y: self.y,
            hp: self.hp,
            max_hp: self.max_hp,
        }
    }
}

/// A connected player. Combat flags are stored as expiry timestamps and
/// cleared by the first query that observes them expired.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: SessionId,
    pub x: f64,
    pub y: f64,
    pub hp: i32,
    pub max_hp: i32,
    pub last_seq_id: u64,
    pub facing: Facing,
    pub inventory: BTreeMap<String, u32>,
    attacking_until: Option<u64>,
    knockback_until: Option<u64>,
    invulnerable_until: Option<u64>,
    last_interaction: Option<u64>,
}

impl PlayerState {
    pub fn new(id: impl Into<SessionId>, x: f64, y: f64, max_hp: i32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            hp: max_hp,
            max_hp,
            last_seq_id: 0,
            facing: Facing::default(),
            inventory: BTreeMap::new(),
            attacking_until: None,
            knockback_until: None,
            invulnerable_until: None,
            last_interaction: None,
        }
    }

    pub fn from_record(record: PlayerRecord) -> Self {
        let max_hp = record.max_hp.max(1);
        Self {
            hp: record.hp.clamp(0, max_hp),
            facing: record.facing,
            inventory: record.inventory,
            ..Self::new(record.id, record.x, record.y, max_hp)
        }
    }

    pub fn record(&self) -> PlayerRecord {
        PlayerRecord {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            max_hp: self.max_hp,
            facing: self.facing,
            inventory: self.inventory.clone(),
        }
    }

    /// Applies damage unless invulnerable. Landing a hit grants
    /// invulnerability for `invulnerable_ms` from `now`. Returns whether the
    /// hit landed.
    pub fn damage(&mut self, amount: i32, now: u64, invulnerable_ms: u64) -> bool {
        if amount <= 0 || self.is_invulnerable(now) {
            return false;
        }
        self.hp = (self.hp - amount).clamp(0, self.max_hp);
        self.invulnerable_until = Some(now + invulnerable_ms);
        true
    }

    pub fn is_invulnerable(&mut self, now: u64) -> bool {
        expire(&mut self.invulnerable_until, now)
    }

    pub fn is_knocked_back(&mut self, now: u64) -> bool {
        expire(&mut self.knockback_until, now)
    }

    pub fn is_attacking(&mut self, now: u64) -> bool {
        expire(&mut self.attacking_until, now)
    }

    pub fn lock_knockback(&mut self, now: u64, duration_ms: u64) {
        self.knockback_until = Some(now + duration_ms);
    }

    pub fn can_interact(&mut self, now: u64, cooldown_ms: u64) -> bool {
        if self.is_knocked_back(now) {
            return false;
        }
        match self.last_interaction {
            Some(last) => now.saturating_sub(last) >= cooldown_ms,
            None => true,
        }
    }

    /// Records an interaction at `now` and raises the attacking flag.
    pub fn begin_interaction(&mut self, now: u64, attacking_ms: u64) {
        self.last_interaction = Some(now);
        self.attacking_until = Some(now + attacking_ms);
    }

    pub fn item_count(&self, item: &str) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    pub fn has_item(&self, item: &str, amount: u32) -> bool {
        self.item_count(item) >= amount
    }

    pub fn add_item(&mut self, item: &str, amount: u32) {
        if amount == 0 {
            return;
        }
        let count = self.inventory.entry(item.to_string()).or_insert(0);
        *count = count.saturating_add(amount);
    }

    /// Removes up to `amount`, never going below zero. Entries that reach
    /// zero are dropped. Returns how many were removed.
    pub fn remove_item(&mut self, item: &str, amount: u32) -> u32 {
        let Some(count) = self.inventory.get_mut(item) else {
            return 0;
        };
        let removed = amount.min(*count);
        *count -= removed;
        if *count == 0 {
            self.inventory.remove(item);
        }
        removed
    }
}

fn expire(flag: &mut Option<u64>, now: u64) -> bool {
    match *flag {
        Some(until) if now < until => true,
        Some(_) => {
            *flag = None;
            false
        }
        None => false,
    }
}

/// Durable part of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: SessionId,
    pub x: f64,
    pub y: f64,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub facing: Facing,
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonsterId(pub u64);

impl fmt::Display for MonsterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monster_{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Monster {
    pub id: MonsterId,
    pub kind: MonsterKind,
    pub x: f64,
    pub y: f64,
    pub hp: i32,
    pub max_hp: i32,
    pub personality: Personality,
    pub speed: f64,
    pub state: MonsterState,
    pub state_since: u64,
    /// End of the current timed state (wander burst, hurt, maneuvers).
    pub state_until: u64,
    pub last_attack: Option<u64>,
    pub last_dash: Option<u64>,
    pub last_jump: Option<u64>,
    pub last_evade: Option<u64>,
    pub target: Option<SessionId>,
    pub aggravated: bool,
    pub dx: f64,
    pub dy: f64,
    /// Landing point fixed when a jump wind-up starts.
    pub jump_to: Option<(f64, f64)>,
}

impl Monster {
    pub fn new(id: MonsterId, kind: MonsterKind, personality: Personality, x: f64, y: f64) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            hp: kind.max_hp(),
            max_hp: kind.max_hp(),
            personality,
            speed: personality.base_speed(),
            state: MonsterState::Idle,
            state_since: 0,
            state_until: 0,
            last_attack: None,
            last_dash: None,
            last_jump: None,
            last_evade: None,
            target: None,
            aggravated: personality.baseline_aggravated(),
            dx: 0.0,
            dy: 0.0,
            jump_to: None,
        }
    }

    pub fn from_record(record: MonsterRecord) -> Self {
        let mut monster = Self::new(
            record.id,
            record.kind,
            record.personality,
            f64::from(record.x),
            f64::from(record.y),
        );
        monster.max_hp = record.max_hp.max(1);
        monster.hp = record.hp.clamp(1, monster.max_hp);
        monster
    }

    pub fn record(&self) -> MonsterRecord {
        MonsterRecord {
            id: self.id,
            kind: self.kind,
            x: self.x as i32,
            y: self.y as i32,
            hp: self.hp,
            max_hp: self.max_hp,
            personality: self.personality,
        }
    }

    pub fn view(&self) -> MonsterView {
        MonsterView {
            id: self.id.to_string(),
            x: self.x as i32,
            y: self.y as i32,
            hp: self.hp,
            state: self.state,
        }
    }

    /// Switches state, stamping entry time and a timer `duration_ms` long.
    pub fn enter(&mut self, state: MonsterState, now: u64, duration_ms: u64) {
        self.state = state;
        self.state_since = now;
        self.state_until = now + duration_ms;
    }

    pub fn timer_expired(&self, now: u64) -> bool {
        now >= self.state_until
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Forgets the current target and falls back to the personality's
    /// default aggression.
    pub fn lose_target(&mut self) {
        self.target = None;
        self.aggravated = self.personality.baseline_aggravated();
        self.jump_to = None;
    }
}

/// True when `last` is unset or at least `cooldown_ms` before `now`.
pub fn cooldown_ready(last: Option<u64>, now: u64, cooldown_ms: u64) -> bool {
    last.map_or(true, |at| now.saturating_sub(at) >= cooldown_ms)
}

/// Durable part of a monster. Positions are whole world units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterRecord {
    pub id: MonsterId,
    #[serde(rename = "type")]
    pub kind: MonsterKind,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub personality: Personality,
}
