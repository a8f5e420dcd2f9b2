//! Monster decision function, run once per monster per simulation tick.
//!
//! Monsters never look for targets on their own. A target is only set when
//! a player strikes the monster; from then on it chases, attacks and rolls
//! combat maneuvers until the target disconnects or escapes beyond the
//! give-up distance. Without a target a monster alternates between idle
//! pauses and short wander bursts.

use std::collections::HashMap;
use std::f64::consts::TAU;

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use shared::{MonsterState, Personality};

use crate::config::Tuning;
use crate::entity::{cooldown_ready, Monster, PlayerState, SessionId};
use crate::physics::{knock_back_player, steer, CollisionWorld};
use crate::utils::{distance, heading};

/// Everything a monster update may read or mutate besides the monster itself.
pub struct AiContext<'a> {
    pub world: CollisionWorld<'a>,
    pub players: &'a mut HashMap<SessionId, PlayerState>,
    pub rng: &'a mut StdRng,
    pub tuning: &'a Tuning,
}

impl AiContext<'_> {
    fn roll(&mut self, chance: f64) -> bool {
        self.rng.gen::<f64>() < chance
    }
}

pub fn update_monster(m: &mut Monster, ctx: &mut AiContext<'_>, now: u64) {
    let t = ctx.tuning;

    if m.state == MonsterState::Hurt {
        if !m.timer_expired(now) {
            return;
        }
        m.enter(MonsterState::Chase, now, 0);
    }

    let Some(target_id) = m.target.clone() else {
        wander(m, ctx, now);
        return;
    };
    let Some((tx, ty)) = ctx.players.get(&target_id).map(|p| (p.x, p.y)) else {
        debug!("{} lost target {}", m.id, target_id);
        m.lose_target();
        m.enter(MonsterState::Idle, now, 0);
        wander(m, ctx, now);
        return;
    };

    match m.state {
        MonsterState::Jump => {
            land_jump(m, ctx, now, tx, ty);
            return;
        }
        MonsterState::Dash => {
            if dash(m, ctx, now, tx, ty) {
                return;
            }
        }
        MonsterState::Evade if !m.timer_expired(now) => {
            flee(m, ctx, tx, ty, t.evade_speed_factor);
            return;
        }
        MonsterState::Retreat if !m.timer_expired(now) => {
            flee(m, ctx, tx, ty, 1.0);
            return;
        }
        _ => {}
    }

    let dist = distance(m.x, m.y, tx, ty);
    if dist > t.give_up_distance {
        debug!("{} gave up on {} at {:.0}", m.id, target_id, dist);
        m.lose_target();
        m.enter(MonsterState::Idle, now, 0);
        return;
    }

    let engaged = matches!(m.state, MonsterState::Chase | MonsterState::Attack);
    if engaged && begin_maneuver(m, ctx, now, dist, &target_id, tx, ty) {
        return;
    }

    if m.hp <= t.retreat_hp && ctx.roll(t.retreat_chance) {
        m.enter(MonsterState::Retreat, now, t.retreat_ms);
        flee(m, ctx, tx, ty, 1.0);
        return;
    }

    if dist <= t.attack_range {
        m.dx = 0.0;
        m.dy = 0.0;
        if cooldown_ready(m.last_attack, now, t.attack_cooldown_ms) {
            m.enter(MonsterState::Attack, now, 0);
            m.last_attack = Some(now);
            if m.aggravated {
                strike(m, ctx, t.attack_damage, 0.0, now);
            }
        }
        return;
    }

    if m.state != MonsterState::Chase {
        m.enter(MonsterState::Chase, now, 0);
    }
    let angle = heading(m.x, m.y, tx, ty);
    step(m, &ctx.world, angle, 1.0, t.steer_offset);
}

/// Rolls evade, jump and dash in that order. Returns whether one started.
fn begin_maneuver(
    m: &mut Monster,
    ctx: &mut AiContext<'_>,
    now: u64,
    dist: f64,
    target_id: &str,
    tx: f64,
    ty: f64,
) -> bool {
    let t = ctx.tuning;

    if dist <= t.evade_threat_radius && cooldown_ready(m.last_evade, now, t.evade_cooldown_ms) {
        let attacking = ctx
            .players
            .get_mut(target_id)
            .map_or(false, |p| p.is_attacking(now));
        let chance = if m.personality == Personality::Shy {
            t.evade_chance_shy
        } else {
            t.evade_chance
        };
        if attacking && ctx.roll(chance) {
            m.last_evade = Some(now);
            m.enter(MonsterState::Evade, now, t.evade_ms);
            flee(m, ctx, tx, ty, t.evade_speed_factor);
            return true;
        }
    }

    let (jump_min, jump_max) = t.jump_range;
    if (jump_min..=jump_max).contains(&dist)
        && cooldown_ready(m.last_jump, now, t.jump_cooldown_ms)
        && ctx.roll(t.jump_chance)
    {
        let angle = heading(m.x, m.y, tx, ty);
        let leap = dist.min(t.jump_max_leap);
        m.last_jump = Some(now);
        m.enter(MonsterState::Jump, now, t.jump_windup_ms);
        m.jump_to = Some((m.x + angle.cos() * leap, m.y + angle.sin() * leap));
        m.dx = 0.0;
        m.dy = 0.0;
        return true;
    }

    let (dash_min, dash_max) = t.dash_range;
    if (dash_min..=dash_max).contains(&dist)
        && cooldown_ready(m.last_dash, now, t.dash_cooldown_ms)
        && ctx.roll(t.dash_chance)
    {
        m.last_dash = Some(now);
        m.enter(MonsterState::Dash, now, t.dash_ms);
        dash(m, ctx, now, tx, ty);
        return true;
    }

    false
}

/// Holds still through the wind-up, then lands on the chosen point and
/// slams anything within strike range.
fn land_jump(m: &mut Monster, ctx: &mut AiContext<'_>, now: u64, tx: f64, ty: f64) {
    if !m.timer_expired(now) {
        return;
    }
    let t = ctx.tuning;
    if let Some((lx, ly)) = m.jump_to.take() {
        if !ctx.world.is_blocked(lx, ly) {
            m.x = lx;
            m.y = ly;
        }
    }
    if distance(m.x, m.y, tx, ty) <= t.jump_strike_range {
        strike(m, ctx, t.jump_damage, t.jump_knockback, now);
    }
    m.enter(MonsterState::Chase, now, 0);
}

/// Advances a dash by one tick. Returns false once the dash window is over
/// so the caller falls through to standard behaviour.
fn dash(m: &mut Monster, ctx: &mut AiContext<'_>, now: u64, tx: f64, ty: f64) -> bool {
    let t = ctx.tuning;
    if m.timer_expired(now) {
        m.enter(MonsterState::Chase, now, 0);
        return false;
    }

    let angle = heading(m.x, m.y, tx, ty);
    if !step(m, &ctx.world, angle, t.dash_speed_factor, t.steer_offset) {
        m.enter(MonsterState::Chase, now, 0);
        return true;
    }
    if distance(m.x, m.y, tx, ty) <= t.dash_contact {
        strike(m, ctx, t.dash_damage, t.dash_knockback, now);
        m.enter(MonsterState::Chase, now, 0);
    }
    true
}

/// Moves directly away from the target at `factor` times base speed.
fn flee(m: &mut Monster, ctx: &AiContext<'_>, tx: f64, ty: f64, factor: f64) {
    let angle = heading(tx, ty, m.x, m.y);
    step(m, &ctx.world, angle, factor, ctx.tuning.steer_offset);
}

fn wander(m: &mut Monster, ctx: &mut AiContext<'_>, now: u64) {
    let t = ctx.tuning;
    if m.timer_expired(now) {
        if m.state == MonsterState::Wander {
            let pause = ctx.rng.gen_range(t.idle_ms.0..t.idle_ms.1);
            m.enter(MonsterState::Idle, now, pause);
            m.dx = 0.0;
            m.dy = 0.0;
        } else {
            let burst = ctx.rng.gen_range(t.wander_ms.0..t.wander_ms.1);
            let angle = ctx.rng.gen_range(0.0..TAU);
            m.enter(MonsterState::Wander, now, burst);
            m.dx = angle.cos() * m.speed * 0.5;
            m.dy = angle.sin() * m.speed * 0.5;
        }
    }

    if m.state == MonsterState::Wander {
        let (nx, ny) = (m.x + m.dx, m.y + m.dy);
        if ctx.world.is_blocked(nx, ny) {
            m.enter(MonsterState::Idle, now, t.blocked_idle_ms);
            m.dx = 0.0;
            m.dy = 0.0;
        } else {
            m.x = nx;
            m.y = ny;
        }
    }
}

fn step(m: &mut Monster, world: &CollisionWorld<'_>, angle: f64, factor: f64, offset: f64) -> bool {
    match steer(world, m.x, m.y, angle, m.speed * factor, offset) {
        Some((x, y)) => {
            m.x = x;
            m.y = y;
            true
        }
        None => false,
    }
}

/// Damages the monster's target and optionally knocks it back. A missing
/// target or an invulnerable one is simply not hit.
fn strike(m: &Monster, ctx: &mut AiContext<'_>, damage: i32, knockback: f64, now: u64) -> bool {
    let t = ctx.tuning;
    let Some(id) = m.target.as_deref() else {
        return false;
    };
    let Some(player) = ctx.players.get_mut(id) else {
        return false;
    };
    let landed = player.damage(damage, now, t.invulnerability_ms);
    if landed {
        debug!("{} hit {} for {} (hp {})", m.id, player.id, damage, player.hp);
        if knockback > 0.0 {
            knock_back_player(&ctx.world, player, m.x, m.y, knockback, now, t);
        }
    }
    landed
}
