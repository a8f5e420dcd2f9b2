//! Command-line configuration and gameplay tuning.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command line arguments for the `server` binary.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    pub port: u16,
    /// Simulation tick period in milliseconds
    #[clap(long, default_value = "50")]
    pub sim_tick_ms: u64,
    /// Broadcast tick period in milliseconds
    #[clap(long, default_value = "50")]
    pub broadcast_tick_ms: u64,
    /// Seconds between background snapshot saves
    #[clap(long, default_value = "30")]
    pub save_interval_secs: u64,
    /// Snapshot file location
    #[clap(long, default_value = "world_save.json")]
    pub save_path: PathBuf,
    /// Maximum number of concurrent sessions
    #[clap(long, default_value = "32")]
    pub max_clients: usize,
    /// Maximum live monster population
    #[clap(long, default_value = "5")]
    pub max_monsters: usize,
    /// Seed for the simulation RNG; random when omitted
    #[clap(long)]
    pub seed: Option<u64>,
}

impl Args {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            sim_tick: Duration::from_millis(self.sim_tick_ms.max(1)),
            broadcast_tick: Duration::from_millis(self.broadcast_tick_ms.max(1)),
            save_interval: Duration::from_secs(self.save_interval_secs.max(1)),
            max_clients: self.max_clients,
            session_timeout: Duration::from_secs(5),
        }
    }

    pub fn tuning(&self) -> Tuning {
        Tuning {
            max_monsters: self.max_monsters,
            ..Tuning::default()
        }
    }
}

/// Scheduler cadences and session limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub sim_tick: Duration,
    pub broadcast_tick: Duration,
    pub save_interval: Duration,
    pub max_clients: usize,
    pub session_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sim_tick: Duration::from_millis(50),
            broadcast_tick: Duration::from_millis(50),
            save_interval: Duration::from_secs(30),
            max_clients: 32,
            session_timeout: Duration::from_secs(5),
        }
    }
}

/// How splash damage to a second monster scales with its distance
/// from the knockback destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplashFalloff {
    Flat,
    /// Full damage at the centre, linearly down to zero at the splash radius.
    Linear,
}

/// Gameplay constants. Distances are world units, durations milliseconds,
/// speeds world units per simulation tick.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub player_radius: f64,
    pub player_max_hp: i32,
    pub interaction_cooldown_ms: u64,
    pub invulnerability_ms: u64,
    pub attacking_ms: u64,
    pub knockback_lock_ms: u64,
    pub max_move_step: f64,

    pub max_monsters: usize,
    pub spawn_chance: f64,
    pub spawn_attempts: u32,
    pub spawn_radius_tiles: i32,

    pub give_up_distance: f64,
    pub attack_range: f64,
    pub attack_cooldown_ms: u64,
    pub attack_damage: i32,
    pub steer_offset: f64,

    pub hurt_ms: u64,
    pub hit_knockback: f64,
    pub strike_radius: f64,
    pub fuzzy_radius: f64,
    pub splash_radius: f64,
    pub splash_knockback: f64,
    pub splash_damage: i32,
    pub splash_falloff: SplashFalloff,

    pub idle_ms: (u64, u64),
    pub wander_ms: (u64, u64),
    pub blocked_idle_ms: u64,

    pub retreat_hp: i32,
    pub retreat_chance: f64,
    pub retreat_ms: u64,

    pub jump_range: (f64, f64),
    pub jump_cooldown_ms: u64,
    pub jump_chance: f64,
    pub jump_windup_ms: u64,
    pub jump_max_leap: f64,
    pub jump_strike_range: f64,
    pub jump_damage: i32,
    pub jump_knockback: f64,

    pub dash_range: (f64, f64),
    pub dash_cooldown_ms: u64,
    pub dash_chance: f64,
    pub dash_ms: u64,
    pub dash_speed_factor: f64,
    pub dash_contact: f64,
    pub dash_damage: i32,
    pub dash_knockback: f64,

    pub evade_threat_radius: f64,
    pub evade_cooldown_ms: u64,
    pub evade_chance: f64,
    pub evade_chance_shy: f64,
    pub evade_ms: u64,
    pub evade_speed_factor: f64,

    pub broadcast_radius: f64,
    pub grid_cell_size: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            player_radius: 10.0,
            player_max_hp: 100,
            interaction_cooldown_ms: 500,
            invulnerability_ms: 1000,
            attacking_ms: 300,
            knockback_lock_ms: 300,
            max_move_step: 192.0,

            max_monsters: 5,
            spawn_chance: 0.05,
            spawn_attempts: 3,
            spawn_radius_tiles: 90,

            give_up_distance: 640.0,
            attack_range: 64.0,
            attack_cooldown_ms: 1500,
            attack_damage: 1,
            steer_offset: 0.6,

            hurt_ms: 400,
            hit_knockback: 15.0,
            strike_radius: 64.0,
            fuzzy_radius: 96.0,
            splash_radius: 48.0,
            splash_knockback: 8.0,
            splash_damage: 1,
            splash_falloff: SplashFalloff::Flat,

            idle_ms: (2000, 4000),
            wander_ms: (1000, 3000),
            blocked_idle_ms: 1000,

            retreat_hp: 3,
            retreat_chance: 0.02,
            retreat_ms: 3000,

            jump_range: (96.0, 256.0),
            jump_cooldown_ms: 4000,
            jump_chance: 0.03,
            jump_windup_ms: 400,
            jump_max_leap: 128.0,
            jump_strike_range: 64.0,
            jump_damage: 2,
            jump_knockback: 30.0,

            dash_range: (160.0, 400.0),
            dash_cooldown_ms: 5000,
            dash_chance: 0.02,
            dash_ms: 600,
            dash_speed_factor: 3.0,
            dash_contact: 40.0,
            dash_damage: 1,
            dash_knockback: 25.0,

            evade_threat_radius: 96.0,
            evade_cooldown_ms: 2500,
            evade_chance: 0.35,
            evade_chance_shy: 0.6,
            evade_ms: 300,
            evade_speed_factor: 2.5,

            broadcast_radius: 1000.0,
            grid_cell_size: 128.0,
        }
    }
}

impl Tuning {
    /// Splash damage dealt at `distance` from the knockback destination.
    pub fn splash_damage_at(&self, distance: f64) -> i32 {
        match self.splash_falloff {
            SplashFalloff::Flat => self.splash_damage,
            SplashFalloff::Linear => {
                let scale = (1.0 - distance / self.splash_radius).clamp(0.0, 1.0);
                (f64::from(self.splash_damage) * scale).round() as i32
            }
        }
    }
}
