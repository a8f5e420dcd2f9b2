//! # Wildgrove Server
//!
//! Authoritative simulation core for a multiplayer top-down survival game.
//! A single task owns the [`game::GameState`]; everything else talks to it
//! through messages.
//!
//! ## Module Organization
//!
//! - `game`: the world aggregate, player lifecycle, spawner, broadcasts
//!   and snapshot conversion
//! - `actions`: movement, inventory, crafting, placement and pickup
//! - `combat`: interaction resolution, drops and splash damage
//! - `ai`: the per-tick monster decision function
//! - `physics`: collision queries, sliding movement, steering and knockback
//! - `spatial`: uniform-grid index over moving entities
//! - `worldgen`: deterministic resource placement from the terrain hash
//! - `persistence`: atomic snapshot files with corruption quarantine
//! - `client_manager` and `network`: the session registry, UDP/JSON
//!   transport and the scheduler loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::config::Tuning;
//! use server::game::GameState;
//! use server::network::Server;
//! use server::persistence::SnapshotStore;
//! use shared::Terrain;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SnapshotStore::new("world_save.json");
//!     let mut game = GameState::new(Terrain::default(), Tuning::default(), None);
//!     match store.load() {
//!         Some(snapshot) => game.restore(snapshot),
//!         None => game.generate_world(),
//!     }
//!
//!     let mut server =
//!         Server::new("127.0.0.1:8080", ServerConfig::default(), game, store).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod ai;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod entity;
pub mod error;
pub mod game;
pub mod network;
pub mod persistence;
pub mod physics;
pub mod spatial;
pub mod utils;
pub mod worldgen;
