//! Error types for the simulation core and its process wiring.
//!
//! None of these ever reach a client. Invalid game actions are logged at
//! debug level and simply produce no event; persistence failures are logged
//! and retried on the next scheduled save.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Reasons a player action was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("no player for session {0}")]
    UnknownSession(String),
    #[error("need {required} of {item}, have {available}")]
    InsufficientItems {
        item: String,
        required: u32,
        available: u32,
    },
    #[error("{item} stack is full ({max})")]
    StackFull { item: String, max: u32 },
    #[error("tile {0} is occupied")]
    TileOccupied(String),
    #[error("tile {0} is not buildable terrain")]
    Unbuildable(String),
    #[error("{0} cannot be placed")]
    NotPlaceable(String),
    #[error("no removable structure at {0}")]
    NotRemovable(String),
    #[error("interaction on cooldown")]
    Cooldown,
    #[error("nothing to hit at {0}")]
    NoTarget(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reasons a session could not be admitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("server full")]
    ServerFull,
    #[error("name {0} is already connected")]
    NameTaken(String),
}
