//! Client error types.

use shared::{GameId, ReasonCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to collaborators through [`crate::presenter::Presenter::on_error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("could not join game {game_id} after {attempts} attempts")]
    JoinFailed { game_id: GameId, attempts: u32 },

    #[error("connection to game {game_id} dropped, recovering")]
    Recovering { game_id: GameId },

    #[error("session in game {game_id} lost: {cause}")]
    SessionLost { game_id: GameId, cause: LossCause },

    #[error("player was removed from game {game_id}")]
    PlayerEjected { game_id: GameId },

    #[error("not in a game")]
    NotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossCause {
    PlayerNotFound,
    RetriesExhausted,
}

impl fmt::Display for LossCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossCause::PlayerNotFound => f.write_str("server no longer knows this player"),
            LossCause::RetriesExhausted => f.write_str("rejoin attempts exhausted"),
        }
    }
}

/// Why a single channel attempt or membership failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelFailure {
    #[error("channel error: {0}")]
    Transient(String),

    #[error("handshake rejected: {0}")]
    Rejected(ReasonCode),

    #[error("handshake timed out")]
    TimedOut,
}

impl ChannelFailure {
    /// The server has forgotten this player; retrying cannot help.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, ChannelFailure::Rejected(ReasonCode::PlayerNotFound))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max budget must be at least 1")]
    ZeroMaxBudget,

    #[error("initial budget {initial} outside 1..={max}")]
    InitialBudgetOutOfRange { initial: u32, max: u32 },

    #[error("low fps threshold {low} must be below high threshold {high}")]
    InvertedThresholds { low: u32, high: u32 },

    #[error("timestamp window needs room for at least 2 entries")]
    WindowTooSmall,

    #[error("{0} must be non-zero")]
    Zero(&'static str),

    #[error("{what} must not exceed {max:?}")]
    TooLong { what: &'static str, max: Duration },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("unknown button: {0}")]
    UnknownButton(String),

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid server address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
