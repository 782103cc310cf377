use serde::{Deserialize, Serialize};
use std::fmt;

pub const INITIAL_BUDGET: u32 = 2;
pub const MAX_BUDGET: u32 = 6;
pub const TARGET_FPS_LO: u32 = 30;
pub const TARGET_FPS_HI: u32 = 50;
pub const MEASUREMENT_INTERVAL_MS: u64 = 2000;
pub const NUM_TIMESTAMPS: usize = 10;

pub const JOIN_ATTEMPTS: u32 = 10;
pub const JOIN_RETRY_DELAY_MS: u64 = 100;
pub const REJOIN_ATTEMPTS: u32 = 20;
pub const REJOIN_RETRY_DELAY_MS: u64 = 1000;
pub const HANDSHAKE_TIMEOUT_MS: u64 = 5000;
pub const CHANNEL_IDLE_TIMEOUT_MS: u64 = 10_000;

pub const MAX_PACKET_SIZE: usize = 16 * 1024;

/// Server-assigned identity of the local player inside one game.
pub type PlayerId = u32;

/// Wire identity of one channel instance. A fresh value is used for every join attempt.
pub type JoinRef = u32;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Forward,
    Backward,
    Left,
    Right,
    Fire,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::Forward,
        Button::Backward,
        Button::Left,
        Button::Right,
        Button::Fire,
    ];

    pub fn index(self) -> usize {
        match self {
            Button::Forward => 0,
            Button::Backward => 1,
            Button::Left => 2,
            Button::Right => 3,
            Button::Fire => 4,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "forward" | "up" => Some(Button::Forward),
            "backward" | "down" => Some(Button::Backward),
            "left" => Some(Button::Left),
            "right" => Some(Button::Right),
            "fire" => Some(Button::Fire),
            _ => None,
        }
    }
}

/// Events the client pushes on a joined game channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Push {
    RequestFrame,
    RequestPlayerList,
    RequestStructure,
    Rename { name: String, old_name: String },
    Control { button: Button, down: bool },
    SelfDestruct,
    LaunchTank { entry_point: String },
    ChatJoin,
    ChatLeave,
    ChatMessage { content: String },
}

/// One arena snapshot as sent by the server. The payload is opaque to the client core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaView {
    pub player_present: bool,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub name: Option<String>,
    pub kills: u32,
    pub deaths: u32,
    pub me: bool,
}

impl PlayerEntry {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "(Anonymous coward)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
}

/// Static arena layout, fetched once per join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaStructure {
    pub width: f32,
    pub height: f32,
    pub entry_points: Vec<EntryPoint>,
    pub entry_point_radius: f32,
}

impl ArenaStructure {
    /// Returns the entry point whose radius contains the arena coordinate.
    /// Overlapping entry points resolve to the last one listed.
    pub fn entry_point_at(&self, x: f32, y: f32) -> Option<&EntryPoint> {
        let radius_squared = self.entry_point_radius * self.entry_point_radius;
        self.entry_points.iter().rev().find(|ep| {
            let dx = x - ep.x;
            let dy = y - ep.y;
            dx * dx + dy * dy <= radius_squared
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatEvent {
    Entered { name: String },
    Left { name: String },
    Renamed { name: String, old_name: String },
    Message { name: String, content: String },
}

/// Messages the server delivers on a joined game channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Broadcast {
    View(ArenaView),
    Players(Vec<PlayerEntry>),
    Structure(ArenaStructure),
    Chat(ChatEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    PlayerNotFound,
    GameNotFound,
    Other(String),
}

impl ReasonCode {
    pub fn as_str(&self) -> &str {
        match self {
            ReasonCode::PlayerNotFound => "player_not_found",
            ReasonCode::GameNotFound => "game_not_found",
            ReasonCode::Other(code) => code,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinReply {
    Ok { game_id: GameId, player_id: PlayerId },
    Error { reason: ReasonCode },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: GameId,
    pub name: Option<String>,
    pub node: String,
}

impl GameSummary {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "(untitled game)",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        join_ref: JoinRef,
        game_id: GameId,
        name: String,
        player_id: Option<PlayerId>,
    },
    Push {
        join_ref: JoinRef,
        push: Push,
    },
    Leave {
        join_ref: JoinRef,
    },
    LobbyJoin,
    CreateGame {
        name: String,
    },

    JoinReply {
        join_ref: JoinRef,
        reply: JoinReply,
    },
    Broadcast {
        join_ref: JoinRef,
        message: Broadcast,
    },
    ChannelError {
        join_ref: JoinRef,
        reason: String,
    },
    LobbyUpdate {
        games: Vec<GameSummary>,
        node: String,
    },
    GameCreated {
        game_id: GameId,
    },
}
