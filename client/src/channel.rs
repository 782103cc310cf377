//! Transport-neutral view of a multiplexed game channel.
//!
//! A [`Transport`] opens one [`Channel`] per join attempt. Every inbound
//! event is tagged with the [`ChannelId`] it arrived on, so consumers can
//! drop anything addressed to a channel that is no longer live.

use shared::{ArenaView, Broadcast, GameId, GameSummary, JoinReply, JoinRef, PlayerId, Push};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub JoinRef);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to one joined (or joining) game channel. All operations are fire-and-forget.
pub trait Channel {
    fn id(&self) -> ChannelId;

    fn push(&mut self, push: Push);

    /// Best-effort leave signal. The handle is consumed; nothing is retried.
    fn leave(self);
}

/// Payload of a join handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub game_id: GameId,
    pub name: String,
    /// Set when rejoining so the server can reattach the existing player.
    pub player_id: Option<PlayerId>,
}

pub trait Transport {
    type Channel: Channel;

    /// Opens a fresh channel and starts its join handshake. The reply arrives
    /// later as [`ChannelEvent::Reply`] for the returned channel's id.
    fn open(&mut self, request: JoinRequest) -> Self::Channel;

    fn create_game(&mut self, name: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Reply(JoinReply),
    Message(Broadcast),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LobbyEvent {
    Update { games: Vec<GameSummary>, node: String },
    Created { game_id: GameId },
}

/// Everything the transport delivers to the client loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Channel { id: ChannelId, event: ChannelEvent },
    Lobby(LobbyEvent),
}

/// An arena snapshot stamped with its client-side arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub received_at: Instant,
    pub player_present: bool,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(view: ArenaView, received_at: Instant) -> Self {
        Self {
            received_at,
            player_present: view.player_present,
            payload: view.payload,
        }
    }
}
