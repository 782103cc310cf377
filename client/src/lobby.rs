//! Lobby directory of running games
//!
//! The server broadcasts the full game list on every change. The directory
//! keeps the latest listing so a joined game can be reported with its
//! display name and hosting node.

use log::debug;
use shared::{GameId, GameSummary};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Lobby {
    games: BTreeMap<GameId, GameSummary>,
    node: Option<String>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the listing with the server's latest snapshot.
    pub fn apply_update(&mut self, games: Vec<GameSummary>, node: String) {
        debug!("Lobby update from {}: {} games", node, games.len());
        self.games = games
            .into_iter()
            .map(|game| (game.id.clone(), game))
            .collect();
        self.node = Some(node);
    }

    pub fn get(&self, id: &GameId) -> Option<&GameSummary> {
        self.games.get(id)
    }

    /// Identity for a game, falling back to the bare id when it is not listed.
    pub fn resolve(&self, id: &GameId) -> GameSummary {
        self.games.get(id).cloned().unwrap_or_else(|| GameSummary {
            id: id.clone(),
            name: None,
            node: self.node.clone().unwrap_or_default(),
        })
    }

    pub fn games(&self) -> impl Iterator<Item = &GameSummary> {
        self.games.values()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Node serving the lobby connection.
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }
}
