use crate::channel::Frame;
use crate::error::SessionError;
use crate::pacer::PacingStats;
use log::{debug, info, warn};
use shared::{ArenaStructure, ChatEvent, GameId, GameSummary, PlayerEntry};

/// Consumer of frames and session lifecycle notifications.
///
/// Implementations own everything visible: drawing, sound, panels. The
/// client core only calls these hooks, always from the client loop.
pub trait Presenter {
    fn on_joined(&mut self, game: &GameSummary);

    fn on_rejoined(&mut self, game_id: &GameId);

    fn on_left(&mut self, game_id: &GameId);

    fn on_frame(&mut self, frame: Frame);

    fn on_player_list(&mut self, _players: &[PlayerEntry]) {}

    fn on_structure(&mut self, _structure: &ArenaStructure) {}

    fn on_chat(&mut self, _event: &ChatEvent) {}

    fn on_pacing(&mut self, _stats: PacingStats) {}

    fn on_error(&mut self, _error: &SessionError) {}
}

/// Presenter for headless runs: reports everything through the log.
pub struct LogPresenter {
    frames_shown: u64,
    bytes_shown: u64,
    last_budget: Option<u32>,
    report_every: u64,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self {
            frames_shown: 0,
            bytes_shown: 0,
            last_budget: None,
            report_every: 300,
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Default for LogPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for LogPresenter {
    fn on_joined(&mut self, game: &GameSummary) {
        info!(
            "Joined game {} ({}) on node {}",
            game.display_name(),
            game.id,
            game.node
        );
        self.frames_shown = 0;
        self.bytes_shown = 0;
        self.last_budget = None;
    }

    fn on_rejoined(&mut self, game_id: &GameId) {
        info!("Rejoined game {}", game_id);
    }

    fn on_left(&mut self, game_id: &GameId) {
        info!(
            "Left game {} after {} frames ({} bytes)",
            game_id, self.frames_shown, self.bytes_shown
        );
    }

    fn on_frame(&mut self, frame: Frame) {
        self.frames_shown += 1;
        self.bytes_shown += frame.payload.len() as u64;
        if self.frames_shown % self.report_every == 0 {
            debug!(
                "{} frames shown, last payload {} bytes",
                self.frames_shown,
                frame.payload.len()
            );
        }
    }

    fn on_player_list(&mut self, players: &[PlayerEntry]) {
        if players.is_empty() {
            info!("Players: (No players)");
            return;
        }
        for player in players {
            let marker = if player.me { " (you)" } else { "" };
            info!(
                "Player {}{}: {} kills, {} deaths",
                player.display_name(),
                marker,
                player.kills,
                player.deaths
            );
        }
    }

    fn on_structure(&mut self, structure: &ArenaStructure) {
        let names: Vec<&str> = structure
            .entry_points
            .iter()
            .map(|ep| ep.name.as_str())
            .collect();
        info!(
            "Arena {}x{}, entry points: {}",
            structure.width,
            structure.height,
            names.join(", ")
        );
    }

    fn on_chat(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Entered { name } => info!("* {} entered", display(name)),
            ChatEvent::Left { name } => info!("* {} left", display(name)),
            ChatEvent::Renamed { name, old_name } => {
                info!("* {} is now known as {}", display(old_name), display(name))
            }
            ChatEvent::Message { name, content } => info!("<{}> {}", display(name), content),
        }
    }

    fn on_pacing(&mut self, stats: PacingStats) {
        if self.last_budget != Some(stats.budget) {
            info!(
                "Frame budget {} (fps {})",
                stats.budget,
                stats
                    .fps
                    .map(|fps| fps.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            self.last_budget = Some(stats.budget);
        }
    }

    fn on_error(&mut self, error: &SessionError) {
        warn!("{}", error);
    }
}

fn display(name: &str) -> &str {
    if name.is_empty() {
        "Anonymous Coward"
    } else {
        name
    }
}
