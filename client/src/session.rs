//! Session lifecycle for the local player's membership in one game
//!
//! This module drives the player through join, transient-disconnect
//! recovery and leave:
//! - Joins are retried on a fresh channel with a fixed delay until the
//!   configured number of attempts is used up
//! - A dropped channel stops the frame pacer and starts a bounded rejoin
//!   carrying the server-assigned player id
//! - `player_not_found` during a rejoin ends the session immediately
//! - Leaving, ejection and lost sessions all return to `Idle`
//!
//! Every channel event is matched against the channel the current state
//! owns. Replies, frames and errors for any other channel are stale and
//! dropped, so tearing down from inside a handler is always safe.

use crate::channel::{Channel, ChannelEvent, ChannelId, Frame, Inbound, JoinRequest, LobbyEvent, Transport};
use crate::config::{PacerConfig, SessionConfig};
use crate::controls::TankControls;
use crate::error::{ChannelFailure, LossCause, SessionError};
use crate::lobby::Lobby;
use crate::pacer::{FrameOutcome, FramePacer};
use crate::presenter::Presenter;
use log::{debug, info, warn};
use shared::{Broadcast, Button, GameId, JoinReply, PlayerId, Push};
use std::mem;
use std::time::Instant;

/// One join handshake, or the pause before the next one.
#[derive(Debug)]
pub enum Attempt<C> {
    /// Handshake in flight on a fresh channel; fails at `deadline` without a reply.
    Pending { channel: C, deadline: Instant },
    /// Fixed retry delay before opening the next channel.
    Backoff { until: Instant },
}

impl<C: Channel> Attempt<C> {
    fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Attempt::Pending { channel, .. } => Some(channel.id()),
            Attempt::Backoff { .. } => None,
        }
    }

    fn deadline(&self) -> Instant {
        match self {
            Attempt::Pending { deadline, .. } => *deadline,
            Attempt::Backoff { until } => *until,
        }
    }

    fn into_channel(self) -> Option<C> {
        match self {
            Attempt::Pending { channel, .. } => Some(channel),
            Attempt::Backoff { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum SessionState<C> {
    Idle,
    Joining {
        game_id: GameId,
        attempts_remaining: u32,
        attempt: Attempt<C>,
    },
    Active {
        game_id: GameId,
        player_id: PlayerId,
        channel: C,
        last_heard: Instant,
    },
    Rejoining {
        game_id: GameId,
        player_id: PlayerId,
        attempts_remaining: u32,
        attempt: Attempt<C>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Joining,
    Active,
    Rejoining,
}

impl<C> SessionState<C> {
    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Idle => Phase::Idle,
            SessionState::Joining { .. } => Phase::Joining,
            SessionState::Active { .. } => Phase::Active,
            SessionState::Rejoining { .. } => Phase::Rejoining,
        }
    }

    pub fn game_id(&self) -> Option<&GameId> {
        match self {
            SessionState::Idle => None,
            SessionState::Joining { game_id, .. }
            | SessionState::Active { game_id, .. }
            | SessionState::Rejoining { game_id, .. } => Some(game_id),
        }
    }

    pub fn attempts_remaining(&self) -> Option<u32> {
        match self {
            SessionState::Joining {
                attempts_remaining, ..
            }
            | SessionState::Rejoining {
                attempts_remaining, ..
            } => Some(*attempts_remaining),
            _ => None,
        }
    }
}

/// Timer work found by `on_timer`.
enum Expired {
    Backoff,
    Handshake,
    Silence,
}

pub struct SessionController<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: SessionState<T::Channel>,
    pacer: FramePacer,
    controls: TankControls,
    lobby: Lobby,
    player_name: String,
    last_error: Option<SessionError>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(
        transport: T,
        player_name: impl Into<String>,
        config: SessionConfig,
        pacer_config: PacerConfig,
    ) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Idle,
            pacer: FramePacer::new(pacer_config),
            controls: TankControls::new(),
            lobby: Lobby::new(),
            player_name: player_name.into(),
            last_error: None,
        }
    }

    pub fn state(&self) -> &SessionState<T::Channel> {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    pub fn controls(&self) -> &TankControls {
        &self.controls
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Starts joining a game. Ignored unless `Idle`.
    pub fn join(&mut self, game_id: GameId, now: Instant) {
        if !matches!(self.state, SessionState::Idle) {
            debug!("Ignoring join of {} while {:?}", game_id, self.phase());
            return;
        }

        info!("Joining game {} as {:?}", game_id, self.player_name);
        let attempt = self.open_attempt(&game_id, None, now);
        self.state = SessionState::Joining {
            game_id,
            attempts_remaining: self.config.join_attempts,
            attempt,
        };
    }

    /// Asks the lobby to create a game; the server's reply triggers a join.
    pub fn create_game(&mut self, name: &str) {
        if !matches!(self.state, SessionState::Idle) {
            debug!("Ignoring create of {:?} while {:?}", name, self.phase());
            return;
        }
        self.transport.create_game(name);
    }

    /// Leaves the current game from any state. No-op when `Idle`.
    pub fn leave<P: Presenter>(&mut self, presenter: &mut P) {
        let (game_id, channel) = match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Idle => return,
            SessionState::Active {
                game_id, mut channel, ..
            } => {
                channel.push(Push::ChatLeave);
                (game_id, Some(channel))
            }
            SessionState::Joining {
                game_id, attempt, ..
            }
            | SessionState::Rejoining {
                game_id, attempt, ..
            } => (game_id, attempt.into_channel()),
        };

        info!("Leaving game {}", game_id);
        if let Some(channel) = channel {
            channel.leave();
        }
        self.teardown(&game_id, presenter);
    }

    /// Changes the name used for handshakes; announced only while `Active`.
    pub fn rename(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name == self.player_name {
            return;
        }

        let old_name = mem::replace(&mut self.player_name, name.clone());
        if let SessionState::Active { channel, .. } = &mut self.state {
            channel.push(Push::Rename { name, old_name });
        }
    }

    pub fn set_button(&mut self, button: Button, down: bool) -> Result<(), SessionError> {
        let SessionState::Active { channel, .. } = &mut self.state else {
            return Err(SessionError::NotActive);
        };
        if let Some(push) = self.controls.set(button, down) {
            channel.push(push);
        }
        Ok(())
    }

    pub fn self_destruct(&mut self) -> Result<(), SessionError> {
        let SessionState::Active { channel, .. } = &mut self.state else {
            return Err(SessionError::NotActive);
        };
        if let Some(push) = self.controls.self_destruct() {
            channel.push(push);
        }
        Ok(())
    }

    /// Launches a tank from the entry point at an arena coordinate.
    /// Returns whether an entry point was hit.
    pub fn launch(&mut self, x: f32, y: f32) -> Result<bool, SessionError> {
        let SessionState::Active { channel, .. } = &mut self.state else {
            return Err(SessionError::NotActive);
        };
        match self.controls.launch(x, y) {
            Some(push) => {
                channel.push(push);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn say(&mut self, content: impl Into<String>) -> Result<(), SessionError> {
        self.push_active(Push::ChatMessage {
            content: content.into(),
        })
    }

    pub fn request_player_list(&mut self) -> Result<(), SessionError> {
        self.push_active(Push::RequestPlayerList)
    }

    fn push_active(&mut self, push: Push) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Active { channel, .. } => {
                channel.push(push);
                Ok(())
            }
            _ => Err(SessionError::NotActive),
        }
    }

    pub fn handle_inbound<P: Presenter>(&mut self, inbound: Inbound, now: Instant, presenter: &mut P) {
        match inbound {
            Inbound::Channel { id, event } => self.handle_event(id, event, now, presenter),
            Inbound::Lobby(LobbyEvent::Update { games, node }) => {
                self.lobby.apply_update(games, node)
            }
            Inbound::Lobby(LobbyEvent::Created { game_id }) => {
                info!("Game {} created", game_id);
                self.join(game_id, now);
            }
        }
    }

    pub fn handle_event<P: Presenter>(
        &mut self,
        id: ChannelId,
        event: ChannelEvent,
        now: Instant,
        presenter: &mut P,
    ) {
        match event {
            ChannelEvent::Reply(reply) => self.handle_reply(id, reply, now, presenter),
            ChannelEvent::Message(message) => self.handle_message(id, message, now, presenter),
            ChannelEvent::Error(reason) => {
                let failure = ChannelFailure::Transient(reason);
                if self.attempt_channel() == Some(id) {
                    self.fail_attempt(failure, now, presenter);
                } else if self.active_channel() == Some(id) {
                    self.drop_active(failure, now, presenter);
                } else {
                    debug!("Discarding stale error on channel {}: {}", id, failure);
                }
            }
        }
    }

    /// Host refresh callback, forwarded to the pacer.
    pub fn on_animation_frame<P: Presenter>(&mut self, now: Instant, presenter: &mut P) {
        if let SessionState::Active { channel, .. } = &mut self.state {
            self.pacer.on_animation_frame(channel, now, presenter);
        }
    }

    /// Earliest instant at which `on_timer` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let session = match &self.state {
            SessionState::Idle => None,
            SessionState::Joining { attempt, .. } | SessionState::Rejoining { attempt, .. } => {
                Some(attempt.deadline())
            }
            SessionState::Active { last_heard, .. } => {
                Some(*last_heard + self.config.channel_idle_timeout)
            }
        };

        match (session, self.pacer.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs rate measurement, retry backoff, handshake and silence timeouts that are due.
    pub fn on_timer<P: Presenter>(&mut self, now: Instant, presenter: &mut P) {
        if let SessionState::Active { channel, .. } = &mut self.state {
            self.pacer.on_timer(channel, now, presenter);
        }

        let expired = match &self.state {
            SessionState::Joining { attempt, .. } | SessionState::Rejoining { attempt, .. }
                if attempt.deadline() <= now =>
            {
                match attempt {
                    Attempt::Pending { .. } => Some(Expired::Handshake),
                    Attempt::Backoff { .. } => Some(Expired::Backoff),
                }
            }
            SessionState::Active { last_heard, .. }
                if now.duration_since(*last_heard) >= self.config.channel_idle_timeout =>
            {
                Some(Expired::Silence)
            }
            _ => None,
        };

        match expired {
            Some(Expired::Backoff) => self.retry(now),
            Some(Expired::Handshake) => self.fail_attempt(ChannelFailure::TimedOut, now, presenter),
            Some(Expired::Silence) => {
                let failure = ChannelFailure::Transient(format!(
                    "no traffic for {:?}",
                    self.config.channel_idle_timeout
                ));
                self.drop_active(failure, now, presenter);
            }
            None => {}
        }
    }

    fn attempt_channel(&self) -> Option<ChannelId> {
        match &self.state {
            SessionState::Joining { attempt, .. } | SessionState::Rejoining { attempt, .. } => {
                attempt.channel_id()
            }
            _ => None,
        }
    }

    fn active_channel(&self) -> Option<ChannelId> {
        match &self.state {
            SessionState::Active { channel, .. } => Some(channel.id()),
            _ => None,
        }
    }

    fn open_attempt(
        &mut self,
        game_id: &GameId,
        player_id: Option<PlayerId>,
        now: Instant,
    ) -> Attempt<T::Channel> {
        let channel = self.transport.open(JoinRequest {
            game_id: game_id.clone(),
            name: self.player_name.clone(),
            player_id,
        });
        debug!("Opened channel {} for game {}", channel.id(), game_id);
        Attempt::Pending {
            channel,
            deadline: now + self.config.handshake_timeout,
        }
    }

    fn handle_reply<P: Presenter>(
        &mut self,
        id: ChannelId,
        reply: JoinReply,
        now: Instant,
        presenter: &mut P,
    ) {
        if self.attempt_channel() != Some(id) {
            debug!("Discarding stale join reply on channel {}", id);
            return;
        }

        match reply {
            JoinReply::Ok { game_id, player_id } => {
                self.complete_attempt(game_id, player_id, now, presenter)
            }
            JoinReply::Error { reason } => {
                self.fail_attempt(ChannelFailure::Rejected(reason), now, presenter)
            }
        }
    }

    fn handle_message<P: Presenter>(
        &mut self,
        id: ChannelId,
        message: Broadcast,
        now: Instant,
        presenter: &mut P,
    ) {
        let SessionState::Active {
            channel,
            last_heard,
            ..
        } = &mut self.state
        else {
            debug!("Discarding message on channel {} outside a game", id);
            return;
        };
        if channel.id() != id {
            debug!("Discarding stale message on channel {}", id);
            return;
        }
        *last_heard = now;

        match message {
            Broadcast::View(view) => {
                let frame = Frame::new(view, now);
                if self.pacer.on_frame(channel, frame, now, presenter) == FrameOutcome::Ejected {
                    self.eject(presenter);
                }
            }
            Broadcast::Players(players) => presenter.on_player_list(&players),
            Broadcast::Structure(structure) => {
                presenter.on_structure(&structure);
                self.controls.start(structure);
            }
            Broadcast::Chat(event) => presenter.on_chat(&event),
        }
    }

    fn complete_attempt<P: Presenter>(
        &mut self,
        reply_game: GameId,
        player_id: PlayerId,
        now: Instant,
        presenter: &mut P,
    ) {
        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Joining {
                game_id,
                attempt: Attempt::Pending { channel, .. },
                ..
            } => {
                if reply_game != game_id {
                    warn!("Joined {} but server answered for {}", game_id, reply_game);
                }
                info!("Joined game {} as player {}", game_id, player_id);
                let game = self.lobby.resolve(&game_id);
                self.activate(game_id, player_id, channel, true, now);
                presenter.on_joined(&game);
            }
            SessionState::Rejoining {
                game_id,
                attempt: Attempt::Pending { channel, .. },
                ..
            } => {
                if reply_game != game_id {
                    warn!("Rejoined {} but server answered for {}", game_id, reply_game);
                }
                info!("Rejoined game {} as player {}", game_id, player_id);
                self.activate(game_id.clone(), player_id, channel, false, now);
                presenter.on_rejoined(&game_id);
            }
            other => self.state = other,
        }
    }

    fn activate(
        &mut self,
        game_id: GameId,
        player_id: PlayerId,
        mut channel: T::Channel,
        first_join: bool,
        now: Instant,
    ) {
        if first_join {
            channel.push(Push::RequestStructure);
        }
        channel.push(Push::RequestPlayerList);
        channel.push(Push::ChatJoin);
        self.controls.reset();
        self.pacer.start(&mut channel, now);
        self.state = SessionState::Active {
            game_id,
            player_id,
            channel,
            last_heard: now,
        };
    }

    fn fail_attempt<P: Presenter>(
        &mut self,
        failure: ChannelFailure,
        now: Instant,
        presenter: &mut P,
    ) {
        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Joining {
                game_id,
                attempts_remaining,
                ..
            } => {
                let remaining = attempts_remaining.saturating_sub(1);
                if remaining == 0 {
                    warn!("Join of game {} failed: {}, giving up", game_id, failure);
                    let attempts = self.config.join_attempts;
                    self.surface(SessionError::JoinFailed { game_id, attempts }, presenter);
                } else {
                    debug!(
                        "Join of game {} failed: {}, {} attempts left",
                        game_id, failure, remaining
                    );
                    self.state = SessionState::Joining {
                        game_id,
                        attempts_remaining: remaining,
                        attempt: Attempt::Backoff {
                            until: now + self.config.join_retry_delay,
                        },
                    };
                }
            }
            SessionState::Rejoining {
                game_id,
                player_id,
                attempts_remaining,
                ..
            } => {
                if failure.is_unrecoverable() {
                    self.lose(game_id, LossCause::PlayerNotFound, presenter);
                    return;
                }
                let remaining = attempts_remaining.saturating_sub(1);
                if remaining == 0 {
                    self.lose(game_id, LossCause::RetriesExhausted, presenter);
                } else {
                    debug!(
                        "Rejoin of game {} failed: {}, {} attempts left",
                        game_id, failure, remaining
                    );
                    self.state = SessionState::Rejoining {
                        game_id,
                        player_id,
                        attempts_remaining: remaining,
                        attempt: Attempt::Backoff {
                            until: now + self.config.rejoin_retry_delay,
                        },
                    };
                }
            }
            other => self.state = other,
        }
    }

    fn retry(&mut self, now: Instant) {
        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Joining {
                game_id,
                attempts_remaining,
                ..
            } => {
                let attempt = self.open_attempt(&game_id, None, now);
                self.state = SessionState::Joining {
                    game_id,
                    attempts_remaining,
                    attempt,
                };
            }
            SessionState::Rejoining {
                game_id,
                player_id,
                attempts_remaining,
                ..
            } => {
                let attempt = self.open_attempt(&game_id, Some(player_id), now);
                self.state = SessionState::Rejoining {
                    game_id,
                    player_id,
                    attempts_remaining,
                    attempt,
                };
            }
            other => self.state = other,
        }
    }

    fn drop_active<P: Presenter>(&mut self, failure: ChannelFailure, now: Instant, presenter: &mut P) {
        let (game_id, player_id) = match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Active {
                game_id,
                player_id,
                channel,
                ..
            } => {
                // Dropped without a leave: the rejoin reattaches the same server-side player.
                warn!("Channel {} for game {} dropped: {}", channel.id(), game_id, failure);
                (game_id, player_id)
            }
            other => {
                self.state = other;
                return;
            }
        };

        self.pacer.stop();
        self.controls.reset();
        self.surface(
            SessionError::Recovering {
                game_id: game_id.clone(),
            },
            presenter,
        );

        let attempt = self.open_attempt(&game_id, Some(player_id), now);
        self.state = SessionState::Rejoining {
            game_id,
            player_id,
            attempts_remaining: self.config.rejoin_attempts,
            attempt,
        };
    }

    /// The server removed the player's entity: leave as if asked to.
    fn eject<P: Presenter>(&mut self, presenter: &mut P) {
        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Active {
                game_id, mut channel, ..
            } => {
                info!("Ejected from game {}", game_id);
                channel.push(Push::ChatLeave);
                channel.leave();
                self.teardown(&game_id, presenter);
                self.surface(SessionError::PlayerEjected { game_id }, presenter);
            }
            other => self.state = other,
        }
    }

    fn lose<P: Presenter>(&mut self, game_id: GameId, cause: LossCause, presenter: &mut P) {
        warn!("Session in game {} lost: {}", game_id, cause);
        self.teardown(&game_id, presenter);
        self.surface(SessionError::SessionLost { game_id, cause }, presenter);
    }

    fn teardown<P: Presenter>(&mut self, game_id: &GameId, presenter: &mut P) {
        self.pacer.stop();
        self.controls.stop();
        presenter.on_left(game_id);
    }

    fn surface<P: Presenter>(&mut self, error: SessionError, presenter: &mut P) {
        presenter.on_error(&error);
        self.last_error = Some(error);
    }
}
