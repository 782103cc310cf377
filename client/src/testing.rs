//! Test doubles for channels, transports and presenters.

use crate::channel::{Channel, ChannelId, Frame, JoinRequest, Transport};
use crate::error::SessionError;
use crate::pacer::PacingStats;
use crate::presenter::Presenter;
use shared::{ArenaStructure, ChatEvent, GameId, GameSummary, PlayerEntry, Push};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything the client sent, across all channels opened by one transport.
#[derive(Debug, Default)]
pub struct Wire {
    pub opened: Vec<(ChannelId, JoinRequest)>,
    pub pushes: Vec<(ChannelId, Push)>,
    pub left: Vec<ChannelId>,
    pub created: Vec<String>,
}

impl Wire {
    pub fn pushes_on(&self, id: ChannelId) -> Vec<Push> {
        self.pushes
            .iter()
            .filter(|(channel, _)| *channel == id)
            .map(|(_, push)| push.clone())
            .collect()
    }

    pub fn frame_requests_on(&self, id: ChannelId) -> usize {
        self.pushes
            .iter()
            .filter(|(channel, push)| *channel == id && *push == Push::RequestFrame)
            .count()
    }
}

#[derive(Debug)]
pub struct TestChannel {
    id: ChannelId,
    wire: Rc<RefCell<Wire>>,
}

impl TestChannel {
    pub fn standalone(id: u32) -> Self {
        Self {
            id: ChannelId(id),
            wire: Rc::new(RefCell::new(Wire::default())),
        }
    }

    pub fn frame_requests(&self) -> usize {
        self.wire.borrow().frame_requests_on(self.id)
    }
}

impl Channel for TestChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn push(&mut self, push: Push) {
        self.wire.borrow_mut().pushes.push((self.id, push));
    }

    fn leave(self) {
        self.wire.borrow_mut().left.push(self.id);
    }
}

pub struct TestTransport {
    next_ref: u32,
    wire: Rc<RefCell<Wire>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self {
            next_ref: 1,
            wire: Rc::new(RefCell::new(Wire::default())),
        }
    }

    pub fn wire(&self) -> Rc<RefCell<Wire>> {
        Rc::clone(&self.wire)
    }
}

impl Transport for TestTransport {
    type Channel = TestChannel;

    fn open(&mut self, request: JoinRequest) -> TestChannel {
        let id = ChannelId(self.next_ref);
        self.next_ref += 1;
        self.wire.borrow_mut().opened.push((id, request));
        TestChannel {
            id,
            wire: Rc::clone(&self.wire),
        }
    }

    fn create_game(&mut self, name: &str) {
        self.wire.borrow_mut().created.push(name.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Joined(GameId),
    Rejoined(GameId),
    Left(GameId),
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub notes: Vec<Note>,
    pub joined_games: Vec<GameSummary>,
    pub errors: Vec<SessionError>,
    pub frames: Vec<Frame>,
    pub player_lists: Vec<Vec<PlayerEntry>>,
    pub structures: Vec<ArenaStructure>,
    pub chats: Vec<ChatEvent>,
    pub pacing: Vec<PacingStats>,
}

impl Presenter for RecordingPresenter {
    fn on_joined(&mut self, game: &GameSummary) {
        self.notes.push(Note::Joined(game.id.clone()));
        self.joined_games.push(game.clone());
    }

    fn on_rejoined(&mut self, game_id: &GameId) {
        self.notes.push(Note::Rejoined(game_id.clone()));
    }

    fn on_left(&mut self, game_id: &GameId) {
        self.notes.push(Note::Left(game_id.clone()));
    }

    fn on_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn on_player_list(&mut self, players: &[PlayerEntry]) {
        self.player_lists.push(players.to_vec());
    }

    fn on_structure(&mut self, structure: &ArenaStructure) {
        self.structures.push(structure.clone());
    }

    fn on_chat(&mut self, event: &ChatEvent) {
        self.chats.push(event.clone());
    }

    fn on_pacing(&mut self, stats: PacingStats) {
        self.pacing.push(stats);
    }

    fn on_error(&mut self, error: &SessionError) {
        self.errors.push(error.clone());
    }
}
