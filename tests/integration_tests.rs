//! Integration tests for the arena client
//!
//! These tests drive the public client API end to end: the session state
//! machine over a scripted transport, and the UDP client loop against a
//! stub server on loopback.

use bincode::{deserialize, serialize};
use client::channel::{Channel, ChannelEvent, ChannelId, Frame, JoinRequest, Transport};
use client::config::{PacerConfig, SessionConfig};
use client::console::Command;
use client::error::SessionError;
use client::network::Client;
use client::presenter::{LogPresenter, Presenter};
use client::session::{Phase, SessionController};
use shared::{
    ArenaView, Broadcast, GameId, GameSummary, JoinReply, Packet, Push, ReasonCode,
    MAX_PACKET_SIZE,
};
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization for the messages a session depends on
    #[test]
    fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Join {
                join_ref: 3,
                game_id: GameId::new("arena"),
                name: "ada".to_string(),
                player_id: Some(12),
            },
            Packet::Push {
                join_ref: 3,
                push: Push::RequestFrame,
            },
            Packet::JoinReply {
                join_ref: 3,
                reply: JoinReply::Error {
                    reason: ReasonCode::PlayerNotFound,
                },
            },
            Packet::Broadcast {
                join_ref: 3,
                message: Broadcast::View(ArenaView {
                    player_present: true,
                    payload: vec![0xAB; 512],
                }),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            assert!(serialized.len() <= MAX_PACKET_SIZE);
            let deserialized: Packet = deserialize(&serialized).unwrap();

            match (&packet, &deserialized) {
                (Packet::Join { .. }, Packet::Join { .. }) => {}
                (Packet::Push { .. }, Packet::Push { .. }) => {}
                (Packet::JoinReply { .. }, Packet::JoinReply { .. }) => {}
                (Packet::Broadcast { .. }, Packet::Broadcast { .. }) => {}
                _ => panic!("Packet type mismatch after serialization"),
            }
        }
    }

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_data = serialize(&Packet::Leave { join_ref: 1 }).unwrap();

        let truncated: Result<Packet, _> = deserialize(&valid_data[..valid_data.len() / 2]);
        assert!(truncated.is_err(), "Should fail to deserialize truncated packet");

        let mut corrupted = valid_data.clone();
        corrupted[0] = 0xFF;
        let corrupted: Result<Packet, _> = deserialize(&corrupted);
        assert!(corrupted.is_err(), "Should fail to deserialize corrupted packet");

        let empty: Result<Packet, _> = deserialize(&[]);
        assert!(empty.is_err(), "Should fail to deserialize empty packet");
    }
}

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        opened: Vec<JoinRequest>,
        pushes: Vec<(ChannelId, Push)>,
        left: Vec<ChannelId>,
    }

    struct ScriptedChannel {
        id: ChannelId,
        log: Rc<RefCell<Log>>,
    }

    impl Channel for ScriptedChannel {
        fn id(&self) -> ChannelId {
            self.id
        }

        fn push(&mut self, push: Push) {
            self.log.borrow_mut().pushes.push((self.id, push));
        }

        fn leave(self) {
            self.log.borrow_mut().left.push(self.id);
        }
    }

    struct ScriptedTransport {
        next: u32,
        log: Rc<RefCell<Log>>,
    }

    impl Transport for ScriptedTransport {
        type Channel = ScriptedChannel;

        fn open(&mut self, request: JoinRequest) -> ScriptedChannel {
            self.next += 1;
            self.log.borrow_mut().opened.push(request);
            ScriptedChannel {
                id: ChannelId(self.next),
                log: Rc::clone(&self.log),
            }
        }

        fn create_game(&mut self, _name: &str) {}
    }

    #[derive(Default)]
    struct CountingPresenter {
        joined: u32,
        rejoined: u32,
        left: u32,
        frames: u32,
        errors: Vec<SessionError>,
    }

    impl Presenter for CountingPresenter {
        fn on_joined(&mut self, _game: &GameSummary) {
            self.joined += 1;
        }

        fn on_rejoined(&mut self, _game_id: &GameId) {
            self.rejoined += 1;
        }

        fn on_left(&mut self, _game_id: &GameId) {
            self.left += 1;
        }

        fn on_frame(&mut self, _frame: Frame) {
            self.frames += 1;
        }

        fn on_error(&mut self, error: &SessionError) {
            self.errors.push(error.clone());
        }
    }

    fn setup() -> (SessionController<ScriptedTransport>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let transport = ScriptedTransport {
            next: 0,
            log: Rc::clone(&log),
        };
        let session = SessionController::new(
            transport,
            "ada",
            SessionConfig::default(),
            PacerConfig::default(),
        );
        (session, log)
    }

    fn current(session: &SessionController<ScriptedTransport>) -> ChannelId {
        session.pacer().binding().unwrap_or(ChannelId(0))
    }

    fn ok() -> ChannelEvent {
        ChannelEvent::Reply(JoinReply::Ok {
            game_id: GameId::new("arena"),
            player_id: 42,
        })
    }

    fn view(player_present: bool) -> ChannelEvent {
        ChannelEvent::Message(Broadcast::View(ArenaView {
            player_present,
            payload: Vec::new(),
        }))
    }

    /// Walks one player through join retries, play, a dropped channel and ejection
    #[test]
    fn full_lifecycle() {
        let (mut session, log) = setup();
        let mut presenter = CountingPresenter::default();
        let mut now = Instant::now();

        session.join(GameId::new("arena"), now);

        // A join rejected with player_not_found is retried like any rejection.
        session.handle_event(
            ChannelId(1),
            ChannelEvent::Reply(JoinReply::Error {
                reason: ReasonCode::PlayerNotFound,
            }),
            now,
            &mut presenter,
        );
        assert_eq!(session.phase(), Phase::Joining);
        now += Duration::from_millis(100);
        session.on_timer(now, &mut presenter);
        session.handle_event(ChannelId(2), ok(), now, &mut presenter);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(presenter.joined, 1);

        // Display at 60 Hz with a frame answering every request.
        for _ in 0..120 {
            now += Duration::from_millis(16);
            session.handle_event(current(&session), view(true), now, &mut presenter);
            session.on_animation_frame(now, &mut presenter);
            session.on_timer(now, &mut presenter);
        }
        assert!(presenter.frames > 50);
        assert!(session.pacer().budget() >= 1);
        assert!(session.pacer().budget() <= 6);

        session.handle_event(
            current(&session),
            ChannelEvent::Error("socket closed".to_string()),
            now,
            &mut presenter,
        );
        assert_eq!(session.phase(), Phase::Rejoining);
        assert_eq!(log.borrow().opened.last().unwrap().player_id, Some(42));

        session.handle_event(ChannelId(3), ok(), now, &mut presenter);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(presenter.rejoined, 1);
        assert_eq!(session.pacer().budget(), 2);

        session.handle_event(ChannelId(3), view(false), now, &mut presenter);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(presenter.left, 1);
        assert_eq!(
            presenter.errors.last(),
            Some(&SessionError::PlayerEjected {
                game_id: GameId::new("arena")
            })
        );
        assert_eq!(log.borrow().left, vec![ChannelId(3)]);
    }

    /// Works with the logging presenter the binary uses
    #[test]
    fn log_presenter_session() {
        let (mut session, log) = setup();
        let mut presenter = LogPresenter::new();
        let now = Instant::now();

        session.join(GameId::new("arena"), now);
        session.handle_event(ChannelId(1), ok(), now, &mut presenter);
        session.handle_event(ChannelId(1), view(true), now, &mut presenter);
        session.on_animation_frame(now, &mut presenter);
        assert_eq!(presenter.frames_shown(), 1);

        session.leave(&mut presenter);
        assert_eq!(log.borrow().left, vec![ChannelId(1)]);
    }
}

/// UDP CLIENT LOOP TESTS
mod udp_tests {
    use super::*;

    async fn recv(server: &UdpSocket) -> (Packet, SocketAddr) {
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];
        let (len, from) = timeout(Duration::from_secs(2), server.recv_from(&mut buffer))
            .await
            .expect("Timed out waiting for client packet")
            .unwrap();
        (deserialize(&buffer[..len]).unwrap(), from)
    }

    async fn send(server: &UdpSocket, to: SocketAddr, packet: &Packet) {
        server.send_to(&serialize(packet).unwrap(), to).await.unwrap();
    }

    async fn expect_push(server: &UdpSocket, expected: Push) {
        match recv(server).await.0 {
            Packet::Push { push, .. } => assert_eq!(push, expected),
            other => panic!("Expected {:?}, got {:?}", expected, other),
        }
    }

    async fn start() -> (
        UdpSocket,
        mpsc::UnboundedSender<Command>,
        tokio::task::JoinHandle<Result<(), client::error::ClientError>>,
    ) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let mut client = Client::connect(
            &addr,
            "ada",
            SessionConfig::default(),
            PacerConfig::default(),
            LogPresenter::new(),
        )
        .await
        .unwrap();

        let (commands, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move { client.run(receiver).await });
        (server, commands, handle)
    }

    /// Tests join, frame pull and leave against a stub server
    #[tokio::test]
    async fn join_pull_and_leave() {
        let (server, commands, handle) = start().await;

        let (packet, client_addr) = recv(&server).await;
        assert!(matches!(packet, Packet::LobbyJoin));

        commands.send(Command::Join(GameId::new("arena"))).unwrap();
        let join_ref = match recv(&server).await.0 {
            Packet::Join {
                join_ref,
                game_id,
                name,
                player_id,
            } => {
                assert_eq!(game_id, GameId::new("arena"));
                assert_eq!(name, "ada");
                assert_eq!(player_id, None);
                join_ref
            }
            other => panic!("Expected join, got {:?}", other),
        };

        send(
            &server,
            client_addr,
            &Packet::JoinReply {
                join_ref,
                reply: JoinReply::Ok {
                    game_id: GameId::new("arena"),
                    player_id: 3,
                },
            },
        )
        .await;

        expect_push(&server, Push::RequestStructure).await;
        expect_push(&server, Push::RequestPlayerList).await;
        expect_push(&server, Push::ChatJoin).await;
        expect_push(&server, Push::RequestFrame).await;
        expect_push(&server, Push::RequestFrame).await;

        send(
            &server,
            client_addr,
            &Packet::Broadcast {
                join_ref,
                message: Broadcast::View(ArenaView {
                    player_present: true,
                    payload: vec![1, 2, 3],
                }),
            },
        )
        .await;
        expect_push(&server, Push::RequestFrame).await;

        commands.send(Command::Quit).unwrap();
        expect_push(&server, Push::ChatLeave).await;
        assert!(matches!(
            recv(&server).await.0,
            Packet::Leave { join_ref: r } if r == join_ref
        ));

        handle.await.unwrap().unwrap();
    }

    /// Tests that a channel error makes the client rejoin with its player id
    #[tokio::test]
    async fn channel_error_triggers_rejoin() {
        let (server, commands, handle) = start().await;
        let (_, client_addr) = recv(&server).await;

        commands.send(Command::Join(GameId::new("arena"))).unwrap();
        let first_ref = match recv(&server).await.0 {
            Packet::Join { join_ref, .. } => join_ref,
            other => panic!("Expected join, got {:?}", other),
        };
        send(
            &server,
            client_addr,
            &Packet::JoinReply {
                join_ref: first_ref,
                reply: JoinReply::Ok {
                    game_id: GameId::new("arena"),
                    player_id: 8,
                },
            },
        )
        .await;
        send(
            &server,
            client_addr,
            &Packet::ChannelError {
                join_ref: first_ref,
                reason: "node restarted".to_string(),
            },
        )
        .await;

        // Pushes from the joined channel may precede the rejoin, but never a leave.
        let rejoin = loop {
            match recv(&server).await.0 {
                Packet::Join {
                    join_ref,
                    player_id,
                    ..
                } => break (join_ref, player_id),
                Packet::Leave { join_ref } => {
                    panic!("Dropped channel {} was told the player left", join_ref)
                }
                Packet::Push {
                    push: Push::ChatLeave,
                    ..
                } => panic!("Chat leave sent on a dropped channel"),
                _ => {}
            }
        };
        assert_ne!(rejoin.0, first_ref);
        assert_eq!(rejoin.1, Some(8));

        drop(commands);
        handle.await.unwrap().unwrap();
    }
}
