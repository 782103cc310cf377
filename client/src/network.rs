use crate::channel::{Channel, ChannelEvent, ChannelId, Inbound, JoinRequest, LobbyEvent, Transport};
use crate::config::{PacerConfig, SessionConfig};
use crate::console::Command;
use crate::error::ClientError;
use crate::presenter::Presenter;
use crate::session::SessionController;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{JoinRef, Packet, Push, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval, sleep_until, MissedTickBehavior};

/// Host refresh period driving the frame pacer's tick.
const REFRESH_INTERVAL: Duration = Duration::from_millis(16);

/// Fire-and-forget datagram send. Failures are logged, never retried.
fn send_packet(socket: &UdpSocket, server_addr: SocketAddr, packet: &Packet) {
    match serialize(packet) {
        Ok(data) => {
            if let Err(e) = socket.try_send_to(&data, server_addr) {
                warn!("Error sending packet: {}", e);
            }
        }
        Err(e) => error!("Error encoding packet: {}", e),
    }
}

/// Maps a server packet onto the event it represents for the client loop.
pub fn packet_to_inbound(packet: Packet) -> Option<Inbound> {
    let channel = |join_ref: JoinRef, event| Inbound::Channel {
        id: ChannelId(join_ref),
        event,
    };

    match packet {
        Packet::JoinReply { join_ref, reply } => Some(channel(join_ref, ChannelEvent::Reply(reply))),
        Packet::Broadcast { join_ref, message } => {
            Some(channel(join_ref, ChannelEvent::Message(message)))
        }
        Packet::ChannelError { join_ref, reason } => {
            Some(channel(join_ref, ChannelEvent::Error(reason)))
        }
        Packet::LobbyUpdate { games, node } => Some(Inbound::Lobby(LobbyEvent::Update { games, node })),
        Packet::GameCreated { game_id } => Some(Inbound::Lobby(LobbyEvent::Created { game_id })),
        _ => {
            warn!("Unexpected packet type");
            None
        }
    }
}

pub struct UdpChannel {
    id: ChannelId,
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
}

impl Channel for UdpChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn push(&mut self, push: Push) {
        let packet = Packet::Push {
            join_ref: self.id.0,
            push,
        };
        send_packet(&self.socket, self.server_addr, &packet);
    }

    fn leave(self) {
        debug!("Leaving channel {}", self.id);
        send_packet(
            &self.socket,
            self.server_addr,
            &Packet::Leave { join_ref: self.id.0 },
        );
    }
}

/// Multiplexes game channels over one UDP socket, keyed by join reference.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    next_ref: JoinRef,
}

impl UdpTransport {
    /// Binds a local socket, subscribes to the lobby and spawns the receive task.
    pub async fn connect(server: &str) -> Result<(Self, UnboundedReceiver<Inbound>), ClientError> {
        let server_addr: SocketAddr = server.parse()?;
        let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
        info!("Bound to {}, server at {}", socket.local_addr()?, server_addr);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(receive_loop(Arc::clone(&socket), server_addr, tx));

        send_packet(&socket, server_addr, &Packet::LobbyJoin);

        let transport = Self {
            socket,
            server_addr,
            next_ref: 1,
        };
        Ok((transport, rx))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.socket.local_addr()?)
    }
}

impl Transport for UdpTransport {
    type Channel = UdpChannel;

    fn open(&mut self, request: JoinRequest) -> UdpChannel {
        let join_ref = self.next_ref;
        self.next_ref = self.next_ref.wrapping_add(1).max(1);

        let packet = Packet::Join {
            join_ref,
            game_id: request.game_id,
            name: request.name,
            player_id: request.player_id,
        };
        send_packet(&self.socket, self.server_addr, &packet);

        UdpChannel {
            id: ChannelId(join_ref),
            socket: Arc::clone(&self.socket),
            server_addr: self.server_addr,
        }
    }

    fn create_game(&mut self, name: &str) {
        send_packet(
            &self.socket,
            self.server_addr,
            &Packet::CreateGame {
                name: name.to_string(),
            },
        );
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, server_addr: SocketAddr, tx: UnboundedSender<Inbound>) {
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];

    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((len, from)) => {
                if from != server_addr {
                    debug!("Ignoring datagram from {}", from);
                    continue;
                }
                match deserialize::<Packet>(&buffer[..len]) {
                    Ok(packet) => {
                        if let Some(inbound) = packet_to_inbound(packet) {
                            if tx.send(inbound).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("Dropping malformed packet ({} bytes): {}", len, e),
                }
            }
            Err(e) => error!("Error receiving packet: {}", e),
        }
    }
}

/// Sleeps until the deadline, or forever when there is none.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Drives one session over UDP from the tokio runtime.
pub struct Client<P: Presenter> {
    session: SessionController<UdpTransport>,
    inbound: UnboundedReceiver<Inbound>,
    presenter: P,
}

impl<P: Presenter> Client<P> {
    pub async fn connect(
        server: &str,
        name: &str,
        session_config: SessionConfig,
        pacer_config: PacerConfig,
        presenter: P,
    ) -> Result<Self, ClientError> {
        session_config.validate()?;
        pacer_config.validate()?;

        let (transport, inbound) = UdpTransport::connect(server).await?;
        Ok(Self {
            session: SessionController::new(transport, name, session_config, pacer_config),
            inbound,
            presenter,
        })
    }

    pub fn session(&self) -> &SessionController<UdpTransport> {
        &self.session
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Runs until `Quit`, the command sender is dropped or the receive task stops.
    /// Leaves any game before returning.
    pub async fn run(&mut self, mut commands: UnboundedReceiver<Command>) -> Result<(), ClientError> {
        let mut refresh = interval(REFRESH_INTERVAL);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.session.next_deadline();

            tokio::select! {
                inbound = self.inbound.recv() => match inbound {
                    Some(inbound) => {
                        self.session.handle_inbound(inbound, Instant::now(), &mut self.presenter);
                    }
                    None => {
                        error!("Receive task stopped");
                        break;
                    }
                },

                _ = refresh.tick() => {
                    self.session.on_animation_frame(Instant::now(), &mut self.presenter);
                },

                _ = sleep_until_deadline(deadline) => {
                    self.session.on_timer(Instant::now(), &mut self.presenter);
                },

                command = commands.recv() => match command {
                    Some(Command::Quit) | None => break,
                    Some(command) => self.execute(command),
                },
            }
        }

        self.session.leave(&mut self.presenter);
        Ok(())
    }

    pub fn execute(&mut self, command: Command) {
        let now = Instant::now();
        let result = match command {
            Command::Join(game_id) => {
                self.session.join(game_id, now);
                Ok(())
            }
            Command::Create(name) => {
                self.session.create_game(&name);
                Ok(())
            }
            Command::Leave => {
                self.session.leave(&mut self.presenter);
                Ok(())
            }
            Command::Rename(name) => {
                self.session.rename(name);
                Ok(())
            }
            Command::Say(content) => self.session.say(content),
            Command::Button { button, down } => self.session.set_button(button, down),
            Command::SelfDestruct => self.session.self_destruct(),
            Command::Launch { x, y } => self.session.launch(x, y).map(|hit| {
                if !hit {
                    info!("No entry point at ({}, {})", x, y);
                }
            }),
            Command::Players => self.session.request_player_list(),
            Command::Games => {
                self.list_games();
                Ok(())
            }
            Command::Quit => Ok(()),
        };

        if let Err(e) = result {
            warn!("{}", e);
        }
    }

    fn list_games(&self) {
        let lobby = self.session.lobby();
        if lobby.is_empty() {
            info!("No running games");
            return;
        }
        for game in lobby.games() {
            info!("{}  {}  ({})", game.id, game.display_name(), game.node);
        }
    }
}
