use clap::Parser;
use client::config::{PacerConfig, SessionConfig};
use client::console::{self, Command};
use client::network::Client;
use client::presenter::LogPresenter;
use log::info;
use shared::GameId;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name shown to other players
    #[arg(short = 'n', long, default_value = "")]
    name: String,

    /// Join this game right after connecting
    #[arg(short = 'j', long)]
    join: Option<String>,

    /// Create a game with this name and join it
    #[arg(short = 'c', long, conflicts_with = "join")]
    create: Option<String>,

    /// Frame requests in flight after a (re)join
    #[arg(long, default_value_t = shared::INITIAL_BUDGET)]
    initial_budget: u32,

    /// Upper bound on frame requests in flight
    #[arg(long, default_value_t = shared::MAX_BUDGET)]
    max_budget: u32,

    /// Join handshakes tried before giving up
    #[arg(long, default_value_t = shared::JOIN_ATTEMPTS)]
    join_attempts: u32,

    /// Rejoin handshakes tried after a dropped channel
    #[arg(long, default_value_t = shared::REJOIN_ATTEMPTS)]
    rejoin_attempts: u32,

    /// Delay between rejoin handshakes in milliseconds
    #[arg(
        long,
        default_value_t = shared::REJOIN_RETRY_DELAY_MS,
        value_parser = clap::value_parser!(u64).range(1..=3_600_000)
    )]
    rejoin_delay: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let pacer_config = PacerConfig {
        initial_budget: args.initial_budget,
        max_budget: args.max_budget,
        ..PacerConfig::default()
    };
    let session_config = SessionConfig {
        join_attempts: args.join_attempts,
        rejoin_attempts: args.rejoin_attempts,
        rejoin_retry_delay: Duration::from_millis(args.rejoin_delay),
        ..SessionConfig::default()
    };

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut client = Client::connect(
        &args.server,
        &args.name,
        session_config,
        pacer_config,
        LogPresenter::new(),
    )
    .await?;

    let (commands, receiver) = mpsc::unbounded_channel();
    if let Some(game_id) = args.join {
        let _ = commands.send(Command::Join(GameId::new(game_id)));
    }
    if let Some(name) = args.create {
        let _ = commands.send(Command::Create(name));
    }
    tokio::spawn(console::read_commands(commands));

    client.run(receiver).await?;

    Ok(())
}
