//! Line-oriented command console
//!
//! Stands in for the browser lobby and keyboard handlers: each stdin line is
//! parsed into a [`Command`] and forwarded to the client loop.

use crate::error::CommandError;
use log::{info, warn};
use shared::{Button, GameId};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join(GameId),
    Create(String),
    Leave,
    Rename(String),
    Say(String),
    Button { button: Button, down: bool },
    SelfDestruct,
    Launch { x: f32, y: f32 },
    Players,
    Games,
    Quit,
}

pub const HELP: &str = "commands: join <game> | create [name] | leave | rename <name> | \
say <text> | press <button> | release <button> | destruct | launch <x> <y> | \
players | games | quit";

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Err(CommandError::Empty),
        "join" => Ok(Command::Join(GameId::new(required(rest, "join")?))),
        "create" => Ok(Command::Create(rest.to_string())),
        "leave" => Ok(Command::Leave),
        "rename" | "name" => Ok(Command::Rename(required(rest, "rename")?.to_string())),
        "say" => Ok(Command::Say(required(rest, "say")?.to_string())),
        "press" => Ok(Command::Button {
            button: button(rest)?,
            down: true,
        }),
        "release" => Ok(Command::Button {
            button: button(rest)?,
            down: false,
        }),
        "destruct" => Ok(Command::SelfDestruct),
        "launch" => {
            let mut coords = rest.split_whitespace();
            let x = coordinate(coords.next())?;
            let y = coordinate(coords.next())?;
            Ok(Command::Launch { x, y })
        }
        "players" => Ok(Command::Players),
        "games" => Ok(Command::Games),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn required<'a>(rest: &'a str, command: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

fn button(rest: &str) -> Result<Button, CommandError> {
    let name = required(rest, "button")?;
    Button::parse(&name.to_ascii_lowercase()).ok_or_else(|| CommandError::UnknownButton(name.to_string()))
}

fn coordinate(token: Option<&str>) -> Result<f32, CommandError> {
    let token = token.ok_or(CommandError::MissingArgument("launch"))?;
    token
        .parse()
        .map_err(|_| CommandError::InvalidCoordinate(token.to_string()))
}

/// Forwards parsed stdin lines until EOF, then asks the client to quit.
pub async fn read_commands(commands: UnboundedSender<Command>) {
    info!("{}", HELP);
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        return;
                    }
                }
                Err(CommandError::Empty) => {}
                Err(e) => warn!("{}; {}", e, HELP),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading stdin: {}", e);
                break;
            }
        }
    }

    let _ = commands.send(Command::Quit);
}
