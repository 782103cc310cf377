//! # Arena Client Library
//!
//! Client core for the multiplayer tank arena. The server runs the
//! simulation; this library keeps the player's membership in a game alive
//! and decides how many arena snapshots to ask for.
//!
//! ## Architecture Overview
//!
//! ### Pull-Based Frame Delivery
//! The server never pushes arena snapshots unprompted. The client requests
//! one frame per request credit, and the credit budget adapts every couple
//! of seconds to the measured presentation rate: slow displays get fewer
//! frames in flight, fast ones get more. Late frames replace earlier
//! buffered ones so the display always shows the newest arena.
//!
//! ### Session Recovery
//! A dropped game channel does not end the session. The client rejoins on a
//! fresh channel carrying its server-assigned player id, and only gives up
//! when retries run out or the server no longer knows the player.
//!
//! ### Deterministic Core
//! The session state machine and pacer never read the clock or spawn tasks.
//! Callers pass `now` and call back at [`session::SessionController::next_deadline`],
//! so tests step time explicitly.
//!
//! ## Module Organization
//!
//! - `channel`: transport-neutral channel and event types
//! - `config`: pacing and retry tunables with validation
//! - `console`: stdin command parsing
//! - `controls`: edge-triggered tank control pushes
//! - `error`: error types for every layer
//! - `lobby`: directory of running games
//! - `network`: UDP transport and the tokio client loop
//! - `pacer`: the adaptive frame-request pacer
//! - `presenter`: frame and lifecycle sink, plus a logging implementation
//! - `session`: join, rejoin and leave state machine
//! - `window`: frame timestamp window and rate averaging
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::{PacerConfig, SessionConfig};
//! use client::console::Command;
//! use client::network::Client;
//! use client::presenter::LogPresenter;
//! use shared::GameId;
//!
//! # async fn example() -> Result<(), client::error::ClientError> {
//! let mut client = Client::connect(
//!     "127.0.0.1:8080",
//!     "ada",
//!     SessionConfig::default(),
//!     PacerConfig::default(),
//!     LogPresenter::new(),
//! )
//! .await?;
//!
//! let (commands, receiver) = tokio::sync::mpsc::unbounded_channel();
//! commands.send(Command::Join(GameId::new("arena-1"))).ok();
//! client.run(receiver).await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod console;
pub mod controls;
pub mod error;
pub mod lobby;
pub mod network;
pub mod pacer;
pub mod presenter;
pub mod session;
pub mod window;

#[cfg(test)]
mod testing;
