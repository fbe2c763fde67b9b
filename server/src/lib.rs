//! # Authoritative Session Server
//!
//! Accepts many concurrent TCP clients, decodes their fixed-size input
//! frames, folds them into per-player state on a fixed tick cadence and
//! broadcasts one status frame per tick to every connected client.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns the session table and runs every step of the tick in
//! sequence. Network I/O happens in background tasks that only hand bytes
//! to the loop through the [`transport::Transport`] trait, so the table
//! needs no locking and all events of a tick are applied before that tick
//! is aggregated.
//!
//! ### Tick Cycle
//! 1. **Drain**: transport events are dispatched until the tick deadline
//!    ([`scheduler`]). Received bytes are reassembled into whole frames
//!    ([`reassembler`]) and applied to the sender's [`session::Session`].
//! 2. **Aggregate**: pending presses are consumed and scored, and key hits
//!    are collected into a status snapshot ([`game`]).
//! 3. **Broadcast**: the snapshot is serialized, framed and queued on every
//!    session, then handed to the transport ([`broadcast`]).
//!
//! ### Misbehaving Clients
//! A client that sends an unknown frame tag, or leaves more unconsumed bytes
//! than the configured limit, is disconnected on the spot. Other sessions
//! are unaffected and nothing else it sent is interpreted.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         address: "127.0.0.1:15000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod game;
pub mod network;
pub mod reassembler;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod utils;
