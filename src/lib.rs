//! # Battlebot - Turn-Based Thread Battles for Chat Platforms
//!
//! Battlebot lets two users fight a simple turn-based battle inside a private
//! chat thread. An admin opens the thread with `/battlethread`, configures the
//! two armies with a `setup` message, and the fighters take turns pressing
//! **Attack** or **Retreat** until one side drops to 0 HP.
//!
//! ## Features
//!
//! - **Battle Sessions**: Two participants, strict turn alternation, randomized
//!   damage (5-19) and healing (3-10), explicit end-of-battle state.
//! - **Duplicate-Press Safety**: One resolution per session at a time; a
//!   second press racing the first is acknowledged and discarded.
//! - **Session Registry**: Thread-keyed lookup with eviction of finished and
//!   idle battles.
//! - **Transport-Agnostic**: The chat platform sits behind the
//!   [`platform::ChatPlatform`] trait; the binary speaks JSON lines on
//!   stdin/stdout for a gateway bridge.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use battlebot::bot::BotServer;
//! use battlebot::config::Config;
//! use battlebot::platform::console::{pump_events, ConsolePlatform};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let platform = Arc::new(ConsolePlatform::spawn(tokio::io::stdout()));
//!     let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//!     let reader = tokio::io::BufReader::new(tokio::io::stdin());
//!     tokio::spawn(pump_events(reader, platform.clone(), tx));
//!     BotServer::new(config, platform).run(rx).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`battle`] - battle session state machine and armies setup
//! - [`bot`] - dispatcher, session registry and slash commands
//! - [`platform`] - chat-platform boundary and transports
//! - [`config`] - configuration management and validation
//! - [`logutil`] - single-line log escaping
//! - [`metrics`] - in-process counters

pub mod battle;
pub mod bot;
pub mod config;
pub mod logutil;
pub mod metrics;
pub mod platform;
