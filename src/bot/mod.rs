//! # Bot Module
//!
//! The glue between the chat platform and the battle core.
//!
//! ## Components
//!
//! - [`server`] - event dispatcher and main loop
//! - [`registry`] - thread id → [`BattleSession`](crate::battle::BattleSession) map
//! - [`commands`] - `/battlethread` and `/thread` slash commands
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  BotServer      │ ← routes events, runs housekeeping
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ SessionRegistry │ ← thread id → session
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  BattleSession  │ ← turn state machine, thread announcements
//! └─────────────────┘
//! ```
//!
//! ## Battle Lifecycle
//!
//! 1. Admin runs `/battlethread attacker:@a defender:@b`
//! 2. Bot creates a private thread, invites a, b and the admin
//! 3. Session is registered under the thread id and asks for the armies setup
//! 4. Admin replies `setup attacker: 3,1,0,0 ; defender: 2,2,0,0`
//! 5. Bot posts Attack / Retreat buttons; fighters alternate turns
//! 6. First side at 0 HP loses; the session is dropped from the registry

pub mod commands;
pub mod registry;
pub mod server;

pub use registry::SessionRegistry;
pub use server::BotServer;
