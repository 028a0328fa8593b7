//! # Battle Core
//!
//! The turn-based battle played inside a thread.
//!
//! - [`session`] - the [`BattleSession`] state machine: participants, turn
//!   order, attack/retreat resolution and thread announcements
//! - [`armies`] - the armies configuration and the admin `setup` parser
//! - [`errors`] - error types for both
//!
//! ## Rules
//!
//! Both participants start at 100 HP. On your turn you either **attack**
//! (opponent loses 5-19 HP) or **retreat** (you recover 3-10 HP, capped at
//! 100). The turn passes after every action unless the attack brings the
//! opponent to 0 HP, which ends the battle.

pub mod armies;
pub mod errors;
pub mod session;

pub use armies::Armies;
pub use errors::{BattleError, SetupError};
pub use session::{Action, BattleSession, BattleSnapshot, Participant, Phase, Resolution};
