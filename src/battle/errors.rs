use thiserror::Error;

use crate::platform::PlatformError;

/// Why an armies setup command was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// Either the `attacker` or the `defender` clause is absent.
    #[error("missing {0} clause")]
    MissingClause(&'static str),

    /// Clause has no `:` before the unit counts.
    #[error("{0} clause has no ':'")]
    MissingColon(&'static str),

    /// Clause does not list exactly four counts.
    #[error("{side} needs 4 counts, got {found}")]
    WrongCount { side: &'static str, found: usize },

    /// A count is not a non-negative integer.
    #[error("{side} count '{value}' is not a non-negative integer")]
    InvalidCount { side: &'static str, value: String },
}

/// Errors raised while handling events for a battle session.
#[derive(Debug, Error)]
pub enum BattleError {
    /// Wrapper around chat-platform failures (send, reply, acknowledge).
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    /// The acting user is not one of the two participants.
    #[error("user {0} is not a participant")]
    NotParticipant(String),

    /// The acting participant is not the one whose turn it is.
    #[error("not {actor}'s turn, waiting on {expected}")]
    NotYourTurn { actor: String, expected: String },

    /// Armies have not been configured yet.
    #[error("battle has not been set up")]
    NotConfigured,

    /// A side has already been defeated.
    #[error("battle is over")]
    Ended,

    /// Another resolution is in flight on this session.
    #[error("resolution already in flight")]
    Busy,
}
