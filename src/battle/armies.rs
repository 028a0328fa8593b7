//! Armies configuration and the admin `setup` command parser.
//!
//! Accepted form (case-insensitive, whitespace-tolerant):
//!
//! ```text
//! setup attacker: 3,1,0,0 ; defender: 2,2,0,0
//! ```
//!
//! Clauses may appear in either order. Each side lists exactly four
//! non-negative unit counts.
use super::errors::SetupError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of unit tiers per side.
pub const UNIT_TIERS: usize = 4;

/// Leading token of the setup command.
pub const SETUP_KEYWORD: &str = "setup";

/// Shown in the setup prompt and in parse-failure replies.
pub const SETUP_EXAMPLE: &str = "setup attacker: 3,1,0,0 ; defender: 2,2,0,0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armies {
    pub attacker: [u32; UNIT_TIERS],
    pub defender: [u32; UNIT_TIERS],
}

impl Armies {
    pub fn new(attacker: [u32; UNIT_TIERS], defender: [u32; UNIT_TIERS]) -> Self {
        Self { attacker, defender }
    }

    /// Parse the text after the `setup` keyword.
    pub fn parse_setup(rest: &str) -> Result<Self, SetupError> {
        let lowered = rest.trim().to_lowercase();
        let clauses: Vec<&str> = lowered.split(';').map(str::trim).collect();
        let attacker = clauses
            .iter()
            .find(|c| c.starts_with("attacker"))
            .ok_or(SetupError::MissingClause("attacker"))?;
        let defender = clauses
            .iter()
            .find(|c| c.starts_with("defender"))
            .ok_or(SetupError::MissingClause("defender"))?;
        Ok(Self {
            attacker: parse_counts("attacker", attacker)?,
            defender: parse_counts("defender", defender)?,
        })
    }

    /// Parse a full message, returning `None` when it is not a setup command.
    pub fn parse_command(content: &str) -> Option<Result<Self, SetupError>> {
        let trimmed = content.trim();
        let head = trimmed.get(..SETUP_KEYWORD.len())?;
        if !head.eq_ignore_ascii_case(SETUP_KEYWORD) {
            return None;
        }
        Some(Self::parse_setup(&trimmed[SETUP_KEYWORD.len()..]))
    }
}

fn parse_counts(side: &'static str, clause: &str) -> Result<[u32; UNIT_TIERS], SetupError> {
    let (_, list) = clause
        .split_once(':')
        .ok_or(SetupError::MissingColon(side))?;
    let parts: Vec<&str> = list.split(',').map(str::trim).collect();
    if parts.len() != UNIT_TIERS {
        return Err(SetupError::WrongCount {
            side,
            found: parts.len(),
        });
    }
    let mut counts = [0u32; UNIT_TIERS];
    for (slot, raw) in counts.iter_mut().zip(parts) {
        let invalid = || SetupError::InvalidCount {
            side,
            value: raw.to_string(),
        };
        // Digits only: no sign, no whitespace inside the number.
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = raw.parse::<u32>().map_err(|_| invalid())?;
    }
    Ok(counts)
}

fn join_counts(counts: &[u32; UNIT_TIERS]) -> String {
    counts
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Armies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attacker: {}; Defender: {}",
            join_counts(&self.attacker),
            join_counts(&self.defender)
        )
    }
}
