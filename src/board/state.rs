//! Turn and phase types, plus the per-guild turn counter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A phase of a turn. Declaration order is resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Beginning,
    Movement,
    Combat,
    Construction,
    ResourceTransfer,
    Upkeep,
    Organization,
}

/// All phases in resolution order.
pub const ALL_PHASES: [Phase; 7] = [
    Phase::Beginning,
    Phase::Movement,
    Phase::Combat,
    Phase::Construction,
    Phase::ResourceTransfer,
    Phase::Upkeep,
    Phase::Organization,
];

impl Phase {
    /// Returns the persisted name, e.g. `"RESOURCE_TRANSFER"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Beginning => "BEGINNING",
            Phase::Movement => "MOVEMENT",
            Phase::Combat => "COMBAT",
            Phase::Construction => "CONSTRUCTION",
            Phase::ResourceTransfer => "RESOURCE_TRANSFER",
            Phase::Upkeep => "UPKEEP",
            Phase::Organization => "ORGANIZATION",
        }
    }

    /// Parses a persisted phase name.
    pub fn parse(s: &str) -> Option<Phase> {
        ALL_PHASES.iter().copied().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-guild turn bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// The last completed turn. Resolution produces turn `current_turn + 1`.
    pub current_turn: u32,
    pub turn_resolution_enabled: bool,
}

impl Default for GuildConfig {
    fn default() -> Self {
        GuildConfig { current_turn: 0, turn_resolution_enabled: true }
    }
}
