//! Faction relationship records: alliances, wars and membership.

use serde::{Deserialize, Serialize};

use super::ids::{CharacterId, FactionId, WarId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    pub leader: Option<CharacterId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllianceStatus {
    /// Proposed by one side, not yet accepted. Has no effect on resolution.
    Pending,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alliance {
    pub faction_a: FactionId,
    pub faction_b: FactionId,
    pub status: AllianceStatus,
}

impl Alliance {
    pub fn active(a: FactionId, b: FactionId) -> Self {
        Alliance { faction_a: a, faction_b: b, status: AllianceStatus::Active }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct War {
    pub id: WarId,
    pub objective: String,
    pub declared_turn: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarSide {
    SideA,
    SideB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarParticipant {
    pub war: WarId,
    pub faction: FactionId,
    pub side: WarSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactionMember {
    pub faction: FactionId,
    pub character: CharacterId,
}
