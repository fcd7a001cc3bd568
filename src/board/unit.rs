//! Units and ownership.

use serde::{Deserialize, Serialize};

use super::ids::{CharacterId, FactionId, TerritoryId, UnitId};

/// Owner of a unit: a single character or a faction, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Character(CharacterId),
    Faction(FactionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    #[default]
    Active,
    Disbanded,
}

/// A land or naval unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Player-facing identifier, e.g. `"INF-007"`.
    pub unit_id: String,
    pub unit_type: String,
    pub owner: Owner,
    pub commander: Option<CharacterId>,
    /// Explicit home faction. Falls back to the owner when unset.
    pub faction: Option<FactionId>,
    pub movement: u32,
    /// Can go negative; disbanding on depletion happens outside this crate.
    pub organization: i32,
    pub size: u32,
    /// Cargo space, in land-unit `size`, for naval transports.
    pub capacity: u32,
    pub is_naval: bool,
    pub keywords: Vec<String>,
    /// Single position for land units; the first occupied territory for naval units.
    pub current_territory: Option<TerritoryId>,
    pub status: UnitStatus,
}

impl Unit {
    /// Creates an active land unit with movement 1 at `territory`.
    pub fn new(id: UnitId, owner: Owner, territory: impl Into<TerritoryId>) -> Self {
        Unit {
            id,
            unit_id: format!("U-{}", id.0),
            unit_type: "infantry".to_string(),
            owner,
            commander: None,
            faction: None,
            movement: 1,
            organization: 10,
            size: 1,
            capacity: 0,
            is_naval: false,
            keywords: Vec::new(),
            current_territory: Some(territory.into()),
            status: UnitStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }

    /// Case-insensitive keyword check.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    /// Land units that can take part in a land movement order.
    pub fn is_mobile_land(&self) -> bool {
        self.is_active() && !self.is_naval
    }

    pub fn is_in(&self, territory: &TerritoryId) -> bool {
        self.current_territory.as_ref() == Some(territory)
    }
}
