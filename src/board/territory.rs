//! Territory records and adjacency edges.

use serde::{Deserialize, Serialize};

use super::ids::{CharacterId, FactionId, TerritoryId};

/// Who controls a territory. Control is held by exactly one character or
/// one faction, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    Character(CharacterId),
    Faction(FactionId),
}

/// A node of the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    #[serde(default)]
    pub name: String,
    /// Terrain category, e.g. `"plains"`, `"mountains"`, `"ocean"`.
    pub terrain: String,
    #[serde(default)]
    pub controller: Option<Controller>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Territory {
    /// Creates an uncontrolled territory with the given terrain.
    pub fn new(id: impl Into<TerritoryId>, terrain: &str) -> Self {
        let id = id.into();
        Territory {
            name: id.to_string(),
            id,
            terrain: terrain.to_string(),
            controller: None,
            keywords: Vec::new(),
        }
    }

    /// Builder-style helper setting the controller.
    pub fn controlled_by(mut self, controller: Controller) -> Self {
        self.controller = Some(controller);
        self
    }
}

/// Undirected edge. The endpoints are stored in canonical (ascending) order
/// so `(a, b)` and `(b, a)` produce the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerritoryAdjacency {
    pub a: TerritoryId,
    pub b: TerritoryId,
}

impl TerritoryAdjacency {
    pub fn new(x: impl Into<TerritoryId>, y: impl Into<TerritoryId>) -> Self {
        let (x, y) = (x.into(), y.into());
        if x <= y {
            TerritoryAdjacency { a: x, b: y }
        } else {
            TerritoryAdjacency { a: y, b: x }
        }
    }
}
