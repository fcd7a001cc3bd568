//! Territory graph for one guild's map.
//!
//! Built once per resolution from the territory and adjacency records and
//! treated as static for the rest of the turn. Neighbour sets are ordered,
//! so every scan over adjacent territories runs in ascending id order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use super::ids::TerritoryId;
use super::territory::{Controller, Territory, TerritoryAdjacency};
use crate::config::ResolverConfig;

/// A territory with its terrain rules pre-applied.
#[derive(Debug, Clone)]
pub struct TerritoryNode {
    pub territory: Territory,
    pub cost: u32,
    pub water: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TerritoryGraph {
    nodes: BTreeMap<TerritoryId, TerritoryNode>,
    neighbors: BTreeMap<TerritoryId, BTreeSet<TerritoryId>>,
    default_cost: u32,
}

impl TerritoryGraph {
    /// Builds the graph. Edges naming unknown territories are dropped.
    pub fn build(
        territories: Vec<Territory>,
        adjacencies: &[TerritoryAdjacency],
        config: &ResolverConfig,
    ) -> Self {
        let mut nodes = BTreeMap::new();
        for territory in territories {
            let node = TerritoryNode {
                cost: config.terrain_cost(&territory.terrain),
                water: config.is_water_terrain(&territory.terrain),
                territory,
            };
            nodes.insert(node.territory.id.clone(), node);
        }

        let mut neighbors: BTreeMap<TerritoryId, BTreeSet<TerritoryId>> = BTreeMap::new();
        for edge in adjacencies {
            if !nodes.contains_key(&edge.a) || !nodes.contains_key(&edge.b) {
                warn!(a = %edge.a, b = %edge.b, "adjacency references unknown territory");
                continue;
            }
            neighbors.entry(edge.a.clone()).or_default().insert(edge.b.clone());
            neighbors.entry(edge.b.clone()).or_default().insert(edge.a.clone());
        }

        TerritoryGraph { nodes, neighbors, default_cost: config.default_terrain_cost }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &TerritoryId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn territory(&self, id: &TerritoryId) -> Option<&Territory> {
        self.nodes.get(id).map(|n| &n.territory)
    }

    pub fn controller(&self, id: &TerritoryId) -> Option<Controller> {
        self.nodes.get(id).and_then(|n| n.territory.controller)
    }

    /// Adjacent territories in ascending id order.
    pub fn neighbors<'a>(&'a self, id: &TerritoryId) -> impl Iterator<Item = &'a TerritoryId> + 'a {
        self.neighbors.get(id).into_iter().flat_map(|set| set.iter())
    }

    pub fn is_adjacent(&self, a: &TerritoryId, b: &TerritoryId) -> bool {
        self.neighbors.get(a).is_some_and(|set| set.contains(b))
    }

    /// MP cost of entering `id`. Unknown territories cost the default.
    pub fn terrain_cost(&self, id: &TerritoryId) -> u32 {
        match self.nodes.get(id) {
            Some(node) => node.cost,
            None => {
                warn!(territory = %id, "terrain cost requested for unknown territory");
                self.default_cost
            }
        }
    }

    pub fn is_water(&self, id: &TerritoryId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.water)
    }

    /// Known and not water.
    pub fn is_land(&self, id: &TerritoryId) -> bool {
        self.nodes.get(id).is_some_and(|n| !n.water)
    }

    /// True if any neighbour of `id` is land.
    pub fn touches_land(&self, id: &TerritoryId) -> bool {
        self.neighbors(id).any(|n| self.is_land(n))
    }
}
