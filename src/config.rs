//! Resolver configuration.
//!
//! Terrain costs, the water terrain set and the engagement-exempt keywords
//! are data rather than code so a guild can run a different ruleset. Every
//! field has a default; a TOML file only needs to name what it overrides:
//!
//! ```toml
//! default_terrain_cost = 1
//! water_terrains = ["ocean", "lake", "sea", "water"]
//!
//! [terrain_costs]
//! mountains = 3
//! swamp = 2
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::unit::Unit;

/// Errors that can occur when loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid resolver config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("terrain cost for '{0}' must be at least 1")]
    ZeroCost(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// MP cost of entering a territory, keyed by lowercase terrain name.
    pub terrain_costs: BTreeMap<String, u32>,
    /// Cost of any terrain not listed in `terrain_costs`.
    pub default_terrain_cost: u32,
    /// Terrain names impassable to land units.
    pub water_terrains: Vec<String>,
    /// Unit keywords that opt a unit out of engagement and encirclement.
    pub exempt_keywords: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let terrain_costs = [("mountains", 3), ("mountain", 3), ("desert", 2)]
            .into_iter()
            .map(|(name, cost)| (name.to_string(), cost))
            .collect();
        ResolverConfig {
            terrain_costs,
            default_terrain_cost: 1,
            water_terrains: ["ocean", "lake", "sea", "water"].map(String::from).to_vec(),
            exempt_keywords: ["infiltrator", "aerial", "aerial-transport"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl ResolverConfig {
    /// Parses a configuration from TOML, filling unspecified fields with defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let mut config: ResolverConfig = toml::from_str(input)?;
        config.terrain_costs = config
            .terrain_costs
            .into_iter()
            .map(|(name, cost)| (name.to_ascii_lowercase(), cost))
            .collect();
        if config.default_terrain_cost == 0 {
            return Err(ConfigError::ZeroCost("<default>".to_string()));
        }
        if let Some((name, _)) = config.terrain_costs.iter().find(|(_, c)| **c == 0) {
            return Err(ConfigError::ZeroCost(name.clone()));
        }
        Ok(config)
    }

    /// MP cost of entering a territory of the given terrain.
    pub fn terrain_cost(&self, terrain: &str) -> u32 {
        self.terrain_costs
            .get(&terrain.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default_terrain_cost)
    }

    pub fn is_water_terrain(&self, terrain: &str) -> bool {
        self.water_terrains
            .iter()
            .any(|w| w.eq_ignore_ascii_case(terrain))
    }

    /// True if the unit carries any engagement-exempt keyword.
    pub fn is_exempt(&self, unit: &Unit) -> bool {
        self.exempt_keywords.iter().any(|k| unit.has_keyword(k))
    }
}
