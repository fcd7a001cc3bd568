//! Strongly-typed identifiers.
//!
//! Every persisted record is addressed by an integer key except territories,
//! which use their stable string identifier (`"t-north-pass"`, `"ocean-7"`).

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                $name(raw)
            }
        }
    };
}

numeric_id!(
    /// A guild (one independent game world).
    GuildId
);
numeric_id!(
    /// Internal unit key.
    UnitId
);
numeric_id!(FactionId);
numeric_id!(CharacterId);
numeric_id!(
    /// Internal order key. Also the tie-breaker when priorities are equal.
    OrderId
);
numeric_id!(WarId);

/// Stable territory identifier. Ordered lexicographically, which is the
/// order neighbour scans and patrol interception use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerritoryId(String);

impl TerritoryId {
    pub fn new(id: impl Into<String>) -> Self {
        TerritoryId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TerritoryId {
    fn from(id: &str) -> Self {
        TerritoryId(id.to_string())
    }
}

impl From<String> for TerritoryId {
    fn from(id: String) -> Self {
        TerritoryId(id)
    }
}
