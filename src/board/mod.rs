//! World data model.
//!
//! Territories and their adjacency graph, units, faction relationship
//! records, orders with their typed payloads, phases and turn-log events.

pub mod adjacency;
pub mod event;
pub mod faction;
pub mod ids;
pub mod order;
pub mod state;
pub mod territory;
pub mod unit;

pub use adjacency::TerritoryGraph;
pub use event::{EventData, EventSubject, TurnLog};
pub use faction::{Alliance, AllianceStatus, Faction, FactionMember, War, WarParticipant, WarSide};
pub use ids::{CharacterId, FactionId, GuildId, OrderId, TerritoryId, UnitId, WarId};
pub use order::{
    LandProgress, MovementStatus, NavalProgress, Order, OrderError, OrderPayload, OrderStatus,
    UnitAction, UnitOrderData, UNIT_ORDER,
};
pub use state::{GuildConfig, Phase, ALL_PHASES};
pub use territory::{Controller, Territory, TerritoryAdjacency};
pub use unit::{Owner, Unit, UnitStatus};
