//! Persistence boundary.
//!
//! The resolver reads and writes world state exclusively through
//! [`WorldStore`]. Every call is keyed by guild; nothing here is shared
//! between guilds. Hosts back it with their relational store; tests, benches
//! and embedders can use [`InMemoryStore`].

pub mod memory;

use thiserror::Error;

use crate::board::{
    Alliance, CharacterId, Faction, FactionId, FactionMember, GuildConfig, GuildId, Order,
    OrderError, OrderId, Phase, Territory, TerritoryAdjacency, TerritoryId, TurnLog, Unit, UnitId,
    War, WarParticipant,
};

pub use memory::InMemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found in guild {guild}")]
    NotFound { kind: &'static str, id: String, guild: GuildId },
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        OrderError::Internal(err.to_string())
    }
}

/// Everything the resolver consumes from the world.
pub trait WorldStore {
    fn guild_config(&self, guild: GuildId) -> Result<Option<GuildConfig>, StoreError>;
    fn save_guild_config(&mut self, guild: GuildId, config: &GuildConfig) -> Result<(), StoreError>;

    fn territories(&self, guild: GuildId) -> Result<Vec<Territory>, StoreError>;
    fn adjacencies(&self, guild: GuildId) -> Result<Vec<TerritoryAdjacency>, StoreError>;

    fn unit(&self, guild: GuildId, id: UnitId) -> Result<Option<Unit>, StoreError>;
    /// All units in the guild, in ascending id order.
    fn units(&self, guild: GuildId) -> Result<Vec<Unit>, StoreError>;
    fn units_in_territory(&self, guild: GuildId, territory: &TerritoryId) -> Result<Vec<Unit>, StoreError>;
    fn save_unit(&mut self, guild: GuildId, unit: &Unit) -> Result<(), StoreError>;

    fn factions(&self, guild: GuildId) -> Result<Vec<Faction>, StoreError>;
    fn alliances(&self, guild: GuildId) -> Result<Vec<Alliance>, StoreError>;
    fn wars(&self, guild: GuildId) -> Result<Vec<War>, StoreError>;
    fn war_participants(&self, guild: GuildId) -> Result<Vec<WarParticipant>, StoreError>;
    fn faction_members(&self, guild: GuildId) -> Result<Vec<FactionMember>, StoreError>;
    /// Characters holding the COMMAND permission in a faction.
    fn command_holders(&self, guild: GuildId, faction: FactionId) -> Result<Vec<CharacterId>, StoreError>;

    /// PENDING and ONGOING orders for a phase, by ascending priority then id.
    fn unresolved_orders(&self, guild: GuildId, phase: Phase) -> Result<Vec<Order>, StoreError>;
    /// Every order in the guild, in ascending id order.
    fn orders(&self, guild: GuildId) -> Result<Vec<Order>, StoreError>;
    fn order(&self, guild: GuildId, id: OrderId) -> Result<Option<Order>, StoreError>;
    fn save_order(&mut self, guild: GuildId, order: &Order) -> Result<(), StoreError>;

    /// Appends events, skipping any whose dedup key is already stored.
    /// Returns the number of rows written.
    fn append_events(&mut self, guild: GuildId, events: &[TurnLog]) -> Result<usize, StoreError>;
    fn events(&self, guild: GuildId) -> Result<Vec<TurnLog>, StoreError>;

    /// Occupied territories of a naval unit; empty if it never received an order.
    fn naval_positions(&self, guild: GuildId, unit: UnitId) -> Result<Vec<TerritoryId>, StoreError>;
    /// Replaces a naval unit's occupied set wholesale.
    fn set_naval_positions(
        &mut self,
        guild: GuildId,
        unit: UnitId,
        territories: &[TerritoryId],
    ) -> Result<(), StoreError>;
    fn naval_units_in_territory(&self, guild: GuildId, territory: &TerritoryId) -> Result<Vec<UnitId>, StoreError>;
}
