//! In-memory [`WorldStore`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::{StoreError, WorldStore};
use crate::board::{
    Alliance, CharacterId, Faction, FactionId, FactionMember, GuildConfig, GuildId, Order, OrderId,
    Phase, Territory, TerritoryAdjacency, TerritoryId, TurnLog, Unit, UnitId, War, WarId,
    WarParticipant, WarSide,
};

#[derive(Debug, Clone, Default)]
struct GuildWorld {
    config: Option<GuildConfig>,
    territories: BTreeMap<TerritoryId, Territory>,
    adjacencies: BTreeSet<TerritoryAdjacency>,
    units: BTreeMap<UnitId, Unit>,
    factions: BTreeMap<FactionId, Faction>,
    alliances: Vec<Alliance>,
    wars: Vec<War>,
    participants: Vec<WarParticipant>,
    members: Vec<FactionMember>,
    command: BTreeMap<FactionId, BTreeSet<CharacterId>>,
    orders: BTreeMap<OrderId, Order>,
    events: Vec<TurnLog>,
    event_keys: HashSet<String>,
    naval_positions: BTreeMap<UnitId, Vec<TerritoryId>>,
    broken_units: BTreeSet<UnitId>,
    unreadable_units: BTreeSet<UnitId>,
    fail_next_append: bool,
}

/// A `HashMap`-of-guilds store. Cloning snapshots every guild.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    guilds: HashMap<GuildId, GuildWorld>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self, guild: GuildId) -> Option<&GuildWorld> {
        self.guilds.get(&guild)
    }

    fn world_mut(&mut self, guild: GuildId) -> &mut GuildWorld {
        self.guilds.entry(guild).or_default()
    }

    pub fn set_guild_config(&mut self, guild: GuildId, config: GuildConfig) {
        self.world_mut(guild).config = Some(config);
    }

    pub fn insert_territory(&mut self, guild: GuildId, territory: Territory) {
        self.world_mut(guild).territories.insert(territory.id.clone(), territory);
    }

    pub fn connect(&mut self, guild: GuildId, a: &str, b: &str) {
        self.world_mut(guild).adjacencies.insert(TerritoryAdjacency::new(a, b));
    }

    pub fn insert_unit(&mut self, guild: GuildId, unit: Unit) {
        self.world_mut(guild).units.insert(unit.id, unit);
    }

    pub fn insert_faction(&mut self, guild: GuildId, faction: Faction) {
        self.world_mut(guild).factions.insert(faction.id, faction);
    }

    pub fn insert_alliance(&mut self, guild: GuildId, alliance: Alliance) {
        self.world_mut(guild).alliances.push(alliance);
    }

    /// Records a war with the given factions on each side.
    pub fn declare_war(&mut self, guild: GuildId, war: WarId, side_a: &[FactionId], side_b: &[FactionId]) {
        let world = self.world_mut(guild);
        world.wars.push(War { id: war, objective: String::new(), declared_turn: 0 });
        for (side, factions) in [(WarSide::SideA, side_a), (WarSide::SideB, side_b)] {
            for &faction in factions {
                world.participants.push(WarParticipant { war, faction, side });
            }
        }
    }

    pub fn insert_member(&mut self, guild: GuildId, faction: FactionId, character: CharacterId) {
        self.world_mut(guild).members.push(FactionMember { faction, character });
    }

    pub fn grant_command(&mut self, guild: GuildId, faction: FactionId, character: CharacterId) {
        self.world_mut(guild).command.entry(faction).or_default().insert(character);
    }

    pub fn insert_order(&mut self, guild: GuildId, order: Order) {
        self.world_mut(guild).orders.insert(order.id, order);
    }

    /// Makes every later `save_unit` for this unit fail. Test hook for the
    /// per-order failure boundary.
    pub fn break_unit_writes(&mut self, guild: GuildId, unit: UnitId) {
        self.world_mut(guild).broken_units.insert(unit);
    }

    /// Makes every later read of this unit fail.
    pub fn break_unit_reads(&mut self, guild: GuildId, unit: UnitId) {
        self.world_mut(guild).unreadable_units.insert(unit);
    }

    /// Makes the next `append_events` call for this guild fail once.
    pub fn fail_next_append(&mut self, guild: GuildId) {
        self.world_mut(guild).fail_next_append = true;
    }
}

impl WorldStore for InMemoryStore {
    fn guild_config(&self, guild: GuildId) -> Result<Option<GuildConfig>, StoreError> {
        Ok(self.world(guild).and_then(|w| w.config.clone()))
    }

    fn save_guild_config(&mut self, guild: GuildId, config: &GuildConfig) -> Result<(), StoreError> {
        self.world_mut(guild).config = Some(config.clone());
        Ok(())
    }

    fn territories(&self, guild: GuildId) -> Result<Vec<Territory>, StoreError> {
        Ok(self.world(guild).map(|w| w.territories.values().cloned().collect()).unwrap_or_default())
    }

    fn adjacencies(&self, guild: GuildId) -> Result<Vec<TerritoryAdjacency>, StoreError> {
        Ok(self.world(guild).map(|w| w.adjacencies.iter().cloned().collect()).unwrap_or_default())
    }

    fn unit(&self, guild: GuildId, id: UnitId) -> Result<Option<Unit>, StoreError> {
        let Some(world) = self.world(guild) else {
            return Ok(None);
        };
        if world.unreadable_units.contains(&id) {
            return Err(StoreError::Backend(format!("unit {} unreadable", id)));
        }
        Ok(world.units.get(&id).cloned())
    }

    fn units(&self, guild: GuildId) -> Result<Vec<Unit>, StoreError> {
        Ok(self.world(guild).map(|w| w.units.values().cloned().collect()).unwrap_or_default())
    }

    fn units_in_territory(&self, guild: GuildId, territory: &TerritoryId) -> Result<Vec<Unit>, StoreError> {
        Ok(self
            .world(guild)
            .map(|w| w.units.values().filter(|u| u.is_in(territory)).cloned().collect())
            .unwrap_or_default())
    }

    fn save_unit(&mut self, guild: GuildId, unit: &Unit) -> Result<(), StoreError> {
        let world = self.world_mut(guild);
        if world.broken_units.contains(&unit.id) {
            return Err(StoreError::Backend(format!("write rejected for unit {}", unit.id)));
        }
        if !world.units.contains_key(&unit.id) {
            return Err(StoreError::NotFound { kind: "unit", id: unit.id.to_string(), guild });
        }
        world.units.insert(unit.id, unit.clone());
        Ok(())
    }

    fn factions(&self, guild: GuildId) -> Result<Vec<Faction>, StoreError> {
        Ok(self.world(guild).map(|w| w.factions.values().cloned().collect()).unwrap_or_default())
    }

    fn alliances(&self, guild: GuildId) -> Result<Vec<Alliance>, StoreError> {
        Ok(self.world(guild).map(|w| w.alliances.clone()).unwrap_or_default())
    }

    fn wars(&self, guild: GuildId) -> Result<Vec<War>, StoreError> {
        Ok(self.world(guild).map(|w| w.wars.clone()).unwrap_or_default())
    }

    fn war_participants(&self, guild: GuildId) -> Result<Vec<WarParticipant>, StoreError> {
        Ok(self.world(guild).map(|w| w.participants.clone()).unwrap_or_default())
    }

    fn faction_members(&self, guild: GuildId) -> Result<Vec<FactionMember>, StoreError> {
        Ok(self.world(guild).map(|w| w.members.clone()).unwrap_or_default())
    }

    fn command_holders(&self, guild: GuildId, faction: FactionId) -> Result<Vec<CharacterId>, StoreError> {
        Ok(self
            .world(guild)
            .and_then(|w| w.command.get(&faction))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn unresolved_orders(&self, guild: GuildId, phase: Phase) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .world(guild)
            .map(|w| {
                w.orders
                    .values()
                    .filter(|o| o.phase == phase && o.is_unresolved())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        orders.sort_by_key(|o| (o.priority, o.id));
        Ok(orders)
    }

    fn orders(&self, guild: GuildId) -> Result<Vec<Order>, StoreError> {
        Ok(self.world(guild).map(|w| w.orders.values().cloned().collect()).unwrap_or_default())
    }

    fn order(&self, guild: GuildId, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.world(guild).and_then(|w| w.orders.get(&id).cloned()))
    }

    fn save_order(&mut self, guild: GuildId, order: &Order) -> Result<(), StoreError> {
        let world = self.world_mut(guild);
        if !world.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound { kind: "order", id: order.id.to_string(), guild });
        }
        world.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn append_events(&mut self, guild: GuildId, events: &[TurnLog]) -> Result<usize, StoreError> {
        let world = self.world_mut(guild);
        if std::mem::take(&mut world.fail_next_append) {
            return Err(StoreError::Backend("event log unavailable".to_string()));
        }
        let mut written = 0;
        for event in events {
            if world.event_keys.insert(event.dedup_key()) {
                world.events.push(event.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    fn events(&self, guild: GuildId) -> Result<Vec<TurnLog>, StoreError> {
        Ok(self.world(guild).map(|w| w.events.clone()).unwrap_or_default())
    }

    fn naval_positions(&self, guild: GuildId, unit: UnitId) -> Result<Vec<TerritoryId>, StoreError> {
        Ok(self
            .world(guild)
            .and_then(|w| w.naval_positions.get(&unit).cloned())
            .unwrap_or_default())
    }

    fn set_naval_positions(
        &mut self,
        guild: GuildId,
        unit: UnitId,
        territories: &[TerritoryId],
    ) -> Result<(), StoreError> {
        self.world_mut(guild).naval_positions.insert(unit, territories.to_vec());
        Ok(())
    }

    fn naval_units_in_territory(&self, guild: GuildId, territory: &TerritoryId) -> Result<Vec<UnitId>, StoreError> {
        Ok(self
            .world(guild)
            .map(|w| {
                w.naval_positions
                    .iter()
                    .filter(|(_, set)| set.contains(territory))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default())
    }
}
