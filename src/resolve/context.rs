//! Shared state handed to every order resolver during a phase.

use std::collections::BTreeSet;

use tracing::warn;

use crate::board::{
    CharacterId, EventData, EventSubject, GuildId, Order, OrderError, Owner, Phase,
    TerritoryGraph, TurnLog, Unit, UnitId,
};
use crate::config::ResolverConfig;
use crate::store::{StoreError, WorldStore};

use super::relations::RelationTable;

pub struct PhaseContext<'a> {
    pub guild: GuildId,
    /// The turn being produced.
    pub turn: u32,
    pub phase: Phase,
    pub store: &'a mut dyn WorldStore,
    pub graph: &'a TerritoryGraph,
    pub relations: &'a RelationTable,
    pub config: &'a ResolverConfig,
}

impl<'a> PhaseContext<'a> {
    pub fn event(&self, subject: EventSubject, data: EventData) -> TurnLog {
        TurnLog::new(self.turn, self.phase, subject, data)
    }

    /// Fetches the listed units, silently skipping ids that no longer exist.
    pub fn load_units(&self, ids: &[UnitId]) -> Result<Vec<Unit>, StoreError> {
        let mut units = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(unit) = self.store.unit(self.guild, id)? {
                units.push(unit);
            }
        }
        Ok(units)
    }

    /// Characters to notify about these units: owner and commander for
    /// character-owned units, COMMAND holders, leader and commander for
    /// faction-owned ones.
    pub fn notify_list(&self, units: &[Unit]) -> Result<Vec<CharacterId>, StoreError> {
        let mut characters = BTreeSet::new();
        for unit in units {
            match unit.owner {
                Owner::Character(c) => {
                    characters.insert(c);
                }
                Owner::Faction(f) => {
                    characters.extend(self.store.command_holders(self.guild, f)?);
                    characters.extend(self.relations.leader(f));
                }
            }
            characters.extend(unit.commander);
        }
        Ok(characters.into_iter().collect())
    }

    /// Notify list for an order that is being failed. When the units or
    /// their command holders cannot be read, only the submitter is notified.
    pub fn failure_notify(&self, order: &Order) -> Vec<CharacterId> {
        match self.load_units(&order.unit_ids).and_then(|units| self.notify_list(&units)) {
            Ok(notify) => notify,
            Err(err) => {
                warn!(order = %order.id, error = %err, "notify list unavailable, notifying submitter only");
                Vec::new()
            }
        }
    }

    /// Marks the order FAILED, persists it and returns the ORDER_FAILED event.
    pub fn fail_order(
        &mut self,
        order: &mut Order,
        error: &OrderError,
        mut notify: Vec<CharacterId>,
    ) -> Result<TurnLog, StoreError> {
        order.fail(error, self.turn);
        self.store.save_order(self.guild, order)?;
        notify.push(order.character);
        Ok(self
            .event(
                EventSubject::Order(order.id),
                EventData::OrderFailed { order_id: order.id, error: error.to_string() },
            )
            .notifying(notify))
    }
}

/// Player-facing ids of a unit list, for event payloads.
pub fn unit_labels<'u>(units: impl IntoIterator<Item = &'u Unit>) -> Vec<String> {
    units.into_iter().map(|u| u.unit_id.clone()).collect()
}
