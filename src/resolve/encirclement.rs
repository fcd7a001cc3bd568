//! Encirclement detection.
//!
//! A land unit is encircled when no walk over the territory graph leads from
//! its position to territory controlled by its own faction or an ally. The
//! walk may cross land that is neutral, allied or held by factions the unit
//! is not at war with. Enemy land and water block it, except where an allied
//! convoy bridges the gap: territories occupied by an allied naval unit on
//! `naval_convoy`, or held by an allied aerial transport on `aerial_convoy`
//! (unless that territory is enemy-controlled).

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::{debug, info};

use crate::board::{
    EventData, EventSubject, FactionId, GuildId, Order, OrderStatus, TerritoryGraph, TerritoryId,
    TurnLog, Unit, UnitAction, UnitId,
};
use crate::config::ResolverConfig;
use crate::store::{StoreError, WorldStore};

use super::aerial::AERIAL_TRANSPORT;
use super::context::PhaseContext;
use super::relations::RelationTable;

/// A convoy bridging territories for a faction's encirclement checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvoyPosting {
    /// Every territory a naval convoy occupies.
    Naval { faction: Option<FactionId>, territories: Vec<TerritoryId> },
    /// The territory an aerial transport holds.
    Aerial { faction: Option<FactionId>, territory: TerritoryId },
}

/// The most recent naval order of a unit that still counts, i.e. not
/// failed or cancelled. Convoys complete immediately and hold until the
/// unit is given a new order, so a SUCCESS convoy is still in effect.
fn latest_naval_action(orders: &[Order], unit: UnitId) -> Option<UnitAction> {
    orders
        .iter()
        .rev()
        .filter(|o| !matches!(o.status, OrderStatus::Failed | OrderStatus::Cancelled))
        .filter(|o| o.unit_ids.contains(&unit))
        .filter_map(|o| o.unit_action())
        .find(|a| a.is_naval())
}

/// Collects every active convoy in the guild.
pub fn load_convoys(
    store: &dyn WorldStore,
    guild: GuildId,
    relations: &RelationTable,
) -> Result<Vec<ConvoyPosting>, StoreError> {
    let mut orders = store.orders(guild)?;
    orders.sort_by_key(|o| o.id);
    let units = store.units(guild)?;
    let mut postings = Vec::new();

    for unit in units.iter().filter(|u| u.is_active() && u.is_naval) {
        if latest_naval_action(&orders, unit.id) == Some(UnitAction::NavalConvoy) {
            let territories = store.naval_positions(guild, unit.id)?;
            postings.push(ConvoyPosting::Naval { faction: relations.home_faction(unit), territories });
        }
    }

    let aerial_units: BTreeSet<UnitId> = orders
        .iter()
        .filter(|o| o.is_unresolved())
        .filter(|o| o.unit_action() == Some(UnitAction::AerialConvoy))
        .flat_map(|o| o.unit_ids.iter().copied())
        .collect();
    for unit in units.iter().filter(|u| aerial_units.contains(&u.id)) {
        if !unit.is_active() || !unit.has_keyword(AERIAL_TRANSPORT) {
            continue;
        }
        if let Some(territory) = unit.current_territory.clone() {
            postings.push(ConvoyPosting::Aerial { faction: relations.home_faction(unit), territory });
        }
    }
    Ok(postings)
}

/// Relation sets and convoy bridges seen from one faction.
#[derive(Debug, Clone)]
struct FactionView {
    allied: BTreeSet<FactionId>,
    enemies: BTreeSet<FactionId>,
    convoy: BTreeSet<TerritoryId>,
}

/// Runs encirclement checks, caching per-faction views.
pub struct EncirclementDetector<'a> {
    graph: &'a TerritoryGraph,
    relations: &'a RelationTable,
    convoys: Vec<ConvoyPosting>,
    views: HashMap<FactionId, FactionView>,
}

impl<'a> EncirclementDetector<'a> {
    pub fn new(graph: &'a TerritoryGraph, relations: &'a RelationTable, convoys: Vec<ConvoyPosting>) -> Self {
        EncirclementDetector { graph, relations, convoys, views: HashMap::new() }
    }

    fn controller(&self, territory: &TerritoryId) -> Option<FactionId> {
        self.relations.controller_faction(self.graph.controller(territory))
    }

    fn build_view(&self, faction: FactionId) -> FactionView {
        let allied = self.relations.allied_set(faction);
        let enemies = self.relations.enemy_set(faction);
        let is_allied = |f: &Option<FactionId>| f.is_some_and(|f| allied.contains(&f));

        let mut convoy = BTreeSet::new();
        for posting in &self.convoys {
            match posting {
                ConvoyPosting::Naval { faction, territories } if is_allied(faction) => {
                    convoy.extend(territories.iter().cloned());
                }
                ConvoyPosting::Aerial { faction, territory } if is_allied(faction) => {
                    if !self.controller(territory).is_some_and(|c| enemies.contains(&c)) {
                        convoy.insert(territory.clone());
                    }
                }
                _ => {}
            }
        }
        FactionView { allied, enemies, convoy }
    }

    /// True if `unit` has no path to friendly territory. Units without a home
    /// faction or without a position are always encircled.
    pub fn is_encircled(&mut self, unit: &Unit, home: Option<FactionId>) -> bool {
        let (Some(home), Some(start)) = (home, unit.current_territory.as_ref()) else {
            return true;
        };
        if !self.views.contains_key(&home) {
            let view = self.build_view(home);
            self.views.insert(home, view);
        }
        let Some(view) = self.views.get(&home) else {
            return true;
        };

        let is_goal = |t: &TerritoryId| self.controller(t).is_some_and(|c| view.allied.contains(&c));
        let passable = |t: &TerritoryId| {
            view.convoy.contains(t)
                || (self.graph.is_land(t) && !self.controller(t).is_some_and(|c| view.enemies.contains(&c)))
        };

        if is_goal(start) {
            return false;
        }
        let mut visited = BTreeSet::from([start.clone()]);
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors(&current) {
                if !visited.insert(next.clone()) {
                    continue;
                }
                if is_goal(next) {
                    debug!(unit = %unit.id, reached = %next, "supply line found");
                    return false;
                }
                if passable(next) {
                    queue.push_back(next.clone());
                }
            }
        }
        true
    }
}

/// Land units subject to encirclement: active, not naval, not exempt, and
/// not riding a transport (carried land units sit on water).
fn subject_to_encirclement(unit: &Unit, graph: &TerritoryGraph, config: &ResolverConfig) -> bool {
    unit.is_mobile_land()
        && !config.is_exempt(unit)
        && unit.current_territory.as_ref().map_or(true, |t| !graph.is_water(t))
}

/// Checks every eligible unit of the guild and reports the encircled ones.
pub fn sweep(ctx: &PhaseContext<'_>) -> Result<Vec<TurnLog>, StoreError> {
    let convoys = load_convoys(&*ctx.store, ctx.guild, ctx.relations)?;
    let mut detector = EncirclementDetector::new(ctx.graph, ctx.relations, convoys);
    let mut events = Vec::new();

    for unit in ctx.store.units(ctx.guild)? {
        if !subject_to_encirclement(&unit, ctx.graph, ctx.config) {
            continue;
        }
        let home = ctx.relations.home_faction(&unit);
        if !detector.is_encircled(&unit, home) {
            continue;
        }
        let Some(territory) = unit.current_territory.clone() else {
            continue;
        };
        let notify = ctx.notify_list(std::slice::from_ref(&unit))?;
        events.push(
            ctx.event(
                EventSubject::Unit(unit.id),
                EventData::UnitEncircled { unit: unit.unit_id.clone(), territory, faction: home },
            )
            .notifying(notify),
        );
    }
    info!(encircled = events.len(), "encirclement sweep finished");
    Ok(events)
}
