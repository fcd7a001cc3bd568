//! Engagement detection during the movement tick loop.
//!
//! Two kinds of check run against the arena:
//!
//! - **standard**: moving groups that share a territory with a hostile
//!   moving group or a hostile stationary cluster stop ENGAGED;
//! - **patrol interception**: a moving patrol looks at affordable adjacent
//!   land territories in ascending id order and jumps onto the first one
//!   holding a hostile.
//!
//! Every engagement produces two mirrored ENGAGEMENT_DETECTED events, one
//! per side. Exempt units never trigger, suffer or appear in engagements.

use std::collections::{BTreeMap, HashSet};

use tracing::info;

use crate::board::{
    CharacterId, EventData, EventSubject, FactionId, MovementStatus, OrderId, TerritoryId, TurnLog,
    Unit, UnitId,
};
use crate::store::StoreError;

use super::context::{unit_labels, PhaseContext};
use super::hostility::{is_hostile, Combatant};
use super::movement::MovementUnitState;

/// Units of one faction sitting in one territory without a movement order.
#[derive(Debug, Clone)]
pub struct StationaryCluster {
    pub territory: TerritoryId,
    pub faction: FactionId,
    pub units: Vec<Unit>,
    pub notify: Vec<CharacterId>,
}

impl StationaryCluster {
    fn combatant(&self) -> Combatant {
        Combatant::new(Some(self.faction), None)
    }
}

/// Groups the guild's stationary units by territory and home faction.
/// Naval, exempt and unaffiliated units and every unit in the arena are left out.
pub fn load_clusters(
    ctx: &PhaseContext<'_>,
    states: &[MovementUnitState],
) -> Result<Vec<StationaryCluster>, StoreError> {
    let ordered: HashSet<UnitId> = states.iter().flat_map(|s| s.units.iter().map(|u| u.id)).collect();

    let mut groups: BTreeMap<(TerritoryId, FactionId), Vec<Unit>> = BTreeMap::new();
    for unit in ctx.store.units(ctx.guild)? {
        if !unit.is_mobile_land() || ctx.config.is_exempt(&unit) || ordered.contains(&unit.id) {
            continue;
        }
        let (Some(territory), Some(faction)) = (unit.current_territory.clone(), ctx.relations.home_faction(&unit)) else {
            continue;
        };
        groups.entry((territory, faction)).or_default().push(unit);
    }

    groups
        .into_iter()
        .map(|((territory, faction), units)| {
            let notify = ctx.notify_list(&units)?;
            Ok(StationaryCluster { territory, faction, units, notify })
        })
        .collect()
}

fn eligible(state: &MovementUnitState) -> bool {
    state.status == MovementStatus::Moving && !state.all_exempt
}

fn combatant(state: &MovementUnitState) -> Combatant {
    Combatant::new(state.faction, Some(state.action))
}

/// One side of an engagement, as rendered into its event.
struct Side {
    order_id: Option<OrderId>,
    subject: EventSubject,
    units: Vec<String>,
    faction: Option<FactionId>,
    notify: Vec<CharacterId>,
}

impl Side {
    fn group(ctx: &PhaseContext<'_>, state: &MovementUnitState) -> Side {
        Side {
            order_id: Some(state.order_id()),
            subject: EventSubject::Order(state.order_id()),
            units: unit_labels(state.engaging_units(ctx.config)),
            faction: state.faction,
            notify: state.notify.clone(),
        }
    }

    fn cluster(cluster: &StationaryCluster) -> Side {
        Side {
            order_id: None,
            // load_clusters never produces an empty cluster
            subject: EventSubject::Unit(cluster.units.first().map_or(UnitId(0), |u| u.id)),
            units: unit_labels(&cluster.units),
            faction: Some(cluster.faction),
            notify: cluster.notify.clone(),
        }
    }
}

fn mirrored(ctx: &PhaseContext<'_>, a: Side, b: Side, territory: &TerritoryId, interception: bool) -> [TurnLog; 2] {
    info!(territory = %territory, a = ?a.units, b = ?b.units, interception, "engagement");
    let event = |me: &Side, them: &Side| {
        ctx.event(
            me.subject,
            EventData::EngagementDetected {
                order_id: me.order_id,
                territory: territory.clone(),
                units: me.units.clone(),
                opponent_units: them.units.clone(),
                faction: me.faction,
                opponent_faction: them.faction,
                interception,
            },
        )
        .notifying(me.notify.clone())
    };
    [event(&a, &b), event(&b, &a)]
}

fn controller_of(ctx: &PhaseContext<'_>, territory: &TerritoryId) -> Option<FactionId> {
    ctx.relations.controller_faction(ctx.graph.controller(territory))
}

/// Checks co-located moving groups against each other and against
/// stationary clusters.
pub fn standard_engagements(
    ctx: &PhaseContext<'_>,
    states: &mut [MovementUnitState],
    clusters: &[StationaryCluster],
) -> Vec<TurnLog> {
    let mut events = Vec::new();
    let n = states.len();

    for i in 0..n {
        for j in (i + 1)..n {
            if !eligible(&states[i]) || !eligible(&states[j]) || states[i].current != states[j].current {
                continue;
            }
            let territory = states[i].current.clone();
            let controller = controller_of(ctx, &territory);
            if !is_hostile(&combatant(&states[i]), &combatant(&states[j]), controller, ctx.relations) {
                continue;
            }
            let (a, b) = (Side::group(ctx, &states[i]), Side::group(ctx, &states[j]));
            states[i].status = MovementStatus::Engaged;
            states[j].status = MovementStatus::Engaged;
            events.extend(mirrored(ctx, a, b, &territory, false));
        }
    }

    for state in states.iter_mut() {
        if !eligible(state) {
            continue;
        }
        let controller = controller_of(ctx, &state.current);
        let me = combatant(state);
        let hostile: Vec<&StationaryCluster> = clusters
            .iter()
            .filter(|c| c.territory == state.current && is_hostile(&me, &c.combatant(), controller, ctx.relations))
            .collect();
        if hostile.is_empty() {
            continue;
        }
        let territory = state.current.clone();
        for cluster in hostile {
            events.extend(mirrored(ctx, Side::group(ctx, state), Side::cluster(cluster), &territory, false));
        }
        state.status = MovementStatus::Engaged;
    }
    events
}

enum Target {
    Group(usize),
    Cluster(usize),
}

/// Lets every moving patrol, oldest order first, intercept one hostile in
/// an adjacent territory it can afford to enter.
pub fn patrol_interceptions(
    ctx: &PhaseContext<'_>,
    states: &mut [MovementUnitState],
    clusters: &[StationaryCluster],
) -> Vec<TurnLog> {
    let mut events = Vec::new();

    for i in 0..states.len() {
        if !states[i].is_patrol() || !eligible(&states[i]) {
            continue;
        }
        let Some((territory, cost, target)) = find_interception(ctx, states, clusters, i) else {
            continue;
        };

        states[i].enter(territory.clone(), cost);
        // The path index is left alone; the next pass walks back onto the route.
        states[i].off_route = true;
        states[i].status = MovementStatus::Engaged;
        let patrol = Side::group(ctx, &states[i]);
        let other = match target {
            Target::Group(j) => {
                states[j].status = MovementStatus::Engaged;
                Side::group(ctx, &states[j])
            }
            Target::Cluster(k) => Side::cluster(&clusters[k]),
        };
        events.extend(mirrored(ctx, patrol, other, &territory, true));
    }
    events
}

fn find_interception(
    ctx: &PhaseContext<'_>,
    states: &[MovementUnitState],
    clusters: &[StationaryCluster],
    patrol: usize,
) -> Option<(TerritoryId, u32, Target)> {
    let me = combatant(&states[patrol]);
    for neighbor in ctx.graph.neighbors(&states[patrol].current) {
        if ctx.graph.is_water(neighbor) {
            continue;
        }
        let cost = ctx.graph.terrain_cost(neighbor);
        if !states[patrol].can_afford(cost) {
            continue;
        }
        let controller = controller_of(ctx, neighbor);

        let group = states.iter().enumerate().position(|(j, other)| {
            j != patrol
                && eligible(other)
                && other.current == *neighbor
                && is_hostile(&me, &combatant(other), controller, ctx.relations)
        });
        if let Some(j) = group {
            return Some((neighbor.clone(), cost, Target::Group(j)));
        }

        let cluster = clusters.iter().position(|c| {
            c.territory == *neighbor && is_hostile(&me, &c.combatant(), controller, ctx.relations)
        });
        if let Some(k) = cluster {
            return Some((neighbor.clone(), cost, Target::Cluster(k)));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{GuildId, Order, Owner, Phase, Territory, TerritoryGraph, UnitAction, WarId};
    use crate::config::ResolverConfig;
    use crate::resolve::relations::RelationTable;
    use crate::store::{InMemoryStore, WorldStore};
    use serde_json::json;

    const GUILD: GuildId = GuildId(1);

    fn world() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for id in ["a", "b", "c"] {
            store.insert_territory(GUILD, Territory::new(id, "plains"));
        }
        store.connect(GUILD, "a", "b");
        store.connect(GUILD, "a", "c");
        store.declare_war(GUILD, WarId(1), &[FactionId(1)], &[FactionId(2)]);
        store
    }

    fn with_ctx<R>(store: &mut InMemoryStore, f: impl FnOnce(&mut PhaseContext<'_>) -> R) -> R {
        let config = ResolverConfig::default();
        let graph = TerritoryGraph::build(store.territories(GUILD).unwrap(), &store.adjacencies(GUILD).unwrap(), &config);
        let relations = RelationTable::load(&*store, GUILD).unwrap();
        let mut ctx = PhaseContext {
            guild: GUILD,
            turn: 1,
            phase: Phase::Movement,
            store,
            graph: &graph,
            relations: &relations,
            config: &config,
        };
        f(&mut ctx)
    }

    fn group(id: i64, faction: i64, at: &str, action: UnitAction) -> MovementUnitState {
        let unit = Unit::new(UnitId(id), Owner::Faction(FactionId(faction)), at);
        MovementUnitState {
            order: Order::unit(OrderId(id), CharacterId(1), vec![unit.id], json!({})),
            units: vec![unit],
            faction: Some(FactionId(faction)),
            action,
            path: vec![at.into(), "a".into()],
            path_index: 0,
            speed: None,
            total_mp: 1,
            remaining_mp: 1,
            mp_spent: 0,
            status: MovementStatus::Moving,
            current: at.into(),
            entered: Vec::new(),
            blocked_at: None,
            off_route: false,
            transport: None,
            notify: Vec::new(),
            all_exempt: false,
        }
    }

    #[test]
    fn clusters_skip_ordered_naval_and_exempt_units() {
        let mut store = world();
        let mut ship = Unit::new(UnitId(2), Owner::Faction(FactionId(2)), "b");
        ship.is_naval = true;
        let mut scout = Unit::new(UnitId(3), Owner::Faction(FactionId(2)), "b");
        scout.keywords.push("aerial".into());
        store.insert_unit(GUILD, Unit::new(UnitId(1), Owner::Faction(FactionId(1)), "a"));
        store.insert_unit(GUILD, ship);
        store.insert_unit(GUILD, scout);
        store.insert_unit(GUILD, Unit::new(UnitId(4), Owner::Faction(FactionId(2)), "b"));
        store.insert_unit(GUILD, Unit::new(UnitId(5), Owner::Faction(FactionId(2)), "b"));

        let clusters = with_ctx(&mut store, |ctx| {
            let states = [group(1, 1, "a", UnitAction::Transit)];
            load_clusters(ctx, &states).unwrap()
        });
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].territory.as_str(), "b");
        let ids: Vec<UnitId> = clusters[0].units.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![UnitId(4), UnitId(5)]);
    }

    #[test]
    fn clusters_notify_command_holders_and_leader() {
        let mut store = world();
        store.insert_faction(GUILD, crate::board::Faction { id: FactionId(2), name: "Blue".into(), leader: Some(CharacterId(7)) });
        store.grant_command(GUILD, FactionId(2), CharacterId(8));
        store.insert_unit(GUILD, Unit::new(UnitId(4), Owner::Faction(FactionId(2)), "b"));

        let clusters = with_ctx(&mut store, |ctx| load_clusters(ctx, &[]).unwrap());
        assert_eq!(clusters[0].notify, vec![CharacterId(7), CharacterId(8)]);
    }

    #[test]
    fn exempt_groups_are_not_engaged() {
        let mut store = world();
        with_ctx(&mut store, |ctx| {
            let mut ghost = group(2, 2, "a", UnitAction::Transit);
            ghost.all_exempt = true;
            let mut states = [group(1, 1, "a", UnitAction::Transit), ghost];
            assert!(standard_engagements(ctx, &mut states, &[]).is_empty());
            assert!(states.iter().all(|s| s.status == MovementStatus::Moving));
        });
    }

    #[test]
    fn group_engages_each_hostile_cluster_once() {
        let mut store = world();
        store.declare_war(GUILD, WarId(2), &[FactionId(1)], &[FactionId(3)]);
        store.insert_unit(GUILD, Unit::new(UnitId(2), Owner::Faction(FactionId(2)), "b"));
        store.insert_unit(GUILD, Unit::new(UnitId(3), Owner::Faction(FactionId(3)), "b"));
        with_ctx(&mut store, |ctx| {
            let mut states = [group(1, 1, "b", UnitAction::Transit)];
            let clusters = load_clusters(ctx, &states).unwrap();
            assert_eq!(clusters.len(), 2);

            let events = standard_engagements(ctx, &mut states, &clusters);
            assert_eq!(events.len(), 4);
            assert_eq!(states[0].status, MovementStatus::Engaged);
            let opponents: Vec<Option<FactionId>> = events
                .iter()
                .filter_map(|e| match &e.data {
                    EventData::EngagementDetected { order_id: Some(_), opponent_faction, .. } => Some(*opponent_faction),
                    _ => None,
                })
                .collect();
            assert_eq!(opponents, vec![Some(FactionId(2)), Some(FactionId(3))]);
        });
    }

    #[test]
    fn patrol_jumps_onto_hostile_group() {
        let mut store = world();
        with_ctx(&mut store, |ctx| {
            let mut states = [group(1, 1, "a", UnitAction::Patrol), group(2, 2, "c", UnitAction::Transit)];
            let events = patrol_interceptions(ctx, &mut states, &[]);
            assert_eq!(events.len(), 2);
            assert_eq!(states[0].current.as_str(), "c");
            assert!(states[0].off_route);
            assert_eq!(states[0].path_index, 0);
            assert_eq!(states[0].remaining_mp, 0);
            assert_eq!(states[1].status, MovementStatus::Engaged);
        });
    }

    #[test]
    fn patrol_ignores_targets_it_cannot_afford() {
        let mut store = world();
        with_ctx(&mut store, |ctx| {
            let mut patrol = group(1, 1, "a", UnitAction::Patrol);
            patrol.remaining_mp = 0;
            let mut states = [patrol, group(2, 2, "b", UnitAction::Transit)];
            assert!(patrol_interceptions(ctx, &mut states, &[]).is_empty());
            assert_eq!(states[0].status, MovementStatus::Moving);
        });
    }
}
