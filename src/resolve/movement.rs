//! Land movement state machine.
//!
//! Every MOVEMENT pass turns the unresolved land orders into an arena of
//! [`MovementUnitState`] values, sorted by order id. Ticks count down from
//! the largest MP budget in the arena; a group steps once per tick while its
//! budget is at least the tick number, paying the terrain cost of the
//! territory it enters. After every tick the engagement checks run, and a
//! group that ends up ENGAGED, OUT_OF_MP or at the end of its path stops.
//! Only a handful of fields survive the pass: they are folded into the
//! order's `result_data` by [`finalize`].

use tracing::{debug, info, warn};

use crate::board::{
    CharacterId, EventData, EventSubject, FactionId, LandProgress, MovementStatus, Order,
    OrderError, OrderId, OrderStatus, TerritoryGraph, TerritoryId, TurnLog, Unit, UnitAction,
    UnitOrderData, UnitStatus,
};
use crate::config::ResolverConfig;
use crate::store::StoreError;

use super::context::{unit_labels, PhaseContext};
use super::engagement::{self, StationaryCluster};
use super::transport::{self, TransportPlan};

/// Per-order aggregate for one MOVEMENT pass. Never persisted as such.
#[derive(Debug, Clone)]
pub struct MovementUnitState {
    pub order: Order,
    pub units: Vec<Unit>,
    pub faction: Option<FactionId>,
    pub action: UnitAction,
    pub path: Vec<TerritoryId>,
    pub path_index: usize,
    /// Patrol only.
    pub speed: Option<u32>,
    pub total_mp: u32,
    pub remaining_mp: u32,
    pub mp_spent: u32,
    pub status: MovementStatus,
    pub current: TerritoryId,
    pub entered: Vec<TerritoryId>,
    /// Territory that could not be afforded, with its cost.
    pub blocked_at: Option<(TerritoryId, u32)>,
    /// A patrol pulled off its route by an interception walks back to
    /// `path[path_index]` before continuing.
    pub off_route: bool,
    pub transport: Option<TransportPlan>,
    pub notify: Vec<CharacterId>,
    /// True when every unit is engagement-exempt.
    pub all_exempt: bool,
}

/// Result of a single [`MovementUnitState::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved,
    /// Next territory costs more than the remaining MP.
    Blocked,
    /// Patrol speed cap reached; the group waits without running out of MP.
    Held,
    PathEnd,
}

/// MP budget: slowest unit plus one for plain transit and transport.
pub fn movement_points(units: &[Unit], action: UnitAction) -> u32 {
    let slowest = units.iter().map(|u| u.movement).min().unwrap_or(0);
    match action {
        UnitAction::Transit | UnitAction::Transport => slowest + 1,
        _ => slowest,
    }
}

impl MovementUnitState {
    pub fn order_id(&self) -> OrderId {
        self.order.id
    }

    pub fn is_patrol(&self) -> bool {
        self.action == UnitAction::Patrol
    }

    pub fn is_moving(&self) -> bool {
        self.status == MovementStatus::Moving
    }

    pub fn at_path_end(&self) -> bool {
        !self.off_route && self.path_index + 1 >= self.path.len()
    }

    /// Units that can take part in an engagement.
    pub fn engaging_units<'a>(&'a self, config: &'a ResolverConfig) -> impl Iterator<Item = &'a Unit> + 'a {
        self.units.iter().filter(move |u| !config.is_exempt(u))
    }

    fn next_index(&self) -> Option<usize> {
        if self.off_route {
            return Some(self.path_index);
        }
        let next = self.path_index + 1;
        if next < self.path.len() {
            return Some(next);
        }
        if !self.is_patrol() {
            return None;
        }
        // A closed loop ends where it starts, so it resumes from the second stop.
        if self.path.len() > 1 && self.path.first() == self.path.last() {
            Some(1)
        } else {
            Some(0)
        }
    }

    /// True if the group may spend `cost` more MP this pass.
    pub fn can_afford(&self, cost: u32) -> bool {
        cost <= self.remaining_mp && self.speed.map_or(true, |cap| self.mp_spent + cost <= cap)
    }

    /// Enters `territory` without touching the path index.
    pub fn enter(&mut self, territory: TerritoryId, cost: u32) {
        self.remaining_mp -= cost;
        self.mp_spent += cost;
        self.current = territory.clone();
        self.entered.push(territory);
    }

    /// Advances one territory along the path.
    pub fn step(&mut self, graph: &TerritoryGraph) -> StepOutcome {
        let Some(next) = self.next_index() else {
            self.status = MovementStatus::PathComplete;
            return StepOutcome::PathEnd;
        };
        let target = self.path[next].clone();
        let cost = graph.terrain_cost(&target);

        if cost > self.remaining_mp {
            self.status = MovementStatus::OutOfMp;
            self.blocked_at = Some((target, cost));
            return StepOutcome::Blocked;
        }
        if !self.can_afford(cost) {
            return StepOutcome::Held;
        }

        self.enter(target, cost);
        self.path_index = next;
        self.off_route = false;
        StepOutcome::Moved
    }
}

/// Validates a land order and builds its arena entry.
pub fn build_state(
    ctx: &PhaseContext<'_>,
    order: &Order,
    data: &UnitOrderData,
) -> Result<MovementUnitState, OrderError> {
    let units: Vec<Unit> = ctx
        .load_units(&order.unit_ids)?
        .into_iter()
        .filter(Unit::is_mobile_land)
        .collect();
    let first = units.first().ok_or(OrderError::NoValidLandUnits)?;
    let current = first.current_territory.clone().ok_or(OrderError::NotColocated)?;
    if units.iter().any(|u| !u.is_in(&current)) {
        return Err(OrderError::NotColocated);
    }

    let min_len = if data.action == UnitAction::Transport { 1 } else { 2 };
    if data.path.len() < min_len {
        return Err(OrderError::PathTooShort { min: min_len });
    }
    for territory in &data.path {
        if !ctx.graph.contains(territory) {
            return Err(OrderError::UnknownTerritory(territory.clone()));
        }
        if ctx.graph.is_water(territory) {
            return Err(OrderError::ImpassableTerrain(territory.clone()));
        }
    }
    for pair in data.path.windows(2) {
        if !ctx.graph.is_adjacent(&pair[0], &pair[1]) {
            return Err(OrderError::NotAdjacent(pair[0].clone(), pair[1].clone()));
        }
    }
    if data.action == UnitAction::Patrol {
        let (first, last) = (&data.path[0], &data.path[data.path.len() - 1]);
        if first != last && !ctx.graph.is_adjacent(last, first) {
            return Err(OrderError::NotAdjacent(last.clone(), first.clone()));
        }
    }

    let ongoing = order.status == OrderStatus::Ongoing;
    let progress = if ongoing { LandProgress::from_result(&order.result_data) } else { LandProgress::default() };
    let path_index = progress.path_index.min(data.path.len() - 1);

    let mut off_route = false;
    if !progress.transported && data.path[path_index] != current {
        if ongoing && data.action == UnitAction::Patrol {
            off_route = true;
        } else {
            return Err(OrderError::StaleOrder { expected: data.path[path_index].clone(), actual: current });
        }
    }

    let transport = match data.action {
        UnitAction::Transport => Some(TransportPlan::validate(ctx.graph, data, &progress)?),
        _ => None,
    };

    let total_mp = movement_points(&units, data.action);
    let all_exempt = units.iter().all(|u| ctx.config.is_exempt(u));
    let faction = ctx.relations.home_faction(first);
    let notify = ctx.notify_list(&units)?;
    let status = if progress.transported { MovementStatus::Transported } else { MovementStatus::Moving };

    Ok(MovementUnitState {
        order: order.clone(),
        units,
        faction,
        action: data.action,
        path: data.path.clone(),
        path_index,
        speed: if data.action == UnitAction::Patrol { data.speed } else { None },
        total_mp,
        remaining_mp: total_mp,
        mp_spent: 0,
        status,
        current,
        entered: Vec::new(),
        blocked_at: None,
        off_route,
        transport,
        notify,
        all_exempt,
    })
}

fn blocked_event(ctx: &PhaseContext<'_>, state: &MovementUnitState) -> Option<TurnLog> {
    let (blocked_at, cost) = state.blocked_at.clone()?;
    Some(
        ctx.event(
            EventSubject::Order(state.order_id()),
            EventData::MovementBlocked {
                order_id: state.order_id(),
                units: unit_labels(&state.units),
                territory: Some(state.current.clone()),
                blocked_at,
                cost,
                remaining_mp: state.remaining_mp,
            },
        )
        .notifying(state.notify.clone()),
    )
}

/// Runs the tick loop over the arena. Pure apart from event construction.
pub fn run_ticks(
    ctx: &PhaseContext<'_>,
    states: &mut [MovementUnitState],
    clusters: &[StationaryCluster],
) -> Vec<TurnLog> {
    let mut events = engagement::patrol_interceptions(ctx, states, clusters);
    let max_mp = states.iter().map(|s| s.total_mp).max().unwrap_or(0);

    for tick in (1..=max_mp).rev() {
        for state in states.iter_mut() {
            if !state.is_moving() || state.total_mp < tick {
                continue;
            }
            match state.step(ctx.graph) {
                StepOutcome::Moved => {
                    debug!(order = %state.order_id(), territory = %state.current, remaining = state.remaining_mp, "step");
                }
                StepOutcome::Blocked => events.extend(blocked_event(ctx, state)),
                StepOutcome::Held | StepOutcome::PathEnd => {}
            }
        }
        events.extend(engagement::standard_engagements(ctx, states, clusters));
        events.extend(engagement::patrol_interceptions(ctx, states, clusters));
    }
    events
}

/// Persists positions and progress of one group and returns its summary event.
pub fn finalize(ctx: &mut PhaseContext<'_>, state: &mut MovementUnitState) -> Result<Vec<TurnLog>, OrderError> {
    if let Some(plan) = &state.transport {
        if plan.lost {
            return transport::lose_cargo(ctx, state);
        }
    }

    for unit in &mut state.units {
        unit.current_territory = Some(state.current.clone());
        ctx.store.save_unit(ctx.guild, unit)?;
    }

    let complete = match &state.transport {
        Some(plan) => plan.landed,
        None => !state.is_patrol() && state.at_path_end(),
    };
    let transported = state.status == MovementStatus::Transported;
    let progress = LandProgress {
        path_index: state.path_index,
        final_territory: Some(state.current.clone()),
        steps_taken: state.entered.len(),
        status: Some(state.status),
        blocked: state.blocked_at.as_ref().map(|(t, _)| t.clone()),
        completed: complete,
        transported,
        transport_order: state.transport.as_ref().and_then(|p| p.carrier),
        territories_entered: state.entered.clone(),
    };

    let order = &mut state.order;
    order.status = if complete { OrderStatus::Success } else { OrderStatus::Ongoing };
    order.result_data = serde_json::to_value(&progress).map_err(|e| OrderError::Internal(e.to_string()))?;
    order.updated_turn = Some(ctx.turn);
    ctx.store.save_order(ctx.guild, order)?;

    let units = unit_labels(&state.units);
    let data = if complete {
        EventData::TransitComplete {
            order_id: order.id,
            units,
            action: state.action,
            territory: Some(state.current.clone()),
            steps_taken: progress.steps_taken,
        }
    } else {
        EventData::TransitProgress {
            order_id: order.id,
            units,
            action: state.action,
            territory: Some(state.current.clone()),
            path_index: state.path_index,
            steps_taken: progress.steps_taken,
            status: state.status,
            transported,
        }
    };
    Ok(vec![ctx.event(EventSubject::Order(order.id), data).notifying(state.notify.clone())])
}

/// Resolves every land order of the MOVEMENT phase as one batch.
///
/// Orders that fail validation, boarding or persistence are failed
/// individually; only failures loading the stationary units abort the pass.
pub fn resolve_land_orders(
    ctx: &mut PhaseContext<'_>,
    orders: Vec<(Order, UnitOrderData)>,
) -> Result<Vec<TurnLog>, StoreError> {
    let mut events = Vec::new();
    let mut states = Vec::with_capacity(orders.len());

    for (mut order, data) in orders {
        match build_state(ctx, &order, &data) {
            Ok(state) => states.push(state),
            Err(err) => {
                warn!(order = %order.id, error = %err, "land order rejected");
                let notify = ctx.failure_notify(&order);
                events.push(ctx.fail_order(&mut order, &err, notify)?);
            }
        }
    }
    states.sort_by_key(|s| s.order_id());

    let mut failed = Vec::new();
    for (i, state) in states.iter_mut().enumerate() {
        if state.status == MovementStatus::Transported {
            if let Err(err) = transport::ride(ctx, state) {
                failed.push((i, err));
            }
        }
    }

    let clusters = engagement::load_clusters(ctx, &states)?;
    events.extend(run_ticks(ctx, &mut states, &clusters));

    for (i, state) in states.iter_mut().enumerate() {
        let boarding = state.transport.is_some()
            && state.status != MovementStatus::Engaged
            && state.status != MovementStatus::Transported
            && state.at_path_end();
        if boarding && !failed.iter().any(|(j, _)| *j == i) {
            match transport::try_board(ctx, state) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => failed.push((i, err)),
            }
        }
    }

    let mut completed = 0;
    for (i, state) in states.iter_mut().enumerate() {
        let result = match failed.iter().find(|(j, _)| *j == i) {
            Some((_, err)) => Err(err.clone()),
            None => finalize(ctx, state),
        };
        match result {
            Ok(evts) => {
                completed += usize::from(state.order.status == OrderStatus::Success);
                events.extend(evts);
            }
            Err(err) => {
                warn!(order = %state.order_id(), error = %err, "land order failed");
                let notify = state.notify.clone();
                events.push(ctx.fail_order(&mut state.order, &err, notify)?);
            }
        }
    }

    info!(orders = states.len(), completed, "land movement resolved");
    Ok(events)
}

/// Marks every unit of the group disbanded.
pub(crate) fn disband_units(ctx: &mut PhaseContext<'_>, state: &mut MovementUnitState) -> Result<(), StoreError> {
    for unit in &mut state.units {
        unit.status = UnitStatus::Disbanded;
        ctx.store.save_unit(ctx.guild, unit)?;
    }
    Ok(())
}
