//! Land transport: walking to the coast, boarding a naval transport, riding
//! it and disembarking.
//!
//! A land `transport` order names a land `path`, the `water_path` of the
//! naval transport it wants and a `landing` territory. At the end of its land
//! path the group boards the lowest-id matching naval transport that is
//! still docked. From then on the group's position follows the ships until
//! the naval order completes (the group lands) or is lost (the group is
//! disbanded).

use tracing::{debug, info};

use crate::board::{
    EventData, EventSubject, LandProgress, MovementStatus, NavalProgress, Order, OrderError,
    OrderId, OrderStatus, Phase, TerritoryGraph, TerritoryId, TurnLog, Unit, UnitAction,
    UnitOrderData, UNIT_ORDER,
};

use super::context::{unit_labels, PhaseContext};
use super::movement::{disband_units, MovementUnitState};
use super::naval;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPlan {
    pub water_path: Vec<TerritoryId>,
    pub landing: TerritoryId,
    /// The naval transport order carrying the group, once boarded.
    pub carrier: Option<OrderId>,
    pub landed: bool,
    pub lost: bool,
}

impl TransportPlan {
    pub fn validate(
        graph: &TerritoryGraph,
        data: &UnitOrderData,
        progress: &LandProgress,
    ) -> Result<Self, OrderError> {
        let last = data
            .water_path
            .last()
            .ok_or_else(|| OrderError::MalformedPayload("transport order needs a water_path".into()))?;
        for territory in &data.water_path {
            if !graph.is_water(territory) {
                return Err(OrderError::NotWater(territory.clone()));
            }
        }
        let landing = data
            .landing
            .clone()
            .ok_or_else(|| OrderError::MalformedPayload("transport order needs a landing".into()))?;
        if !graph.is_land(&landing) || !graph.is_adjacent(&landing, last) {
            return Err(OrderError::InvalidLanding(landing));
        }
        Ok(TransportPlan {
            water_path: data.water_path.clone(),
            landing,
            carrier: progress.transport_order,
            landed: false,
            lost: false,
        })
    }
}

fn friendly(ctx: &PhaseContext<'_>, ship: &Unit, state: &MovementUnitState) -> bool {
    match (ctx.relations.home_faction(ship), state.faction) {
        (Some(a), Some(b)) => ctx.relations.are_allied(a, b),
        _ => state.units.first().is_some_and(|u| u.owner == ship.owner),
    }
}

/// Boards the group onto the first suitable docked naval transport.
/// Returns the TRANSPORT_BOARDED event, or `None` if nothing could take it.
pub fn try_board(ctx: &mut PhaseContext<'_>, state: &mut MovementUnitState) -> Result<Option<TurnLog>, OrderError> {
    let Some(water_path) = state.transport.as_ref().map(|p| p.water_path.clone()) else {
        return Ok(None);
    };
    let cargo_size: u32 = state.units.iter().map(|u| u.size).sum();

    let mut candidates: Vec<Order> = ctx
        .store
        .unresolved_orders(ctx.guild, Phase::Movement)?
        .into_iter()
        .filter(|o| o.order_type == UNIT_ORDER && o.status == OrderStatus::Ongoing)
        .collect();
    candidates.sort_by_key(|o| o.id);

    for mut carrier in candidates {
        let Ok(data) = UnitOrderData::parse(&carrier.order_data) else {
            continue;
        };
        if data.action != UnitAction::NavalTransport || data.path != water_path {
            continue;
        }
        let progress = NavalProgress::from_result(&carrier.result_data);
        if progress.window_active || !ctx.graph.is_adjacent(&state.current, &data.path[0]) {
            continue;
        }
        let ships: Vec<Unit> = ctx
            .load_units(&carrier.unit_ids)?
            .into_iter()
            .filter(|u| u.is_naval && u.is_active())
            .collect();
        if ships.is_empty() || !ships.iter().all(|s| friendly(&*ctx, s, &*state)) {
            continue;
        }
        let carried: u32 = ctx.load_units(&progress.carrying_units)?.iter().map(|u| u.size).sum();
        if naval::remaining_capacity(&ships, carried) < cargo_size {
            debug!(order = %carrier.id, cargo_size, carried, "transport full");
            continue;
        }

        naval::load_cargo(&mut carrier, &state.units)?;
        ctx.store.save_order(ctx.guild, &carrier)?;

        let dock = data.path[0].clone();
        state.status = MovementStatus::Transported;
        state.current = dock.clone();
        state.entered.push(dock.clone());
        if let Some(plan) = state.transport.as_mut() {
            plan.carrier = Some(carrier.id);
        }
        info!(order = %state.order_id(), carrier = %carrier.id, territory = %dock, "cargo boarded");

        let event = ctx
            .event(
                EventSubject::Order(state.order_id()),
                EventData::TransportBoarded {
                    order_id: state.order_id(),
                    naval_order_id: carrier.id,
                    units: unit_labels(&state.units),
                    territory: dock,
                },
            )
            .notifying(state.notify.clone());
        return Ok(Some(event));
    }

    debug!(order = %state.order_id(), "no transport available to board");
    Ok(None)
}

/// Moves an already-boarded group along with its carrier, landing it when
/// the carrier's order has completed and flagging it lost when the carrier
/// is gone.
pub fn ride(ctx: &mut PhaseContext<'_>, state: &mut MovementUnitState) -> Result<(), OrderError> {
    let Some(plan) = state.transport.as_mut() else {
        return Err(OrderError::Internal("transported group without a transport plan".into()));
    };
    let carrier = match plan.carrier {
        Some(id) => ctx.store.order(ctx.guild, id)?,
        None => None,
    };
    let Some(carrier) = carrier.filter(|o| !matches!(o.status, OrderStatus::Failed | OrderStatus::Cancelled)) else {
        plan.lost = true;
        return Ok(());
    };
    let ships: Vec<Unit> = ctx
        .load_units(&carrier.unit_ids)?
        .into_iter()
        .filter(|u| u.is_naval && u.is_active())
        .collect();
    let Some(flagship) = ships.first() else {
        plan.lost = true;
        return Ok(());
    };

    if carrier.status == OrderStatus::Success {
        plan.landed = true;
        state.current = plan.landing.clone();
        state.entered.push(plan.landing.clone());
        state.path_index = state.path.len() - 1;
        state.status = MovementStatus::PathComplete;
        info!(order = %state.order_id(), landing = %state.current, "cargo landed");
    } else if let Some(position) = flagship.current_territory.clone() {
        if position != state.current {
            state.entered.push(position.clone());
            state.current = position;
        }
    }
    Ok(())
}

/// Disbands a group whose carrier was lost and fails its order.
pub fn lose_cargo(ctx: &mut PhaseContext<'_>, state: &mut MovementUnitState) -> Result<Vec<TurnLog>, OrderError> {
    disband_units(ctx, state)?;
    let carrier = state.transport.as_ref().and_then(|p| p.carrier);
    state.order.fail(&OrderError::TransportLost, ctx.turn);
    ctx.store.save_order(ctx.guild, &state.order)?;
    info!(order = %state.order_id(), carrier = ?carrier, "cargo lost");

    Ok(vec![ctx
        .event(
            EventSubject::Order(state.order_id()),
            EventData::TransportLost {
                order_id: state.order_id(),
                naval_order_id: carrier,
                units: unit_labels(&state.units),
            },
        )
        .notifying(state.notify.clone())])
}
