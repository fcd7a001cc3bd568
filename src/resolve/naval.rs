//! Naval positioning.
//!
//! A naval group does not sit in one territory: it occupies a window of its
//! order's water path. The window size comes from the slowest unit's
//! movement (plus one for transit). Convoys and patrols hold the head of the
//! path; transits slide forward one window per turn; transports wait on the
//! first territory until cargo boards and then slide like a transit.

use tracing::{debug, info};

use crate::board::{
    EventData, EventSubject, NavalProgress, Order, OrderError, OrderStatus, TerritoryId, TurnLog,
    Unit, UnitAction, UnitOrderData,
};

use super::context::{unit_labels, PhaseContext};

/// Number of territories a naval group spans for this action.
pub fn window_size(action: UnitAction, units: &[Unit]) -> usize {
    let slowest = units.iter().map(|u| u.movement).min().unwrap_or(0) as usize;
    match action {
        UnitAction::NavalTransit => slowest + 1,
        _ => slowest,
    }
}

/// Territories covered by the window `[start, start + window)`. A window
/// running past the end of the path collapses to the final territory.
pub fn sliding_window(path: &[TerritoryId], start: usize, window: usize) -> Vec<TerritoryId> {
    let end = start + window;
    if end > path.len() {
        return path.last().cloned().into_iter().collect();
    }
    path[start..end].to_vec()
}

/// Where a naval order puts its units this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavalPlacement {
    pub occupied: Vec<TerritoryId>,
    pub progress: NavalProgress,
}

/// Computes the placement for one resolution. `previous` is the order's
/// stored progress and `ongoing` whether it was resolved before.
pub fn place(
    action: UnitAction,
    path: &[TerritoryId],
    window: usize,
    previous: &NavalProgress,
    ongoing: bool,
) -> NavalPlacement {
    let mut progress = if ongoing { previous.clone() } else { NavalProgress::default() };

    let occupied = match action {
        UnitAction::NavalTransit => {
            if ongoing {
                progress.window_start_index += window;
            }
            progress.path_complete = progress.window_start_index + window >= path.len();
            sliding_window(path, progress.window_start_index, window)
        }
        UnitAction::NavalTransport => {
            if progress.waiting_for_cargo {
                progress.path_complete = false;
                path.first().cloned().into_iter().collect()
            } else {
                if progress.window_active {
                    progress.window_start_index += window;
                } else {
                    progress.window_start_index = 0;
                    progress.window_active = true;
                }
                progress.path_complete = progress.window_start_index + window >= path.len();
                sliding_window(path, progress.window_start_index, window)
            }
        }
        _ => {
            progress.path_complete = true;
            path[..window.min(path.len())].to_vec()
        }
    };

    progress.occupied_territories = occupied.clone();
    NavalPlacement { occupied, progress }
}

/// Checks a naval order against the map and the units' current positions.
pub fn validate(
    ctx: &PhaseContext<'_>,
    action: UnitAction,
    path: &[TerritoryId],
    units: &[Unit],
    window: usize,
) -> Result<(), OrderError> {
    if path.is_empty() {
        return Err(OrderError::PathTooShort { min: 1 });
    }
    if window == 0 {
        return Err(OrderError::ImmobileNavalUnits);
    }
    for territory in path {
        if !ctx.graph.contains(territory) {
            return Err(OrderError::UnknownTerritory(territory.clone()));
        }
        if !ctx.graph.is_water(territory) {
            return Err(OrderError::NotWater(territory.clone()));
        }
    }

    for unit in units {
        let current = ctx.store.naval_positions(ctx.guild, unit.id)?;
        if !current.is_empty() {
            if !current.iter().any(|t| path.contains(t)) {
                return Err(OrderError::NoOverlap);
            }
            continue;
        }
        match &unit.current_territory {
            None => return Err(OrderError::NoPosition(unit.id)),
            Some(t) if !path.contains(t) => {
                return Err(OrderError::FirstOrderMissingTerritory(t.clone()))
            }
            Some(_) => {}
        }
    }

    if matches!(action, UnitAction::NavalConvoy | UnitAction::NavalPatrol) && path.len() > window {
        return Err(OrderError::TooManyTerritories { len: path.len(), max: window });
    }
    if action == UnitAction::NavalTransport && !ctx.graph.touches_land(&path[0]) {
        return Err(OrderError::TransportNotCoastal(path[0].clone()));
    }
    Ok(())
}

/// Resolves one naval order: validates it, moves its units' occupied sets and
/// writes the new progress back to the order.
pub fn resolve_naval_order(
    ctx: &mut PhaseContext<'_>,
    order: &mut Order,
    data: &UnitOrderData,
) -> Result<Vec<TurnLog>, OrderError> {
    let units: Vec<Unit> = ctx
        .load_units(&order.unit_ids)?
        .into_iter()
        .filter(|u| u.is_naval && u.is_active())
        .collect();
    if units.is_empty() {
        return Err(OrderError::NoValidNavalUnits);
    }

    let window = window_size(data.action, &units);
    validate(ctx, data.action, &data.path, &units, window)?;

    let previous = NavalProgress::from_result(&order.result_data);
    let ongoing = order.status == OrderStatus::Ongoing;
    let NavalPlacement { occupied, progress } = place(data.action, &data.path, window, &previous, ongoing);

    for unit in &units {
        ctx.store.set_naval_positions(ctx.guild, unit.id, &occupied)?;
        if let Some(first) = occupied.first() {
            let mut moved = unit.clone();
            moved.current_territory = Some(first.clone());
            ctx.store.save_unit(ctx.guild, &moved)?;
        }
    }

    order.status = if progress.path_complete { OrderStatus::Success } else { OrderStatus::Ongoing };
    order.result_data = serde_json::to_value(&progress).map_err(|e| OrderError::Internal(e.to_string()))?;
    order.updated_turn = Some(ctx.turn);
    ctx.store.save_order(ctx.guild, order)?;

    let labels = unit_labels(&units);
    let payload = match data.action {
        UnitAction::NavalConvoy | UnitAction::NavalPatrol => EventData::NavalPositionSet {
            order_id: order.id,
            units: labels,
            action: data.action,
            occupied_territories: occupied.clone(),
        },
        UnitAction::NavalTransport if progress.waiting_for_cargo => EventData::NavalWaiting {
            order_id: order.id,
            units: labels,
            occupied_territories: occupied.clone(),
        },
        _ if progress.path_complete => EventData::NavalTransitComplete {
            order_id: order.id,
            units: labels,
            action: data.action,
            occupied_territories: occupied.clone(),
            carrying_units: progress.carrying_units.clone(),
        },
        _ => EventData::NavalTransitProgress {
            order_id: order.id,
            units: labels,
            action: data.action,
            occupied_territories: occupied.clone(),
            window_start_index: progress.window_start_index,
            carrying_units: progress.carrying_units.clone(),
        },
    };

    info!(
        order = %order.id,
        action = data.action.as_str(),
        occupied = ?occupied,
        complete = progress.path_complete,
        "naval order resolved"
    );
    let notify = ctx.notify_list(&units)?;
    Ok(vec![ctx.event(EventSubject::Order(order.id), payload).notifying(notify)])
}

/// Records boarded cargo on a naval transport order.
pub fn load_cargo(order: &mut Order, cargo: &[Unit]) -> Result<(), OrderError> {
    let mut progress = NavalProgress::from_result(&order.result_data);
    progress.waiting_for_cargo = false;
    progress.carrying_units.extend(cargo.iter().map(|u| u.id));
    debug!(order = %order.id, carrying = ?progress.carrying_units, "cargo boarded");
    order.result_data = serde_json::to_value(&progress).map_err(|e| OrderError::Internal(e.to_string()))?;
    Ok(())
}

/// Cargo space left on a naval transport.
pub fn remaining_capacity(naval_units: &[Unit], carried_size: u32) -> u32 {
    let capacity: u32 = naval_units.iter().map(|u| u.capacity).sum();
    capacity.saturating_sub(carried_size)
}
