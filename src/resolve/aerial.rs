//! Aerial convoys.
//!
//! An aerial-transport unit on an `aerial_convoy` order holds its current
//! territory and bridges it for encirclement purposes. The order never
//! completes on its own; it stays ONGOING until superseded or cancelled.

use serde_json::json;
use tracing::info;

use crate::board::{EventData, EventSubject, Order, OrderError, OrderStatus, TurnLog, Unit, UnitOrderData};

use super::context::{unit_labels, PhaseContext};

pub const AERIAL_TRANSPORT: &str = "aerial-transport";

pub fn resolve_aerial_convoy(
    ctx: &mut PhaseContext<'_>,
    order: &mut Order,
    data: &UnitOrderData,
) -> Result<Vec<TurnLog>, OrderError> {
    let units: Vec<Unit> = ctx
        .load_units(&order.unit_ids)?
        .into_iter()
        .filter(|u| u.is_active() && !u.is_naval)
        .collect();
    if units.is_empty() {
        return Err(OrderError::NoValidLandUnits);
    }
    if let Some(unit) = units.iter().find(|u| !u.has_keyword(AERIAL_TRANSPORT)) {
        return Err(OrderError::MissingAerialTransport(unit.unit_id.clone()));
    }

    let station = data.path.first().ok_or(OrderError::PathTooShort { min: 1 })?;
    if !ctx.graph.contains(station) {
        return Err(OrderError::UnknownTerritory(station.clone()));
    }
    if let Some(unit) = units.iter().find(|u| !u.is_in(station)) {
        let actual = unit.current_territory.clone().ok_or(OrderError::NoPosition(unit.id))?;
        return Err(OrderError::StaleOrder { expected: station.clone(), actual });
    }

    let established = order.status == OrderStatus::Pending;
    order.status = OrderStatus::Ongoing;
    order.result_data = json!({ "territory": station, "active": true });
    order.updated_turn = Some(ctx.turn);
    ctx.store.save_order(ctx.guild, order)?;

    if !established {
        return Ok(Vec::new());
    }
    info!(order = %order.id, territory = %station, "aerial convoy established");
    let notify = ctx.notify_list(&units)?;
    Ok(vec![ctx
        .event(
            EventSubject::Order(order.id),
            EventData::ConvoyEstablished {
                order_id: order.id,
                units: unit_labels(&units),
                territory: Some(station.clone()),
            },
        )
        .notifying(notify)])
}
