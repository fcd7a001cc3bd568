//! Phase sequencing.
//!
//! A turn runs every phase in [`ALL_PHASES`] order. Each phase fetches its
//! unresolved orders by priority and hands them to a resolver: the built-in
//! unit resolvers during MOVEMENT (naval first, then aerial convoys, then
//! the land batch), and the registered [`OrderHandler`] for every other
//! order type. UPKEEP finishes with the encirclement sweep.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::board::{
    GuildId, Order, OrderError, OrderPayload, Phase, TerritoryGraph, TurnLog, UnitOrderData,
    ALL_PHASES,
};
use crate::config::ResolverConfig;
use crate::store::{StoreError, WorldStore};

use super::context::PhaseContext;
use super::relations::RelationTable;
use super::{aerial, encirclement, movement, naval};

/// Resolves one order type. Implementations must leave the order in its
/// final state for the turn (status, result) and persist their own side
/// effects through the context's store; returning an error fails the order.
pub trait OrderHandler: Send + Sync {
    fn handle(&self, ctx: &mut PhaseContext<'_>, order: &mut Order) -> Result<Vec<TurnLog>, OrderError>;
}

/// Order-type dispatch table.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Box<dyn OrderHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `order_type`, replacing any previous one.
    pub fn register(&mut self, order_type: impl Into<String>, handler: Box<dyn OrderHandler>) {
        self.handlers.insert(order_type.into(), handler);
    }

    pub fn get(&self, order_type: &str) -> Option<&dyn OrderHandler> {
        self.handlers.get(order_type).map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Turns a resolver's outcome into events, failing the order on error.
fn settle(
    ctx: &mut PhaseContext<'_>,
    order: &mut Order,
    outcome: Result<Vec<TurnLog>, OrderError>,
) -> Result<Vec<TurnLog>, StoreError> {
    match outcome {
        Ok(events) => Ok(events),
        Err(err) => {
            warn!(order = %order.id, order_type = %order.order_type, error = %err, "order failed");
            let notify = ctx.failure_notify(order);
            Ok(vec![ctx.fail_order(order, &err, notify)?])
        }
    }
}

fn dispatch(ctx: &mut PhaseContext<'_>, handlers: &HandlerTable, mut order: Order) -> Result<Vec<TurnLog>, StoreError> {
    let Some(handler) = handlers.get(&order.order_type) else {
        warn!(order = %order.id, order_type = %order.order_type, phase = %ctx.phase, "no handler registered");
        order.fail(&OrderError::MissingHandler(order.order_type.clone()), ctx.turn);
        ctx.store.save_order(ctx.guild, &order)?;
        return Ok(Vec::new());
    };
    let outcome = handler.handle(ctx, &mut order);
    settle(ctx, &mut order, outcome)
}

/// Naval orders, aerial convoys, the land batch, then handler-dispatched
/// orders. Each group keeps the store's priority order.
fn resolve_movement(
    ctx: &mut PhaseContext<'_>,
    handlers: &HandlerTable,
    orders: Vec<Order>,
) -> Result<Vec<TurnLog>, StoreError> {
    let mut events = Vec::new();
    let mut naval_orders: Vec<(Order, UnitOrderData)> = Vec::new();
    let mut aerial_orders = Vec::new();
    let mut land_orders = Vec::new();
    let mut dispatched = Vec::new();

    for mut order in orders {
        match OrderPayload::classify(&order) {
            Ok(OrderPayload::Naval(data)) => naval_orders.push((order, data)),
            Ok(OrderPayload::AerialConvoy(data)) => aerial_orders.push((order, data)),
            Ok(OrderPayload::Land(data)) => land_orders.push((order, data)),
            Ok(OrderPayload::Dispatched) => dispatched.push(order),
            Err(err) => events.extend(settle(ctx, &mut order, Err(err))?),
        }
    }

    for (mut order, data) in naval_orders {
        let outcome = naval::resolve_naval_order(ctx, &mut order, &data);
        events.extend(settle(ctx, &mut order, outcome)?);
    }
    for (mut order, data) in aerial_orders {
        let outcome = aerial::resolve_aerial_convoy(ctx, &mut order, &data);
        events.extend(settle(ctx, &mut order, outcome)?);
    }
    events.extend(movement::resolve_land_orders(ctx, land_orders)?);
    for order in dispatched {
        events.extend(dispatch(ctx, handlers, order)?);
    }
    Ok(events)
}

/// Resolves every unresolved order of `ctx.phase`.
pub fn resolve_phase(ctx: &mut PhaseContext<'_>, handlers: &HandlerTable) -> Result<Vec<TurnLog>, StoreError> {
    let orders = ctx.store.unresolved_orders(ctx.guild, ctx.phase)?;
    info!(guild = %ctx.guild, turn = ctx.turn, phase = %ctx.phase, orders = orders.len(), "phase started");

    let mut events = if ctx.phase == Phase::Movement {
        resolve_movement(ctx, handlers, orders)?
    } else {
        let mut events = Vec::new();
        for order in orders {
            events.extend(dispatch(ctx, handlers, order)?);
        }
        events
    };
    if ctx.phase == Phase::Upkeep {
        events.extend(encirclement::sweep(ctx)?);
    }

    info!(guild = %ctx.guild, phase = %ctx.phase, events = events.len(), "phase finished");
    Ok(events)
}

/// Loads the map and relations fresh and resolves a single phase. Handlers
/// of earlier phases may have changed control or diplomacy.
pub fn run_phase(
    store: &mut dyn WorldStore,
    guild: GuildId,
    turn: u32,
    phase: Phase,
    config: &ResolverConfig,
    handlers: &HandlerTable,
) -> Result<Vec<TurnLog>, StoreError> {
    let graph = TerritoryGraph::build(store.territories(guild)?, &store.adjacencies(guild)?, config);
    let relations = RelationTable::load(&*store, guild)?;
    let mut ctx = PhaseContext { guild, turn, phase, store, graph: &graph, relations: &relations, config };
    resolve_phase(&mut ctx, handlers)
}

/// Runs all phases for `turn` and returns the accumulated events.
/// Nothing is appended to the turn log here.
pub fn run_phases(
    store: &mut dyn WorldStore,
    guild: GuildId,
    turn: u32,
    config: &ResolverConfig,
    handlers: &HandlerTable,
) -> Result<Vec<TurnLog>, StoreError> {
    let mut events = Vec::new();
    for phase in ALL_PHASES {
        events.extend(run_phase(store, guild, turn, phase, config, handlers)?);
    }
    Ok(events)
}
