//! Turn-log events.
//!
//! Events are append-only. Each carries the list of characters to notify;
//! rendering them to text is the host's business.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{CharacterId, FactionId, OrderId, TerritoryId, UnitId};
use super::order::{MovementStatus, UnitAction};
use super::state::Phase;

/// The entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity_id", rename_all = "snake_case")]
pub enum EventSubject {
    Order(OrderId),
    Unit(UnitId),
}

impl fmt::Display for EventSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSubject::Order(id) => write!(f, "order/{}", id),
            EventSubject::Unit(id) => write!(f, "unit/{}", id),
        }
    }
}

/// Event payloads. Unit lists hold player-facing unit identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventData {
    OrderFailed {
        order_id: OrderId,
        error: String,
    },
    TransitProgress {
        order_id: OrderId,
        units: Vec<String>,
        action: UnitAction,
        territory: Option<TerritoryId>,
        path_index: usize,
        steps_taken: usize,
        status: MovementStatus,
        transported: bool,
    },
    TransitComplete {
        order_id: OrderId,
        units: Vec<String>,
        action: UnitAction,
        territory: Option<TerritoryId>,
        steps_taken: usize,
    },
    MovementBlocked {
        order_id: OrderId,
        units: Vec<String>,
        territory: Option<TerritoryId>,
        blocked_at: TerritoryId,
        cost: u32,
        remaining_mp: u32,
    },
    EngagementDetected {
        order_id: Option<OrderId>,
        territory: TerritoryId,
        units: Vec<String>,
        opponent_units: Vec<String>,
        faction: Option<FactionId>,
        opponent_faction: Option<FactionId>,
        interception: bool,
    },
    NavalPositionSet {
        order_id: OrderId,
        units: Vec<String>,
        action: UnitAction,
        occupied_territories: Vec<TerritoryId>,
    },
    NavalTransitProgress {
        order_id: OrderId,
        units: Vec<String>,
        action: UnitAction,
        occupied_territories: Vec<TerritoryId>,
        window_start_index: usize,
        carrying_units: Vec<UnitId>,
    },
    NavalTransitComplete {
        order_id: OrderId,
        units: Vec<String>,
        action: UnitAction,
        occupied_territories: Vec<TerritoryId>,
        carrying_units: Vec<UnitId>,
    },
    NavalWaiting {
        order_id: OrderId,
        units: Vec<String>,
        occupied_territories: Vec<TerritoryId>,
    },
    TransportBoarded {
        order_id: OrderId,
        naval_order_id: OrderId,
        units: Vec<String>,
        territory: TerritoryId,
    },
    TransportLost {
        order_id: OrderId,
        naval_order_id: Option<OrderId>,
        units: Vec<String>,
    },
    ConvoyEstablished {
        order_id: OrderId,
        units: Vec<String>,
        territory: Option<TerritoryId>,
    },
    UnitEncircled {
        unit: String,
        territory: TerritoryId,
        faction: Option<FactionId>,
    },
}

impl EventData {
    pub const fn event_type(&self) -> &'static str {
        match self {
            EventData::OrderFailed { .. } => "ORDER_FAILED",
            EventData::TransitProgress { .. } => "TRANSIT_PROGRESS",
            EventData::TransitComplete { .. } => "TRANSIT_COMPLETE",
            EventData::MovementBlocked { .. } => "MOVEMENT_BLOCKED",
            EventData::EngagementDetected { .. } => "ENGAGEMENT_DETECTED",
            EventData::NavalPositionSet { .. } => "NAVAL_POSITION_SET",
            EventData::NavalTransitProgress { .. } => "NAVAL_TRANSIT_PROGRESS",
            EventData::NavalTransitComplete { .. } => "NAVAL_TRANSIT_COMPLETE",
            EventData::NavalWaiting { .. } => "NAVAL_WAITING",
            EventData::TransportBoarded { .. } => "TRANSPORT_BOARDED",
            EventData::TransportLost { .. } => "TRANSPORT_LOST",
            EventData::ConvoyEstablished { .. } => "CONVOY_ESTABLISHED",
            EventData::UnitEncircled { .. } => "UNIT_ENCIRCLED",
        }
    }
}

/// One row of the turn log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLog {
    pub turn_number: u32,
    pub phase: Phase,
    pub subject: EventSubject,
    pub data: EventData,
    /// Characters to notify, ascending and de-duplicated.
    pub notify: Vec<CharacterId>,
}

impl TurnLog {
    pub fn new(turn_number: u32, phase: Phase, subject: EventSubject, data: EventData) -> Self {
        TurnLog { turn_number, phase, subject, data, notify: Vec::new() }
    }

    /// Builder-style helper setting the notification list.
    pub fn notifying(mut self, mut characters: Vec<CharacterId>) -> Self {
        characters.sort_unstable();
        characters.dedup();
        self.notify = characters;
        self
    }

    pub fn event_type(&self) -> &'static str {
        self.data.event_type()
    }

    /// Deterministic identity of this event. A retried turn regenerates the
    /// same keys, so stores can drop rows they already hold.
    pub fn dedup_key(&self) -> String {
        let payload = serde_json::to_string(&self.data).unwrap_or_default();
        format!(
            "{}:{}:{}:{}:{}",
            self.turn_number,
            self.phase,
            self.event_type(),
            self.subject,
            payload
        )
    }
}
