//! Orders, their typed payloads and the per-order error taxonomy.
//!
//! Orders are persisted with two free-form JSON columns: `order_data` (what
//! the submitter asked for) and `result_data` (resumable progress written
//! back after each resolution). Both are parsed exactly once per resolution
//! into the typed structs below; handlers never walk raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::ids::{CharacterId, OrderId, TerritoryId, UnitId};
use super::state::Phase;

/// `order_type` of orders that move units.
pub const UNIT_ORDER: &str = "UNIT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Ongoing,
    Success,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// Only PENDING and ONGOING orders are picked up by resolution.
    pub fn is_unresolved(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Ongoing)
    }
}

/// A submitted intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_type: String,
    pub character: CharacterId,
    pub phase: Phase,
    /// Lower resolves first within a phase.
    pub priority: i32,
    pub status: OrderStatus,
    #[serde(default)]
    pub unit_ids: Vec<UnitId>,
    pub submitted_turn: u32,
    #[serde(default)]
    pub updated_turn: Option<u32>,
    #[serde(default)]
    pub order_data: Value,
    #[serde(default)]
    pub result_data: Value,
}

impl Order {
    /// Creates a PENDING order of an arbitrary type.
    pub fn new(id: OrderId, order_type: &str, character: CharacterId, phase: Phase) -> Self {
        Order {
            id,
            order_type: order_type.to_string(),
            character,
            phase,
            priority: 0,
            status: OrderStatus::Pending,
            unit_ids: Vec::new(),
            submitted_turn: 0,
            updated_turn: None,
            order_data: Value::Null,
            result_data: Value::Null,
        }
    }

    /// Creates a PENDING MOVEMENT-phase unit order.
    pub fn unit(id: OrderId, character: CharacterId, unit_ids: Vec<UnitId>, order_data: Value) -> Self {
        Order {
            unit_ids,
            order_data,
            ..Order::new(id, UNIT_ORDER, character, Phase::Movement)
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.status.is_unresolved()
    }

    /// Marks the order FAILED and records the error as its result.
    pub fn fail(&mut self, error: &OrderError, turn: u32) {
        self.status = OrderStatus::Failed;
        self.result_data = serde_json::json!({ "error": error.to_string() });
        self.updated_turn = Some(turn);
    }

    /// Lenient action lookup for orders that are not being resolved, e.g. when
    /// scanning a unit's order history. Malformed payloads yield `None`.
    pub fn unit_action(&self) -> Option<UnitAction> {
        if self.order_type != UNIT_ORDER {
            return None;
        }
        UnitOrderData::parse(&self.order_data).ok().map(|d| d.action)
    }
}

/// What a unit order asks its units to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitAction {
    #[default]
    Transit,
    Transport,
    Patrol,
    Raid,
    Capture,
    Siege,
    NavalConvoy,
    NavalPatrol,
    NavalTransit,
    NavalTransport,
    AerialConvoy,
}

impl UnitAction {
    pub fn is_naval(self) -> bool {
        matches!(
            self,
            UnitAction::NavalConvoy
                | UnitAction::NavalPatrol
                | UnitAction::NavalTransit
                | UnitAction::NavalTransport
        )
    }

    /// Actions resolved by the land movement state machine.
    pub fn is_land(self) -> bool {
        !self.is_naval() && self != UnitAction::AerialConvoy
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            UnitAction::Transit => "transit",
            UnitAction::Transport => "transport",
            UnitAction::Patrol => "patrol",
            UnitAction::Raid => "raid",
            UnitAction::Capture => "capture",
            UnitAction::Siege => "siege",
            UnitAction::NavalConvoy => "naval_convoy",
            UnitAction::NavalPatrol => "naval_patrol",
            UnitAction::NavalTransit => "naval_transit",
            UnitAction::NavalTransport => "naval_transport",
            UnitAction::AerialConvoy => "aerial_convoy",
        }
    }
}

/// Parsed `order_data` of a UNIT order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitOrderData {
    #[serde(default)]
    pub action: UnitAction,
    #[serde(default)]
    pub path: Vec<TerritoryId>,
    /// Patrol only: cap on MP spent per turn.
    #[serde(default)]
    pub speed: Option<u32>,
    /// Land transport only: the naval transport route to board.
    #[serde(default)]
    pub water_path: Vec<TerritoryId>,
    /// Land transport only: where the cargo disembarks.
    #[serde(default)]
    pub landing: Option<TerritoryId>,
}

impl UnitOrderData {
    pub fn parse(value: &Value) -> Result<Self, OrderError> {
        serde_json::from_value(value.clone()).map_err(|e| OrderError::MalformedPayload(e.to_string()))
    }
}

/// An unresolved order's payload, classified by which part of the pipeline
/// resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderPayload {
    Land(UnitOrderData),
    Naval(UnitOrderData),
    AerialConvoy(UnitOrderData),
    /// Any non-UNIT order type; resolved by its registered handler.
    Dispatched,
}

impl OrderPayload {
    pub fn classify(order: &Order) -> Result<Self, OrderError> {
        if order.order_type != UNIT_ORDER {
            return Ok(OrderPayload::Dispatched);
        }
        let data = UnitOrderData::parse(&order.order_data)?;
        Ok(match data.action {
            a if a.is_naval() => OrderPayload::Naval(data),
            UnitAction::AerialConvoy => OrderPayload::AerialConvoy(data),
            _ => OrderPayload::Land(data),
        })
    }
}

/// Terminal or per-pass status of a land movement group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    Moving,
    Engaged,
    OutOfMp,
    PathComplete,
    Transported,
}

/// Resumable progress of a land movement order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LandProgress {
    pub path_index: usize,
    pub final_territory: Option<TerritoryId>,
    /// Steps taken during the last pass.
    pub steps_taken: usize,
    pub status: Option<MovementStatus>,
    pub blocked: Option<TerritoryId>,
    pub completed: bool,
    pub transported: bool,
    pub transport_order: Option<OrderId>,
    pub territories_entered: Vec<TerritoryId>,
}

impl LandProgress {
    /// Reads progress from `result_data`; anything unparseable means "no progress yet".
    pub fn from_result(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Resumable progress of a naval order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavalProgress {
    pub occupied_territories: Vec<TerritoryId>,
    pub window_start_index: usize,
    pub path_complete: bool,
    /// Transport only.
    pub waiting_for_cargo: bool,
    pub carrying_units: Vec<UnitId>,
    /// Transport only: the window has been placed at least once since boarding.
    pub window_active: bool,
}

impl Default for NavalProgress {
    fn default() -> Self {
        NavalProgress {
            occupied_territories: Vec::new(),
            window_start_index: 0,
            path_complete: false,
            waiting_for_cargo: true,
            carrying_units: Vec::new(),
            window_active: false,
        }
    }
}

impl NavalProgress {
    pub fn from_result(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Why a single order failed. Never aborts the phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("no valid land units in order")]
    NoValidLandUnits,
    #[error("no valid naval units in order")]
    NoValidNavalUnits,
    #[error("units in a movement order must share a territory")]
    NotColocated,
    #[error("path must contain at least {min} territories")]
    PathTooShort { min: usize },
    #[error("territory {0} does not exist")]
    UnknownTerritory(TerritoryId),
    #[error("territory {0} is water and impassable to land units")]
    ImpassableTerrain(TerritoryId),
    #[error("territory {0} is not water")]
    NotWater(TerritoryId),
    #[error("{0} is not adjacent to {1}")]
    NotAdjacent(TerritoryId, TerritoryId),
    #[error("path starts at {expected} but units are at {actual}")]
    StaleOrder { expected: TerritoryId, actual: TerritoryId },
    #[error("unit {0} has no known position")]
    NoPosition(UnitId),
    #[error("new order must overlap with at least one currently occupied territory")]
    NoOverlap,
    #[error("first order must include the unit's initial territory ({0})")]
    FirstOrderMissingTerritory(TerritoryId),
    #[error("order has {len} territories, max allowed is {max}")]
    TooManyTerritories { len: usize, max: usize },
    #[error("naval units need at least 1 movement to hold a position")]
    ImmobileNavalUnits,
    #[error("first territory {0} must be adjacent to at least one land territory for boarding")]
    TransportNotCoastal(TerritoryId),
    #[error("landing {0} must be land adjacent to the end of the water path")]
    InvalidLanding(TerritoryId),
    #[error("the carrying transport was lost")]
    TransportLost,
    #[error("unit {0} is not an aerial transport")]
    MissingAerialTransport(String),
    #[error("malformed order payload: {0}")]
    MalformedPayload(String),
    #[error("no handler registered for order type {0}")]
    MissingHandler(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_action_defaults_to_transit() {
        let data = UnitOrderData::parse(&json!({"path": ["a", "b"]})).unwrap();
        assert_eq!(data.action, UnitAction::Transit);
        assert_eq!(data.path.len(), 2);
        assert_eq!(data.speed, None);
    }

    #[test]
    fn unknown_action_is_malformed() {
        let err = UnitOrderData::parse(&json!({"action": "teleport", "path": []})).unwrap_err();
        assert!(matches!(err, OrderError::MalformedPayload(_)));
    }

    #[test]
    fn classify_routes_by_action() {
        let naval = Order::unit(OrderId(1), CharacterId(1), vec![], json!({"action": "naval_convoy", "path": ["s"]}));
        assert!(matches!(OrderPayload::classify(&naval), Ok(OrderPayload::Naval(_))));

        let aerial = Order::unit(OrderId(2), CharacterId(1), vec![], json!({"action": "aerial_convoy", "path": ["s"]}));
        assert!(matches!(OrderPayload::classify(&aerial), Ok(OrderPayload::AerialConvoy(_))));

        let land = Order::unit(OrderId(3), CharacterId(1), vec![], json!({"action": "patrol", "path": ["a", "b"], "speed": 2}));
        match OrderPayload::classify(&land) {
            Ok(OrderPayload::Land(data)) => assert_eq!(data.speed, Some(2)),
            other => panic!("expected land payload, got {:?}", other),
        }

        let build = Order::new(OrderId(4), "CONSTRUCTION", CharacterId(1), Phase::Construction);
        assert_eq!(OrderPayload::classify(&build), Ok(OrderPayload::Dispatched));
    }

    #[test]
    fn fail_records_error_in_result() {
        let mut order = Order::unit(OrderId(1), CharacterId(1), vec![], json!({}));
        order.fail(&OrderError::NoValidLandUnits, 4);
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.updated_turn, Some(4));
        assert_eq!(order.result_data["error"], "no valid land units in order");
        assert!(!order.is_unresolved());
    }

    #[test]
    fn progress_defaults_from_error_result() {
        let land = LandProgress::from_result(&json!({"error": "boom"}));
        assert_eq!(land, LandProgress::default());
        let naval = NavalProgress::from_result(&Value::Null);
        assert!(naval.waiting_for_cargo);
    }

    #[test]
    fn land_progress_reads_persisted_fields() {
        let progress = LandProgress::from_result(&json!({
            "path_index": 2,
            "final_territory": "c",
            "status": "OUT_OF_MP",
            "transported": false
        }));
        assert_eq!(progress.path_index, 2);
        assert_eq!(progress.status, Some(MovementStatus::OutOfMp));
        assert_eq!(progress.final_territory, Some(TerritoryId::from("c")));
    }
}
