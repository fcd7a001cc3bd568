//! Turn resolution.
//!
//! Resolves a guild's due orders phase by phase: naval positioning, aerial
//! convoys and the land movement state machine during MOVEMENT (with
//! engagement and transport boarding), registered handlers elsewhere, and
//! the encirclement sweep at UPKEEP.

pub mod aerial;
pub mod context;
pub mod encirclement;
pub mod engagement;
pub mod hostility;
pub mod movement;
pub mod naval;
pub mod phase;
pub mod relations;
pub mod transport;

pub use context::PhaseContext;
pub use encirclement::{ConvoyPosting, EncirclementDetector};
pub use hostility::{is_hostile, Combatant};
pub use movement::{MovementUnitState, StepOutcome};
pub use phase::{resolve_phase, run_phase, run_phases, HandlerTable, OrderHandler};
pub use relations::RelationTable;
