//! Turn-resolution core for a persistent multiplayer strategy simulation.
//!
//! Exposes the world model, the persistence boundary, the resolvers and the
//! [`engine::Engine`] entry points for embedding hosts and integration tests.

pub mod board;
pub mod config;
pub mod engine;
pub mod resolve;
pub mod store;

pub use config::ResolverConfig;
pub use engine::{Engine, EngineError, TurnReport, TurnStatus};
