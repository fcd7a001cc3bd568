//! Engine entry points.
//!
//! Holds the resolver configuration and the order-type handler table, and
//! serializes resolution per guild. One guild's turn never runs twice at
//! once; different guilds are independent and may resolve in parallel.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::board::{GuildId, Phase, TurnLog, ALL_PHASES};
use crate::config::ResolverConfig;
use crate::resolve::{run_phases, HandlerTable, OrderHandler};
use crate::store::{StoreError, WorldStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("guild {0} has no configuration")]
    NotConfigured(GuildId),
    #[error("turn resolution is disabled for guild {0}")]
    Disabled(GuildId),
    #[error("resolution lock for guild {0} is poisoned")]
    LockPoisoned(GuildId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one turn resolution.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub success: bool,
    pub message: String,
    /// The turn that was produced, or the unchanged current turn on failure.
    pub turn: u32,
    pub events: Vec<TurnLog>,
    /// Events actually appended; retried turns skip duplicates.
    pub appended: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnStatus {
    pub current_turn: u32,
    pub resolution_enabled: bool,
    pub pending: BTreeMap<Phase, usize>,
    pub total_pending: usize,
}

/// One resolution lock per guild.
#[derive(Debug, Default)]
pub struct GuildLocks {
    locks: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
}

impl GuildLocks {
    pub fn lock_for(&self, guild: GuildId) -> Result<Arc<Mutex<()>>, EngineError> {
        let mut locks = self.locks.lock().map_err(|_| EngineError::LockPoisoned(guild))?;
        Ok(Arc::clone(locks.entry(guild).or_default()))
    }
}

pub struct Engine {
    config: ResolverConfig,
    handlers: HandlerTable,
    locks: GuildLocks,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(ResolverConfig::default())
    }
}

impl Engine {
    pub fn new(config: ResolverConfig) -> Self {
        Engine { config, handlers: HandlerTable::new(), locks: GuildLocks::default() }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Registers the handler for a non-UNIT order type.
    pub fn register_handler(&mut self, order_type: impl Into<String>, handler: impl OrderHandler + 'static) {
        self.handlers.register(order_type, Box::new(handler));
    }

    /// Resolves the next turn of `guild`: every phase in order, then the
    /// accumulated events are appended to the log and the turn counter advances.
    pub fn resolve_turn(&self, store: &mut dyn WorldStore, guild: GuildId) -> Result<TurnReport, EngineError> {
        let lock = self.locks.lock_for(guild)?;
        let _held = lock.lock().map_err(|_| EngineError::LockPoisoned(guild))?;

        let mut guild_config = store.guild_config(guild)?.ok_or(EngineError::NotConfigured(guild))?;
        if !guild_config.turn_resolution_enabled {
            return Err(EngineError::Disabled(guild));
        }
        let turn = guild_config.current_turn + 1;
        info!(guild = %guild, turn, "resolving turn");

        let events = run_phases(store, guild, turn, &self.config, &self.handlers)?;

        // The counter advances only after the log holds the turn.
        let appended = store.append_events(guild, &events)?;
        guild_config.current_turn = turn;
        store.save_guild_config(guild, &guild_config)?;

        info!(guild = %guild, turn, events = events.len(), appended, "turn resolved");
        Ok(TurnReport {
            success: true,
            message: format!("turn {} resolved with {} events", turn, events.len()),
            turn,
            events,
            appended,
        })
    }

    /// Like [`Engine::resolve_turn`], but folds failures into the report.
    pub fn run_turn(&self, store: &mut dyn WorldStore, guild: GuildId) -> TurnReport {
        match self.resolve_turn(store, guild) {
            Ok(report) => report,
            Err(err) => {
                warn!(guild = %guild, error = %err, "turn resolution failed");
                let turn = store.guild_config(guild).ok().flatten().map_or(0, |c| c.current_turn);
                TurnReport { success: false, message: err.to_string(), turn, events: Vec::new(), appended: 0 }
            }
        }
    }

    pub fn turn_status(&self, store: &dyn WorldStore, guild: GuildId) -> Result<TurnStatus, EngineError> {
        let guild_config = store.guild_config(guild)?.ok_or(EngineError::NotConfigured(guild))?;
        let mut pending = BTreeMap::new();
        for phase in ALL_PHASES {
            pending.insert(phase, store.unresolved_orders(guild, phase)?.len());
        }
        Ok(TurnStatus {
            current_turn: guild_config.current_turn,
            resolution_enabled: guild_config.turn_resolution_enabled,
            total_pending: pending.values().sum(),
            pending,
        })
    }

    /// Resolves one turn for each guild, in parallel. Each store is owned by
    /// exactly one guild.
    pub fn resolve_guilds<S>(&self, worlds: &mut [(GuildId, S)]) -> Vec<(GuildId, Result<TurnReport, EngineError>)>
    where
        S: WorldStore + Send,
    {
        worlds
            .par_iter_mut()
            .map(|(guild, store)| (*guild, self.resolve_turn(store, *guild)))
            .collect()
    }
}
