//! # Villager Core
//!
//! Deterministic per-unit task engine for a tile-based RTS.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//! - No wall clock: time is passed in by the caller
//!
//! ## Crate Structure
//!
//! - [`grid`] - Tile map, occupancy and spatial indexes
//! - [`pathfinding`] - 8-directional A* over the grid
//! - [`movement`] - Time-based movement along routes
//! - [`economy`] - Gathering, carrying and depositing
//! - [`combat`] - Range- and cadence-gated attacks
//! - [`construction`] - Shared construction sites
//! - [`production`] - Training queues
//! - [`tasks`] - Per-unit task dispatch and the command API
//! - [`simulation`] - Tick driver, hashing and serialization
//! - [`replay`] - Recording and verifying games

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod components;
pub mod construction;
pub mod data;
pub mod economy;
pub mod error;
pub mod events;
pub mod grid;
pub mod math;
pub mod movement;
pub mod pathfinding;
pub mod production;
pub mod replay;
pub mod simulation;
pub mod snapshot;
pub mod tasks;
pub mod time;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{Combatant, HitOutcome};
    pub use crate::components::{
        Building, CombatTarget, Command, EntityId, Facing, Player, PlayerId, ResourceAmounts,
        ResourceKind, Unit, UnitTask,
    };
    pub use crate::construction::SiteKey;
    pub use crate::data::{BuildingKind, Catalog, Civilization, EngineConfig, UnitKind};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{SimEvent, TickEvents};
    pub use crate::grid::{GridMap, TilePos};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::movement::MoveOutcome;
    pub use crate::replay::Replay;
    pub use crate::simulation::Simulation;
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::time::{SimClock, SimTime};
    pub use crate::world::World;
}
