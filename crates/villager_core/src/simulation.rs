//! Tick driver.
//!
//! A [`Simulation`] owns the [`World`] and the [`SimClock`]. Each call to
//! [`Simulation::tick`] advances the clock by the elapsed delta and updates
//! every unit and building once, in a fixed order.
//!
//! # Determinism
//!
//! - All quantities are fixed-point ([`Fixed`])
//! - Players are processed in id order, units in roster order, buildings
//!   in id order
//! - Entity storage is ordered, so serialized bytes are stable
//!
//! # Example
//!
//! ```
//! use villager_core::data::{Civilization, UnitKind};
//! use villager_core::grid::TilePos;
//! use villager_core::math::Fixed;
//! use villager_core::simulation::Simulation;
//! use villager_core::world::World;
//!
//! let mut world = World::new(16, 16);
//! let player = world.add_player("Red", Civilization::Means);
//! let unit = world
//!     .place_unit(UnitKind::Villager, player, TilePos::new(0, 0))
//!     .unwrap();
//!
//! let mut sim = Simulation::new(world);
//! assert!(sim.world_mut().move_unit(unit, 3, 0, Fixed::ZERO));
//! sim.tick(Fixed::ONE).unwrap();
//! assert_eq!(sim.get_tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::combat;
use crate::components::Command;
use crate::error::{GameError, Result};
use crate::events::TickEvents;
use crate::math::Fixed;
use crate::production;
use crate::replay::Replay;
use crate::snapshot::WorldSnapshot;
use crate::tasks;
use crate::time::{SimClock, SimTime};
use crate::world::World;

/// The running game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    /// Completed, unpaused ticks.
    tick: u64,
    clock: SimClock,
    world: World,
    /// Replay being recorded, if any.
    #[serde(skip)]
    recording: Option<Replay>,
}

impl Simulation {
    /// Wrap a prepared world, starting at time zero.
    #[must_use]
    pub fn new(world: World) -> Self {
        Self {
            tick: 0,
            clock: SimClock::new(),
            world,
            recording: None,
        }
    }

    /// Number of ticks processed. Paused ticks do not count.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Current simulation time.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Whether the clock is frozen.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world, for setup and direct command calls.
    ///
    /// Commands issued this way are not recorded in a replay; use
    /// [`apply_command`](Self::apply_command) for that.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Freeze the clock. Ticks become no-ops until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        self.clock.pause();
        debug!(tick = self.tick, "simulation paused");
    }

    /// Unfreeze the clock.
    pub fn resume(&mut self) {
        self.clock.resume();
        debug!(tick = self.tick, "simulation resumed");
    }

    /// Advance by `dt` seconds and update every unit and building.
    ///
    /// # Order
    ///
    /// 1. Each player's units, in roster order
    /// 2. Buildings in id order: training queues, then keep defence
    ///
    /// A failed unit update is logged and the unit idled. A failed building
    /// update is logged and skipped. The rest of the tick still runs.
    ///
    /// # Errors
    ///
    /// None at present. The `Result` is kept for callers driving ticks
    /// with `?`.
    pub fn tick(&mut self, dt: Fixed) -> Result<TickEvents> {
        if let Some(replay) = self.recording.as_mut() {
            replay.record_tick(dt);
        }

        let mut events = TickEvents {
            tick: self.tick,
            ..TickEvents::default()
        };
        if !self.clock.advance(dt) {
            events.paused = true;
            return Ok(events);
        }
        let now = self.clock.now();

        for index in 0..self.world.players.len() {
            let roster = self.world.players[index].units.clone();
            for id in roster {
                if let Err(err) = tasks::update_unit(&mut self.world, id, now, &mut events) {
                    warn!(unit = id, %err, "unit update failed");
                    if let Some(unit) = self.world.unit_mut(id) {
                        unit.go_idle();
                    }
                }
            }
        }

        for id in self.world.buildings.sorted_ids() {
            if !self.world.buildings.contains(id) {
                continue;
            }
            if let Err(err) = production::process_training(&mut self.world, id, now, &mut events)
            {
                warn!(building = id, %err, "training update failed");
            }
            if let Err(err) = combat::building_defence(&mut self.world, id, now, &mut events) {
                warn!(building = id, %err, "building defence failed");
            }
        }

        self.tick += 1;
        events.tick = self.tick;
        trace!(
            tick = self.tick,
            hash = self.state_hash(),
            events = events.events.len(),
            "tick complete"
        );
        Ok(events)
    }

    /// Apply an external command at the current time, recording it if a
    /// replay is being captured.
    ///
    /// Returns whether the command was accepted.
    pub fn apply_command(&mut self, command: Command) -> bool {
        if let Some(replay) = self.recording.as_mut() {
            replay.record_command(command);
        }

        let now = self.clock.now();
        match command {
            Command::Move { unit, x, y } => self.world.move_unit(unit, x, y, now),
            Command::Gather { unit, resource } => self.world.gather_resources(unit, resource, now),
            Command::Battle { unit, target } => self.world.go_battle(unit, target, now),
            Command::Construct {
                unit,
                building,
                x,
                y,
                player,
            } => self.world.construct_building(unit, building, x, y, player, now),
            Command::Train {
                building,
                unit_kind,
            } => self.world.train_unit(building, unit_kind, now),
            Command::Pause => {
                self.pause();
                true
            }
            Command::Resume => {
                self.resume();
                true
            }
        }
    }

    /// Start recording ticks and commands from the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the current state cannot be serialized.
    pub fn start_recording(&mut self, scenario_id: impl Into<String>) -> Result<()> {
        self.recording = Some(Replay::new(scenario_id, self)?);
        Ok(())
    }

    /// Stop recording and return the finished replay.
    pub fn stop_recording(&mut self) -> Option<Replay> {
        let mut replay = self.recording.take()?;
        replay.finalize(self.tick, self.state_hash());
        Some(replay)
    }

    /// Whether a replay is being recorded.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Hash of the simulation state, for desync and replay checks.
    ///
    /// Covers the tick counter, clock, players (stocks, rosters, sites),
    /// units (positions, hp, tasks, loads, timers), buildings and remaining
    /// resources, all in deterministic order.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.clock.now().to_bits().hash(&mut hasher);
        self.clock.is_paused().hash(&mut hasher);

        self.world.players.hash(&mut hasher);

        self.world.units.len().hash(&mut hasher);
        for (id, unit) in self.world.units.iter() {
            id.hash(&mut hasher);
            unit.hash(&mut hasher);
        }

        self.world.buildings.len().hash(&mut hasher);
        for (id, building) in self.world.buildings.iter() {
            id.hash(&mut hasher);
            building.hash(&mut hasher);
        }

        for tile in self.world.map.tiles() {
            if let Some(deposit) = tile.resource {
                tile.pos.hash(&mut hasher);
                deposit.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Read-only view for presentation layers.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world, self.tick, self.clock.now(), self.clock.is_paused())
    }

    /// Serialize the simulation state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize simulation: {e}")))
    }
}
