//! Per-unit task dispatch and the command API.
//!
//! Each tick a unit's [`UnitTask`] selects which subsystem updates it.
//! Commands overwrite the task; a unit pulled off a construction site is
//! unregistered from it.

use tracing::{debug, warn};

use crate::combat;
use crate::components::{CombatTarget, EntityId, PlayerId, ResourceKind, Unit, UnitTask};
use crate::construction;
use crate::data::{BuildingKind, UnitKind};
use crate::economy;
use crate::error::{GameError, Result};
use crate::events::{SimEvent, TickEvents};
use crate::grid::TilePos;
use crate::movement::{self, MoveOutcome};
use crate::production;
use crate::time::SimTime;
use crate::world::World;

/// Run one tick of `id`'s current task.
///
/// Units removed earlier in the same tick are skipped.
pub(crate) fn update_unit(
    world: &mut World,
    id: EntityId,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    if !world.units.contains(id) {
        return Ok(());
    }

    world.with_unit(id, |world, unit| match unit.task {
        UnitTask::Idle => Ok(()),
        UnitTask::Moving { destination } => {
            update_moving(world, unit, destination, now, events);
            Ok(())
        }
        UnitTask::Marching {
            resource,
            source,
            stand,
        } => economy::update_marching(world, unit, resource, source, stand, now, events),
        UnitTask::Gathering { resource, source } => {
            economy::update_gathering(world, unit, resource, source, now, events)
        }
        UnitTask::Returning {
            resource,
            drop_point,
            drop_tile,
        } => economy::update_returning(world, unit, resource, drop_point, drop_tile, now, events),
        UnitTask::GoingToBattle { target, last_seen } => {
            combat::update_going_to_battle(world, unit, target, last_seen, now, events)
        }
        UnitTask::Attacking { target } => {
            combat::update_attacking(world, unit, target, now, events)
        }
        UnitTask::GoingToConstructionSite { site, stand } => {
            construction::update_going_to_site(world, unit, site, stand, now, events)
        }
        UnitTask::Constructing { site, .. } => {
            construction::update_constructing(world, unit, site, now, events)
        }
    })
}

fn update_moving(
    world: &mut World,
    unit: &mut Unit,
    destination: TilePos,
    now: SimTime,
    events: &mut TickEvents,
) {
    if unit.target_position.is_none() {
        if movement::is_at(unit, destination, &world.config) {
            unit.go_idle();
            return;
        }
        if movement::plan_route(unit, &world.map, destination).is_err() {
            unit.go_idle();
            return;
        }
    }

    match movement::step(unit, &mut world.map, &world.config, now) {
        MoveOutcome::Arrived => {
            unit.go_idle();
            events.push(SimEvent::Arrived {
                unit: unit.id,
                tile: destination,
            });
        }
        MoveOutcome::Blocked => events.push(SimEvent::MovementBlocked {
            unit: unit.id,
            goal: destination,
        }),
        _ => {}
    }
}

impl World {
    /// Run a command against a detached unit, leaving any construction
    /// site the command pulls it off.
    fn command_unit<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut World, &mut Unit) -> Result<R>,
    ) -> Result<R> {
        self.with_unit(id, |world, unit| {
            let previous = unit.task;
            let result = f(world, unit);
            if unit.task != previous {
                construction::leave_site(world, unit, previous);
            }
            result
        })
    }

    /// Order a unit to walk to `(x, y)`.
    ///
    /// Repeating the order while en route keeps the current route.
    ///
    /// # Errors
    ///
    /// - [`GameError::EntityNotFound`] if the unit does not exist.
    /// - [`GameError::InvalidTarget`] if the tile is out of bounds or
    ///   blocked; the unit is untouched.
    /// - [`GameError::NoPathFound`] if the tile cannot be reached; the unit
    ///   is untouched.
    pub fn try_move_unit(&mut self, id: EntityId, x: u32, y: u32, now: SimTime) -> Result<()> {
        let destination = TilePos::new(x, y);
        self.command_unit(id, |world, unit| {
            movement::set_destination(unit, &world.map, destination, now)?;
            unit.task = UnitTask::Moving { destination };
            debug!(unit = unit.id, ?destination, "move ordered");
            Ok(())
        })
    }

    /// [`try_move_unit`](Self::try_move_unit), reporting success.
    pub fn move_unit(&mut self, id: EntityId, x: u32, y: u32, now: SimTime) -> bool {
        report(id, "move", self.try_move_unit(id, x, y, now))
    }

    /// Order a unit to gather the nearest source of `kind`.
    ///
    /// # Errors
    ///
    /// See [`economy::try_gather_resources`].
    pub fn try_gather_resources(
        &mut self,
        id: EntityId,
        kind: ResourceKind,
        now: SimTime,
    ) -> Result<()> {
        self.command_unit(id, |world, unit| economy::try_gather_resources(world, unit, kind, now))
    }

    /// [`try_gather_resources`](Self::try_gather_resources), reporting success.
    pub fn gather_resources(&mut self, id: EntityId, kind: ResourceKind, now: SimTime) -> bool {
        report(id, "gather", self.try_gather_resources(id, kind, now))
    }

    /// Order a unit to attack `target`.
    ///
    /// # Errors
    ///
    /// See [`combat::try_go_battle`].
    pub fn try_go_battle(
        &mut self,
        id: EntityId,
        target: CombatTarget,
        now: SimTime,
    ) -> Result<()> {
        self.command_unit(id, |world, unit| combat::try_go_battle(world, unit, target, now))
    }

    /// [`try_go_battle`](Self::try_go_battle), reporting success.
    pub fn go_battle(&mut self, id: EntityId, target: CombatTarget, now: SimTime) -> bool {
        report(id, "battle", self.try_go_battle(id, target, now))
    }

    /// Order a unit to build `kind` with its top-left corner at `(x, y)`.
    ///
    /// # Errors
    ///
    /// See [`construction::try_construct_building`].
    pub fn try_construct_building(
        &mut self,
        id: EntityId,
        kind: BuildingKind,
        x: u32,
        y: u32,
        player: PlayerId,
        now: SimTime,
    ) -> Result<()> {
        let origin = TilePos::new(x, y);
        self.command_unit(id, |world, unit| {
            construction::try_construct_building(world, unit, kind, origin, player, now)
        })
    }

    /// [`try_construct_building`](Self::try_construct_building), reporting success.
    pub fn construct_building(
        &mut self,
        id: EntityId,
        kind: BuildingKind,
        x: u32,
        y: u32,
        player: PlayerId,
        now: SimTime,
    ) -> bool {
        report(
            id,
            "construct",
            self.try_construct_building(id, kind, x, y, player, now),
        )
    }

    /// Queue a unit at a training building.
    ///
    /// # Errors
    ///
    /// See [`production::try_train_unit`].
    pub fn try_train_unit(
        &mut self,
        building: EntityId,
        kind: UnitKind,
        now: SimTime,
    ) -> Result<()> {
        production::try_train_unit(self, building, kind, now)
    }

    /// [`try_train_unit`](Self::try_train_unit), reporting success.
    pub fn train_unit(&mut self, building: EntityId, kind: UnitKind, now: SimTime) -> bool {
        report(building, "train", self.try_train_unit(building, kind, now))
    }
}

fn report(entity: EntityId, command: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err @ (GameError::InvalidState(_) | GameError::DataParseError { .. })) => {
            warn!(entity, command, %err, "command failed");
            false
        }
        Err(err) => {
            debug!(entity, command, %err, "command rejected");
            false
        }
    }
}
