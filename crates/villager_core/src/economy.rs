//! Resource gathering: march, gather, return, deposit.
//!
//! A worker marches to a tile next to the nearest source of the requested
//! resource (or onto the farm for Food), extracts at `gather_rate` until its
//! load for that resource reaches `carry_capacity`, walks to the nearest
//! drop point and hands the load in, then goes idle.

use tracing::{debug, warn};

use crate::components::{EntityId, ResourceKind, Unit, UnitTask};
use crate::error::{GameError, Result};
use crate::events::{SimEvent, TickEvents};
use crate::grid::TilePos;
use crate::math::Fixed;
use crate::movement::{self, MoveOutcome};
use crate::time::SimTime;
use crate::world::World;

/// Send `unit` to gather the nearest `kind`.
///
/// Repeating the order while the unit is already cycling on `kind` is a
/// no-op.
///
/// # Errors
///
/// - [`GameError::ResourceUnavailable`] if no source of `kind` exists; the
///   unit is left idle.
/// - [`GameError::InvalidState`] if the unit cannot carry anything.
/// - [`GameError::InvalidTarget`] / [`GameError::NoPathFound`] if the
///   source cannot be reached.
pub fn try_gather_resources(
    world: &mut World,
    unit: &mut Unit,
    kind: ResourceKind,
    now: SimTime,
) -> Result<()> {
    if unit.carry_capacity <= Fixed::ZERO {
        return Err(GameError::InvalidState(format!(
            "{:?} cannot gather",
            unit.kind
        )));
    }
    if unit.task.gather_resource() == Some(kind) {
        return Ok(());
    }

    let Some(source) = world.find_nearest_resource(unit.tile, kind, unit.owner) else {
        unit.go_idle();
        return Err(GameError::ResourceUnavailable(kind));
    };
    march_to(world, unit, kind, source, now)
}

fn is_adjacent(a: TilePos, b: TilePos) -> bool {
    a != b && a.x.abs_diff(b.x) <= 1 && a.y.abs_diff(b.y) <= 1
}

/// Tile to stand on while harvesting `source`.
fn gathering_stand(
    world: &World,
    unit: &Unit,
    kind: ResourceKind,
    source: TilePos,
) -> Option<TilePos> {
    if kind == ResourceKind::Food {
        return Some(source);
    }
    world
        .map
        .neighbors(source)
        .filter(|p| world.map.is_tile_free_for_unit(*p))
        .min_by_key(|p| p.manhattan(unit.tile))
}

fn begin_gathering(unit: &mut Unit, resource: ResourceKind, source: TilePos, now: SimTime) {
    unit.stop();
    unit.task = UnitTask::Gathering { resource, source };
    unit.last_gather_time = Some(now);
    debug!(unit = unit.id, ?resource, ?source, "gathering");
}

/// Start walking to `source`, or start gathering if already beside it.
fn march_to(
    world: &mut World,
    unit: &mut Unit,
    resource: ResourceKind,
    source: TilePos,
    now: SimTime,
) -> Result<()> {
    let standing = movement::is_at(unit, unit.tile, &world.config);
    let beside = match resource {
        ResourceKind::Food => unit.tile == source,
        _ => is_adjacent(unit.tile, source),
    };
    if standing && beside {
        begin_gathering(unit, resource, source, now);
        return Ok(());
    }

    let stand = gathering_stand(world, unit, resource, source)
        .ok_or(GameError::InvalidTarget(source))?;
    movement::set_destination(unit, &world.map, stand, now)?;
    unit.task = UnitTask::Marching {
        resource,
        source,
        stand,
    };
    debug!(unit = unit.id, ?resource, ?source, ?stand, "marching");
    Ok(())
}

/// The current source is gone: return the load, pick another source, or
/// give up.
fn retarget(
    world: &mut World,
    unit: &mut Unit,
    resource: ResourceKind,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    if unit.carrying.get(resource) > Fixed::ZERO {
        return begin_return(world, unit, resource, now, events);
    }

    let next = world.find_nearest_resource(unit.tile, resource, unit.owner);
    let marched = next.is_some_and(|source| march_to(world, unit, resource, source, now).is_ok());
    if !marched {
        debug!(unit = unit.id, ?resource, "no source left");
        unit.go_idle();
        events.push(SimEvent::GatherAbandoned {
            unit: unit.id,
            resource,
        });
    }
    Ok(())
}

pub(crate) fn update_marching(
    world: &mut World,
    unit: &mut Unit,
    resource: ResourceKind,
    source: TilePos,
    stand: TilePos,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    if world.source_amount(resource, source).is_none() {
        return retarget(world, unit, resource, now, events);
    }

    if unit.target_position.is_none() {
        if movement::is_at(unit, stand, &world.config) {
            begin_gathering(unit, resource, source, now);
            return Ok(());
        }
        if movement::set_destination(unit, &world.map, stand, now).is_err() {
            events.push(SimEvent::MovementBlocked {
                unit: unit.id,
                goal: stand,
            });
            return Ok(());
        }
    }

    match movement::step(unit, &mut world.map, &world.config, now) {
        MoveOutcome::Arrived => begin_gathering(unit, resource, source, now),
        MoveOutcome::Blocked => events.push(SimEvent::MovementBlocked {
            unit: unit.id,
            goal: stand,
        }),
        _ => {}
    }
    Ok(())
}

pub(crate) fn update_gathering(
    world: &mut World,
    unit: &mut Unit,
    resource: ResourceKind,
    source: TilePos,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let capacity = unit.carry_capacity;
    if unit.carrying.get(resource) >= capacity {
        return begin_return(world, unit, resource, now, events);
    }

    let Some(available) = world.source_amount(resource, source) else {
        return retarget(world, unit, resource, now, events);
    };
    let Some(last) = unit.last_gather_time else {
        unit.last_gather_time = Some(now);
        return Ok(());
    };

    let elapsed = (now - last).max(Fixed::ZERO);
    let room = capacity - unit.carrying.get(resource);
    let amount = (unit.gather_rate * elapsed).min(room).min(available);
    if amount > Fixed::ZERO {
        unit.carrying.add(resource, amount);
        unit.last_gather_time = Some(now);
        extract(world, resource, source, amount, events);
        events.push(SimEvent::Gathered {
            unit: unit.id,
            resource,
            amount,
        });
    }

    if unit.carrying.get(resource) >= capacity {
        return begin_return(world, unit, resource, now, events);
    }
    Ok(())
}

/// Take `amount` from a source, removing it when it runs dry.
fn extract(
    world: &mut World,
    resource: ResourceKind,
    source: TilePos,
    amount: Fixed,
    events: &mut TickEvents,
) {
    let depleted = match resource {
        ResourceKind::Food => {
            let Some(farm) = world.map.farm_at(source) else {
                return;
            };
            let Some(building) = world.buildings.get_mut(farm.building) else {
                return;
            };
            building.food -= amount;
            if building.food > Fixed::ZERO {
                false
            } else {
                let (kind, owner) = (building.kind, building.owner);
                world.destroy_building(farm.building);
                events.push(SimEvent::BuildingDestroyed {
                    building: farm.building,
                    kind,
                    owner,
                });
                true
            }
        }
        _ => world.map.extract_resource(source, amount).1,
    };

    if depleted {
        debug!(?resource, ?source, "source depleted");
        events.push(SimEvent::ResourceDepleted {
            resource,
            tile: source,
        });
    }
}

/// Head for the nearest drop point with the current load.
///
/// An owner with no drop point at all leaves the unit idle with its load
/// kept; a later gather order resumes the return.
fn begin_return(
    world: &mut World,
    unit: &mut Unit,
    resource: ResourceKind,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let Some((_, drop_point)) = world.find_drop_point(unit.tile, unit.owner) else {
        warn!(unit = unit.id, owner = ?unit.owner, ?resource, "no drop point for resource return");
        unit.go_idle();
        events.push(SimEvent::ReturnStalled {
            unit: unit.id,
            player: unit.owner,
            resource,
        });
        return Ok(());
    };
    let building = world
        .building(drop_point)
        .ok_or(GameError::EntityNotFound(drop_point))?;
    let (origin, size) = (building.origin, building.size);

    let Some(drop_tile) = world
        .map
        .perimeter(origin, size)
        .into_iter()
        .find(|p| world.map.is_tile_free_for_unit(*p))
    else {
        warn!(unit = unit.id, drop_point, "drop point is walled in");
        return Ok(());
    };

    unit.task = UnitTask::Returning {
        resource,
        drop_point,
        drop_tile,
    };
    if movement::set_destination(unit, &world.map, drop_tile, now).is_err() {
        unit.stop();
        events.push(SimEvent::MovementBlocked {
            unit: unit.id,
            goal: drop_tile,
        });
    }
    debug!(unit = unit.id, ?resource, drop_point, ?drop_tile, "returning");
    Ok(())
}

pub(crate) fn update_returning(
    world: &mut World,
    unit: &mut Unit,
    resource: ResourceKind,
    drop_point: EntityId,
    drop_tile: TilePos,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let still_ours = world
        .building(drop_point)
        .is_some_and(|b| b.owner == unit.owner);
    if !still_ours || !world.map.is_tile_free_for_unit(drop_tile) {
        unit.stop();
        return begin_return(world, unit, resource, now, events);
    }

    if movement::is_at(unit, drop_tile, &world.config) {
        return deposit(world, unit, resource, events);
    }
    if unit.target_position.is_none()
        && movement::set_destination(unit, &world.map, drop_tile, now).is_err()
    {
        events.push(SimEvent::MovementBlocked {
            unit: unit.id,
            goal: drop_tile,
        });
        return Ok(());
    }

    match movement::step(unit, &mut world.map, &world.config, now) {
        MoveOutcome::Arrived => deposit(world, unit, resource, events),
        MoveOutcome::Blocked => {
            events.push(SimEvent::MovementBlocked {
                unit: unit.id,
                goal: drop_tile,
            });
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Move the whole load into the owner's stock in one step.
fn deposit(
    world: &mut World,
    unit: &mut Unit,
    resource: ResourceKind,
    events: &mut TickEvents,
) -> Result<()> {
    let amount = unit.carrying.get(resource);
    let player = world.player_mut(unit.owner)?;
    player.stock.add(resource, amount);
    unit.carrying.set(resource, Fixed::ZERO);
    unit.go_idle();
    debug!(unit = unit.id, ?resource, %amount, "deposited");
    events.push(SimEvent::Deposited {
        unit: unit.id,
        player: unit.owner,
        resource,
        amount,
    });
    Ok(())
}
