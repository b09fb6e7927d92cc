//! Time-based movement along planned routes.
//!
//! A unit's continuous position advances by `speed * dt` towards the next
//! waypoint each tick. Tile occupancy is committed only when a waypoint is
//! reached, so a unit between tiles is still listed on the tile it left.

use tracing::{debug, warn};

use crate::components::Unit;
use crate::data::EngineConfig;
use crate::error::{GameError, Result};
use crate::grid::{GridMap, TilePos};
use crate::math::Fixed;
use crate::pathfinding::find_path;
use crate::time::SimTime;

/// Result of one movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// No destination, or no time elapsed.
    Stationary,
    /// Moved part of the way to the next waypoint.
    Advanced,
    /// Reached an intermediate waypoint.
    ReachedWaypoint,
    /// Standing exactly on the destination; route cleared.
    Arrived,
    /// No route exists from the current tile.
    Blocked,
}

/// Plan a route to `goal` and make it the unit's destination.
///
/// Movement time starts counting from `now`. Repeating the call for the
/// destination already being travelled to keeps the existing route and
/// timer. On error nothing about the unit changes.
///
/// # Errors
///
/// - [`GameError::InvalidTarget`] if `goal` is out of bounds or blocked.
/// - [`GameError::NoPathFound`] if `goal` cannot be reached.
pub fn set_destination(unit: &mut Unit, map: &GridMap, goal: TilePos, now: SimTime) -> Result<()> {
    if unit.target_position == Some(goal) && unit.path.is_some() {
        return Ok(());
    }
    plan_route(unit, map, goal)?;
    unit.last_move_time = Some(now);
    Ok(())
}

/// Re-plan towards `goal` without touching the movement timer.
///
/// Used when a unit already under way changes course mid-task.
///
/// # Errors
///
/// Same as [`set_destination`].
pub fn plan_route(unit: &mut Unit, map: &GridMap, goal: TilePos) -> Result<()> {
    if !map.is_tile_free_for_unit(goal) {
        return Err(GameError::InvalidTarget(goal));
    }
    if unit.target_position == Some(goal) && unit.path.is_some() {
        return Ok(());
    }

    let path = find_path(map, unit.tile, goal)?;
    debug!(unit = unit.id, ?goal, steps = path.len(), "route planned");
    unit.path = Some(path.into());
    unit.target_position = Some(goal);
    Ok(())
}

/// Whether the unit stands on `tile` within the arrival epsilon.
#[must_use]
pub fn is_at(unit: &Unit, tile: TilePos, config: &EngineConfig) -> bool {
    unit.position.approx_eq(tile.to_world(), config.arrival_epsilon)
}

/// Advance the unit along its route for the time since its last step.
///
/// At most one waypoint is consumed per call. If the next waypoint has been
/// blocked since planning, the route is re-planned from the committed tile.
pub fn step(
    unit: &mut Unit,
    map: &mut GridMap,
    config: &EngineConfig,
    now: SimTime,
) -> MoveOutcome {
    let Some(goal) = unit.target_position else {
        return MoveOutcome::Stationary;
    };

    let last = unit.last_move_time.unwrap_or(now);
    let dt = (now - last).clamp(Fixed::ZERO, config.max_time_slice);
    unit.last_move_time = Some(now);

    let next_blocked = unit
        .path
        .as_ref()
        .and_then(|p| p.front())
        .is_some_and(|next| !map.is_tile_free_for_unit(*next));
    if unit.path.is_none() || next_blocked {
        match find_path(map, unit.tile, goal) {
            Ok(path) => unit.path = Some(path.into()),
            Err(err) => {
                warn!(unit = unit.id, ?goal, %err, "movement blocked");
                unit.path = None;
                return MoveOutcome::Blocked;
            }
        }
    }

    let goal_world = goal.to_world();
    let Some(path) = unit.path.as_mut() else {
        return MoveOutcome::Blocked;
    };
    if path.is_empty() {
        if unit.position == goal_world {
            arrive(unit, map, goal);
            return MoveOutcome::Arrived;
        }
        path.push_back(goal);
    }
    let Some(&next) = path.front() else {
        return MoveOutcome::Stationary;
    };

    let budget = unit.speed * dt;
    if budget <= Fixed::ZERO {
        return MoveOutcome::Stationary;
    }

    let next_world = next.to_world();
    if budget * budget >= unit.position.distance_squared(next_world) {
        unit.position = next_world;
        path.pop_front();
        let finished = path.is_empty();
        commit_tile(unit, map, next);
        if finished {
            arrive(unit, map, goal);
            return MoveOutcome::Arrived;
        }
        return MoveOutcome::ReachedWaypoint;
    }

    let direction = (next_world - unit.position).normalize();
    unit.position = unit.position + direction.scale(budget);
    MoveOutcome::Advanced
}

fn commit_tile(unit: &mut Unit, map: &mut GridMap, tile: TilePos) {
    if unit.tile != tile && map.move_unit(unit.id, unit.tile, tile) {
        unit.tile = tile;
    }
}

fn arrive(unit: &mut Unit, map: &mut GridMap, goal: TilePos) {
    unit.position = goal.to_world();
    commit_tile(unit, map, goal);
    unit.stop();
    debug!(unit = unit.id, ?goal, "arrived");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{PlayerId, ResourceAmounts, ResourceKind, UnitTask};
    use crate::data::UnitKind;
    use crate::math::Vec2Fixed;

    fn unit_at(map: &mut GridMap, x: u32, y: u32, speed: Fixed) -> Unit {
        let tile = TilePos::new(x, y);
        map.place_unit(tile, 1);
        Unit {
            id: 1,
            owner: PlayerId(0),
            kind: UnitKind::Villager,
            position: tile.to_world(),
            tile,
            speed,
            hp: 25,
            max_hp: 25,
            attack: 2,
            range: Fixed::ONE,
            path: None,
            target_position: None,
            task: UnitTask::Idle,
            carrying: ResourceAmounts::default(),
            carry_capacity: Fixed::from_num(20),
            gather_rate: Fixed::ONE,
            last_move_time: None,
            last_gather_time: None,
            last_hit_time: None,
        }
    }

    fn t(n: f64) -> SimTime {
        Fixed::from_num(n)
    }

    #[test]
    fn test_walks_one_tile_per_second() {
        let mut map = GridMap::new(10, 10);
        let config = EngineConfig::default();
        let mut unit = unit_at(&mut map, 0, 0, Fixed::ONE);

        set_destination(&mut unit, &map, TilePos::new(3, 0), t(0.0)).unwrap();
        assert_eq!(step(&mut unit, &mut map, &config, t(1.0)), MoveOutcome::ReachedWaypoint);
        assert_eq!(unit.position, Vec2Fixed::from_int(1, 0));
        assert_eq!(unit.tile, TilePos::new(1, 0));
        assert_eq!(map.tile(TilePos::new(1, 0)).unwrap().units, vec![1]);

        step(&mut unit, &mut map, &config, t(2.0));
        assert_eq!(step(&mut unit, &mut map, &config, t(3.0)), MoveOutcome::Arrived);
        assert_eq!(unit.position, Vec2Fixed::from_int(3, 0));
        assert!(unit.path.is_none());
        assert!(unit.target_position.is_none());
    }

    #[test]
    fn test_partial_step_does_not_commit_tile() {
        let mut map = GridMap::new(10, 10);
        let config = EngineConfig::default();
        let mut unit = unit_at(&mut map, 0, 0, Fixed::ONE);

        set_destination(&mut unit, &map, TilePos::new(2, 0), t(0.0)).unwrap();
        assert_eq!(step(&mut unit, &mut map, &config, t(0.5)), MoveOutcome::Advanced);
        assert_eq!(unit.position, Vec2Fixed::new(t(0.5), Fixed::ZERO));
        assert_eq!(unit.tile, TilePos::new(0, 0));
        assert_eq!(map.tile(TilePos::new(0, 0)).unwrap().units, vec![1]);
    }

    #[test]
    fn test_time_slice_is_capped() {
        let mut map = GridMap::new(20, 1);
        let config = EngineConfig {
            max_time_slice: t(0.25),
            ..EngineConfig::default()
        };
        let mut unit = unit_at(&mut map, 0, 0, Fixed::ONE);

        set_destination(&mut unit, &map, TilePos::new(10, 0), t(0.0)).unwrap();
        step(&mut unit, &mut map, &config, t(50.0));
        assert_eq!(unit.position, Vec2Fixed::new(t(0.25), Fixed::ZERO));
    }

    #[test]
    fn test_repeated_destination_keeps_route() {
        let mut map = GridMap::new(10, 10);
        let config = EngineConfig::default();
        let mut unit = unit_at(&mut map, 0, 0, Fixed::ONE);

        set_destination(&mut unit, &map, TilePos::new(6, 0), t(0.0)).unwrap();
        step(&mut unit, &mut map, &config, t(1.0));
        let before = unit.path.clone();

        set_destination(&mut unit, &map, TilePos::new(6, 0), t(1.0)).unwrap();
        assert_eq!(unit.path, before);
        assert_eq!(unit.last_move_time, Some(t(1.0)));
    }

    #[test]
    fn test_replans_around_new_obstacle() {
        let mut map = GridMap::new(10, 10);
        let config = EngineConfig::default();
        let mut unit = unit_at(&mut map, 0, 5, Fixed::ONE);

        set_destination(&mut unit, &map, TilePos::new(4, 5), t(0.0)).unwrap();
        map.add_resource(TilePos::new(1, 5), ResourceKind::Gold, Fixed::from_num(800))
            .unwrap();

        let outcome = step(&mut unit, &mut map, &config, t(1.0));
        assert_ne!(outcome, MoveOutcome::Blocked);
        assert_ne!(unit.tile, TilePos::new(1, 5));
        assert_eq!(unit.target_position, Some(TilePos::new(4, 5)));
    }

    #[test]
    fn test_blocked_when_goal_sealed_after_planning() {
        let mut map = GridMap::new(3, 1);
        let config = EngineConfig::default();
        let mut unit = unit_at(&mut map, 0, 0, Fixed::ONE);

        set_destination(&mut unit, &map, TilePos::new(2, 0), t(0.0)).unwrap();
        map.add_resource(TilePos::new(1, 0), ResourceKind::Wood, Fixed::from_num(5))
            .unwrap();

        assert_eq!(step(&mut unit, &mut map, &config, t(1.0)), MoveOutcome::Blocked);
        assert_eq!(unit.position, Vec2Fixed::from_int(0, 0));
        assert_eq!(unit.target_position, Some(TilePos::new(2, 0)));
    }

    #[test]
    fn test_invalid_destination_leaves_unit_untouched() {
        let mut map = GridMap::new(5, 5);
        let mut unit = unit_at(&mut map, 0, 0, Fixed::ONE);
        let before = unit.clone();

        let err = set_destination(&mut unit, &map, TilePos::new(9, 9), t(0.0)).unwrap_err();
        assert!(matches!(err, GameError::InvalidTarget(_)));
        assert_eq!(unit, before);
    }

    #[test]
    fn test_diagonal_step_reaches_waypoint_exactly() {
        let mut map = GridMap::new(5, 5);
        let config = EngineConfig::default();
        let mut unit = unit_at(&mut map, 0, 0, Fixed::ONE);

        set_destination(&mut unit, &map, TilePos::new(1, 1), t(0.0)).unwrap();
        assert_eq!(step(&mut unit, &mut map, &config, t(1.0)), MoveOutcome::Advanced);
        assert_eq!(step(&mut unit, &mut map, &config, t(2.0)), MoveOutcome::Arrived);
        assert_eq!(unit.position, Vec2Fixed::from_int(1, 1));
    }
}
