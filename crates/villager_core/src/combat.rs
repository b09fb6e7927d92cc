//! Range- and cadence-gated combat.
//!
//! This module implements:
//! - The [`Combatant`] capability shared by units and buildings
//! - Damage resolution: a hit at least as strong as the remaining hp kills
//! - Chasing (`GoingToBattle`) with re-planning when the target moves
//! - Attacking at most once per `attack_interval` while within
//!   `range + attack_tolerance`
//! - Keep defence against the nearest enemy unit

use tracing::debug;

use crate::components::{Building, CombatTarget, EntityId, PlayerId, Unit, UnitTask};
use crate::data::EngineConfig;
use crate::error::{GameError, Result};
use crate::events::{SimEvent, TickEvents};
use crate::grid::TilePos;
use crate::math::{Fixed, Vec2Fixed};
use crate::movement::{self, MoveOutcome};
use crate::time::SimTime;
use crate::world::World;

/// Something with hit points that can be attacked and killed.
pub trait Combatant {
    /// Remaining hit points.
    fn hp(&self) -> i32;

    /// Overwrite hit points.
    fn set_hp(&mut self, hp: i32);

    /// Owning player.
    fn owner(&self) -> PlayerId;

    /// Reference position: a unit's position or a building's origin.
    fn position(&self) -> Vec2Fixed;

    /// Euclidean distance from `point` to the nearest part of the body.
    fn distance_from(&self, point: Vec2Fixed) -> Fixed;

    /// Whether hit points remain.
    fn is_alive(&self) -> bool {
        self.hp() > 0
    }

    /// Drop hit points to zero. Removal from the world is the caller's job.
    fn kill(&mut self) {
        self.set_hp(0);
    }
}

impl Combatant for Unit {
    fn hp(&self) -> i32 {
        self.hp
    }

    fn set_hp(&mut self, hp: i32) {
        self.hp = hp;
    }

    fn owner(&self) -> PlayerId {
        self.owner
    }

    fn position(&self) -> Vec2Fixed {
        self.position
    }

    fn distance_from(&self, point: Vec2Fixed) -> Fixed {
        self.position.distance(point)
    }
}

impl Combatant for Building {
    fn hp(&self) -> i32 {
        self.hp
    }

    fn set_hp(&mut self, hp: i32) {
        self.hp = hp;
    }

    fn owner(&self) -> PlayerId {
        self.owner
    }

    fn position(&self) -> Vec2Fixed {
        self.origin.to_world()
    }

    fn distance_from(&self, point: Vec2Fixed) -> Fixed {
        self.closest_point(point).distance(point)
    }
}

/// Outcome of a single hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// The defender survived with this many hit points.
    Damaged(i32),
    /// The defender's hit points reached zero.
    Killed,
}

/// Apply one hit of `attack` damage.
pub fn resolve_hit(attack: i32, defender: &mut dyn Combatant) -> HitOutcome {
    if attack >= defender.hp() {
        defender.kill();
        HitOutcome::Killed
    } else {
        defender.set_hp(defender.hp() - attack);
        HitOutcome::Damaged(defender.hp())
    }
}

/// Whether `distance` is within `range` plus the configured tolerance.
#[must_use]
pub fn in_attack_range(distance: Fixed, range: Fixed, config: &EngineConfig) -> bool {
    distance <= range + config.attack_tolerance
}

/// Whether enough simulated time has passed since `last_hit`.
#[must_use]
pub fn can_strike(last_hit: Option<SimTime>, now: SimTime, config: &EngineConfig) -> bool {
    last_hit.map_or(true, |last| now - last >= config.attack_interval)
}

/// What an attacker needs to know about its target this tick.
#[derive(Debug, Clone, Copy)]
struct TargetView {
    distance: Fixed,
    tile: TilePos,
    approach: Option<TilePos>,
}

fn target_view(world: &World, attacker: &Unit, target: CombatTarget) -> Option<TargetView> {
    match target {
        CombatTarget::Unit(id) => {
            let victim = world.units.get(id).filter(|u| u.is_alive())?;
            Some(TargetView {
                distance: victim.distance_from(attacker.position),
                tile: victim.tile,
                approach: Some(victim.tile),
            })
        }
        CombatTarget::Building(id) => {
            let victim = world.buildings.get(id).filter(|b| b.is_alive())?;
            Some(TargetView {
                distance: victim.distance_from(attacker.position),
                tile: victim.origin,
                approach: building_approach(world, attacker, victim),
            })
        }
    }
}

/// Free perimeter tile from which the attacker can reach the building,
/// falling back to the nearest free one.
fn building_approach(world: &World, attacker: &Unit, building: &Building) -> Option<TilePos> {
    let ring: Vec<TilePos> = world
        .map
        .perimeter(building.origin, building.size)
        .into_iter()
        .filter(|p| world.map.is_tile_free_for_unit(*p))
        .collect();
    let reachable = ring.iter().copied().filter(|p| {
        in_attack_range(
            building.distance_from(p.to_world()),
            attacker.range,
            &world.config,
        )
    });

    nearest_to(attacker.tile, reachable).or_else(|| nearest_to(attacker.tile, ring.iter().copied()))
}

fn nearest_to(from: TilePos, tiles: impl Iterator<Item = TilePos>) -> Option<TilePos> {
    tiles.min_by_key(|p| p.manhattan(from))
}

/// Send `unit` after `target`.
///
/// Repeating the order for the current target is a no-op.
///
/// # Errors
///
/// - [`GameError::EntityAlreadyDead`] if the target is dead or gone; the
///   unit is left idle.
/// - [`GameError::InvalidState`] if the unit targets itself or cannot
///   deal damage.
pub fn try_go_battle(
    world: &mut World,
    unit: &mut Unit,
    target: CombatTarget,
    now: SimTime,
) -> Result<()> {
    if target == CombatTarget::Unit(unit.id) {
        return Err(GameError::InvalidState(format!(
            "unit {} cannot attack itself",
            unit.id
        )));
    }
    if unit.attack <= 0 {
        return Err(GameError::InvalidState(format!(
            "{:?} cannot attack",
            unit.kind
        )));
    }
    if unit.task.combat_target() == Some(target) {
        return Ok(());
    }

    let Some(view) = target_view(world, unit, target) else {
        unit.go_idle();
        return Err(GameError::EntityAlreadyDead(target.id()));
    };

    unit.stop();
    unit.last_move_time = Some(now);
    unit.task = UnitTask::GoingToBattle {
        target,
        last_seen: view.tile,
    };
    debug!(unit = unit.id, ?target, "going to battle");
    Ok(())
}

pub(crate) fn update_going_to_battle(
    world: &mut World,
    unit: &mut Unit,
    target: CombatTarget,
    last_seen: TilePos,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let Some(view) = target_view(world, unit, target) else {
        debug!(unit = unit.id, ?target, "target gone");
        unit.go_idle();
        return Ok(());
    };

    if in_attack_range(view.distance, unit.range, &world.config) {
        unit.stop();
        unit.task = UnitTask::Attacking { target };
        return update_attacking(world, unit, target, now, events);
    }

    if view.tile != last_seen || unit.target_position.is_none() {
        unit.task = UnitTask::GoingToBattle {
            target,
            last_seen: view.tile,
        };
        let planned = view
            .approach
            .is_some_and(|approach| movement::plan_route(unit, &world.map, approach).is_ok());
        if !planned {
            events.push(SimEvent::MovementBlocked {
                unit: unit.id,
                goal: view.tile,
            });
            return Ok(());
        }
    }

    if movement::step(unit, &mut world.map, &world.config, now) == MoveOutcome::Blocked {
        events.push(SimEvent::MovementBlocked {
            unit: unit.id,
            goal: view.tile,
        });
    }
    Ok(())
}

pub(crate) fn update_attacking(
    world: &mut World,
    unit: &mut Unit,
    target: CombatTarget,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let Some(view) = target_view(world, unit, target) else {
        debug!(unit = unit.id, ?target, "target gone");
        unit.go_idle();
        return Ok(());
    };

    if !in_attack_range(view.distance, unit.range, &world.config) {
        unit.stop();
        unit.task = UnitTask::GoingToBattle {
            target,
            last_seen: view.tile,
        };
        return Ok(());
    }
    if !can_strike(unit.last_hit_time, now, &world.config) {
        return Ok(());
    }

    unit.last_hit_time = Some(now);
    if strike(world, unit.id, unit.attack, target, events) == Some(HitOutcome::Killed) {
        unit.go_idle();
    }
    Ok(())
}

/// Land a hit and remove the target if it dies.
fn strike(
    world: &mut World,
    attacker: EntityId,
    attack: i32,
    target: CombatTarget,
    events: &mut TickEvents,
) -> Option<HitOutcome> {
    let (outcome, owner) = match target {
        CombatTarget::Unit(id) => {
            let victim = world.units.get_mut(id)?;
            (resolve_hit(attack, victim), victim.owner)
        }
        CombatTarget::Building(id) => {
            let victim = world.buildings.get_mut(id)?;
            (resolve_hit(attack, victim), victim.owner)
        }
    };

    let remaining_hp = match outcome {
        HitOutcome::Damaged(hp) => hp,
        HitOutcome::Killed => 0,
    };
    events.push(SimEvent::Hit {
        attacker,
        target,
        damage: attack,
        remaining_hp,
    });

    if outcome == HitOutcome::Killed {
        match target {
            CombatTarget::Unit(id) => {
                world.kill_unit(id);
                events.push(SimEvent::UnitKilled { unit: id, owner });
            }
            CombatTarget::Building(id) => {
                let kind = world.building(id).map(|b| b.kind);
                world.destroy_building(id);
                if let Some(kind) = kind {
                    events.push(SimEvent::BuildingDestroyed {
                        building: id,
                        kind,
                        owner,
                    });
                }
            }
        }
    }
    Some(outcome)
}

/// Let a defensive building shoot the nearest enemy unit in range.
pub(crate) fn building_defence(
    world: &mut World,
    building: EntityId,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let Some(keep) = world.building(building) else {
        return Ok(());
    };
    let stats = world.catalog.building(keep.kind)?;
    if stats.attack <= 0 || !can_strike(keep.last_hit_time, now, &world.config) {
        return Ok(());
    }

    let mut best: Option<(Fixed, EntityId)> = None;
    for player in world.players.iter().filter(|p| p.id != keep.owner) {
        for id in &player.units {
            let Some(enemy) = world.units.get(*id) else {
                continue;
            };
            let distance = keep.distance_from(enemy.position);
            if !in_attack_range(distance, stats.range, &world.config) {
                continue;
            }
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, *id));
            }
        }
    }

    let Some((_, victim)) = best else {
        return Ok(());
    };
    let attack = stats.attack;
    if let Some(keep) = world.building_mut(building) {
        keep.last_hit_time = Some(now);
    }
    strike(world, building, attack, CombatTarget::Unit(victim), events);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BuildingKind, Civilization, UnitKind};

    fn t(n: f64) -> SimTime {
        Fixed::from_num(n)
    }

    fn duel(distance: u32) -> (World, EntityId, EntityId) {
        let mut world = World::new(20, 20);
        let red = world.add_player("Red", Civilization::Means);
        let blue = world.add_player("Blue", Civilization::Means);
        let attacker = world
            .place_unit(UnitKind::Swordsman, red, TilePos::new(2, 2))
            .unwrap();
        let victim = world
            .place_unit(UnitKind::Villager, blue, TilePos::new(2 + distance, 2))
            .unwrap();
        (world, attacker, victim)
    }

    fn update(world: &mut World, id: EntityId, now: SimTime, events: &mut TickEvents) {
        world
            .with_unit(id, |world, unit| match unit.task {
                UnitTask::GoingToBattle { target, last_seen } => {
                    update_going_to_battle(world, unit, target, last_seen, now, events)
                }
                UnitTask::Attacking { target } => {
                    update_attacking(world, unit, target, now, events)
                }
                _ => Ok(()),
            })
            .unwrap();
    }

    #[test]
    fn test_resolve_hit() {
        let (mut world, _, victim) = duel(1);
        let unit = world.unit_mut(victim).unwrap();
        assert_eq!(resolve_hit(4, unit), HitOutcome::Damaged(21));
        unit.hp = 3;
        assert_eq!(resolve_hit(4, unit), HitOutcome::Killed);
        assert_eq!(unit.hp, 0);
        assert!(!unit.is_alive());
    }

    #[test]
    fn test_range_includes_tolerance() {
        let config = EngineConfig::default();
        assert!(in_attack_range(t(1.25), Fixed::ONE, &config));
        assert!(!in_attack_range(t(1.3), Fixed::ONE, &config));
    }

    #[test]
    fn test_cadence_independent_of_tick_rate() {
        let config = EngineConfig::default();
        assert!(can_strike(None, t(0.0), &config));
        assert!(!can_strike(Some(t(3.0)), t(3.9), &config));
        assert!(can_strike(Some(t(3.0)), t(4.0), &config));
    }

    #[test]
    fn test_kill_removes_target_and_idles_attacker() {
        let (mut world, attacker, victim) = duel(1);
        world.unit_mut(victim).unwrap().hp = 3;

        world
            .with_unit(attacker, |world, unit| {
                try_go_battle(world, unit, CombatTarget::Unit(victim), t(0.0))
            })
            .unwrap();
        let mut events = TickEvents::default();
        update(&mut world, attacker, t(0.1), &mut events);

        assert!(world.unit(victim).is_none());
        assert!(world.unit(attacker).unwrap().task.is_idle());
        assert_eq!(events.killed_units().collect::<Vec<_>>(), vec![victim]);
    }

    #[test]
    fn test_chases_then_attacks() {
        let (mut world, attacker, victim) = duel(4);
        world.unit_mut(attacker).unwrap().speed = Fixed::ONE;
        world
            .with_unit(attacker, |world, unit| {
                try_go_battle(world, unit, CombatTarget::Unit(victim), t(0.0))
            })
            .unwrap();

        let mut events = TickEvents::default();
        for second in 1..=4 {
            update(&mut world, attacker, t(f64::from(second)), &mut events);
        }
        assert!(matches!(
            world.unit(attacker).unwrap().task,
            UnitTask::Attacking { .. }
        ));
        assert!(world.unit(victim).unwrap().hp < 25);
    }

    #[test]
    fn test_dead_target_rejected() {
        let (mut world, attacker, victim) = duel(1);
        world.kill_unit(victim);
        let result = world.with_unit(attacker, |world, unit| {
            try_go_battle(world, unit, CombatTarget::Unit(victim), t(0.0))
        });
        assert!(matches!(result, Err(GameError::EntityAlreadyDead(_))));
        assert!(world.unit(attacker).unwrap().task.is_idle());
    }

    #[test]
    fn test_attacking_building_from_perimeter() {
        let mut world = World::new(20, 20);
        let red = world.add_player("Red", Civilization::Means);
        let blue = world.add_player("Blue", Civilization::Means);
        let attacker = world
            .place_unit(UnitKind::Swordsman, red, TilePos::new(0, 0))
            .unwrap();
        world.unit_mut(attacker).unwrap().speed = Fixed::ONE;
        let house = world
            .place_building(BuildingKind::House, blue, TilePos::new(6, 6))
            .unwrap();

        world
            .with_unit(attacker, |world, unit| {
                try_go_battle(world, unit, CombatTarget::Building(house), t(0.0))
            })
            .unwrap();
        let mut events = TickEvents::default();
        for second in 1..=15 {
            update(&mut world, attacker, t(f64::from(second)), &mut events);
        }

        assert!(world.building(house).unwrap().hp < 200);
        assert!(events.events.iter().any(|e| matches!(
            e,
            SimEvent::Hit {
                target: CombatTarget::Building(_),
                ..
            }
        )));
    }

    #[test]
    fn test_keep_shoots_nearest_enemy() {
        let mut world = World::new(20, 20);
        let red = world.add_player("Red", Civilization::Means);
        let blue = world.add_player("Blue", Civilization::Means);
        let keep = world
            .place_building(BuildingKind::Keep, red, TilePos::new(10, 10))
            .unwrap();
        let near = world
            .place_unit(UnitKind::Villager, blue, TilePos::new(12, 10))
            .unwrap();
        let far = world
            .place_unit(UnitKind::Villager, blue, TilePos::new(16, 10))
            .unwrap();
        world
            .place_unit(UnitKind::Villager, red, TilePos::new(11, 10))
            .unwrap();

        let mut events = TickEvents::default();
        building_defence(&mut world, keep, t(0.0), &mut events).unwrap();
        building_defence(&mut world, keep, t(0.5), &mut events).unwrap();

        assert_eq!(world.unit(near).unwrap().hp, 20);
        assert_eq!(world.unit(far).unwrap().hp, 25);
    }
}
