//! Unit training queues on buildings.
//!
//! The cost of a unit is paid when it is queued. Only the front entry
//! progresses; its timer starts when it reaches the front, and the finished
//! unit appears on the first free tile around the building.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::components::EntityId;
use crate::data::UnitKind;
use crate::error::{GameError, Result};
use crate::events::{SimEvent, TickEvents};
use crate::math::option_fixed_serde;
use crate::time::SimTime;
use crate::world::World;

/// A unit waiting in a training queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainingEntry {
    /// Unit type being trained.
    pub kind: UnitKind,
    /// When the entry reached the front of the queue.
    #[serde(with = "option_fixed_serde")]
    pub started_at: Option<SimTime>,
}

impl TrainingEntry {
    /// Queue a unit that has not started yet.
    #[must_use]
    pub const fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            started_at: None,
        }
    }
}

/// Per-building training queue. The front entry is the one in progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrainingQueue {
    entries: VecDeque<TrainingEntry>,
}

impl TrainingQueue {
    /// Number of queued units, including the one in progress.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry in progress.
    #[must_use]
    pub fn current(&self) -> Option<&TrainingEntry> {
        self.entries.front()
    }

    /// Queued entries, front first.
    pub fn iter(&self) -> impl Iterator<Item = &TrainingEntry> {
        self.entries.iter()
    }

    fn push(&mut self, entry: TrainingEntry) {
        self.entries.push_back(entry);
    }

    /// Start the front entry's timer if it has not started yet.
    fn start_front(&mut self, now: SimTime) -> Option<TrainingEntry> {
        let front = self.entries.front_mut()?;
        front.started_at.get_or_insert(now);
        Some(*front)
    }

    fn finish_front(&mut self) -> Option<TrainingEntry> {
        self.entries.pop_front()
    }
}

/// Queue a unit for training at `building`, paying its cost up front.
///
/// # Errors
///
/// - [`GameError::EntityNotFound`] if the building does not exist.
/// - [`GameError::InvalidState`] if the building cannot train `kind` or
///   its queue is full.
/// - [`GameError::InsufficientFunds`] if the owner cannot pay; nothing is
///   deducted or queued.
pub fn try_train_unit(
    world: &mut World,
    building: EntityId,
    kind: UnitKind,
    now: SimTime,
) -> Result<()> {
    let site = world
        .building(building)
        .ok_or(GameError::EntityNotFound(building))?;
    let (owner, building_kind, queued) = (site.owner, site.kind, site.training.len());

    if !world.catalog.building(building_kind)?.trains.contains(&kind) {
        return Err(GameError::InvalidState(format!(
            "{building_kind:?} cannot train {kind:?}"
        )));
    }
    if queued >= world.config.training_queue_limit {
        return Err(GameError::InvalidState(format!(
            "training queue of building {building} is full"
        )));
    }

    let cost = world.catalog.unit(kind)?.cost;
    world.player_mut(owner)?.stock.spend(&cost)?;

    let queue = &mut world
        .building_mut(building)
        .ok_or(GameError::EntityNotFound(building))?
        .training;
    queue.push(TrainingEntry::new(kind));
    if queue.len() == 1 {
        queue.start_front(now);
    }
    debug!(building, ?kind, queued = queue.len(), "unit queued");
    Ok(())
}

/// Advance the front of `building`'s queue and spawn it when done.
///
/// A finished unit waits in the queue while its owner is at the
/// population cap or no tile around the building is free.
pub(crate) fn process_training(
    world: &mut World,
    building: EntityId,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let Some(trainer) = world.building_mut(building) else {
        return Ok(());
    };
    let Some(entry) = trainer.training.start_front(now) else {
        return Ok(());
    };
    let (owner, origin, size) = (trainer.owner, trainer.origin, trainer.size);

    let started = entry.started_at.unwrap_or(now);
    if now - started < world.catalog.unit(entry.kind)?.training_time {
        return Ok(());
    }

    if world.player(owner)?.population >= world.population_cap(owner) {
        debug!(building, kind = ?entry.kind, "training waits for population room");
        return Ok(());
    }
    let Some(tile) = world
        .map
        .perimeter(origin, size)
        .into_iter()
        .find(|p| world.map.is_tile_free_for_unit(*p))
    else {
        debug!(building, kind = ?entry.kind, "no free tile to place trained unit");
        return Ok(());
    };

    let unit = world.spawn_unit(entry.kind, owner, tile)?;
    if let Some(trainer) = world.building_mut(building) {
        trainer.training.finish_front();
        trainer.training.start_front(now);
    }
    info!(building, unit, kind = ?entry.kind, ?tile, "unit trained");
    events.push(SimEvent::UnitTrained {
        building,
        unit,
        kind: entry.kind,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{PlayerId, ResourceAmounts, ResourceKind};
    use crate::data::{BuildingKind, Civilization};
    use crate::grid::TilePos;
    use crate::math::Fixed;

    fn t(n: f64) -> SimTime {
        Fixed::from_num(n)
    }

    fn town() -> (World, PlayerId, EntityId) {
        let mut world = World::new(20, 20);
        let player = world.add_player("Red", Civilization::Means);
        let center = world
            .place_building(BuildingKind::TownCenter, player, TilePos::new(5, 5))
            .unwrap();
        (world, player, center)
    }

    #[test]
    fn test_cost_paid_on_enqueue() {
        let (mut world, player, center) = town();
        try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).unwrap();

        let stock = world.player(player).unwrap().stock;
        assert_eq!(stock.get(ResourceKind::Food), Fixed::ZERO);
        assert_eq!(world.building(center).unwrap().training.len(), 1);
    }

    #[test]
    fn test_insufficient_funds_is_a_no_op() {
        let (mut world, player, center) = town();
        world.set_stock(player, ResourceAmounts::new(0, 0, 10)).unwrap();

        let err = try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { .. }));
        assert!(world.building(center).unwrap().training.is_empty());
        assert_eq!(
            world.player(player).unwrap().stock.get(ResourceKind::Food),
            Fixed::from_num(10)
        );
    }

    #[test]
    fn test_building_must_offer_the_kind() {
        let (mut world, _, center) = town();
        let err = try_train_unit(&mut world, center, UnitKind::Swordsman, t(0.0)).unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[test]
    fn test_queue_limit() {
        let (mut world, player, center) = town();
        world
            .set_stock(player, ResourceAmounts::new(0, 0, 10_000))
            .unwrap();
        for _ in 0..world.config.training_queue_limit {
            try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).unwrap();
        }
        assert!(try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).is_err());
    }

    #[test]
    fn test_unit_spawns_after_training_time() {
        let (mut world, player, center) = town();
        try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).unwrap();

        let mut events = TickEvents::default();
        process_training(&mut world, center, t(24.0), &mut events).unwrap();
        assert!(events.is_empty());

        process_training(&mut world, center, t(25.0), &mut events).unwrap();
        assert_eq!(world.player(player).unwrap().units.len(), 1);
        let unit = world.player(player).unwrap().units[0];
        assert_eq!(world.unit(unit).unwrap().tile, TilePos::new(4, 4));
        assert!(world.building(center).unwrap().training.is_empty());
        assert!(matches!(events.events[0], SimEvent::UnitTrained { .. }));
    }

    #[test]
    fn test_next_entry_starts_when_front_finishes() {
        let (mut world, player, center) = town();
        world
            .set_stock(player, ResourceAmounts::new(0, 0, 100))
            .unwrap();
        try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).unwrap();
        try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).unwrap();

        let mut events = TickEvents::default();
        process_training(&mut world, center, t(25.0), &mut events).unwrap();
        let queue = &world.building(center).unwrap().training;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.current().unwrap().started_at, Some(t(25.0)));
    }

    #[test]
    fn test_waits_at_population_cap() {
        let (mut world, player, center) = town();
        for x in 0..5 {
            world
                .place_unit(UnitKind::Villager, player, TilePos::new(x, 15))
                .unwrap();
        }
        try_train_unit(&mut world, center, UnitKind::Villager, t(0.0)).unwrap();

        let mut events = TickEvents::default();
        process_training(&mut world, center, t(30.0), &mut events).unwrap();
        assert_eq!(world.player(player).unwrap().population, 5);
        assert_eq!(world.building(center).unwrap().training.len(), 1);

        world
            .place_building(BuildingKind::House, player, TilePos::new(15, 15))
            .unwrap();
        process_training(&mut world, center, t(31.0), &mut events).unwrap();
        assert_eq!(world.player(player).unwrap().population, 6);
    }
}
