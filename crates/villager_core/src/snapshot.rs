//! End-of-tick views for renderers, AI and the headless runner.
//!
//! A snapshot is an owned copy; nothing in it can write back into the
//! simulation.

use serde::Serialize;

use crate::components::{EntityId, Facing, PlayerId, ResourceAmounts, ResourceKind};
use crate::data::{BuildingKind, UnitKind};
use crate::grid::TilePos;
use crate::math::{decimal_serde, Fixed, Vec2Fixed};
use crate::time::SimTime;
use crate::world::World;

/// What a renderer needs to draw a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitView {
    /// Entity id.
    pub id: EntityId,
    /// Owner.
    pub owner: PlayerId,
    /// Unit type.
    pub kind: UnitKind,
    /// Continuous position.
    pub position: Vec2Fixed,
    /// Committed tile.
    pub tile: TilePos,
    /// Task tag.
    pub task: &'static str,
    /// Direction of travel, if moving.
    pub facing: Option<Facing>,
    /// Hit points.
    pub hp: i32,
    /// Carried load.
    pub carrying: ResourceAmounts,
}

/// What a renderer needs to draw a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildingView {
    /// Entity id.
    pub id: EntityId,
    /// Owner.
    pub owner: PlayerId,
    /// Building type.
    pub kind: BuildingKind,
    /// Top-left footprint tile.
    pub origin: TilePos,
    /// Footprint edge length.
    pub size: u32,
    /// Hit points.
    pub hp: i32,
    /// Units waiting in the training queue.
    pub training: usize,
}

/// Per-player totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Stockpile.
    pub stock: ResourceAmounts,
    /// Living units.
    pub population: u32,
    /// Current population cap.
    pub population_cap: u32,
    /// Open construction sites.
    pub sites: usize,
}

/// Read-only copy of the world at the end of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSnapshot {
    /// Ticks processed.
    pub tick: u64,
    /// Simulation time, in seconds.
    #[serde(with = "decimal_serde")]
    pub time: SimTime,
    /// Whether the clock is frozen.
    pub paused: bool,
    /// Players in id order.
    pub players: Vec<PlayerView>,
    /// Units in id order.
    pub units: Vec<UnitView>,
    /// Buildings in id order.
    pub buildings: Vec<BuildingView>,
}

impl WorldSnapshot {
    /// Copy the presentation-relevant parts of `world`.
    #[must_use]
    pub fn capture(world: &World, tick: u64, time: SimTime, paused: bool) -> Self {
        let players = world
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                stock: p.stock,
                population: p.population,
                population_cap: world.population_cap(p.id),
                sites: p.sites.len(),
            })
            .collect();

        let units = world
            .units
            .iter()
            .map(|(id, u)| UnitView {
                id,
                owner: u.owner,
                kind: u.kind,
                position: u.position,
                tile: u.tile,
                task: u.task.label(),
                facing: u.facing(),
                hp: u.hp,
                carrying: u.carrying,
            })
            .collect();

        let buildings = world
            .buildings
            .iter()
            .map(|(id, b)| BuildingView {
                id,
                owner: b.owner,
                kind: b.kind,
                origin: b.origin,
                size: b.size,
                hp: b.hp,
                training: b.training.len(),
            })
            .collect();

        Self {
            tick,
            time,
            paused,
            players,
            units,
            buildings,
        }
    }

    /// Unit view by id.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&UnitView> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Stock of one resource for a player, or zero for unknown players.
    #[must_use]
    pub fn stock(&self, player: PlayerId, kind: ResourceKind) -> Fixed {
        self.players
            .iter()
            .find(|p| p.id == player)
            .map_or(Fixed::ZERO, |p| p.stock.get(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Civilization;

    #[test]
    fn test_capture_reflects_world() {
        let mut world = World::new(10, 10);
        let red = world.add_player("Red", Civilization::Means);
        let unit = world
            .place_unit(UnitKind::Villager, red, TilePos::new(1, 1))
            .unwrap();
        world
            .place_building(BuildingKind::House, red, TilePos::new(5, 5))
            .unwrap();
        world.try_move_unit(unit, 4, 1, Fixed::ZERO).unwrap();

        let snapshot = WorldSnapshot::capture(&world, 3, Fixed::from_num(3), false);
        let view = snapshot.unit(unit).unwrap();
        assert_eq!(view.task, "moving");
        assert_eq!(view.facing, Some(Facing::East));
        assert_eq!(snapshot.buildings.len(), 1);
        assert_eq!(snapshot.players[0].population_cap, 5);
        assert_eq!(snapshot.stock(red, ResourceKind::Wood), Fixed::from_num(200));
    }

    #[test]
    fn test_snapshot_serializes_time_in_seconds() {
        let mut world = World::new(10, 10);
        world.add_player("Red", Civilization::Means);
        let snapshot = WorldSnapshot::capture(&world, 7, Fixed::from_num(2.5), false);

        let bytes = bincode::serialize(&snapshot).unwrap();
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 7);
        assert_eq!(f64::from_le_bytes(bytes[8..16].try_into().unwrap()), 2.5);
    }
}
