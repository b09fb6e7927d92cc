//! World state: the grid, players, and entity registries.
//!
//! Spawning, killing and destruction go through [`World`] so that the grid,
//! the player rosters and the population counters always agree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::components::{
    Building, EntityId, Player, PlayerId, ResourceAmounts, ResourceKind, Unit, UnitTask,
};
use crate::construction::ConstructionSites;
use crate::data::{BuildingKind, Catalog, Civilization, EngineConfig, UnitKind};
use crate::error::{GameError, Result};
use crate::grid::{BuildingCell, GridMap, IndexedBuilding, TilePos};
use crate::math::Fixed;
use crate::production::TrainingQueue;

/// Id-keyed entity registry with sorted iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStorage<T> {
    entities: BTreeMap<EntityId, T>,
}

impl<T> Default for EntityStorage<T> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }
}

impl<T> EntityStorage<T> {
    /// Insert or replace an entity.
    pub fn insert(&mut self, id: EntityId, entity: T) {
        self.entities.insert(id, entity);
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    /// All ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }
}

/// Everything a tick mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Engine constants.
    pub config: EngineConfig,
    /// Unit and building stats.
    pub catalog: Catalog,
    /// The grid.
    pub map: GridMap,
    /// Players in processing order.
    pub players: Vec<Player>,
    /// Living units.
    pub units: EntityStorage<Unit>,
    /// Standing buildings.
    pub buildings: EntityStorage<Building>,
    next_id: EntityId,
}

impl World {
    /// An empty world with default constants and stats.
    ///
    /// # Example
    ///
    /// ```
    /// use villager_core::world::World;
    ///
    /// let world = World::new(32, 32);
    /// assert_eq!(world.map.width(), 32);
    /// assert!(world.players.is_empty());
    /// ```
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_data(width, height, EngineConfig::default(), Catalog::default())
    }

    /// An empty world with explicit constants and stats.
    #[must_use]
    pub fn with_data(width: u32, height: u32, config: EngineConfig, catalog: Catalog) -> Self {
        Self {
            config,
            catalog,
            map: GridMap::new(width, height),
            players: Vec::new(),
            units: EntityStorage::default(),
            buildings: EntityStorage::default(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Add a player with its civilisation's starting stock.
    pub fn add_player(&mut self, name: impl Into<String>, civilization: Civilization) -> PlayerId {
        let id = PlayerId(u8::try_from(self.players.len()).unwrap_or(u8::MAX));
        self.players.push(Player {
            id,
            name: name.into(),
            civilization,
            stock: civilization.starting_stock(),
            units: Vec::new(),
            buildings: Vec::new(),
            population: 0,
            max_population: self.config.max_population,
            sites: ConstructionSites::default(),
        });
        id
    }

    /// Player by id.
    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players
            .get(id.index())
            .ok_or_else(|| GameError::InvalidState(format!("unknown player {id:?}")))
    }

    /// Mutable player by id.
    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players
            .get_mut(id.index())
            .ok_or_else(|| GameError::InvalidState(format!("unknown player {id:?}")))
    }

    /// Overwrite a player's stock.
    pub fn set_stock(&mut self, id: PlayerId, stock: ResourceAmounts) -> Result<()> {
        self.player_mut(id)?.stock = stock;
        Ok(())
    }

    /// Units a player may field: building capacity, bounded by the ceiling.
    #[must_use]
    pub fn population_cap(&self, id: PlayerId) -> u32 {
        let Ok(player) = self.player(id) else {
            return 0;
        };
        let capacity: u32 = player
            .buildings
            .iter()
            .filter_map(|b| self.buildings.get(*b))
            .map(|b| b.population_increase)
            .sum();
        capacity.min(player.max_population)
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    /// Place a unit during setup, ignoring the population cap.
    pub fn place_unit(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        tile: TilePos,
    ) -> Result<EntityId> {
        self.insert_unit(kind, owner, tile)
    }

    /// Spawn a unit in play. Fails when the owner is at its population cap.
    pub fn spawn_unit(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        tile: TilePos,
    ) -> Result<EntityId> {
        let population = self.player(owner)?.population;
        if population >= self.population_cap(owner) {
            return Err(GameError::InvalidState(format!(
                "player {owner:?} is at its population cap"
            )));
        }
        self.insert_unit(kind, owner, tile)
    }

    fn insert_unit(&mut self, kind: UnitKind, owner: PlayerId, tile: TilePos) -> Result<EntityId> {
        self.player(owner)?;
        if !self.map.is_tile_free_for_unit(tile) {
            return Err(GameError::InvalidTarget(tile));
        }
        let stats = self.catalog.unit(kind)?.clone();

        let id = self.allocate_id();
        let unit = Unit {
            id,
            owner,
            kind,
            position: tile.to_world(),
            tile,
            speed: stats.speed,
            hp: stats.hp,
            max_hp: stats.hp,
            attack: stats.attack,
            range: stats.range,
            path: None,
            target_position: None,
            task: UnitTask::Idle,
            carrying: ResourceAmounts::default(),
            carry_capacity: stats.carry_capacity,
            gather_rate: stats.gather_rate,
            last_move_time: None,
            last_gather_time: None,
            last_hit_time: None,
        };

        self.map.place_unit(tile, id);
        self.units.insert(id, unit);
        let player = self.player_mut(owner)?;
        player.units.push(id);
        player.population += 1;
        debug!(unit = id, ?kind, ?owner, ?tile, "unit spawned");
        Ok(id)
    }

    /// Unit by id.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Mutable unit by id.
    pub fn unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    /// Remove a dead unit from its tile, roster and construction sites.
    ///
    /// Returns `false` if the unit does not exist.
    pub fn kill_unit(&mut self, id: EntityId) -> bool {
        let Some(unit) = self.units.remove(id) else {
            return false;
        };
        self.map.remove_unit(unit.tile, id);
        if let Ok(player) = self.player_mut(unit.owner) {
            player.units.retain(|u| *u != id);
            player.population = player.population.saturating_sub(1);
            player.sites.remove_worker(id);
        }
        info!(unit = id, owner = ?unit.owner, "unit killed");
        true
    }

    /// Run `f` with the unit taken out of the registry.
    ///
    /// The unit is put back afterwards whatever `f` returns, so `f` may
    /// freely borrow the rest of the world mutably.
    pub fn with_unit<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Self, &mut Unit) -> Result<R>,
    ) -> Result<R> {
        let mut unit = self.units.remove(id).ok_or(GameError::EntityNotFound(id))?;
        let result = f(self, &mut unit);
        self.units.insert(id, unit);
        result
    }

    // ------------------------------------------------------------------
    // Buildings
    // ------------------------------------------------------------------

    /// Place a finished building on a free footprint.
    pub fn place_building(
        &mut self,
        kind: BuildingKind,
        owner: PlayerId,
        origin: TilePos,
    ) -> Result<EntityId> {
        self.player(owner)?;
        let stats = self.catalog.building(kind)?.clone();
        if !self.map.is_area_free(origin, stats.size) {
            return Err(GameError::InvalidTarget(origin));
        }

        let id = self.allocate_id();
        self.map.place_building(
            origin,
            stats.size,
            BuildingCell {
                id,
                walkable: stats.walkable,
            },
        );
        let entry = IndexedBuilding {
            owner,
            building: id,
        };
        if stats.drop_point {
            self.map.register_drop_point(origin, entry);
        }
        if stats.food_store > Fixed::ZERO {
            self.map.register_farm(origin, entry);
        }

        self.buildings.insert(
            id,
            Building {
                id,
                kind,
                owner,
                origin,
                size: stats.size,
                hp: stats.hp,
                max_hp: stats.hp,
                food: stats.food_store,
                population_increase: stats.population_increase,
                training: TrainingQueue::default(),
                last_hit_time: None,
            },
        );
        self.player_mut(owner)?.buildings.push(id);
        info!(building = id, ?kind, ?owner, ?origin, "building placed");
        Ok(id)
    }

    /// Building by id.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(id)
    }

    /// Mutable building by id.
    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.buildings.get_mut(id)
    }

    /// Remove a building, clearing its footprint and index entries.
    ///
    /// Returns `false` if the building does not exist.
    pub fn destroy_building(&mut self, id: EntityId) -> bool {
        let Some(building) = self.buildings.remove(id) else {
            return false;
        };
        self.map.remove_building(building.origin, building.size, id);
        if let Ok(player) = self.player_mut(building.owner) {
            player.buildings.retain(|b| *b != id);
        }
        info!(building = id, kind = ?building.kind, "building destroyed");
        true
    }

    // ------------------------------------------------------------------
    // Resources and queries
    // ------------------------------------------------------------------

    /// Put a resource tile down with the catalog's default amount.
    pub fn place_resource(&mut self, pos: TilePos, kind: ResourceKind) -> Result<()> {
        let amount = self
            .catalog
            .tile_amount(kind)
            .ok_or(GameError::ResourceUnavailable(kind))?;
        self.map.add_resource(pos, kind, amount)
    }

    /// Amount left at a gather source: a resource tile or a farm origin.
    #[must_use]
    pub fn source_amount(&self, kind: ResourceKind, source: TilePos) -> Option<Fixed> {
        let amount = match kind {
            ResourceKind::Food => {
                let farm = self.map.farm_at(source)?;
                self.buildings.get(farm.building).map(|b| b.food)
            }
            _ => self
                .map
                .resource_at(source)
                .filter(|d| d.kind == kind)
                .map(|d| d.amount),
        };
        amount.filter(|amount| *amount > Fixed::ZERO)
    }

    /// Tile free of resources and blocking buildings.
    #[must_use]
    pub fn is_tile_free_for_unit(&self, x: u32, y: u32) -> bool {
        self.map.is_tile_free_for_unit(TilePos::new(x, y))
    }

    /// Footprint free of resources, buildings and units.
    #[must_use]
    pub fn is_area_free(&self, x: u32, y: u32, size: u32) -> bool {
        self.map.is_area_free(TilePos::new(x, y), size)
    }

    /// Nearest source of a resource type for a player.
    #[must_use]
    pub fn find_nearest_resource(
        &self,
        from: TilePos,
        kind: ResourceKind,
        player: PlayerId,
    ) -> Option<TilePos> {
        self.map.find_nearest_resource(from, kind, player)
    }

    /// Nearest drop point owned by a player.
    #[must_use]
    pub fn find_drop_point(&self, from: TilePos, player: PlayerId) -> Option<(TilePos, EntityId)> {
        self.map.find_drop_point(from, player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_player() -> (World, PlayerId) {
        let mut world = World::new(20, 20);
        let player = world.add_player("Blue", Civilization::Means);
        (world, player)
    }

    #[test]
    fn test_spawn_requires_population_capacity() {
        let (mut world, player) = world_with_player();
        let err = world
            .spawn_unit(UnitKind::Villager, player, TilePos::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        world
            .place_building(BuildingKind::House, player, TilePos::new(10, 10))
            .unwrap();
        assert_eq!(world.population_cap(player), 5);
        for x in 0..5 {
            world
                .spawn_unit(UnitKind::Villager, player, TilePos::new(x, 0))
                .unwrap();
        }
        assert!(world
            .spawn_unit(UnitKind::Villager, player, TilePos::new(6, 0))
            .is_err());
        assert_eq!(world.player(player).unwrap().population, 5);
    }

    #[test]
    fn test_place_unit_registers_everywhere() {
        let (mut world, player) = world_with_player();
        let id = world
            .place_unit(UnitKind::Archer, player, TilePos::new(3, 4))
            .unwrap();

        let unit = world.unit(id).unwrap();
        assert_eq!(unit.range, Fixed::from_num(4));
        assert_eq!(world.map.tile(TilePos::new(3, 4)).unwrap().units, vec![id]);
        assert_eq!(world.player(player).unwrap().units, vec![id]);
    }

    #[test]
    fn test_kill_unit_cleans_up() {
        let (mut world, player) = world_with_player();
        let id = world
            .place_unit(UnitKind::Villager, player, TilePos::new(1, 1))
            .unwrap();

        assert!(world.kill_unit(id));
        assert!(world.unit(id).is_none());
        assert!(world.map.is_tile_free(TilePos::new(1, 1)));
        assert_eq!(world.player(player).unwrap().population, 0);
        assert!(!world.kill_unit(id));
    }

    #[test]
    fn test_buildings_need_free_area_and_index() {
        let (mut world, player) = world_with_player();
        let tc = world
            .place_building(BuildingKind::TownCenter, player, TilePos::new(5, 5))
            .unwrap();
        assert!(world
            .place_building(BuildingKind::House, player, TilePos::new(7, 7))
            .is_err());
        assert_eq!(
            world.find_drop_point(TilePos::new(0, 0), player),
            Some((TilePos::new(5, 5), tc))
        );

        let farm = world
            .place_building(BuildingKind::Farm, player, TilePos::new(0, 0))
            .unwrap();
        assert_eq!(
            world.source_amount(ResourceKind::Food, TilePos::new(0, 0)),
            Some(Fixed::from_num(300))
        );

        assert!(world.destroy_building(farm));
        assert_eq!(world.source_amount(ResourceKind::Food, TilePos::new(0, 0)), None);
        assert!(world.is_area_free(0, 0, 2));
    }

    #[test]
    fn test_with_unit_restores_unit_on_error() {
        let (mut world, player) = world_with_player();
        let id = world
            .place_unit(UnitKind::Villager, player, TilePos::new(1, 1))
            .unwrap();

        let result: Result<()> = world.with_unit(id, |world, unit| {
            assert!(world.unit(unit.id).is_none());
            Err(GameError::InvalidState("boom".into()))
        });
        assert!(result.is_err());
        assert!(world.unit(id).is_some());
        assert!(matches!(
            world.with_unit(999, |_, _| Ok(())),
            Err(GameError::EntityNotFound(999))
        ));
    }
}
