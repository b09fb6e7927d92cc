//! Test fixtures and helpers.
//!
//! Pre-built worlds and number helpers for consistent testing.

use fixed::types::I32F32;
use villager_core::components::{EntityId, PlayerId, ResourceAmounts, ResourceKind};
use villager_core::data::{BuildingKind, Civilization, UnitKind};
use villager_core::grid::TilePos;
use villager_core::math::Fixed;
use villager_core::simulation::Simulation;
use villager_core::world::World;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Shorthand for a tile.
#[must_use]
pub const fn tile(x: u32, y: u32) -> TilePos {
    TilePos::new(x, y)
}

/// An empty map with one player holding a large stockpile.
#[must_use]
pub fn empty_world(width: u32, height: u32) -> (World, PlayerId) {
    let mut world = World::new(width, height);
    let player = world.add_player("Player", Civilization::Leans);
    (world, player)
}

/// Place a unit with an overridden speed.
///
/// # Panics
///
/// Panics if the tile is out of bounds or blocked.
pub fn unit_with_speed(world: &mut World, player: PlayerId, at: TilePos, speed: Fixed) -> EntityId {
    let id = world
        .place_unit(UnitKind::Villager, player, at)
        .expect("fixture unit placement");
    if let Some(unit) = world.unit_mut(id) {
        unit.speed = speed;
    }
    id
}

/// A villager standing beside a gold tile, with a town center in the
/// corner. Gather rate is one unit per second.
///
/// Returns the world, the player, the villager and the gold tile.
///
/// # Panics
///
/// Panics if the fixture layout cannot be placed.
#[must_use]
pub fn gold_mine_world() -> (World, PlayerId, EntityId, TilePos) {
    let (mut world, player) = empty_world(32, 32);
    world
        .place_building(BuildingKind::TownCenter, player, tile(0, 0))
        .expect("fixture town center");
    let gold = tile(10, 10);
    world
        .place_resource(gold, ResourceKind::Gold)
        .expect("fixture gold");
    let villager = world
        .place_unit(UnitKind::Villager, player, tile(9, 10))
        .expect("fixture villager");
    if let Some(unit) = world.unit_mut(villager) {
        unit.gather_rate = Fixed::ONE;
        unit.carry_capacity = fixed(20);
    }
    (world, player, villager, gold)
}

/// Two opposing players, each with a town center, three villagers and a
/// swordsman, and a few resource tiles between them.
///
/// # Panics
///
/// Panics if the fixture layout cannot be placed.
#[must_use]
pub fn skirmish() -> Simulation {
    let mut world = World::new(40, 40);
    let red = world.add_player("Red", Civilization::Means);
    let blue = world.add_player("Blue", Civilization::Means);
    for player in [red, blue] {
        world
            .set_stock(player, ResourceAmounts::new(500, 200, 200))
            .expect("fixture stock");
    }

    world
        .place_building(BuildingKind::TownCenter, red, tile(2, 2))
        .expect("red town center");
    world
        .place_building(BuildingKind::TownCenter, blue, tile(34, 34))
        .expect("blue town center");
    for (x, y) in [(18, 18), (19, 18), (20, 20), (21, 21)] {
        world
            .place_resource(tile(x, y), ResourceKind::Wood)
            .expect("fixture wood");
    }
    world
        .place_resource(tile(15, 25), ResourceKind::Gold)
        .expect("fixture gold");

    for x in 7..10 {
        world
            .place_unit(UnitKind::Villager, red, tile(x, 7))
            .expect("red villager");
        world
            .place_unit(UnitKind::Villager, blue, tile(x + 22, 32))
            .expect("blue villager");
    }
    world
        .place_unit(UnitKind::Swordsman, red, tile(10, 10))
        .expect("red swordsman");
    world
        .place_unit(UnitKind::Swordsman, blue, tile(28, 28))
        .expect("blue swordsman");

    Simulation::new(world)
}
