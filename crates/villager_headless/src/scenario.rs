//! Scenario loading and configuration.
//!
//! Scenarios define the initial game state for headless runs: the map,
//! the players and their stock, resource tiles, buildings and units, plus
//! a list of orders issued at fixed ticks. Units and buildings can carry a
//! label so orders can refer to them before they have entity ids.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use villager_core::components::{
    CombatTarget, Command, EntityId, PlayerId, ResourceAmounts, ResourceKind,
};
use villager_core::data::{BuildingKind, Civilization, EngineConfig, UnitKind};
use villager_core::error::GameError;
use villager_core::grid::TilePos;
use villager_core::math::Fixed;
use villager_core::world::World;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The engine rejected the setup or failed a tick.
    #[error("Engine error: {0}")]
    Engine(#[from] GameError),
    /// A placement names a player index that does not exist.
    #[error("Unknown player index {0}")]
    UnknownPlayer(usize),
    /// An order refers to a label no unit or building carries.
    #[error("Unknown label '{0}'")]
    UnknownLabel(String),
    /// Two entities share a label.
    #[error("Duplicate label '{0}'")]
    DuplicateLabel(String),
    /// Map size, tick delta or tick count is unusable.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map dimensions (width, height) in tiles.
    pub map_size: (u32, u32),
    /// Engine constants; defaults when omitted.
    #[serde(default)]
    pub config: Option<EngineConfig>,
    /// Players, in processing order.
    pub players: Vec<PlayerSetup>,
    /// Resource tiles.
    #[serde(default)]
    pub resources: Vec<ResourcePlacement>,
    /// Finished buildings present at the start.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// Units present at the start.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Orders issued during the run.
    #[serde(default)]
    pub orders: Vec<TimedOrder>,
    /// Default number of ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Default tick delta in seconds.
    #[serde(default = "default_dt")]
    pub dt: f64,
}

fn default_ticks() -> u64 {
    600
}

fn default_dt() -> f64 {
    0.1
}

/// One player's starting setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Display name.
    pub name: String,
    /// Civilisation, which sets the default stock.
    #[serde(default)]
    pub civilization: Civilization,
    /// Stock override as (wood, gold, food).
    #[serde(default)]
    pub stock: Option<(i64, i64, i64)>,
}

/// A resource tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePlacement {
    /// Resource type.
    pub kind: ResourceKind,
    /// Tile column.
    pub x: u32,
    /// Tile row.
    pub y: u32,
    /// Amount override; the catalog default when omitted.
    #[serde(default)]
    pub amount: Option<f64>,
}

/// A finished building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Label orders can refer to.
    #[serde(default)]
    pub label: Option<String>,
    /// Building type.
    pub kind: BuildingKind,
    /// Owning player index.
    pub player: usize,
    /// Footprint origin column.
    pub x: u32,
    /// Footprint origin row.
    pub y: u32,
}

/// A unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Label orders can refer to.
    #[serde(default)]
    pub label: Option<String>,
    /// Unit type.
    pub kind: UnitKind,
    /// Owning player index.
    pub player: usize,
    /// Tile column.
    pub x: u32,
    /// Tile row.
    pub y: u32,
}

/// An order issued before a given tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedOrder {
    /// Number of ticks run before the order is issued.
    pub at_tick: u64,
    /// The order.
    pub order: Order,
}

/// Scenario-level orders, referring to entities by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Walk to a tile.
    Move {
        /// Unit label.
        unit: String,
        /// Destination column.
        x: u32,
        /// Destination row.
        y: u32,
    },
    /// Gather a resource type.
    Gather {
        /// Unit label.
        unit: String,
        /// Resource type.
        resource: ResourceKind,
    },
    /// Attack a labelled unit or building.
    Attack {
        /// Attacker label.
        unit: String,
        /// Target label.
        target: String,
    },
    /// Build at a footprint origin, paid for by the unit's owner.
    Construct {
        /// Worker label.
        unit: String,
        /// Building type.
        building: BuildingKind,
        /// Footprint column.
        x: u32,
        /// Footprint row.
        y: u32,
    },
    /// Queue a unit in a labelled building.
    Train {
        /// Building label.
        building: String,
        /// Unit type.
        unit: UnitKind,
    },
    /// Freeze the clock.
    Pause,
    /// Unfreeze the clock.
    Resume,
}

/// Label to entity id, for units and buildings.
#[derive(Debug, Clone, Default)]
pub struct Labels {
    units: BTreeMap<String, EntityId>,
    buildings: BTreeMap<String, EntityId>,
}

impl Labels {
    fn insert_unit(&mut self, label: &str, id: EntityId) -> Result<(), ScenarioError> {
        if self.buildings.contains_key(label) || self.units.insert(label.to_string(), id).is_some()
        {
            return Err(ScenarioError::DuplicateLabel(label.to_string()));
        }
        Ok(())
    }

    fn insert_building(&mut self, label: &str, id: EntityId) -> Result<(), ScenarioError> {
        if self.units.contains_key(label) || self.buildings.insert(label.to_string(), id).is_some()
        {
            return Err(ScenarioError::DuplicateLabel(label.to_string()));
        }
        Ok(())
    }

    /// Unit id by label.
    pub fn unit(&self, label: &str) -> Result<EntityId, ScenarioError> {
        self.units
            .get(label)
            .copied()
            .ok_or_else(|| ScenarioError::UnknownLabel(label.to_string()))
    }

    /// Building id by label.
    pub fn building(&self, label: &str) -> Result<EntityId, ScenarioError> {
        self.buildings
            .get(label)
            .copied()
            .ok_or_else(|| ScenarioError::UnknownLabel(label.to_string()))
    }

    fn target(&self, label: &str) -> Result<CombatTarget, ScenarioError> {
        if let Some(id) = self.units.get(label) {
            return Ok(CombatTarget::Unit(*id));
        }
        self.building(label).map(CombatTarget::Building)
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    fn player_id(&self, index: usize) -> Result<PlayerId, ScenarioError> {
        if index >= self.players.len() {
            return Err(ScenarioError::UnknownPlayer(index));
        }
        u8::try_from(index)
            .map(PlayerId)
            .map_err(|_| ScenarioError::UnknownPlayer(index))
    }

    /// Build the starting world and resolve every label.
    pub fn build_world(&self) -> Result<(World, Labels), ScenarioError> {
        let (width, height) = self.map_size;
        if width == 0 || height == 0 {
            return Err(ScenarioError::Invalid(format!(
                "map size {width}x{height} must be positive"
            )));
        }

        let mut world = World::with_data(
            width,
            height,
            self.config.clone().unwrap_or_default(),
            Default::default(),
        );
        for setup in &self.players {
            let id = world.add_player(setup.name.clone(), setup.civilization);
            if let Some((wood, gold, food)) = setup.stock {
                world.set_stock(id, ResourceAmounts::new(wood, gold, food))?;
            }
        }

        for resource in &self.resources {
            let pos = TilePos::new(resource.x, resource.y);
            match resource.amount {
                Some(amount) => {
                    let amount = Fixed::checked_from_num(amount)
                        .filter(|a| *a > Fixed::ZERO)
                        .ok_or_else(|| {
                            ScenarioError::Invalid(format!("resource amount {amount} out of range"))
                        })?;
                    world.map.add_resource(pos, resource.kind, amount)?;
                }
                None => world.place_resource(pos, resource.kind)?,
            }
        }

        let mut labels = Labels::default();
        for placement in &self.buildings {
            let owner = self.player_id(placement.player)?;
            let id = world.place_building(
                placement.kind,
                owner,
                TilePos::new(placement.x, placement.y),
            )?;
            if let Some(label) = &placement.label {
                labels.insert_building(label, id)?;
            }
        }

        for placement in &self.units {
            let owner = self.player_id(placement.player)?;
            let id = world.place_unit(
                placement.kind,
                owner,
                TilePos::new(placement.x, placement.y),
            )?;
            if let Some(label) = &placement.label {
                labels.insert_unit(label, id)?;
            }
        }

        Ok((world, labels))
    }

    /// Resolve every order into an engine command, sorted by tick.
    ///
    /// Orders sharing a tick keep their file order.
    pub fn resolve_orders(
        &self,
        world: &World,
        labels: &Labels,
    ) -> Result<Vec<(u64, Command)>, ScenarioError> {
        let mut commands = self
            .orders
            .iter()
            .map(|timed| Ok((timed.at_tick, resolve(&timed.order, world, labels)?)))
            .collect::<Result<Vec<_>, ScenarioError>>()?;
        commands.sort_by_key(|(tick, _)| *tick);
        Ok(commands)
    }
}

fn resolve(order: &Order, world: &World, labels: &Labels) -> Result<Command, ScenarioError> {
    let command = match order {
        Order::Move { unit, x, y } => Command::Move {
            unit: labels.unit(unit)?,
            x: *x,
            y: *y,
        },
        Order::Gather { unit, resource } => Command::Gather {
            unit: labels.unit(unit)?,
            resource: *resource,
        },
        Order::Attack { unit, target } => Command::Battle {
            unit: labels.unit(unit)?,
            target: labels.target(target)?,
        },
        Order::Construct { unit, building, x, y } => {
            let id = labels.unit(unit)?;
            let player = world
                .unit(id)
                .map(|u| u.owner)
                .ok_or(GameError::EntityNotFound(id))?;
            Command::Construct {
                unit: id,
                building: *building,
                x: *x,
                y: *y,
                player,
            }
        }
        Order::Train { building, unit } => Command::Train {
            building: labels.building(building)?,
            unit_kind: *unit,
        },
        Order::Pause => Command::Pause,
        Order::Resume => Command::Resume,
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        (
            name: "small",
            map_size: (16, 16),
            players: [
                (name: "Red", civilization: Means),
                (name: "Blue", stock: Some((10, 20, 30))),
            ],
            resources: [
                (kind: Gold, x: 10, y: 10),
                (kind: Wood, x: 11, y: 10, amount: Some(40.0)),
            ],
            buildings: [
                (label: Some("tc"), kind: TownCenter, player: 0, x: 0, y: 0),
            ],
            units: [
                (label: Some("worker"), kind: Villager, player: 0, x: 6, y: 6),
                (label: Some("raider"), kind: Swordsman, player: 1, x: 12, y: 12),
            ],
            orders: [
                (at_tick: 5, order: Attack(unit: "raider", target: "tc")),
                (at_tick: 0, order: Gather(unit: "worker", resource: Gold)),
                (at_tick: 5, order: Construct(unit: "worker", building: House, x: 6, y: 2)),
            ],
        )
    "#;

    #[test]
    fn test_parse_fills_defaults() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        assert_eq!(scenario.ticks, 600);
        assert!((scenario.dt - 0.1).abs() < f64::EPSILON);
        assert!(scenario.config.is_none());
        assert_eq!(scenario.players[1].civilization, Civilization::Means);
    }

    #[test]
    fn test_build_world_places_everything() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        let (world, labels) = scenario.build_world().unwrap();

        assert_eq!(world.players.len(), 2);
        assert_eq!(
            world.players[1].stock.get(ResourceKind::Food),
            Fixed::from_num(30)
        );
        assert_eq!(world.units.len(), 2);
        assert_eq!(world.buildings.len(), 1);
        assert_eq!(
            world.source_amount(ResourceKind::Wood, TilePos::new(11, 10)),
            Some(Fixed::from_num(40))
        );
        assert!(labels.unit("worker").is_ok());
        assert!(labels.building("tc").is_ok());
    }

    #[test]
    fn test_orders_resolve_in_tick_order() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        let (world, labels) = scenario.build_world().unwrap();
        let commands = scenario.resolve_orders(&world, &labels).unwrap();

        let ticks: Vec<u64> = commands.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![0, 5, 5]);
        assert!(matches!(
            commands[1].1,
            Command::Battle {
                target: CombatTarget::Building(_),
                ..
            }
        ));
        assert!(matches!(
            commands[2].1,
            Command::Construct {
                player: PlayerId(0),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_label_rejected() {
        let mut scenario = Scenario::from_ron_str(SMALL).unwrap();
        scenario.orders.push(TimedOrder {
            at_tick: 1,
            order: Order::Move {
                unit: "ghost".into(),
                x: 1,
                y: 1,
            },
        });
        let (world, labels) = scenario.build_world().unwrap();
        assert!(matches!(
            scenario.resolve_orders(&world, &labels),
            Err(ScenarioError::UnknownLabel(label)) if label == "ghost"
        ));
    }

    #[test]
    fn test_unknown_player_rejected() {
        let mut scenario = Scenario::from_ron_str(SMALL).unwrap();
        scenario.units[0].player = 7;
        assert!(matches!(
            scenario.build_world(),
            Err(ScenarioError::UnknownPlayer(7))
        ));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut scenario = Scenario::from_ron_str(SMALL).unwrap();
        scenario.units[1].label = Some("tc".into());
        assert!(matches!(
            scenario.build_world(),
            Err(ScenarioError::DuplicateLabel(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/nonexistent/scenario.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
