//! Unit and building definitions.
//!
//! Stats are data-driven: [`Catalog::default`] carries the standard values
//! and [`Catalog::from_ron_str`] loads a replacement table.

use serde::{Deserialize, Serialize};

use crate::components::{ResourceAmounts, ResourceKind};
use crate::error::{GameError, Result};
use crate::math::{decimal_serde, Fixed};

/// Unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Gatherer and builder.
    Villager,
    /// Melee infantry.
    Swordsman,
    /// Fast melee cavalry.
    Horseman,
    /// Ranged infantry.
    Archer,
}

impl UnitKind {
    /// Every unit type.
    pub const ALL: [Self; 4] = [Self::Villager, Self::Swordsman, Self::Horseman, Self::Archer];
}

/// Building types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Main base: drop point and villager production.
    TownCenter,
    /// Population capacity.
    House,
    /// Forward drop point.
    Camp,
    /// Food source.
    Farm,
    /// Trains swordsmen.
    Barracks,
    /// Trains horsemen.
    Stable,
    /// Trains archers.
    ArcheryRange,
    /// Defensive tower.
    Keep,
}

impl BuildingKind {
    /// Every building type.
    pub const ALL: [Self; 8] = [
        Self::TownCenter,
        Self::House,
        Self::Camp,
        Self::Farm,
        Self::Barracks,
        Self::Stable,
        Self::ArcheryRange,
        Self::Keep,
    ];
}

/// Civilisations differ only in starting stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Civilization {
    /// Standard start.
    #[default]
    Means,
    /// Rich start.
    Leans,
    /// Sandbox start.
    Marines,
}

impl Civilization {
    /// Resources a player of this civilisation starts with.
    #[must_use]
    pub fn starting_stock(self) -> ResourceAmounts {
        match self {
            Self::Means => ResourceAmounts::new(200, 50, 50),
            Self::Leans => ResourceAmounts::new(2_000, 2_000, 2_000),
            Self::Marines => ResourceAmounts::new(20_000, 20_000, 20_000),
        }
    }
}

/// Whole-unit resource cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Wood.
    #[serde(default)]
    pub wood: i64,
    /// Gold.
    #[serde(default)]
    pub gold: i64,
    /// Food.
    #[serde(default)]
    pub food: i64,
}

impl Cost {
    /// Component for one resource.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Wood => self.wood,
            ResourceKind::Gold => self.gold,
            ResourceKind::Food => self.food,
        }
    }
}

/// Stats for one unit type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitStats {
    /// Type these stats describe.
    pub kind: UnitKind,
    /// Maximum hit points.
    pub hp: i32,
    /// Damage per hit.
    pub attack: i32,
    /// Tiles per second.
    #[serde(with = "decimal_serde")]
    pub speed: Fixed,
    /// Attack range in tiles.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
    /// Training cost.
    pub cost: Cost,
    /// Seconds spent in the training queue.
    #[serde(with = "decimal_serde")]
    pub training_time: Fixed,
    /// Carry limit per resource; zero for non-gatherers.
    #[serde(with = "decimal_serde", default = "zero")]
    pub carry_capacity: Fixed,
    /// Amount gathered per second.
    #[serde(with = "decimal_serde", default = "zero")]
    pub gather_rate: Fixed,
    /// May work on construction sites.
    #[serde(default)]
    pub can_build: bool,
}

/// Stats for one building type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildingStats {
    /// Type these stats describe.
    pub kind: BuildingKind,
    /// Maximum hit points.
    pub hp: i32,
    /// Single-worker build time before the worker discount.
    #[serde(with = "decimal_serde")]
    pub build_time: Fixed,
    /// Construction cost.
    pub cost: Cost,
    /// Footprint edge length.
    pub size: u32,
    /// Population capacity provided.
    #[serde(default)]
    pub population_increase: u32,
    /// Accepts resource deposits.
    #[serde(default)]
    pub drop_point: bool,
    /// Units may stand on the footprint.
    #[serde(default)]
    pub walkable: bool,
    /// Food held when finished.
    #[serde(with = "decimal_serde", default = "zero")]
    pub food_store: Fixed,
    /// Unit types this building can train.
    #[serde(default)]
    pub trains: Vec<UnitKind>,
    /// Damage per defensive shot; zero for passive buildings.
    #[serde(default)]
    pub attack: i32,
    /// Defensive range in tiles.
    #[serde(with = "decimal_serde", default = "zero")]
    pub range: Fixed,
}

fn zero() -> Fixed {
    Fixed::ZERO
}

/// Complete stat table.
///
/// # Example RON
///
/// ```ron
/// Catalog(
///     units: [
///         UnitStats(kind: Villager, hp: 25, attack: 2, speed: 0.8, range: 1.0,
///                   cost: Cost(food: 50), training_time: 25.0,
///                   carry_capacity: 20.0, gather_rate: 0.4167, can_build: true),
///     ],
///     buildings: [ /* ... */ ],
///     wood_per_tile: 100.0,
///     gold_per_tile: 800.0,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Catalog {
    units: Vec<UnitStats>,
    buildings: Vec<BuildingStats>,
    /// Amount placed on a fresh forest tile.
    #[serde(with = "decimal_serde")]
    pub wood_per_tile: Fixed,
    /// Amount placed on a fresh gold tile.
    #[serde(with = "decimal_serde")]
    pub gold_per_tile: Fixed,
}

impl Catalog {
    /// Parse and validate a catalog from RON text.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let catalog: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            source_name: "catalog".into(),
            message: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Every unit and building type must be described exactly once, and at
    /// least one building type must accept resource returns.
    pub fn validate(&self) -> Result<()> {
        for kind in UnitKind::ALL {
            let count = self.units.iter().filter(|u| u.kind == kind).count();
            if count != 1 {
                return Err(GameError::DataParseError {
                    source_name: "catalog".into(),
                    message: format!("expected one entry for {kind:?}, found {count}"),
                });
            }
        }
        for kind in BuildingKind::ALL {
            let count = self.buildings.iter().filter(|b| b.kind == kind).count();
            if count != 1 {
                return Err(GameError::DataParseError {
                    source_name: "catalog".into(),
                    message: format!("expected one entry for {kind:?}, found {count}"),
                });
            }
        }
        if let Some(bad) = self.buildings.iter().find(|b| b.size == 0) {
            return Err(GameError::DataParseError {
                source_name: "catalog".into(),
                message: format!("{:?} has a zero-size footprint", bad.kind),
            });
        }
        if !self.buildings.iter().any(|b| b.drop_point) {
            return Err(GameError::MissingDropPoint);
        }
        Ok(())
    }

    /// Stats for a unit type.
    pub fn unit(&self, kind: UnitKind) -> Result<&UnitStats> {
        self.units
            .iter()
            .find(|u| u.kind == kind)
            .ok_or_else(|| GameError::InvalidState(format!("no stats for {kind:?}")))
    }

    /// Stats for a building type.
    pub fn building(&self, kind: BuildingKind) -> Result<&BuildingStats> {
        self.buildings
            .iter()
            .find(|b| b.kind == kind)
            .ok_or_else(|| GameError::InvalidState(format!("no stats for {kind:?}")))
    }

    /// Mutable stats for a unit type.
    pub fn unit_mut(&mut self, kind: UnitKind) -> Result<&mut UnitStats> {
        self.units
            .iter_mut()
            .find(|u| u.kind == kind)
            .ok_or_else(|| GameError::InvalidState(format!("no stats for {kind:?}")))
    }

    /// Mutable stats for a building type.
    pub fn building_mut(&mut self, kind: BuildingKind) -> Result<&mut BuildingStats> {
        self.buildings
            .iter_mut()
            .find(|b| b.kind == kind)
            .ok_or_else(|| GameError::InvalidState(format!("no stats for {kind:?}")))
    }

    /// Default amount for a fresh resource tile.
    #[must_use]
    pub fn tile_amount(&self, kind: ResourceKind) -> Option<Fixed> {
        match kind {
            ResourceKind::Wood => Some(self.wood_per_tile),
            ResourceKind::Gold => Some(self.gold_per_tile),
            ResourceKind::Food => None,
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let villager_rate = Fixed::from_num(25) / Fixed::from_num(60);
        let infantry = |kind: UnitKind,
                        hp: i32,
                        speed: f64,
                        cost: Cost,
                        training_time: i32,
                        range: i32| UnitStats {
            kind,
            hp,
            attack: 4,
            speed: Fixed::from_num(speed),
            range: Fixed::from_num(range),
            cost,
            training_time: Fixed::from_num(training_time),
            carry_capacity: Fixed::ZERO,
            gather_rate: Fixed::ZERO,
            can_build: false,
        };

        let units = vec![
            UnitStats {
                kind: UnitKind::Villager,
                hp: 25,
                attack: 2,
                speed: Fixed::from_num(0.8),
                range: Fixed::ONE,
                cost: Cost {
                    food: 50,
                    ..Cost::default()
                },
                training_time: Fixed::from_num(25),
                carry_capacity: Fixed::from_num(20),
                gather_rate: villager_rate,
                can_build: true,
            },
            infantry(
                UnitKind::Swordsman,
                40,
                0.9,
                Cost {
                    food: 50,
                    gold: 20,
                    wood: 0,
                },
                20,
                1,
            ),
            infantry(
                UnitKind::Horseman,
                45,
                1.2,
                Cost {
                    food: 80,
                    gold: 20,
                    wood: 0,
                },
                30,
                1,
            ),
            infantry(
                UnitKind::Archer,
                30,
                1.0,
                Cost {
                    wood: 25,
                    gold: 45,
                    food: 0,
                },
                35,
                4,
            ),
        ];

        let building = |kind: BuildingKind, hp: i32, build_time: i32, wood: i64, size: u32| BuildingStats {
            kind,
            hp,
            build_time: Fixed::from_num(build_time),
            cost: Cost {
                wood,
                ..Cost::default()
            },
            size,
            population_increase: 0,
            drop_point: false,
            walkable: false,
            food_store: Fixed::ZERO,
            trains: Vec::new(),
            attack: 0,
            range: Fixed::ZERO,
        };

        let buildings = vec![
            BuildingStats {
                population_increase: 5,
                drop_point: true,
                trains: vec![UnitKind::Villager],
                ..building(BuildingKind::TownCenter, 1000, 150, 350, 4)
            },
            BuildingStats {
                population_increase: 5,
                ..building(BuildingKind::House, 200, 25, 25, 2)
            },
            BuildingStats {
                drop_point: true,
                ..building(BuildingKind::Camp, 200, 25, 100, 2)
            },
            BuildingStats {
                walkable: true,
                food_store: Fixed::from_num(300),
                ..building(BuildingKind::Farm, 100, 10, 60, 2)
            },
            BuildingStats {
                trains: vec![UnitKind::Swordsman],
                ..building(BuildingKind::Barracks, 500, 50, 175, 3)
            },
            BuildingStats {
                trains: vec![UnitKind::Horseman],
                ..building(BuildingKind::Stable, 500, 50, 175, 3)
            },
            BuildingStats {
                trains: vec![UnitKind::Archer],
                ..building(BuildingKind::ArcheryRange, 500, 50, 175, 3)
            },
            BuildingStats {
                cost: Cost {
                    wood: 35,
                    gold: 125,
                    food: 0,
                },
                attack: 5,
                range: Fixed::from_num(8),
                ..building(BuildingKind::Keep, 800, 80, 35, 1)
            },
        ];

        Self {
            units,
            buildings,
            wood_per_tile: Fixed::from_num(100),
            gold_per_tile: Fixed::from_num(800),
        }
    }
}
