//! Entity data: units, buildings, players and the task union.
//!
//! Components are plain data. Behaviour lives in the subsystem modules,
//! which receive a unit detached from the world for the duration of its
//! update.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::construction::{ConstructionSites, SiteKey};
use crate::data::catalog::{BuildingKind, Civilization, Cost, UnitKind};
use crate::error::{GameError, Result};
use crate::grid::TilePos;
use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};
use crate::production::TrainingQueue;
use crate::time::SimTime;

/// Unique identifier for units and buildings. One counter serves both.
pub type EntityId = u64;

/// Player index into the world's player list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Position in the player list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Gatherable resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Found on forest tiles.
    Wood,
    /// Found on gold mine tiles.
    Gold,
    /// Stored in farms.
    Food,
}

impl ResourceKind {
    /// All resource types in canonical order.
    pub const ALL: [Self; 3] = [Self::Wood, Self::Gold, Self::Food];
}

/// One amount per resource type. Used for stockpiles and carried loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceAmounts {
    #[serde(with = "fixed_serde")]
    wood: Fixed,
    #[serde(with = "fixed_serde")]
    gold: Fixed,
    #[serde(with = "fixed_serde")]
    food: Fixed,
}

impl ResourceAmounts {
    /// Build from whole amounts.
    #[must_use]
    pub fn new(wood: i64, gold: i64, food: i64) -> Self {
        Self {
            wood: Fixed::from_num(wood),
            gold: Fixed::from_num(gold),
            food: Fixed::from_num(food),
        }
    }

    /// Amount of one resource.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> Fixed {
        match kind {
            ResourceKind::Wood => self.wood,
            ResourceKind::Gold => self.gold,
            ResourceKind::Food => self.food,
        }
    }

    fn slot(&mut self, kind: ResourceKind) -> &mut Fixed {
        match kind {
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Gold => &mut self.gold,
            ResourceKind::Food => &mut self.food,
        }
    }

    /// Overwrite one resource.
    pub fn set(&mut self, kind: ResourceKind, amount: Fixed) {
        *self.slot(kind) = amount;
    }

    /// Add to one resource.
    pub fn add(&mut self, kind: ResourceKind, amount: Fixed) {
        *self.slot(kind) += amount;
    }

    /// Sum across all types.
    #[must_use]
    pub fn total(&self) -> Fixed {
        self.wood + self.gold + self.food
    }

    /// Check that every component of `cost` is covered.
    pub fn check_affordable(&self, cost: &Cost) -> Result<()> {
        for kind in ResourceKind::ALL {
            let required = cost.get(kind);
            let available = self.get(kind);
            if available < Fixed::from_num(required) {
                return Err(GameError::InsufficientFunds {
                    resource: kind,
                    required,
                    available: available.to_num(),
                });
            }
        }
        Ok(())
    }

    /// Deduct `cost`. Nothing is deducted unless all of it is affordable.
    pub fn spend(&mut self, cost: &Cost) -> Result<()> {
        self.check_affordable(cost)?;
        for kind in ResourceKind::ALL {
            *self.slot(kind) -= Fixed::from_num(cost.get(kind));
        }
        Ok(())
    }
}

/// Reference to something that can be attacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatTarget {
    /// A unit.
    Unit(EntityId),
    /// A building.
    Building(EntityId),
}

impl CombatTarget {
    /// Underlying entity id.
    #[must_use]
    pub const fn id(self) -> EntityId {
        match self {
            Self::Unit(id) | Self::Building(id) => id,
        }
    }
}

/// What a unit is currently doing.
///
/// Each variant carries exactly the payload its subsystem needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitTask {
    /// Nothing to do.
    #[default]
    Idle,
    /// Plain move order.
    Moving {
        /// Final tile.
        destination: TilePos,
    },
    /// Walking to a tile from which `source` can be harvested.
    Marching {
        /// Resource type requested.
        resource: ResourceKind,
        /// Tile holding the resource, or the farm origin.
        source: TilePos,
        /// Tile the unit will stand on while gathering.
        stand: TilePos,
    },
    /// Extracting from `source`.
    Gathering {
        /// Resource type requested.
        resource: ResourceKind,
        /// Tile holding the resource, or the farm origin.
        source: TilePos,
    },
    /// Carrying a load back to a drop point.
    Returning {
        /// Resource type carried.
        resource: ResourceKind,
        /// Drop-point building.
        drop_point: EntityId,
        /// Perimeter tile where the load is handed in.
        drop_tile: TilePos,
    },
    /// Closing distance to a target.
    GoingToBattle {
        /// What is being chased.
        target: CombatTarget,
        /// Target tile when the current route was planned.
        last_seen: TilePos,
    },
    /// In range and striking.
    Attacking {
        /// What is being hit.
        target: CombatTarget,
    },
    /// Walking to a construction site.
    GoingToConstructionSite {
        /// Site being joined.
        site: SiteKey,
        /// Perimeter tile the worker builds from.
        stand: TilePos,
    },
    /// Registered on a construction site.
    Constructing {
        /// Site being built.
        site: SiteKey,
        /// When the site was created.
        #[serde(with = "fixed_serde")]
        started_at: SimTime,
    },
}

impl UnitTask {
    /// Stable symbolic tag.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving { .. } => "moving",
            Self::Marching { .. } => "marching",
            Self::Gathering { .. } => "gathering",
            Self::Returning { .. } => "returning",
            Self::GoingToBattle { .. } => "going_to_battle",
            Self::Attacking { .. } => "attacking",
            Self::GoingToConstructionSite { .. } => "going_to_construction_site",
            Self::Constructing { .. } => "constructing",
        }
    }

    /// Whether this is [`UnitTask::Idle`].
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Resource type of a gather-cycle task.
    #[must_use]
    pub const fn gather_resource(&self) -> Option<ResourceKind> {
        match self {
            Self::Marching { resource, .. }
            | Self::Gathering { resource, .. }
            | Self::Returning { resource, .. } => Some(*resource),
            _ => None,
        }
    }

    /// Target of a combat task.
    #[must_use]
    pub const fn combat_target(&self) -> Option<CombatTarget> {
        match self {
            Self::GoingToBattle { target, .. } | Self::Attacking { target } => Some(*target),
            _ => None,
        }
    }

    /// Site of a construction task.
    #[must_use]
    pub const fn construction_site(&self) -> Option<SiteKey> {
        match self {
            Self::GoingToConstructionSite { site, .. } | Self::Constructing { site, .. } => {
                Some(*site)
            }
            _ => None,
        }
    }
}

/// Eight-way facing, derived for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    /// Towards negative y.
    North,
    /// Towards positive x and negative y.
    NorthEast,
    /// Towards positive x.
    East,
    /// Towards positive x and positive y.
    SouthEast,
    /// Towards positive y.
    South,
    /// Towards negative x and positive y.
    SouthWest,
    /// Towards negative x.
    West,
    /// Towards negative x and negative y.
    NorthWest,
}

impl Facing {
    /// Facing for a direction vector, or `None` for the zero vector.
    #[must_use]
    pub fn from_direction(direction: Vec2Fixed) -> Option<Self> {
        let sx = direction.x.signum().to_num::<i32>();
        let sy = direction.y.signum().to_num::<i32>();
        match (sx, sy) {
            (0, -1) => Some(Self::North),
            (1, -1) => Some(Self::NorthEast),
            (1, 0) => Some(Self::East),
            (1, 1) => Some(Self::SouthEast),
            (0, 1) => Some(Self::South),
            (-1, 1) => Some(Self::SouthWest),
            (-1, 0) => Some(Self::West),
            (-1, -1) => Some(Self::NorthWest),
            _ => None,
        }
    }
}

/// A mobile unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Entity id.
    pub id: EntityId,
    /// Owning player.
    pub owner: PlayerId,
    /// Unit type.
    pub kind: UnitKind,
    /// Continuous position.
    pub position: Vec2Fixed,
    /// Tile whose occupant list holds this unit.
    pub tile: TilePos,
    /// Tiles per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Damage per hit.
    pub attack: i32,
    /// Attack range in tiles.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Remaining waypoints; always ends at `target_position` when present.
    pub path: Option<VecDeque<TilePos>>,
    /// Movement destination.
    pub target_position: Option<TilePos>,
    /// Current task.
    pub task: UnitTask,
    /// Carried resources.
    pub carrying: ResourceAmounts,
    /// Maximum carried amount of any single resource.
    #[serde(with = "fixed_serde")]
    pub carry_capacity: Fixed,
    /// Units gathered per second.
    #[serde(with = "fixed_serde")]
    pub gather_rate: Fixed,
    /// Time of the last movement step.
    #[serde(with = "option_fixed_serde")]
    pub last_move_time: Option<SimTime>,
    /// Time of the last extraction.
    #[serde(with = "option_fixed_serde")]
    pub last_gather_time: Option<SimTime>,
    /// Time of the last landed hit.
    #[serde(with = "option_fixed_serde")]
    pub last_hit_time: Option<SimTime>,
}

impl Unit {
    /// Whether hit points remain.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Drop any route and destination.
    pub fn stop(&mut self) {
        self.path = None;
        self.target_position = None;
    }

    /// Stop and clear the task.
    pub fn go_idle(&mut self) {
        self.stop();
        self.task = UnitTask::Idle;
    }

    /// Direction of travel towards the next waypoint.
    #[must_use]
    pub fn facing(&self) -> Option<Facing> {
        let next = self
            .path
            .as_ref()
            .and_then(|p| p.front().copied())
            .or(self.target_position)?;
        Facing::from_direction(next.to_world() - self.position)
    }
}

/// A placed building.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Entity id.
    pub id: EntityId,
    /// Building type.
    pub kind: BuildingKind,
    /// Owning player.
    pub owner: PlayerId,
    /// Top-left footprint tile.
    pub origin: TilePos,
    /// Footprint edge length.
    pub size: u32,
    /// Hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Food left in a farm.
    #[serde(with = "fixed_serde")]
    pub food: Fixed,
    /// Population capacity added while standing.
    pub population_increase: u32,
    /// Units waiting to be trained.
    pub training: TrainingQueue,
    /// Time of the last defensive shot.
    #[serde(with = "option_fixed_serde")]
    pub last_hit_time: Option<SimTime>,
}

impl Building {
    /// Whether hit points remain.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Whether `pos` lies within the footprint.
    #[must_use]
    pub const fn covers(&self, pos: TilePos) -> bool {
        pos.x >= self.origin.x
            && pos.y >= self.origin.y
            && pos.x < self.origin.x + self.size
            && pos.y < self.origin.y + self.size
    }

    /// Point of the footprint closest to `point`.
    #[must_use]
    pub fn closest_point(&self, point: Vec2Fixed) -> Vec2Fixed {
        let min = self.origin.to_world();
        let extent = Fixed::from_num(self.size.saturating_sub(1));
        Vec2Fixed::new(
            point.x.clamp(min.x, min.x + extent),
            point.y.clamp(min.y, min.y + extent),
        )
    }
}

/// A participant in the game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Civilisation, which fixes the starting stock.
    pub civilization: Civilization,
    /// Stockpiled resources.
    pub stock: ResourceAmounts,
    /// Owned units in creation order.
    pub units: Vec<EntityId>,
    /// Owned buildings in creation order.
    pub buildings: Vec<EntityId>,
    /// Living unit count.
    pub population: u32,
    /// Hard population ceiling.
    pub max_population: u32,
    /// Active construction sites.
    pub sites: ConstructionSites,
}

/// External commands, as issued by input or AI and recorded in replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Walk to a tile.
    Move {
        /// Unit to move.
        unit: EntityId,
        /// Destination column.
        x: u32,
        /// Destination row.
        y: u32,
    },
    /// Gather the nearest resource of a type.
    Gather {
        /// Worker.
        unit: EntityId,
        /// Resource type.
        resource: ResourceKind,
    },
    /// Chase and attack a target.
    Battle {
        /// Attacker.
        unit: EntityId,
        /// Target.
        target: CombatTarget,
    },
    /// Build at a footprint origin.
    Construct {
        /// Worker.
        unit: EntityId,
        /// Building type.
        building: BuildingKind,
        /// Footprint column.
        x: u32,
        /// Footprint row.
        y: u32,
        /// Player paying for the site.
        player: PlayerId,
    },
    /// Queue a unit in a building.
    Train {
        /// Producing building.
        building: EntityId,
        /// Unit type.
        unit_kind: UnitKind,
    },
    /// Freeze the clock.
    Pause,
    /// Unfreeze the clock.
    Resume,
}
