//! Events emitted during a tick for presentation and logging layers.

use serde::{Deserialize, Serialize};

use crate::components::{CombatTarget, EntityId, PlayerId, ResourceKind};
use crate::construction::SiteKey;
use crate::data::{BuildingKind, UnitKind};
use crate::grid::TilePos;
use crate::math::{fixed_serde, Fixed};

/// Something observable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A unit reached its move destination.
    Arrived {
        /// Unit.
        unit: EntityId,
        /// Destination tile.
        tile: TilePos,
    },
    /// No route from the unit's tile to its destination.
    MovementBlocked {
        /// Unit.
        unit: EntityId,
        /// Unreachable destination.
        goal: TilePos,
    },
    /// Resources moved from a source into a unit's load.
    Gathered {
        /// Worker.
        unit: EntityId,
        /// Resource type.
        resource: ResourceKind,
        /// Amount extracted this tick.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A source ran dry and was removed.
    ResourceDepleted {
        /// Resource type.
        resource: ResourceKind,
        /// Tile or farm origin.
        tile: TilePos,
    },
    /// A load was handed in at a drop point.
    Deposited {
        /// Worker.
        unit: EntityId,
        /// Player credited.
        player: PlayerId,
        /// Resource type.
        resource: ResourceKind,
        /// Amount added to the stock.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A worker went idle because no source of its resource remains.
    GatherAbandoned {
        /// Worker.
        unit: EntityId,
        /// Resource type.
        resource: ResourceKind,
    },
    /// A full worker went idle because its owner has no drop point.
    ReturnStalled {
        /// Worker.
        unit: EntityId,
        /// Owner without a drop point.
        player: PlayerId,
        /// Resource still carried.
        resource: ResourceKind,
    },
    /// Damage landed.
    Hit {
        /// Attacking unit or building.
        attacker: EntityId,
        /// Target.
        target: CombatTarget,
        /// Damage dealt.
        damage: i32,
        /// Hit points left.
        remaining_hp: i32,
    },
    /// A unit died and was removed.
    UnitKilled {
        /// Unit.
        unit: EntityId,
        /// Former owner.
        owner: PlayerId,
    },
    /// A building was destroyed or a farm exhausted.
    BuildingDestroyed {
        /// Building.
        building: EntityId,
        /// Building type.
        kind: BuildingKind,
        /// Former owner.
        owner: PlayerId,
    },
    /// First worker arrived and the cost was paid.
    ConstructionStarted {
        /// Paying player.
        player: PlayerId,
        /// Site.
        site: SiteKey,
    },
    /// Another worker registered on an existing site.
    WorkerJoined {
        /// Worker.
        unit: EntityId,
        /// Site.
        site: SiteKey,
    },
    /// A site finished and its building was placed.
    ConstructionCompleted {
        /// Owner.
        player: PlayerId,
        /// Site.
        site: SiteKey,
        /// New building.
        building: EntityId,
    },
    /// A site was abandoned because its footprint was occupied.
    ConstructionAborted {
        /// Owner.
        player: PlayerId,
        /// Site.
        site: SiteKey,
    },
    /// A unit left a training queue.
    UnitTrained {
        /// Producing building.
        building: EntityId,
        /// New unit.
        unit: EntityId,
        /// Unit type.
        kind: UnitKind,
    },
}

/// Events generated during a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick number the events belong to.
    pub tick: u64,
    /// Whether the tick was skipped because the clock is paused.
    pub paused: bool,
    /// Events in the order they happened.
    pub events: Vec<SimEvent>,
}

impl TickEvents {
    /// Record an event.
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Units killed this tick.
    pub fn killed_units(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::UnitKilled { unit, .. } => Some(*unit),
            _ => None,
        })
    }

    /// Buildings completed this tick.
    pub fn completed_buildings(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::ConstructionCompleted { building, .. } => Some(*building),
            _ => None,
        })
    }
}
