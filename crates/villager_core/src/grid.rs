//! Tile grid: terrain contents, unit occupancy and spatial indexes.
//!
//! The grid is the single owner of the resource index (per-kind tile
//! resources plus farms) and the drop-point index. Other subsystems mutate
//! it only through the methods below and read it through the query methods.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, PlayerId, ResourceKind};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Integer tile coordinates.
///
/// Ordering is lexicographic on `(x, y)`; index scans rely on it for
/// deterministic tie-breaking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TilePos {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl TilePos {
    /// Create a tile position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// World position of this tile. Tile `(x, y)` sits at exactly `(x, y)`.
    #[must_use]
    pub fn to_world(self) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(self.x), Fixed::from_num(self.y))
    }

    /// Tile containing a world position, or `None` when negative.
    #[must_use]
    pub fn from_world(pos: Vec2Fixed) -> Option<Self> {
        if pos.x < Fixed::ZERO || pos.y < Fixed::ZERO {
            return None;
        }
        Some(Self::new(pos.x.floor().to_num(), pos.y.floor().to_num()))
    }

    /// Manhattan distance between two tiles.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Offset by a signed delta, or `None` if it would go negative.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(Self::new(x, y))
    }
}

/// Direction offsets for 8-directional movement.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// A gatherable deposit lying on a tile (Wood or Gold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDeposit {
    /// Resource type.
    pub kind: ResourceKind,
    /// Remaining amount.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
}

/// Building reference stored on every tile of its footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildingCell {
    /// Building entity.
    pub id: EntityId,
    /// Whether units may stand on this tile.
    pub walkable: bool,
}

/// A single grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Coordinates of this tile.
    pub pos: TilePos,
    /// Resource lying on the tile.
    pub resource: Option<ResourceDeposit>,
    /// Building covering the tile.
    pub building: Option<BuildingCell>,
    /// Units whose committed position is this tile.
    pub units: Vec<EntityId>,
}

impl Tile {
    /// No resource, no building and no units.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.resource.is_none() && self.building.is_none() && self.units.is_empty()
    }

    /// No resource and no blocking building. Units may share tiles.
    #[must_use]
    pub fn is_free_for_unit(&self) -> bool {
        self.resource.is_none() && self.building.map_or(true, |b| b.walkable)
    }
}

/// Owner and entity of an indexed building (farm or drop point).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedBuilding {
    /// Owning player.
    pub owner: PlayerId,
    /// Building entity.
    pub building: EntityId,
}

/// The world grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMap {
    width: u32,
    height: u32,
    /// Row-major tiles.
    tiles: Vec<Tile>,
    /// Tile resources by kind.
    resource_index: BTreeMap<ResourceKind, BTreeSet<TilePos>>,
    /// Farms by footprint origin; the Food source index.
    farm_index: BTreeMap<TilePos, IndexedBuilding>,
    /// Drop-capable buildings by footprint origin.
    drop_index: BTreeMap<TilePos, IndexedBuilding>,
}

impl GridMap {
    /// Create an empty map.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "GridMap width must be positive");
        assert!(height > 0, "GridMap height must be positive");

        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                tiles.push(Tile {
                    pos: TilePos::new(x, y),
                    ..Tile::default()
                });
            }
        }

        Self {
            width,
            height,
            tiles,
            resource_index: BTreeMap::new(),
            farm_index: BTreeMap::new(),
            drop_index: BTreeMap::new(),
        }
    }

    /// Map width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Map height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, pos: TilePos) -> usize {
        (pos.y as usize) * (self.width as usize) + (pos.x as usize)
    }

    /// Check if a tile is within bounds.
    #[must_use]
    pub const fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Tile at `pos`, if in bounds.
    #[must_use]
    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.in_bounds(pos).then(|| &self.tiles[self.index(pos)])
    }

    fn tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        if self.in_bounds(pos) {
            let index = self.index(pos);
            Some(&mut self.tiles[index])
        } else {
            None
        }
    }

    /// Iterate every tile in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// In-bounds neighbours of `pos` in [`DIRECTIONS`] order.
    pub fn neighbors(&self, pos: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        DIRECTIONS
            .iter()
            .filter_map(move |&(dx, dy)| pos.offset(dx, dy))
            .filter(move |p| self.in_bounds(*p))
    }

    // ------------------------------------------------------------------
    // Free / occupied queries
    // ------------------------------------------------------------------

    /// No resource, building or unit. Out of bounds is never free.
    #[must_use]
    pub fn is_tile_free(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(Tile::is_free)
    }

    /// No resource and no blocking building. Out of bounds is never free.
    #[must_use]
    pub fn is_tile_free_for_unit(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(Tile::is_free_for_unit)
    }

    /// Every tile of the `size`×`size` footprint at `origin` is free.
    #[must_use]
    pub fn is_area_free(&self, origin: TilePos, size: u32) -> bool {
        footprint(origin, size).all(|pos| self.is_tile_free(pos))
    }

    // ------------------------------------------------------------------
    // Unit occupancy
    // ------------------------------------------------------------------

    /// Add a unit to a tile's occupant list.
    pub fn place_unit(&mut self, pos: TilePos, unit: EntityId) -> bool {
        match self.tile_mut(pos) {
            Some(tile) => {
                if !tile.units.contains(&unit) {
                    tile.units.push(unit);
                }
                true
            }
            None => false,
        }
    }

    /// Remove a unit from a tile's occupant list.
    pub fn remove_unit(&mut self, pos: TilePos, unit: EntityId) -> bool {
        let Some(tile) = self.tile_mut(pos) else {
            return false;
        };
        let before = tile.units.len();
        tile.units.retain(|&id| id != unit);
        tile.units.len() != before
    }

    /// Relocate a unit between tiles. Nothing changes if `to` is out of bounds.
    pub fn move_unit(&mut self, unit: EntityId, from: TilePos, to: TilePos) -> bool {
        if !self.in_bounds(to) {
            return false;
        }
        self.remove_unit(from, unit);
        self.place_unit(to, unit)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Put a Wood or Gold deposit on a free tile and index it.
    pub fn add_resource(&mut self, pos: TilePos, kind: ResourceKind, amount: Fixed) -> Result<()> {
        if kind == ResourceKind::Food {
            return Err(GameError::InvalidState(
                "food is stored in farms, not on tiles".into(),
            ));
        }
        if !self.is_tile_free(pos) || amount <= Fixed::ZERO {
            return Err(GameError::InvalidTarget(pos));
        }
        if let Some(tile) = self.tile_mut(pos) {
            tile.resource = Some(ResourceDeposit { kind, amount });
        }
        self.resource_index.entry(kind).or_default().insert(pos);
        Ok(())
    }

    /// Deposit lying on `pos`.
    #[must_use]
    pub fn resource_at(&self, pos: TilePos) -> Option<&ResourceDeposit> {
        self.tile(pos).and_then(|t| t.resource.as_ref())
    }

    /// Take up to `requested` from the deposit at `pos`.
    ///
    /// Returns `(extracted, depleted)`. A depleted deposit is removed from
    /// the tile and the index.
    pub fn extract_resource(&mut self, pos: TilePos, requested: Fixed) -> (Fixed, bool) {
        let Some(tile) = self.tile_mut(pos) else {
            return (Fixed::ZERO, false);
        };
        let Some(deposit) = tile.resource.as_mut() else {
            return (Fixed::ZERO, false);
        };

        let extracted = requested.min(deposit.amount).max(Fixed::ZERO);
        deposit.amount -= extracted;
        let kind = deposit.kind;

        if deposit.amount <= Fixed::ZERO {
            tile.resource = None;
            if let Some(set) = self.resource_index.get_mut(&kind) {
                set.remove(&pos);
            }
            return (extracted, true);
        }
        (extracted, false)
    }

    /// Number of indexed deposits of `kind` (farms for Food).
    #[must_use]
    pub fn source_count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Food => self.farm_index.len(),
            _ => self.resource_index.get(&kind).map_or(0, BTreeSet::len),
        }
    }

    /// Nearest source of `kind` to `from` by Manhattan distance.
    ///
    /// Wood and Gold come from the shared tile index; Food comes only from
    /// farms owned by `player`. Scan order is lexicographic, and only a
    /// strictly smaller distance replaces the current best, so ties resolve
    /// to the lowest coordinate.
    #[must_use]
    pub fn find_nearest_resource(
        &self,
        from: TilePos,
        kind: ResourceKind,
        player: PlayerId,
    ) -> Option<TilePos> {
        let candidates: Box<dyn Iterator<Item = TilePos> + '_> = match kind {
            ResourceKind::Food => Box::new(
                self.farm_index
                    .iter()
                    .filter(move |(_, entry)| entry.owner == player)
                    .map(|(pos, _)| *pos),
            ),
            _ => Box::new(
                self.resource_index
                    .get(&kind)
                    .into_iter()
                    .flat_map(|set| set.iter().copied()),
            ),
        };

        nearest(from, candidates)
    }

    // ------------------------------------------------------------------
    // Buildings
    // ------------------------------------------------------------------

    /// Cover the footprint with a building. Fails if the area is not free.
    pub fn place_building(&mut self, origin: TilePos, size: u32, cell: BuildingCell) -> bool {
        if !self.is_area_free(origin, size) {
            return false;
        }
        for pos in footprint(origin, size) {
            if let Some(tile) = self.tile_mut(pos) {
                tile.building = Some(cell);
            }
        }
        true
    }

    /// Clear a building's footprint and drop its index entries.
    pub fn remove_building(&mut self, origin: TilePos, size: u32, id: EntityId) {
        for pos in footprint(origin, size) {
            if let Some(tile) = self.tile_mut(pos) {
                if tile.building.is_some_and(|b| b.id == id) {
                    tile.building = None;
                }
            }
        }
        self.farm_index.retain(|_, entry| entry.building != id);
        self.drop_index.retain(|_, entry| entry.building != id);
    }

    /// Register a farm as a Food source.
    pub fn register_farm(&mut self, origin: TilePos, entry: IndexedBuilding) {
        self.farm_index.insert(origin, entry);
    }

    /// Farm whose footprint origin is `origin`.
    #[must_use]
    pub fn farm_at(&self, origin: TilePos) -> Option<IndexedBuilding> {
        self.farm_index.get(&origin).copied()
    }

    /// Register a building that accepts deposits.
    pub fn register_drop_point(&mut self, origin: TilePos, entry: IndexedBuilding) {
        self.drop_index.insert(origin, entry);
    }

    /// Nearest drop point owned by `player`, as `(origin, building)`.
    #[must_use]
    pub fn find_drop_point(&self, from: TilePos, player: PlayerId) -> Option<(TilePos, EntityId)> {
        let owned = self
            .drop_index
            .iter()
            .filter(|(_, entry)| entry.owner == player)
            .map(|(pos, _)| *pos);
        let origin = nearest(from, owned)?;
        self.drop_index.get(&origin).map(|e| (origin, e.building))
    }

    /// Tiles of the one-tile ring around a footprint that are in bounds.
    ///
    /// Order starts at the top-left diagonal corner and runs clockwise.
    #[must_use]
    pub fn perimeter(&self, origin: TilePos, size: u32) -> Vec<TilePos> {
        let (ox, oy) = (i64::from(origin.x), i64::from(origin.y));
        let n = i64::from(size);
        let mut ring = Vec::with_capacity(4 * (size as usize) + 4);

        for x in ox - 1..=ox + n {
            ring.push((x, oy - 1));
        }
        for y in oy..=oy + n {
            ring.push((ox + n, y));
        }
        for x in (ox - 1..ox + n).rev() {
            ring.push((x, oy + n));
        }
        for y in (oy..oy + n).rev() {
            ring.push((ox - 1, y));
        }

        ring.into_iter()
            .filter_map(|(x, y)| {
                let pos = TilePos::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?);
                self.in_bounds(pos).then_some(pos)
            })
            .collect()
    }

    /// Perimeter tile free for units closest to `from`, ties in ring order.
    #[must_use]
    pub fn nearest_free_perimeter_tile(
        &self,
        origin: TilePos,
        size: u32,
        from: TilePos,
    ) -> Option<TilePos> {
        let free = self
            .perimeter(origin, size)
            .into_iter()
            .filter(|p| self.is_tile_free_for_unit(*p));
        nearest(from, free)
    }
}

/// All tiles of a `size`×`size` footprint.
pub fn footprint(origin: TilePos, size: u32) -> impl Iterator<Item = TilePos> {
    (0..size).flat_map(move |dy| {
        (0..size).filter_map(move |dx| {
            Some(TilePos::new(
                origin.x.checked_add(dx)?,
                origin.y.checked_add(dy)?,
            ))
        })
    })
}

/// First candidate with strictly minimal Manhattan distance.
fn nearest(from: TilePos, candidates: impl Iterator<Item = TilePos>) -> Option<TilePos> {
    let mut best: Option<(u32, TilePos)> = None;
    for pos in candidates {
        let distance = from.manhattan(pos);
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, pos));
        }
    }
    best.map(|(_, pos)| pos)
}
