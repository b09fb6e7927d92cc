//! Multi-worker construction.
//!
//! Workers walk to a free tile next to the footprint and register on the
//! player's site for `(kind, origin)`. The first arrival pays the cost and
//! starts the clock; every worker shortens the effective build time with
//! diminishing returns:
//!
//! ```text
//! effective = K * base / (min(workers, max_builders) + C)
//! ```
//!
//! When the elapsed time reaches the effective time the building is placed,
//! provided its footprint is still free. An occupied footprint aborts the
//! site and forfeits both progress and cost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::components::{EntityId, PlayerId, Unit, UnitTask};
use crate::data::{BuildingKind, EngineConfig};
use crate::error::{GameError, Result};
use crate::events::{SimEvent, TickEvents};
use crate::grid::TilePos;
use crate::math::{fixed_serde, Fixed};
use crate::movement::{self, MoveOutcome};
use crate::time::SimTime;
use crate::world::World;

/// Identifies a site within one player's sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteKey {
    /// Building being raised.
    pub kind: BuildingKind,
    /// Top-left footprint tile.
    pub origin: TilePos,
}

/// An active site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionSite {
    /// Registered workers in arrival order.
    pub workers: Vec<EntityId>,
    /// When the first worker arrived.
    #[serde(with = "fixed_serde")]
    pub started_at: SimTime,
}

/// A player's sites, keyed by [`SiteKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionSites {
    sites: BTreeMap<SiteKey, ConstructionSite>,
}

impl ConstructionSites {
    /// Site for a key.
    #[must_use]
    pub fn get(&self, key: &SiteKey) -> Option<&ConstructionSite> {
        self.sites.get(key)
    }

    /// Whether a site exists for a key.
    #[must_use]
    pub fn contains(&self, key: &SiteKey) -> bool {
        self.sites.contains_key(key)
    }

    /// Number of active sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether no site is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Iterate sites in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SiteKey, &ConstructionSite)> {
        self.sites.iter()
    }

    /// Create an empty site started at `now`. Existing sites are kept.
    pub fn open(&mut self, key: SiteKey, now: SimTime) {
        self.sites.entry(key).or_insert_with(|| ConstructionSite {
            workers: Vec::new(),
            started_at: now,
        });
    }

    /// Register a worker. Returns the site's start time.
    pub fn join(&mut self, key: &SiteKey, worker: EntityId) -> Option<SimTime> {
        let site = self.sites.get_mut(key)?;
        if !site.workers.contains(&worker) {
            site.workers.push(worker);
        }
        Some(site.started_at)
    }

    /// Unregister a worker from one site. A site left without workers is
    /// dropped.
    pub fn leave(&mut self, key: &SiteKey, worker: EntityId) {
        if let Some(site) = self.sites.get_mut(key) {
            site.workers.retain(|w| *w != worker);
            if site.workers.is_empty() {
                self.sites.remove(key);
            }
        }
    }

    /// Unregister a worker from every site.
    pub fn remove_worker(&mut self, worker: EntityId) {
        for site in self.sites.values_mut() {
            site.workers.retain(|w| *w != worker);
        }
        self.sites.retain(|_, site| !site.workers.is_empty());
    }

    /// Remove a site.
    pub fn remove(&mut self, key: &SiteKey) -> Option<ConstructionSite> {
        self.sites.remove(key)
    }
}

/// Build time for `workers` workers on a building of base time `base`.
///
/// Strictly decreasing up to `max_builders_per_site` workers, after which it
/// stays at the floor `K * base / (max_builders_per_site + C)`.
#[must_use]
pub fn effective_build_time(config: &EngineConfig, base: Fixed, workers: usize) -> Fixed {
    let capped = workers.min(config.max_builders_per_site as usize).max(1);
    config.build_time_k * base / (Fixed::from_num(capped) + config.build_time_c)
}

/// Lowest possible build time for a building of base time `base`.
#[must_use]
pub fn minimum_build_time(config: &EngineConfig, base: Fixed) -> Fixed {
    effective_build_time(config, base, config.max_builders_per_site as usize)
}

/// Send `unit` to build `kind` with its footprint at `origin`.
///
/// Affordability is checked now only if no site exists yet; the cost is
/// paid when the first worker arrives. Repeating the order for the site
/// the unit already works on is a no-op.
///
/// # Errors
///
/// - [`GameError::InvalidState`] if the unit cannot build or belongs to
///   another player.
/// - [`GameError::InvalidTarget`] if the footprint is not free or has no
///   reachable free perimeter tile.
/// - [`GameError::InsufficientFunds`] if a new site cannot be paid for.
/// - [`GameError::NoPathFound`] if no perimeter tile can be reached.
pub fn try_construct_building(
    world: &mut World,
    unit: &mut Unit,
    kind: BuildingKind,
    origin: TilePos,
    player: PlayerId,
    now: SimTime,
) -> Result<()> {
    if unit.owner != player {
        return Err(GameError::InvalidState(format!(
            "unit {} does not belong to {player:?}",
            unit.id
        )));
    }
    if !world.catalog.unit(unit.kind)?.can_build {
        return Err(GameError::InvalidState(format!(
            "{:?} cannot construct buildings",
            unit.kind
        )));
    }

    let key = SiteKey { kind, origin };
    if unit.task.construction_site() == Some(key) {
        return Ok(());
    }

    let stats = world.catalog.building(kind)?;
    let (size, cost) = (stats.size, stats.cost);
    if !world.map.is_area_free(origin, size) {
        return Err(GameError::InvalidTarget(origin));
    }
    let owner = world.player(player)?;
    if !owner.sites.contains(&key) {
        owner.stock.check_affordable(&cost)?;
    }

    let stand = world
        .map
        .nearest_free_perimeter_tile(origin, size, unit.tile)
        .ok_or(GameError::InvalidTarget(origin))?;
    movement::set_destination(unit, &world.map, stand, now)?;

    unit.task = UnitTask::GoingToConstructionSite { site: key, stand };
    debug!(unit = unit.id, ?kind, ?origin, ?stand, "heading to construction site");
    Ok(())
}

/// Unregister a unit from the site its `previous` task was building.
pub(crate) fn leave_site(world: &mut World, unit: &Unit, previous: UnitTask) {
    if let UnitTask::Constructing { site, .. } = previous {
        if let Ok(player) = world.player_mut(unit.owner) {
            player.sites.leave(&site, unit.id);
        }
    }
}

pub(crate) fn update_going_to_site(
    world: &mut World,
    unit: &mut Unit,
    site: SiteKey,
    stand: TilePos,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let size = world.catalog.building(site.kind)?.size;
    let site_open = world.player(unit.owner)?.sites.contains(&site);
    if !site_open && !world.map.is_area_free(site.origin, size) {
        debug!(unit = unit.id, ?site, "footprint taken before arrival");
        unit.go_idle();
        return Ok(());
    }

    if unit.target_position.is_none() {
        if movement::is_at(unit, stand, &world.config) {
            return register_worker(world, unit, site, now, events);
        }
        if movement::set_destination(unit, &world.map, stand, now).is_err() {
            unit.go_idle();
            return Ok(());
        }
    }

    match movement::step(unit, &mut world.map, &world.config, now) {
        MoveOutcome::Arrived => register_worker(world, unit, site, now, events),
        MoveOutcome::Blocked => {
            events.push(SimEvent::MovementBlocked {
                unit: unit.id,
                goal: stand,
            });
            Ok(())
        }
        _ => Ok(()),
    }
}

fn register_worker(
    world: &mut World,
    unit: &mut Unit,
    key: SiteKey,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let stats = world.catalog.building(key.kind)?;
    let (size, cost) = (stats.size, stats.cost);
    let owner = unit.owner;

    if !world.player(owner)?.sites.contains(&key) {
        if !world.map.is_area_free(key.origin, size) {
            debug!(unit = unit.id, ?key, "footprint taken on arrival");
            unit.go_idle();
            return Ok(());
        }
        let player = world.player_mut(owner)?;
        if let Err(err) = player.stock.spend(&cost) {
            debug!(unit = unit.id, ?key, %err, "cannot pay for site");
            unit.go_idle();
            return Ok(());
        }
        player.sites.open(key, now);
        info!(player = ?owner, ?key, "construction started");
        events.push(SimEvent::ConstructionStarted {
            player: owner,
            site: key,
        });
    }

    let started_at = world
        .player_mut(owner)?
        .sites
        .join(&key, unit.id)
        .ok_or_else(|| GameError::InvalidState(format!("site {key:?} vanished")))?;
    unit.stop();
    unit.task = UnitTask::Constructing {
        site: key,
        started_at,
    };
    events.push(SimEvent::WorkerJoined {
        unit: unit.id,
        site: key,
    });
    Ok(())
}

pub(crate) fn update_constructing(
    world: &mut World,
    unit: &mut Unit,
    key: SiteKey,
    now: SimTime,
    events: &mut TickEvents,
) -> Result<()> {
    let owner = unit.owner;
    let Some(site) = world.player(owner)?.sites.get(&key) else {
        unit.go_idle();
        return Ok(());
    };
    let (started_at, workers) = (site.started_at, site.workers.len());
    let stats = world.catalog.building(key.kind)?;
    let (size, base) = (stats.size, stats.build_time);

    if !world.map.is_area_free(key.origin, size) {
        abort_site(world, unit, owner, key, events);
        return Ok(());
    }

    let effective = effective_build_time(&world.config, base, workers);
    if now - started_at >= effective {
        complete_site(world, unit, owner, key, events);
    }
    Ok(())
}

/// Remove a site and idle every worker registered on it.
fn close_site(world: &mut World, unit: &mut Unit, owner: PlayerId, key: SiteKey) {
    let workers = world
        .player_mut(owner)
        .ok()
        .and_then(|p| p.sites.remove(&key))
        .map(|site| site.workers)
        .unwrap_or_default();

    for worker in workers {
        if worker == unit.id {
            continue;
        }
        if let Some(other) = world.units.get_mut(worker) {
            if other.task.construction_site() == Some(key) {
                other.go_idle();
            }
        }
    }
    unit.go_idle();
}

fn abort_site(
    world: &mut World,
    unit: &mut Unit,
    owner: PlayerId,
    key: SiteKey,
    events: &mut TickEvents,
) {
    warn!(player = ?owner, ?key, "construction aborted: footprint occupied");
    close_site(world, unit, owner, key);
    events.push(SimEvent::ConstructionAborted {
        player: owner,
        site: key,
    });
}

fn complete_site(
    world: &mut World,
    unit: &mut Unit,
    owner: PlayerId,
    key: SiteKey,
    events: &mut TickEvents,
) {
    match world.place_building(key.kind, owner, key.origin) {
        Ok(building) => {
            close_site(world, unit, owner, key);
            events.push(SimEvent::ConstructionCompleted {
                player: owner,
                site: key,
                building,
            });
        }
        Err(err) => {
            warn!(player = ?owner, ?key, %err, "completed site could not be placed");
            abort_site(world, unit, owner, key, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_time_decreases_with_workers() {
        let config = EngineConfig::default();
        let base = Fixed::from_num(10);

        assert_eq!(effective_build_time(&config, base, 1), base);
        let mut previous = effective_build_time(&config, base, 1);
        for workers in 2..=8 {
            let time = effective_build_time(&config, base, workers);
            assert!(time < previous, "{workers} workers should be faster");
            previous = time;
        }
        assert_eq!(effective_build_time(&config, base, 20), previous);
        assert_eq!(minimum_build_time(&config, base), Fixed::from_num(3));
    }

    #[test]
    fn test_sites_join_and_leave() {
        let mut sites = ConstructionSites::default();
        let key = SiteKey {
            kind: BuildingKind::House,
            origin: TilePos::new(3, 3),
        };

        assert_eq!(sites.join(&key, 1), None);
        sites.open(key, Fixed::from_num(5));
        assert_eq!(sites.join(&key, 1), Some(Fixed::from_num(5)));
        assert_eq!(sites.join(&key, 1), Some(Fixed::from_num(5)));
        sites.join(&key, 2);
        assert_eq!(sites.get(&key).unwrap().workers, vec![1, 2]);

        // Re-opening keeps the original start time.
        sites.open(key, Fixed::from_num(9));
        assert_eq!(sites.get(&key).unwrap().started_at, Fixed::from_num(5));

        sites.leave(&key, 1);
        assert_eq!(sites.get(&key).unwrap().workers, vec![2]);
        sites.remove_worker(2);
        assert!(sites.is_empty());
    }
}
