//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Sources of non-determinism
//!
//! - **Floating-point math**: all simulation quantities are
//!   [`villager_core::math::Fixed`].
//! - **Map iteration order**: entity storage is ordered by id and units
//!   are processed in roster order.
//! - **Tick deltas**: every helper here drives the simulation with an
//!   explicit, constant delta.

use std::thread;

use villager_core::math::Fixed;
use villager_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one step
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

fn advance(sim: &mut Simulation, dt: Fixed) {
    sim.tick(dt).expect("simulation tick failed");
}

/// Run a simulation twice from identical setups and compare final hashes.
///
/// # Panics
///
/// Panics if a tick returns an error.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(2, num_ticks, &setup_fn, |sim| advance(sim, dt), Simulation::state_hash)
        .is_deterministic
}

/// Run `num_sims` simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a tick returns an error or a thread panics.
pub fn run_parallel_simulations<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
    dt: Fixed,
) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        advance(&mut sim, dt);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two runs tick by tick.
///
/// Returns `None` if they never diverge, or the first tick at which the
/// state hashes differ.
///
/// # Panics
///
/// Panics if a tick returns an error.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    for tick in 0..num_ticks {
        advance(&mut sim1, dt);
        advance(&mut sim2, dt);
        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a serialization round trip mid-game changes nothing: the
/// restored copy and the original stay in lockstep afterwards.
///
/// # Panics
///
/// Panics if a tick returns an error.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..num_ticks {
        advance(&mut sim, dt);
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..num_ticks {
        advance(&mut sim, dt);
        advance(&mut restored, dt);
    }
    restored.state_hash() == sim.state_hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::fixtures::{fixed, gold_mine_world};
    use villager_core::components::Command;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_differing_runs_are_reported() {
        let runs = Cell::new(0u64);
        let result = verify_determinism(
            2,
            10,
            || {
                runs.set(runs.get() + 1);
                runs.get()
            },
            |n| *n += 1,
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes(), vec![11, 12]);
    }

    #[test]
    fn test_divergence_found_at_first_differing_tick() {
        let runs = Cell::new(0);
        let setup = || {
            runs.set(runs.get() + 1);
            let (world, _, villager, _) = gold_mine_world();
            let mut sim = Simulation::new(world);
            let x = if runs.get() == 1 { 20 } else { 0 };
            sim.apply_command(Command::Move {
                unit: villager,
                x,
                y: 10,
            });
            sim
        };
        assert_eq!(find_first_divergence(setup, 10, fixed(1)), Some(0));
    }
}
