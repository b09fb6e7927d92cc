//! Proptest strategies.
//!
//! These strategies generate random but reproducible inputs for
//! property-based testing of the engine.

use proptest::prelude::*;
use villager_core::grid::TilePos;
use villager_core::math::Fixed;

/// Generate a tile inside a `width` x `height` map.
pub fn arb_tile(width: u32, height: u32) -> impl Strategy<Value = TilePos> {
    (0..width, 0..height).prop_map(|(x, y)| TilePos::new(x, y))
}

/// Generate a distinct start and goal tile inside the map.
pub fn arb_route(width: u32, height: u32) -> impl Strategy<Value = (TilePos, TilePos)> {
    (arb_tile(width, height), arb_tile(width, height)).prop_filter("start != goal", |(a, b)| a != b)
}

/// Generate a set of obstacle tiles (may include duplicates).
pub fn arb_obstacles(width: u32, height: u32, max: usize) -> impl Strategy<Value = Vec<TilePos>> {
    proptest::collection::vec(arb_tile(width, height), 0..max)
}

/// Generate a tick delta between 0.05 and 2.0 seconds.
pub fn arb_tick_delta() -> impl Strategy<Value = Fixed> {
    (1i32..=40i32).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(20))
}

/// Generate a sequence of tick deltas.
pub fn arb_tick_deltas(max_len: usize) -> impl Strategy<Value = Vec<Fixed>> {
    proptest::collection::vec(arb_tick_delta(), 1..max_len)
}

/// Generate a movement speed between 0.25 and 3.0 tiles per second.
pub fn arb_speed() -> impl Strategy<Value = Fixed> {
    (1i32..=12i32).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(4))
}

/// Generate a gather rate between 0.5 and 8 units per second.
pub fn arb_gather_rate() -> impl Strategy<Value = Fixed> {
    (1i32..=16i32).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(2))
}

/// Generate a worker count for a construction site.
pub fn arb_worker_count() -> impl Strategy<Value = usize> {
    1usize..16usize
}
