//! Grid pathfinding using the A* algorithm.
//!
//! All costs use fixed-point math for deterministic results. Occupancy is
//! sampled once, at search time; the movement controller deals with routes
//! that go stale afterwards.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{GameError, Result};
use crate::grid::{GridMap, TilePos, DIRECTIONS};
use crate::math::{Fixed, SQRT_2};

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: TilePos,
    g_score: Fixed,
    f_score: Fixed,
    /// Push order. Equal f-scores pop in insertion order.
    sequence: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both keys for min-heap behaviour.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost of a single step between adjacent tiles.
#[inline]
fn step_cost(from: TilePos, to: TilePos) -> Fixed {
    if from.x != to.x && from.y != to.y {
        SQRT_2
    } else {
        Fixed::ONE
    }
}

/// Octile distance: exact shortest 8-directional cost with no obstacles.
#[must_use]
pub fn octile_distance(a: TilePos, b: TilePos) -> Fixed {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };
    Fixed::from_num(long - short) + SQRT_2 * Fixed::from_num(short)
}

/// Total step cost of walking `path` from `start`.
#[must_use]
pub fn path_cost(start: TilePos, path: &[TilePos]) -> Fixed {
    let mut cost = Fixed::ZERO;
    let mut current = start;
    for &next in path {
        cost += step_cost(current, next);
        current = next;
    }
    cost
}

/// Find a shortest route from `start` to `goal`.
///
/// The returned tiles exclude `start` and end with `goal`; an empty vector
/// means the unit is already there. A neighbour is expanded only if it is
/// free for units, so a blocked goal is unreachable.
///
/// # Errors
///
/// - [`GameError::InvalidTarget`] if either endpoint is out of bounds.
/// - [`GameError::NoPathFound`] if the frontier is exhausted.
pub fn find_path(map: &GridMap, start: TilePos, goal: TilePos) -> Result<Vec<TilePos>> {
    if !map.in_bounds(start) {
        return Err(GameError::InvalidTarget(start));
    }
    if !map.in_bounds(goal) {
        return Err(GameError::InvalidTarget(goal));
    }
    if start == goal {
        return Ok(Vec::new());
    }

    let width = map.width() as usize;
    let cell_count = width * map.height() as usize;
    let index = |p: TilePos| (p.y as usize) * width + (p.x as usize);

    let mut g_score = vec![Fixed::MAX; cell_count];
    let mut came_from: Vec<Option<TilePos>> = vec![None; cell_count];
    let mut closed = vec![false; cell_count];
    let mut open_set = BinaryHeap::new();
    let mut sequence = 0_u64;

    g_score[index(start)] = Fixed::ZERO;
    open_set.push(AStarNode {
        pos: start,
        g_score: Fixed::ZERO,
        f_score: octile_distance(start, goal),
        sequence,
    });

    while let Some(current) = open_set.pop() {
        let current_index = index(current.pos);
        if closed[current_index] || current.g_score > g_score[current_index] {
            continue;
        }
        if current.pos == goal {
            return Ok(reconstruct_path(&came_from, index, start, goal));
        }
        closed[current_index] = true;

        for &(dx, dy) in &DIRECTIONS {
            let Some(neighbor) = current.pos.offset(dx, dy) else {
                continue;
            };
            if !map.is_tile_free_for_unit(neighbor) {
                continue;
            }
            let neighbor_index = index(neighbor);
            if closed[neighbor_index] {
                continue;
            }

            let tentative_g = current.g_score + step_cost(current.pos, neighbor);
            if tentative_g < g_score[neighbor_index] {
                g_score[neighbor_index] = tentative_g;
                came_from[neighbor_index] = Some(current.pos);
                sequence += 1;
                open_set.push(AStarNode {
                    pos: neighbor,
                    g_score: tentative_g,
                    f_score: tentative_g + octile_distance(neighbor, goal),
                    sequence,
                });
            }
        }
    }

    Err(GameError::NoPathFound {
        from: start,
        to: goal,
    })
}

fn reconstruct_path(
    came_from: &[Option<TilePos>],
    index: impl Fn(TilePos) -> usize,
    start: TilePos,
    goal: TilePos,
) -> Vec<TilePos> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(prev) = came_from[index(current)] {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
