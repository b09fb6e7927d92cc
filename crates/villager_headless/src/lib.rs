//! Headless scenario runner for CI and balance checks.
//!
//! Loads a RON scenario, runs it without any presentation layer and
//! reports a JSON summary on stdout. Logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! cargo run -p villager_headless -- run --scenario scenarios/gather.ron
//! cargo run -p villager_headless -- run --scenario scenarios/skirmish.ron --ticks 1200 --dt 0.05
//! ```

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, PlayerSummary, RunOptions, RunSummary, ScenarioRunner};
pub use scenario::{Order, Scenario, ScenarioError};
