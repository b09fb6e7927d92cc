//! Scenario runner implementation.
//!
//! Builds the starting world from a [`Scenario`], issues its orders at the
//! scheduled ticks and collects a JSON-ready [`RunSummary`].

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use villager_core::components::{Command, ResourceKind};
use villager_core::events::{SimEvent, TickEvents};
use villager_core::math::Fixed;
use villager_core::simulation::Simulation;
use villager_core::snapshot::WorldSnapshot;

use crate::scenario::{Scenario, ScenarioError};

/// Command-line overrides for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Tick count; the scenario's own when `None`.
    pub ticks: Option<u64>,
    /// Tick delta in seconds; the scenario's own when `None`.
    pub dt: Option<f64>,
}

/// End-of-run totals for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSummary {
    /// Display name.
    pub name: String,
    /// Wood in stock.
    pub wood: f64,
    /// Gold in stock.
    pub gold: f64,
    /// Food in stock.
    pub food: f64,
    /// Living units.
    pub population: u32,
    /// Population cap.
    pub population_cap: u32,
    /// Standing buildings.
    pub buildings: usize,
    /// Open construction sites.
    pub sites: usize,
    /// Unit count per task label.
    pub tasks: BTreeMap<&'static str, u32>,
}

/// JSON summary printed at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Tick calls made.
    pub steps: u64,
    /// Ticks processed (paused calls excluded).
    pub ticks: u64,
    /// Simulation time in seconds.
    pub time: f64,
    /// Whether the clock ended paused.
    pub paused: bool,
    /// Final state hash, hex encoded.
    pub state_hash: String,
    /// Orders issued.
    pub orders_issued: usize,
    /// Orders the engine rejected.
    pub orders_rejected: usize,
    /// Event count per event type.
    pub events: BTreeMap<&'static str, u64>,
    /// Per-player totals.
    pub players: Vec<PlayerSummary>,
}

/// Runs a scenario tick by tick.
#[derive(Debug)]
pub struct ScenarioRunner {
    name: String,
    simulation: Simulation,
    orders: Vec<(u64, Command)>,
    next_order: usize,
    step: u64,
    ticks: u64,
    dt: Fixed,
    orders_rejected: usize,
    events: BTreeMap<&'static str, u64>,
}

impl ScenarioRunner {
    /// Build the world and resolve orders.
    pub fn new(scenario: &Scenario, options: RunOptions) -> Result<Self, ScenarioError> {
        let ticks = options.ticks.unwrap_or(scenario.ticks);
        let dt_secs = options.dt.unwrap_or(scenario.dt);
        let dt = Fixed::checked_from_num(dt_secs)
            .filter(|dt| *dt > Fixed::ZERO)
            .ok_or_else(|| ScenarioError::Invalid(format!("tick delta {dt_secs} out of range")))?;

        let (world, labels) = scenario.build_world()?;
        let orders = scenario.resolve_orders(&world, &labels)?;
        info!(
            scenario = %scenario.name,
            ticks,
            dt = dt_secs,
            orders = orders.len(),
            "Scenario loaded"
        );

        Ok(Self {
            name: scenario.name.clone(),
            simulation: Simulation::new(world),
            orders,
            next_order: 0,
            step: 0,
            ticks,
            dt,
            orders_rejected: 0,
            events: BTreeMap::new(),
        })
    }

    fn issue_due_orders(&mut self) {
        while let Some(&(at, command)) = self.orders.get(self.next_order) {
            if at > self.step {
                break;
            }
            if self.simulation.apply_command(command) {
                debug!(step = self.step, ?command, "Order issued");
            } else {
                warn!(step = self.step, ?command, "Order rejected");
                self.orders_rejected += 1;
            }
            self.next_order += 1;
        }
    }

    /// Issue due orders and run one tick.
    pub fn step(&mut self) -> Result<TickEvents, ScenarioError> {
        self.issue_due_orders();
        let events = self.simulation.tick(self.dt)?;
        for event in &events.events {
            *self.events.entry(event_name(event)).or_default() += 1;
        }
        self.step += 1;
        Ok(events)
    }

    /// Whether the requested number of ticks has run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.step >= self.ticks
    }

    /// Run every remaining tick and summarise.
    pub fn run(mut self) -> Result<RunSummary, ScenarioError> {
        while !self.is_finished() {
            self.step()?;
        }
        let summary = self.summary();
        info!(
            scenario = %summary.scenario,
            ticks = summary.ticks,
            hash = %summary.state_hash,
            "Scenario finished"
        );
        Ok(summary)
    }

    /// Current state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Summary of the current state.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let snapshot = self.simulation.snapshot();
        RunSummary {
            scenario: self.name.clone(),
            steps: self.step,
            ticks: snapshot.tick,
            time: snapshot.time.to_num(),
            paused: snapshot.paused,
            state_hash: format!("{:016x}", self.simulation.state_hash()),
            orders_issued: self.next_order,
            orders_rejected: self.orders_rejected,
            events: self.events.clone(),
            players: player_summaries(&snapshot),
        }
    }
}

fn player_summaries(snapshot: &WorldSnapshot) -> Vec<PlayerSummary> {
    snapshot
        .players
        .iter()
        .map(|player| {
            let mut tasks = BTreeMap::new();
            for unit in snapshot.units.iter().filter(|u| u.owner == player.id) {
                *tasks.entry(unit.task).or_default() += 1;
            }
            PlayerSummary {
                name: player.name.clone(),
                wood: player.stock.get(ResourceKind::Wood).to_num(),
                gold: player.stock.get(ResourceKind::Gold).to_num(),
                food: player.stock.get(ResourceKind::Food).to_num(),
                population: player.population,
                population_cap: player.population_cap,
                buildings: snapshot
                    .buildings
                    .iter()
                    .filter(|b| b.owner == player.id)
                    .count(),
                sites: player.sites,
                tasks,
            }
        })
        .collect()
}

fn event_name(event: &SimEvent) -> &'static str {
    match event {
        SimEvent::Arrived { .. } => "arrived",
        SimEvent::MovementBlocked { .. } => "movement_blocked",
        SimEvent::Gathered { .. } => "gathered",
        SimEvent::ResourceDepleted { .. } => "resource_depleted",
        SimEvent::Deposited { .. } => "deposited",
        SimEvent::GatherAbandoned { .. } => "gather_abandoned",
        SimEvent::ReturnStalled { .. } => "return_stalled",
        SimEvent::Hit { .. } => "hit",
        SimEvent::UnitKilled { .. } => "unit_killed",
        SimEvent::BuildingDestroyed { .. } => "building_destroyed",
        SimEvent::ConstructionStarted { .. } => "construction_started",
        SimEvent::WorkerJoined { .. } => "worker_joined",
        SimEvent::ConstructionCompleted { .. } => "construction_completed",
        SimEvent::ConstructionAborted { .. } => "construction_aborted",
        SimEvent::UnitTrained { .. } => "unit_trained",
    }
}

/// Load, run and summarise in one call.
pub fn run_scenario(scenario: &Scenario, options: RunOptions) -> Result<RunSummary, ScenarioError> {
    ScenarioRunner::new(scenario, options)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATHER: &str = r#"
        (
            name: "gather",
            map_size: (24, 24),
            players: [(name: "Red", civilization: Leans)],
            resources: [(kind: Gold, x: 12, y: 12)],
            buildings: [(label: Some("tc"), kind: TownCenter, player: 0, x: 2, y: 2)],
            units: [
                (label: Some("miner"), kind: Villager, player: 0, x: 11, y: 12),
                (label: Some("walker"), kind: Villager, player: 0, x: 0, y: 20),
            ],
            orders: [
                (at_tick: 0, order: Gather(unit: "miner", resource: Gold)),
                (at_tick: 3, order: Move(unit: "walker", x: 6, y: 20)),
                (at_tick: 4, order: Move(unit: "walker", x: 500, y: 500)),
            ],
            ticks: 40,
            dt: 0.5,
        )
    "#;

    #[test]
    fn test_run_counts_ticks_and_orders() {
        let scenario = Scenario::from_ron_str(GATHER).unwrap();
        let summary = run_scenario(&scenario, RunOptions::default()).unwrap();

        assert_eq!(summary.steps, 40);
        assert_eq!(summary.ticks, 40);
        assert!((summary.time - 20.0).abs() < 1e-9);
        assert_eq!(summary.orders_issued, 3);
        assert_eq!(summary.orders_rejected, 1);
        assert_eq!(summary.events.get("arrived"), Some(&1));
        assert!(summary.events.get("gathered").copied().unwrap_or(0) > 0);
        assert_eq!(summary.players[0].population, 2);
    }

    #[test]
    fn test_options_override_scenario() {
        let scenario = Scenario::from_ron_str(GATHER).unwrap();
        let options = RunOptions {
            ticks: Some(4),
            dt: Some(1.0),
        };
        let summary = run_scenario(&scenario, options).unwrap();
        assert_eq!(summary.steps, 4);
        assert!((summary.time - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_dt_rejected() {
        let scenario = Scenario::from_ron_str(GATHER).unwrap();
        let options = RunOptions {
            ticks: None,
            dt: Some(0.0),
        };
        assert!(matches!(
            ScenarioRunner::new(&scenario, options),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let scenario = Scenario::from_ron_str(GATHER).unwrap();
        let a = run_scenario(&scenario, RunOptions::default()).unwrap();
        let b = run_scenario(&scenario, RunOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let scenario = Scenario::from_ron_str(GATHER).unwrap();
        let summary = run_scenario(&scenario, RunOptions::default()).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["scenario"], "gather");
        assert_eq!(json["players"][0]["name"], "Red");
        assert!(json["state_hash"].as_str().unwrap().len() == 16);
    }
}
