//! Runs the bundled scenario files end to end.

use std::path::PathBuf;

use villager_headless::{run_scenario, RunOptions, Scenario, ScenarioError};

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

// ============================================================================
// Bundled scenarios
// ============================================================================

#[test]
fn gather_scenario_deposits_gold() {
    let scenario = Scenario::load(bundled("gather.ron")).unwrap();
    let summary = run_scenario(&scenario, RunOptions::default()).unwrap();

    assert_eq!(summary.steps, 1200);
    assert_eq!(summary.orders_rejected, 0);
    assert!(summary.events.get("deposited").copied().unwrap_or(0) >= 1);
    assert!(summary.players[0].gold > 50.0);
}

#[test]
fn construction_scenario_builds_and_trains() {
    let scenario = Scenario::load(bundled("construction.ron")).unwrap();
    let summary = run_scenario(&scenario, RunOptions::default()).unwrap();

    assert_eq!(summary.orders_rejected, 0);
    assert_eq!(summary.events.get("construction_started"), Some(&1));
    assert_eq!(summary.events.get("construction_completed"), Some(&1));
    assert_eq!(summary.events.get("unit_trained"), Some(&1));
    assert_eq!(summary.players[0].buildings, 3);
    assert_eq!(summary.players[0].population, 5);
    assert_eq!(summary.players[0].sites, 0);
}

#[test]
fn skirmish_scenario_is_deterministic() {
    let scenario = Scenario::load(bundled("skirmish.ron")).unwrap();
    let options = RunOptions {
        ticks: Some(1500),
        dt: None,
    };
    let first = run_scenario(&scenario, options).unwrap();
    let second = run_scenario(&scenario, options).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.players.len(), 2);
    assert!(first.events.get("deposited").copied().unwrap_or(0) > 0);
}

// ============================================================================
// Files on disk
// ============================================================================

#[test]
fn scenario_written_to_disk_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walk.ron");
    std::fs::write(
        &path,
        r#"(
            name: "walk",
            map_size: (10, 10),
            players: [(name: "Solo")],
            units: [(label: Some("u"), kind: Villager, player: 0, x: 0, y: 0)],
            orders: [(at_tick: 0, order: Move(unit: "u", x: 4, y: 0))],
            ticks: 10,
            dt: 1.0,
        )"#,
    )
    .unwrap();

    let scenario = Scenario::load(&path).unwrap();
    let summary = run_scenario(&scenario, RunOptions::default()).unwrap();
    assert_eq!(summary.events.get("arrived"), Some(&1));
    assert_eq!(summary.players[0].tasks.get("idle"), Some(&1));
}

#[test]
fn malformed_scenario_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    std::fs::write(&path, "(name: \"broken\", map_size: (10,").unwrap();

    assert!(matches!(
        Scenario::load(&path),
        Err(ScenarioError::ParseError(_))
    ));
}
