//! Determinism checks over busy simulations: same setup, same hashes.

use villager_core::components::{CombatTarget, Command, ResourceKind};
use villager_core::data::{BuildingKind, UnitKind};
use villager_core::simulation::Simulation;
use villager_test_utils::determinism::{
    find_first_divergence, run_parallel_simulations, verify_determinism,
    verify_serialization_determinism, verify_simulation_determinism,
};
use villager_test_utils::fixtures::{fixed, fixed_f, gold_mine_world, skirmish};

/// Skirmish with every villager gathering, swordsmen fighting and both town
/// centers training.
fn busy_skirmish() -> Simulation {
    let mut sim = skirmish();
    let rosters: Vec<_> = sim
        .world()
        .players
        .iter()
        .map(|p| p.units.clone())
        .collect();

    for (side, roster) in rosters.iter().enumerate() {
        let enemies = &rosters[1 - side];
        for (i, &unit) in roster.iter().enumerate() {
            let kind = sim.world().unit(unit).map(|u| u.kind);
            let command = match kind {
                Some(UnitKind::Swordsman) => Command::Battle {
                    unit,
                    target: CombatTarget::Unit(enemies[0]),
                },
                _ => Command::Gather {
                    unit,
                    resource: if i % 2 == 0 {
                        ResourceKind::Wood
                    } else {
                        ResourceKind::Gold
                    },
                },
            };
            sim.apply_command(command);
        }
    }

    for building in sim.world().buildings.sorted_ids() {
        if sim.world().building(building).map(|b| b.kind) == Some(BuildingKind::TownCenter) {
            sim.apply_command(Command::Train {
                building,
                unit_kind: UnitKind::Villager,
            });
        }
    }
    sim
}

fn gathering() -> Simulation {
    let (world, _, villager, _) = gold_mine_world();
    let mut sim = Simulation::new(world);
    sim.apply_command(Command::Gather {
        unit: villager,
        resource: ResourceKind::Gold,
    });
    sim
}

#[test]
fn gather_cycle_is_deterministic() {
    assert!(verify_simulation_determinism(gathering, 120, fixed(1)));
}

#[test]
fn busy_skirmish_is_deterministic() {
    let result = verify_determinism(
        3,
        400,
        busy_skirmish,
        |sim| {
            sim.tick(fixed_f(0.25)).unwrap();
        },
        Simulation::state_hash,
    );
    result.assert_deterministic();
    assert_eq!(result.unique_hashes().len(), 1);
}

#[test]
fn busy_skirmish_never_diverges() {
    assert_eq!(find_first_divergence(busy_skirmish, 400, fixed_f(0.25)), None);
}

#[test]
fn busy_skirmish_matches_across_threads() {
    let result = run_parallel_simulations(busy_skirmish, 4, 200, fixed_f(0.5));
    result.assert_deterministic();
    assert_eq!(result.hashes.len(), 4);
}

#[test]
fn busy_skirmish_survives_save_and_restore() {
    assert!(verify_serialization_determinism(busy_skirmish, 150, fixed_f(0.25)));
}
