use digevo_core::{
    BirthMethod, DeathMethod, Geometry, MigrationStyle, MutationRates, RandomSource, ResourceSpec,
    SchedulerConfig, SimulationConfig, SlicingMethod, WorldConfig,
};
use digevo_exec::ReplicatorFactory;
use digevo_genome::Genome;
use digevo_world::{
    DivideFailure, DivideOutcome, DivideRequest, DivideStage, Grid, InProcessHub, Migrator, Scheduler,
    SchedulerPolicy, World,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

const ANCESTOR: &str = "abcdefghijklmnopqrstuvwx";

fn base_config(width: i32, height: i32, seed: u64) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.world.width = width;
    config.world.height = height;
    config.world.seed = seed;
    config.mutation = MutationRates::none();
    config.death.death_method = DeathMethod::Never;
    config
}

fn build(config: SimulationConfig) -> World {
    World::new(config, Arc::new(ReplicatorFactory::default()), None).unwrap()
}

fn ancestor() -> Genome {
    ANCESTOR.parse().unwrap()
}

fn snapshot(world: &World) -> Vec<Option<String>> {
    (0..world.grid().size())
        .map(|cell| world.organism(cell).map(|o| o.genome().to_string()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn same_seed_same_history(seed in 1u64..10_000) {
        let mut config = base_config(8, 8, seed);
        config.mutation = MutationRates::default();
        let mut a = build(config.clone());
        let mut b = build(config);
        a.inject(ancestor(), 27).unwrap();
        b.inject(ancestor(), 27).unwrap();
        for _ in 0..25 {
            a.run_update().unwrap();
            b.run_update().unwrap();
        }
        prop_assert_eq!(snapshot(&a), snapshot(&b));
        let (sa, sb) = (a.stats(), b.stats());
        prop_assert_eq!(sa.total_births, sb.total_births);
        prop_assert_eq!(sa.num_genotypes, sb.num_genotypes);
        prop_assert_eq!(sa.ave_merit, sb.ave_merit);
    }
}

#[test]
fn population_counts_stay_consistent() {
    let mut config = base_config(12, 12, 99);
    config.mutation = MutationRates::default();
    config.death.death_method = DeathMethod::ProportionalAgeLimit;
    config.death.age_limit = 20;
    let mut world = build(config);
    world.inject(ancestor(), 70).unwrap();

    for _ in 0..80 {
        world.run_update().unwrap();
        world.check_invariants().unwrap();
        let living: u64 = world.genotypes().iter().map(|g| g.num_living()).sum();
        assert_eq!(living, world.num_organisms() as u64);
    }
    assert!(world.stats().total_births > 0);
}

#[test]
fn short_copy_aborts_at_validation() {
    let mut config = base_config(5, 5, 3);
    config.divide.min_copied_lines = 0.5;
    let mut world = build(config);
    world.inject(ancestor(), 0).unwrap();

    let outcome = world
        .divide(
            0,
            DivideRequest {
                offspring: ancestor(),
                executed_fraction: 1.0,
                copied_fraction: 0.3,
            },
        )
        .unwrap();
    assert_eq!(
        outcome,
        DivideOutcome::aborted(DivideStage::Validating, DivideFailure::CopiedTooFew)
    );
    assert_eq!(world.num_organisms(), 1);
    assert_eq!(world.stats().divide_failures_this_update, 1);
}

#[test]
fn oldest_neighbor_receives_offspring_in_full_grid() {
    let mut config = base_config(3, 3, 11);
    config.world.geometry = Geometry::Grid;
    config.birth.birth_method = BirthMethod::OldestInNeighborhood;
    let mut world = build(config);
    // No divide symbol, so nothing reproduces on its own.
    let inert: Genome = "abcdefghijklmnop".parse().unwrap();

    world.inject(inert.clone(), 0).unwrap();
    world.run_update().unwrap();
    for cell in 1..9 {
        world.inject(inert.clone(), cell).unwrap();
    }
    assert_eq!(world.organism(0).unwrap().age(), 1);

    let outcome = world
        .divide(
            4,
            DivideRequest {
                offspring: inert,
                executed_fraction: 1.0,
                copied_fraction: 1.0,
            },
        )
        .unwrap();
    match outcome {
        DivideOutcome::Committed { target, .. } => assert_eq!(target, 0),
        other => panic!("expected a committed divide, got {:?}", other),
    }
    assert_eq!(world.organism(0).unwrap().age(), 0);
    assert_eq!(world.num_organisms(), 9);
}

#[test]
fn oldest_in_population_refills_cells_freed_by_death() {
    let mut config = base_config(2, 1, 3);
    config.birth.birth_method = BirthMethod::OldestInPopulation;
    config.birth.allow_parent = false;
    let mut world = build(config);
    world.inject(ancestor(), 0).unwrap();
    world.inject(ancestor(), 1).unwrap();
    assert!(world.kill(1).unwrap());
    let outcome = world
        .divide(
            0,
            DivideRequest {
                offspring: ancestor(),
                executed_fraction: 1.0,
                copied_fraction: 1.0,
            },
        )
        .unwrap();
    assert!(matches!(outcome, DivideOutcome::Committed { target: 1, .. }), "{:?}", outcome);
    assert_eq!(world.num_organisms(), 2);

    // A full row thinned back to one organism grows back through the update loop.
    let mut config = base_config(4, 1, 3);
    config.birth.birth_method = BirthMethod::OldestInPopulation;
    config.birth.allow_parent = false;
    let mut world = build(config);
    for cell in 0..4 {
        world.inject(ancestor(), cell).unwrap();
    }
    for cell in 1..4 {
        world.kill(cell).unwrap();
    }
    for _ in 0..40 {
        world.run_update().unwrap();
        world.check_invariants().unwrap();
    }
    let stats = world.stats();
    assert_eq!(stats.num_organisms, 4);
    assert!(stats.total_births >= 3);
}

#[test]
fn deme_schedules_grant_full_budget_with_empty_demes() {
    // Three bands of eight cells; the middle band stays empty.
    let grid = Grid::from_config(&WorldConfig {
        width: 4,
        height: 6,
        num_demes: 3,
        ..WorldConfig::default()
    })
    .unwrap();
    let occupied = [(0, 1.0), (3, 4.0), (17, 0.5), (18, 2.0), (23, 1.0)];
    for method in [SlicingMethod::DemeProbabilistic, SlicingMethod::ProportionalDemeProbabilistic] {
        for ave_time_slice in [30, 7] {
            let config = SchedulerConfig {
                slicing_method: method,
                ave_time_slice,
                burst_size: 4,
            };
            let mut scheduler = Scheduler::from_config(&config, &grid);
            for &(cell, merit) in &occupied {
                scheduler.adjust(cell, Some(merit));
            }
            let mut rng = RandomSource::new(17);
            for _ in 0..20 {
                scheduler.begin_update(&mut rng);
                let mut granted = 0u64;
                while let Some(slice) = scheduler.next_slice(&mut rng) {
                    assert_ne!(grid.deme_of(slice.cell), 1);
                    granted += slice.cycles;
                }
                assert_eq!(granted, ave_time_slice as u64 * occupied.len() as u64, "{:?}", method);
            }
        }
    }
}

#[test]
fn global_resource_follows_inflow_and_decay() {
    let mut config = base_config(4, 4, 5);
    config.resources = vec![ResourceSpec::global("glucose", 0.0, 10.0, 0.01)];
    let mut world = build(config);
    let glucose = world.resources().resolve("glucose").unwrap();

    for _ in 0..100 {
        world.run_update().unwrap();
    }
    let expected = 10.0 * (1.0 - 0.99f64.powi(100)) / 0.01;
    let level = world.resources().get_resource(glucose);
    assert!((level - expected).abs() < 1e-6, "level {} expected {}", level, expected);
}

#[test]
fn demes_replicate_on_birth_count() {
    let mut config = base_config(5, 10, 21);
    config.world.num_demes = 2;
    config.demes.max_births = Some(5);
    let mut world = build(config);
    world.inject(ancestor(), 0).unwrap();

    for _ in 0..150 {
        world.run_update().unwrap();
        world.check_invariants().unwrap();
        for deme in world.demes().iter() {
            assert!(deme.births() < 5, "deme {} kept {} births", deme.id(), deme.births());
        }
    }
    assert!(world.demes().replications() > 0);
    assert!(world.demes().iter().all(|d| d.org_count() > 0));
    assert!(world.demes().iter().any(|d| d.generation() > 0));
}

#[test]
fn config_loads_from_json() {
    let json = r#"{
        "world": { "width": 6, "height": 6, "seed": 17 },
        "birth": { "birth_method": "oldest_in_population" },
        "death": { "death_method": "never" },
        "run": { "max_updates": 5 }
    }"#;
    let config: SimulationConfig = serde_json::from_str(json).unwrap();
    let mut world = build(config);
    world.inject(ancestor(), 0).unwrap();
    let stats = world.run().unwrap();
    assert_eq!(stats.update, 5);
}

#[test]
fn migrants_cross_between_worlds() {
    let endpoints = InProcessHub::endpoints(2);
    let handles: Vec<_> = endpoints
        .into_iter()
        .enumerate()
        .map(|(rank, endpoint)| {
            thread::spawn(move || {
                let mut config = base_config(6, 6, 100 + rank as u64);
                config.migration.enabled = true;
                config.migration.style = MigrationStyle::MassAction;
                config.migration.migration_prob = 0.5;
                let migrator = Migrator::new(&config.migration, &config.world, Box::new(endpoint)).unwrap();
                let mut world =
                    World::new(config, Arc::new(ReplicatorFactory::default()), Some(migrator)).unwrap();
                world.inject(ancestor(), 14).unwrap();
                for _ in 0..40 {
                    world.run_update().unwrap();
                    world.check_invariants().unwrap();
                }
                world.stats()
            })
        })
        .collect();

    let stats: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let sent: u64 = stats.iter().map(|s| s.migrants_out).sum();
    let arrived: u64 = stats.iter().map(|s| s.migrants_in).sum();
    assert!(sent > 0);
    assert_eq!(sent, arrived);
}
