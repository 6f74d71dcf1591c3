use super::*;
use contracts::{
    AttitudeDist, AttractorPosition, DistributionSpec, EvaluatorKind, HesitancyProfile,
    PositionKey, Recurrence, SignalSchedule,
};

fn small_config(seed: u64) -> SimConfig {
    let mut config = SimConfig {
        run_id: "run_test".to_string(),
        seed,
        ..SimConfig::default()
    };
    config.population.size = 300;
    config.population.migration_interval_days = DistributionSpec::constant(1_000_000.0);
    config.statistics.recurrence = None;
    config.network.degree = 6;
    config
}

fn far_recurrence() -> Recurrence {
    Recurrence {
        offset_days: Decimal::from(10_000),
        period_days: Decimal::from(7),
    }
}

fn unvaccinated_profile(scale: f64, fraction: f64) -> HesitancyProfile {
    HesitancyProfile {
        religious: false,
        alternative: false,
        status: VaccineStatus::None,
        fraction,
        confidence: AttitudeDist::new(10.0, scale, 0.0, 1.0),
        complacency: AttitudeDist::new(10.0, 0.5, 0.0, 1.0),
    }
}

#[test]
fn new_model_places_attractors_first_and_reaches_population_size() {
    let model = HouseholdModel::new(small_config(3)).expect("model");
    let store = model.store();
    assert_eq!(store.attractor_count(), 2);
    assert!(store.is_attractor(0));
    assert!(store.is_attractor(1));
    assert!(store.household_rows().iter().all(|row| *row >= 2));
    assert!(store.person_count() >= 300 / 3);
    for row in store.household_rows() {
        assert_eq!(store.attractor_of(row), Some(store.broker(row)));
        assert!(store.referent_of(row).is_some());
    }
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = small_config(1);
    config.attractors.clear();
    let err = HouseholdModel::new(config).expect_err("no attractors");
    assert!(matches!(err, SimError::Configuration(_)));
}

#[test]
fn network_is_symmetric_and_bounded_by_degree() {
    let model = HouseholdModel::new(small_config(5)).expect("model");
    let store = model.store();
    assert!(model.network_degree() <= 6);
    for ((i, j), weight) in store.network.edges() {
        assert!(i < j);
        assert!(weight > Decimal::ZERO);
        assert!(store.network.contains(j, i));
        assert!(!store.is_attractor(i) && !store.is_attractor(j));
    }
    for row in store.household_rows() {
        let size = store
            .households
            .get(row, HouseholdAttribute::SocialNetworkSize);
        assert_eq!(size, Decimal::from(store.network.degree(row) as u64));
    }
}

#[test]
fn identical_seeds_produce_identical_runs() {
    let mut left = HouseholdModel::new(small_config(11)).expect("left");
    let mut right = HouseholdModel::new(small_config(11)).expect("right");
    left.run_until(Decimal::from(60));
    right.run_until(Decimal::from(60));
    assert_eq!(left.snapshot(), right.snapshot());
    assert_eq!(left.counters(), right.counters());
}

#[test]
fn propagation_and_impressions_advance_counters() {
    let mut model = HouseholdModel::new(small_config(13)).expect("model");
    model.run_until(Decimal::from(21));
    let counters = model.counters();
    assert_eq!(counters.propagations, 3);
    assert!(counters.impressions > 0);
    assert_eq!(counters.terminated_streams, 0);
    for row in model.store().household_rows() {
        for key in HouseholdAttribute::ALL {
            if key.is_unit_interval() {
                let value = model.store().households.get(row, key);
                assert!(value >= Decimal::ZERO && value <= Decimal::ONE, "{key:?}={value}");
            }
        }
    }
}

#[test]
fn maximally_convenient_occasion_vaccinates_every_positive_household() {
    let mut config = small_config(17);
    config.population.size = 600;
    config.attractors.truncate(1);
    config.hesitancy.evaluator = EvaluatorKind::Threshold;
    config.hesitancy.propagation = far_recurrence();
    config.hesitancy.profiles = vec![
        unvaccinated_profile(0.9, 0.5),
        unvaccinated_profile(0.1, 0.5),
    ];
    for factor in [
        &mut config.vaccination.utility,
        &mut config.vaccination.proximity,
        &mut config.vaccination.clarity,
        &mut config.vaccination.affinity,
    ] {
        *factor = DistributionSpec::constant(1.0);
    }
    let mut model = HouseholdModel::new(config).expect("model");

    model.run_until(Decimal::new(69, 1));
    let before = model.snapshot();
    assert_eq!(model.counters().occasions, 0);
    model.run_until(Decimal::from(7));
    let after = model.snapshot();
    assert_eq!(model.counters().occasions, 1);

    let min_age = Decimal::new(5, 1);
    let max_age = Decimal::from(4);
    let mut positive = 0;
    let mut negative = 0;
    for old in &before.households {
        let Some(new) = after
            .households
            .iter()
            .find(|record| record.identifier == old.identifier)
        else {
            continue;
        };
        let Some(child) = &old.child else {
            continue;
        };
        let eligible = child.status == MemberStatus::Susceptible
            && child.age_years >= min_age
            && child.age_years < max_age;
        if !eligible {
            continue;
        }
        let status = new.child.as_ref().map(|child| child.status);
        if old.confidence - old.complacency >= Decimal::ZERO {
            positive += 1;
            assert_eq!(status, Some(MemberStatus::ArtificialImmune));
        } else {
            negative += 1;
            assert_eq!(status, Some(MemberStatus::Susceptible));
        }
    }
    assert!(positive > 0, "no eligible positive household drawn");
    assert!(negative > 0, "no eligible negative household drawn");
    assert!(model.counters().vaccinated >= positive);
}

#[test]
fn migration_replaces_households_but_never_attractors() {
    let mut config = small_config(19);
    config.population.migration_interval_days = DistributionSpec::constant(1.0);
    let mut model = HouseholdModel::new(config).expect("model");
    let households = model.store().household_count();
    let edges = model.store().network.edge_count();

    model.run_until(Decimal::from(30));
    assert_eq!(model.counters().migrations, 30);
    assert_eq!(model.store().household_count(), households);
    assert_eq!(model.store().network.edge_count(), edges);
    assert!(model.store().is_attractor(0));
    assert!(model.store().is_attractor(1));
    assert_eq!(
        model.store().households.get(0, HouseholdAttribute::Confidence),
        Decimal::new(9, 1)
    );
}

#[test]
fn children_leaving_home_renew_the_household() {
    let mut config = small_config(23);
    config.population.leave_home_age_years = Decimal::from(2);
    let mut model = HouseholdModel::new(config).expect("model");
    let households = model.store().household_count();
    model.run_until(Decimal::from(30));
    assert!(model.counters().home_leavers > 0);
    assert_eq!(model.store().household_count(), households);
}

#[test]
fn statistics_stream_queues_snapshots_in_order() {
    let mut config = small_config(29);
    config.statistics.recurrence = Some(Recurrence::every(Decimal::from(10)));
    let mut model = HouseholdModel::new(config).expect("model");
    model.run_until(Decimal::from(35));
    let snapshots = model.drain_snapshots();
    assert_eq!(snapshots.len(), 3);
    assert_eq!(
        snapshots.iter().map(|s| s.seq).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(snapshots[2].now_days, Decimal::from(30));
    assert!(model.drain_snapshots().is_empty());
}

#[test]
fn attractor_signal_overwrites_position_on_schedule() {
    let mut config = small_config(31);
    config.attractors[0].schedules.push(SignalSchedule {
        start_days: Decimal::ZERO,
        interval_days: Decimal::from(10),
        series: [(
            PositionKey::Confidence,
            vec![Decimal::new(1, 1), Decimal::new(2, 1), Decimal::new(3, 1)],
        )]
        .into_iter()
        .collect(),
    });
    let mut model = HouseholdModel::new(config).expect("model");
    model.run_until(Decimal::from(15));
    assert_eq!(
        model.store().households.get(0, HouseholdAttribute::Confidence),
        Decimal::new(2, 1)
    );
    assert_eq!(model.snapshot().attractors[0].confidence, Decimal::new(2, 1));
    model.run_until(Decimal::from(100));
    assert_eq!(
        model.store().households.get(0, HouseholdAttribute::Confidence),
        Decimal::new(3, 1)
    );
}

#[test]
fn run_reaches_horizon_and_reports_complete() {
    let mut config = small_config(37);
    config.duration_days = Decimal::from(30);
    let mut model = HouseholdModel::new(config).expect("model");
    let processed = model.run();
    assert!(processed > 0);
    let status = model.status();
    assert!(status.complete);
    assert_eq!(status.now_days, Decimal::from(30));
    assert_eq!(status.processed_events, processed);
    assert!(!model.step());
}

#[test]
fn attractor_position_defaults_flow_into_households() {
    let mut config = small_config(41);
    config.attractors[0].position = AttractorPosition {
        self_multiplier: Decimal::from(2),
        ..AttractorPosition::new(Decimal::ONE, Decimal::ZERO)
    };
    let model = HouseholdModel::new(config).expect("model");
    let store = model.store();
    let row = store
        .household_rows()
        .into_iter()
        .find(|row| store.attractor_of(*row) == Some(0))
        .expect("group member");
    assert_eq!(
        store.households.get(row, HouseholdAttribute::ImpressionSelf),
        Decimal::from(2)
    );
}

#[test]
fn multiplier_signal_reaches_existing_group_members() {
    let mut config = small_config(47);
    config.attractors[0].schedules.push(SignalSchedule {
        start_days: Decimal::ONE,
        interval_days: Decimal::from(10),
        series: [(PositionKey::SelfMultiplier, vec![Decimal::from(5)])]
            .into_iter()
            .collect(),
    });
    let mut model = HouseholdModel::new(config).expect("model");
    let (group, others): (Vec<usize>, Vec<usize>) = model
        .store()
        .household_rows()
        .into_iter()
        .partition(|row| model.store().attractor_of(*row) == Some(0));
    assert!(!group.is_empty() && !others.is_empty());
    let untouched = model
        .store()
        .households
        .get(others[0], HouseholdAttribute::ImpressionSelf);

    model.run_until(Decimal::from(2));
    let store = model.store();
    assert_eq!(
        store.households.get(0, HouseholdAttribute::ImpressionSelf),
        Decimal::from(5)
    );
    for row in group {
        assert_eq!(
            store.households.get(row, HouseholdAttribute::ImpressionSelf),
            Decimal::from(5),
            "row {row}"
        );
    }
    assert_eq!(
        store.households.get(others[0], HouseholdAttribute::ImpressionSelf),
        untouched
    );
}

#[test]
fn snapshots_export_attractor_positions() {
    let mut model = HouseholdModel::new(small_config(53)).expect("model");
    let snapshot = model.snapshot();
    assert_eq!(snapshot.attractors.len(), 2);
    let first = &snapshot.attractors[0];
    assert_eq!(first.index, 0);
    assert_eq!(first.name, "public_health");
    assert_eq!(first.confidence, Decimal::new(9, 1));
    assert_eq!(first.complacency, Decimal::new(1, 1));
    assert_eq!(snapshot.attractors[1].name, "alternative_medicine");
    assert!(snapshot.households.iter().all(|record| record.index >= 2));
}

#[test]
fn impression_feeds_count_peers_moved_at_propagation() {
    let mut config = small_config(43);
    config.hesitancy.impression_impact_rate = Decimal::from(70);
    let mut model = HouseholdModel::new(config).expect("model");

    model.run_until(Decimal::new(69, 1));
    assert_eq!(model.counters().propagations, 0);
    assert!(model.counters().impressions > 0);
    let before = model.snapshot();
    assert!(before
        .households
        .iter()
        .all(|record| record.impression_feeds == 0));

    model.run_until(Decimal::from(7));
    assert_eq!(model.counters().propagations, 1);
    let after = model.snapshot();
    let fed = after
        .households
        .iter()
        .filter(|record| record.impression_feeds > 0)
        .count() as u64;
    let total = after
        .households
        .iter()
        .map(|record| record.impression_feeds)
        .sum::<u64>();
    assert!(fed > 0);
    assert!(fed <= model.counters().propagated_rows);
    assert!(total >= fed);
}
