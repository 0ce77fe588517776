use std::collections::BTreeMap;

use nalgebra::{dvector, Vector3, Vector6};
use odpartials::estimation_setup::mutual_approximation_partials::{
    create_multi_link_partials, create_single_link_partials,
};
use odpartials::estimation_setup::PartialSettings;
use odpartials::link_ends::{LinkEndType, LinkEnds, ObservableType};
use odpartials::parameters::catalog::EstimatableParameterSet;
use odpartials::parameters::{EstimatableParameter, ParameterIndex};
use odpartials::position_partials::EnvironmentPositionPartials;
use odpartials::scaling::ScalingVariant;
use odpartials::PartialsError;

mod common;
use common::{
    link_ends, shapiro_legs, CountingProvider, EmptyProvider, SecondaryTransmitterProvider,
    JUPITER_MU,
};

fn target_catalog() -> EstimatableParameterSet {
    EstimatableParameterSet::new(vec![EstimatableParameter::initial_body_state(
        "Target",
        Vector6::zeros(),
    )])
    .unwrap()
}

#[test]
fn test_single_initial_state_dependency() {
    let provider = SecondaryTransmitterProvider {
        body: "Target".into(),
    };
    let partials = create_single_link_partials(
        &link_ends("Io", "Target", "Earth"),
        &target_catalog(),
        &PartialSettings::default(),
        &provider,
        &[],
    )
    .unwrap();

    assert_eq!(partials.indices(), vec![ParameterIndex::new(0, 6)]);
    let partial = partials.get(&ParameterIndex::new(0, 6)).unwrap();
    assert_eq!(partial.parameter_size(), 6);
    assert_eq!(partial.observable_size(), 1);
    assert_eq!(partial.light_time_leg_count(), 0);
}

#[test]
fn test_no_dependency_gives_empty_map() {
    let partials = create_single_link_partials(
        &link_ends("Io", "Target", "Earth"),
        &target_catalog(),
        &PartialSettings::default(),
        &EmptyProvider,
        &[],
    )
    .unwrap();

    assert!(partials.is_empty());
    assert_eq!(partials.scaling.variant(), ScalingVariant::CentralInstant);
    assert!(partials.scaling.current_epoch().is_none());
}

#[test]
fn test_multi_link_correction_lookup() {
    let with_corrections = link_ends("Io", "Europa", "Earth");
    let without_corrections = link_ends("Io", "Ganymede", "Earth");
    let corrections = BTreeMap::from([(with_corrections.clone(), shapiro_legs(2))]);

    let catalog = EstimatableParameterSet::new(vec![
        EstimatableParameter::initial_body_state("Io", Vector6::zeros()),
        EstimatableParameter::gravitational_parameter("Jupiter", JUPITER_MU),
        EstimatableParameter::ppn_gamma(1.0),
    ])
    .unwrap();

    let map = create_multi_link_partials(
        &[with_corrections.clone(), without_corrections.clone()],
        &catalog,
        &PartialSettings::default(),
        &EnvironmentPositionPartials::new(),
        Some(&corrections),
    )
    .unwrap();
    assert_eq!(map.len(), 2);

    let corrected = &map[&with_corrections];
    assert_eq!(
        corrected.indices(),
        vec![
            ParameterIndex::new(0, 6),
            ParameterIndex::new(6, 1),
            ParameterIndex::new(7, 1)
        ]
    );
    for partial in corrected.partials.values() {
        assert_eq!(partial.light_time_leg_count(), 2);
    }
    let mu = corrected.get(&ParameterIndex::new(6, 1)).unwrap();
    assert_eq!(mu.number_of_light_time_correction_partial_functions(), 2);

    let uncorrected = &map[&without_corrections];
    assert_eq!(uncorrected.indices(), vec![ParameterIndex::new(0, 6)]);
    let io = uncorrected.get(&ParameterIndex::new(0, 6)).unwrap();
    assert_eq!(io.light_time_leg_count(), 0);
    assert_eq!(io.number_of_light_time_correction_partial_functions(), 0);
}

#[test]
fn test_link_property_bypasses_position_provider() {
    let links = link_ends("Io", "Europa", "Earth");
    let catalog = EstimatableParameterSet::new(vec![EstimatableParameter::observation_bias(
        false,
        links.clone(),
        ObservableType::MutualApproximation,
        dvector![0.0],
    )
    .unwrap()])
    .unwrap();

    let provider = CountingProvider::default();
    let partials = create_single_link_partials(
        &links,
        &catalog,
        &PartialSettings::default(),
        &provider,
        &[],
    )
    .unwrap();

    assert_eq!(provider.total_calls(), 0);
    assert_eq!(partials.indices(), vec![ParameterIndex::new(0, 1)]);
}

#[test]
fn test_position_provider_queried_once_per_parameter() {
    let catalog = EstimatableParameterSet::new(vec![
        EstimatableParameter::initial_body_state("Io", Vector6::zeros()),
        EstimatableParameter::initial_body_state("Europa", Vector6::zeros()),
        EstimatableParameter::radiation_pressure_coefficient("Io", 1.2),
        EstimatableParameter::ground_station_position("Earth", "Station-A", Vector3::x()),
    ])
    .unwrap();
    let provider = CountingProvider::default();
    create_single_link_partials(
        &link_ends("Io", "Europa", "Earth"),
        &catalog,
        &PartialSettings::default(),
        &provider,
        &[],
    )
    .unwrap();

    assert_eq!(
        provider
            .wrt_body_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
    assert_eq!(
        provider
            .wrt_parameter_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
}

#[test]
fn test_uncoupled_parameters_are_absent() {
    let catalog = EstimatableParameterSet::new(vec![
        EstimatableParameter::initial_body_state("Callisto", Vector6::zeros()),
        EstimatableParameter::initial_body_state("Europa", Vector6::zeros()),
        EstimatableParameter::gravitational_parameter("Saturn", 3.7931187e16),
        EstimatableParameter::ppn_gamma(1.0),
        EstimatableParameter::ground_station_position("Mars", "Lander", Vector3::y()),
    ])
    .unwrap();

    let partials = create_single_link_partials(
        &link_ends("Io", "Europa", "Earth"),
        &catalog,
        &PartialSettings::default(),
        &EnvironmentPositionPartials::new(),
        &shapiro_legs(2),
    )
    .unwrap();

    // Saturn does not perturb the light paths; gamma does through the Jupiter term.
    assert_eq!(
        partials.indices(),
        vec![ParameterIndex::new(6, 6), ParameterIndex::new(13, 1)]
    );
}

#[test]
fn test_catalog_blocks_do_not_overlap() {
    let links = link_ends("Io", "Europa", "Earth");
    let catalog = EstimatableParameterSet::new(vec![
        EstimatableParameter::gravitational_parameter("Jupiter", JUPITER_MU),
        EstimatableParameter::initial_body_state("Io", Vector6::zeros()),
        EstimatableParameter::ground_station_position("Earth", "Station-A", Vector3::x()),
        EstimatableParameter::arc_wise_initial_body_state("Europa", 0, Vector6::zeros()),
        EstimatableParameter::arc_wise_initial_body_state("Europa", 1, Vector6::zeros()),
        EstimatableParameter::ppn_gamma(1.0),
        EstimatableParameter::observation_bias(
            true,
            links,
            ObservableType::MutualApproximation,
            dvector![0.0],
        )
        .unwrap(),
    ])
    .unwrap();

    let indices: Vec<ParameterIndex> = catalog
        .parameter_indices()
        .into_iter()
        .map(|(index, _)| index)
        .collect();
    for (i, a) in indices.iter().enumerate() {
        for b in &indices[i + 1..] {
            assert!(!a.overlaps(b), "{a} overlaps {b}");
        }
    }
    let initial_starts: Vec<usize> = indices.iter().take(3).map(|index| index.start).collect();
    assert_eq!(initial_starts, vec![0, 6, 12]);
    assert_eq!(catalog.total_parameter_size(), 24);
}

#[test]
fn test_strict_leg_count() {
    let links = link_ends("Io", "Europa", "Earth");
    for legs in [1, 3] {
        let err = create_single_link_partials(
            &links,
            &target_catalog(),
            &PartialSettings::default(),
            &EnvironmentPositionPartials::new(),
            &shapiro_legs(legs),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PartialsError::LightTimeLegCount {
                observable: ObservableType::MutualApproximation,
                found: legs,
                expected: 2,
            }
        );
        assert!(err
            .to_string()
            .contains(&format!("light time corrections for {legs} links found")));
    }

    assert!(create_single_link_partials(
        &links,
        &target_catalog(),
        &PartialSettings::default(),
        &EnvironmentPositionPartials::new(),
        &[],
    )
    .is_ok());
}

#[test]
fn test_permissive_multi_link_still_fails_on_leg_count() {
    // The multi-link builder only warns; the per-link builder it forwards to rejects the list.
    let links = link_ends("Io", "Europa", "Earth");
    let corrections = BTreeMap::from([(links.clone(), shapiro_legs(1))]);
    let err = create_multi_link_partials(
        &[links],
        &target_catalog(),
        &PartialSettings::default(),
        &EnvironmentPositionPartials::new(),
        Some(&corrections),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PartialsError::LightTimeLegCount { found: 1, .. }
    ));
}

#[test]
fn test_missing_role() {
    let incomplete = LinkEnds::new()
        .with(LinkEndType::Transmitter, "Io")
        .with(LinkEndType::Receiver, "Earth");
    let err = create_single_link_partials(
        &incomplete,
        &target_catalog(),
        &PartialSettings::default(),
        &EnvironmentPositionPartials::new(),
        &[],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PartialsError::MissingLinkEnd {
            missing: LinkEndType::Transmitter2,
            ..
        }
    ));
    assert!(err.to_string().contains("did not find"));

    let map = create_multi_link_partials(
        &[link_ends("Io", "Europa", "Earth"), incomplete],
        &target_catalog(),
        &PartialSettings::default(),
        &EnvironmentPositionPartials::new(),
        None,
    );
    assert!(map.is_err());
}

#[test]
fn test_rotational_initial_state_is_rejected() {
    let catalog = EstimatableParameterSet::new(vec![
        EstimatableParameter::initial_rotational_body_state(
            "Io",
            nalgebra::SVector::<f64, 7>::zeros(),
        ),
    ])
    .unwrap();
    let err = create_single_link_partials(
        &link_ends("Io", "Europa", "Earth"),
        &catalog,
        &PartialSettings::default(),
        &EnvironmentPositionPartials::new(),
        &[],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PartialsError::UnidentifiedInitialStateParameter { .. }
    ));
}

#[test]
fn test_instant_flag_selects_distinct_scalings() {
    let links = link_ends("Io", "Europa", "Earth");
    let catalog = EstimatableParameterSet::new(vec![EstimatableParameter::initial_body_state(
        "Io",
        Vector6::zeros(),
    )])
    .unwrap();
    let instant = PartialSettings::builder()
        .central_instant_as_observable(true)
        .build()
        .unwrap();
    let modified = PartialSettings::builder()
        .central_instant_as_observable(false)
        .build()
        .unwrap();

    let provider = EnvironmentPositionPartials::new();
    let a = create_single_link_partials(&links, &catalog, &instant, &provider, &[]).unwrap();
    let b = create_single_link_partials(&links, &catalog, &modified, &provider, &[]).unwrap();

    assert_ne!(a.scaling.variant(), b.scaling.variant());
    assert_ne!(
        a.scaling.variant().to_string(),
        b.scaling.variant().to_string()
    );

    // Same geometry, different observables: the two partials must not be interchangeable.
    let states = common::approach_states();
    let epoch = common::reference_epoch();
    a.scaling.update(&states, epoch).unwrap();
    b.scaling.update(&states, epoch).unwrap();
    let index = ParameterIndex::new(0, 6);
    let from_instant = a
        .get(&index)
        .unwrap()
        .calculate_partial(&states, None)
        .unwrap();
    let from_modified = b
        .get(&index)
        .unwrap()
        .calculate_partial(&states, None)
        .unwrap();
    assert!((from_instant - from_modified).norm() > 0.0);
}

#[test]
fn test_modified_instant_requires_central_instant_observable() {
    let err = PartialSettings::builder()
        .observable(ObservableType::MutualApproximationWithImpactParameter)
        .central_instant_as_observable(false)
        .build()
        .unwrap_err();
    assert!(matches!(err, PartialsError::InvalidSettings(_)));
}
