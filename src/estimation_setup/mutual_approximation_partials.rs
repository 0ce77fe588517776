//! # Mutual-approximation partial builders
//!
//! Builds, once per estimation setup, the sparse set of partials of a mutual-approximation
//! observable (central instant, impact parameter, or both) w.r.t. every estimated parameter.
//!
//! ## Algorithm (one link-end set)
//!
//! 1. Check that `Transmitter`, `Transmitter2` and `Receiver` are all present.
//! 2. Create the light-time correction partials, one list per leg (zero or exactly two legs).
//! 3. Create the single scaling object of the link-end set.
//! 4. Initial-state parameters, in catalog order, at consecutive 6-wide blocks from column 0.
//! 5. Scalar parameters at `(key, 1)`.
//! 6. Vector parameters at `(key, width)`; link properties (biases) take a dedicated path that
//!    never queries the position-partial provider.
//!
//! A partial is kept only if at least one link-end position or one light-time correction
//! depends on its parameter; otherwise the parameter has no entry in the map.
//!
//! ## Leg-count handling
//!
//! [`create_single_link_partials`] rejects a correction list with a leg count other than 0
//! or 2. [`create_multi_link_partials`] only warns about it and forwards the list unchanged,
//! so the error still surfaces from the per-link builder.
//!
//! ## See also
//! ------------
//! * [`crate::position_partials::PositionPartialProvider`] – Link-end position sensitivities.
//! * [`crate::light_time_corrections::create_leg_correction_partials`] – Per-leg correction partials.
//! * [`crate::scaling::create_observable_scaling`] – Scaling of a link-end set.
use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::constants::{INITIAL_STATE_SIZE, REQUIRED_LIGHT_TIME_LEGS};
use crate::estimation_setup::{
    MultiLinkPartialMap, PartialSettings, SingleLinkPartialList, SingleLinkPartials,
};
use crate::light_time_corrections::{
    create_leg_correction_partials, LegCorrectionPartials, LightTimeCorrection,
    LightTimeCorrectionList,
};
use crate::link_ends::{check_required_link_ends, LinkEnds, ObservableType};
use crate::observation_partials::{
    create_observation_partial_wrt_link_property, ApproximationPartial, LegPartialFunctions,
    ObservationPartial,
};
use crate::parameters::catalog::ParameterCatalog;
use crate::parameters::{
    EstimatableParameter, EstimatableParameterKind, ParameterIdentifier, ParameterIndex,
};
use crate::partials_errors::PartialsError;
use crate::position_partials::{PositionPartialMap, PositionPartialProvider};
use crate::scaling::{create_observable_scaling, SharedScaling};

/// Light-time partial functions of every leg that depend on `parameter`.
fn light_time_partial_functions(
    correction_partials: &LegCorrectionPartials,
    parameter: &ParameterIdentifier,
) -> LegPartialFunctions {
    correction_partials
        .iter()
        .map(|leg| {
            leg.iter()
                .filter_map(|partial| partial.light_time_partial_function(parameter))
                .collect()
        })
        .collect()
}

/// Wrap position and light-time dependencies into a partial, or `None` when both are empty.
fn approximation_partial_if_dependent(
    parameter: &ParameterIdentifier,
    parameter_size: usize,
    scaling: &SharedScaling,
    position_partials: PositionPartialMap,
    correction_partials: &LegCorrectionPartials,
) -> Option<Box<dyn ObservationPartial>> {
    let partial = ApproximationPartial::new(
        parameter.clone(),
        parameter_size,
        Arc::clone(scaling),
        position_partials,
        light_time_partial_functions(correction_partials, parameter),
    );
    if partial.has_dependency() {
        Some(Box::new(partial))
    } else {
        None
    }
}

/// Create the partial of a mutual-approximation observable w.r.t. the current state of a body.
///
/// Arguments
/// -----------------
/// * `link_ends`: Link-end set of the observable.
/// * `body`: Body whose state is the parameter.
/// * `parameter`: Identifier under which the partial is recorded.
/// * `scaling`: Scaling shared by the link-end set.
/// * `position_provider`: Source of link-end position partials.
/// * `correction_partials`: Light-time correction partials, one list per leg (may be empty).
///
/// Return
/// ----------
/// * `Some(partial)` if a link end is located on `body` or a light-time correction depends on
///   the parameter, `None` otherwise.
pub fn create_partial_wrt_body_position(
    link_ends: &LinkEnds,
    body: &str,
    parameter: &ParameterIdentifier,
    scaling: &SharedScaling,
    position_provider: &dyn PositionPartialProvider,
    correction_partials: &LegCorrectionPartials,
) -> Option<Box<dyn ObservationPartial>> {
    let position_partials = position_provider.position_partials_wrt_body(link_ends, body);
    approximation_partial_if_dependent(
        parameter,
        INITIAL_STATE_SIZE,
        scaling,
        position_partials,
        correction_partials,
    )
}

/// Create the partial of a mutual-approximation observable w.r.t. a scalar or vector parameter.
///
/// Link-property parameters (observation biases) are handed to
/// [`create_observation_partial_wrt_link_property`] without querying `position_provider`.
///
/// Return
/// ----------
/// * `Some(partial)` when the observable depends on the parameter, `None` otherwise.
pub fn create_partial_wrt_parameter(
    link_ends: &LinkEnds,
    observable: ObservableType,
    parameter: &EstimatableParameter,
    scaling: &SharedScaling,
    position_provider: &dyn PositionPartialProvider,
    correction_partials: &LegCorrectionPartials,
) -> Option<Box<dyn ObservationPartial>> {
    if parameter.is_observation_link_property() {
        return create_observation_partial_wrt_link_property(link_ends, observable, parameter);
    }
    let position_partials = position_provider.position_partials_wrt_parameter(link_ends, parameter);
    approximation_partial_if_dependent(
        parameter.identifier(),
        parameter.width(),
        scaling,
        position_partials,
        correction_partials,
    )
}

/// Pair every initial-state parameter with its 6-wide block, in catalog order.
fn initial_state_blocks<'a>(
    parameters: &[&'a EstimatableParameter],
) -> Vec<(&'a EstimatableParameter, ParameterIndex)> {
    parameters
        .iter()
        .scan(0, |offset, parameter| {
            let index = ParameterIndex::new(*offset, INITIAL_STATE_SIZE);
            *offset += INITIAL_STATE_SIZE;
            Some((*parameter, index))
        })
        .collect()
}

/// Create all partials of one link-end set.
///
/// Arguments
/// -----------------
/// * `link_ends`: Link-end set; must hold `Transmitter`, `Transmitter2` and `Receiver`.
/// * `catalog`: Estimated parameters and their indices.
/// * `settings`: Observable and scaling formulation.
/// * `position_provider`: Source of link-end position partials.
/// * `light_time_corrections`: Raw light-time corrections, one list per leg; empty or two legs.
///
/// Return
/// ----------
/// * The sparse partial map of the link-end set and its shared scaling.
///
/// Errors
/// ----------
/// * [`PartialsError::MissingLinkEnd`] if a required role is missing.
/// * [`PartialsError::LightTimeLegCount`] if corrections are given for other than two legs.
/// * [`PartialsError::UnidentifiedInitialStateParameter`] for an initial-state parameter that
///   is not the translational state of a named body.
pub fn create_single_link_partials<C: ParameterCatalog + ?Sized>(
    link_ends: &LinkEnds,
    catalog: &C,
    settings: &PartialSettings,
    position_provider: &dyn PositionPartialProvider,
    light_time_corrections: &[Vec<Arc<dyn LightTimeCorrection>>],
) -> Result<SingleLinkPartials, PartialsError> {
    let observable = settings.observable();
    check_required_link_ends(link_ends, observable)?;

    let correction_partials = create_leg_correction_partials(observable, light_time_corrections)?;
    let scaling = create_observable_scaling(
        settings.scaling_variant(),
        link_ends,
        settings.dependent_variables(),
    );

    let mut partials = SingleLinkPartialList::new();

    for (parameter, index) in initial_state_blocks(&catalog.initial_state_parameters()) {
        let body = match (parameter.kind(), parameter.identifier().body.as_deref()) {
            (
                EstimatableParameterKind::InitialBodyState
                | EstimatableParameterKind::ArcWiseInitialBodyState,
                Some(body),
            ) => body,
            _ => {
                return Err(PartialsError::UnidentifiedInitialStateParameter {
                    observable,
                    parameter: parameter.identifier().to_string(),
                })
            }
        };
        if let Some(partial) = create_partial_wrt_body_position(
            link_ends,
            body,
            parameter.identifier(),
            &scaling,
            position_provider,
            &correction_partials,
        ) {
            partials.insert(index, partial);
        }
    }

    for (key, parameter) in catalog.scalar_parameters() {
        if let Some(partial) = create_partial_wrt_parameter(
            link_ends,
            observable,
            parameter,
            &scaling,
            position_provider,
            &correction_partials,
        ) {
            partials.insert(ParameterIndex::new(key, 1), partial);
        }
    }

    for (key, parameter) in catalog.vector_parameters() {
        if let Some(partial) = create_partial_wrt_parameter(
            link_ends,
            observable,
            parameter,
            &scaling,
            position_provider,
            &correction_partials,
        ) {
            partials.insert(ParameterIndex::new(key, parameter.width()), partial);
        }
    }

    debug!(
        "Created {} {observable} partials for link ends {link_ends} ({}, {} light-time legs)",
        partials.len(),
        scaling.variant(),
        correction_partials.len()
    );

    Ok(SingleLinkPartials { partials, scaling })
}

/// Create the partials of several link-end sets.
///
/// Arguments
/// -----------------
/// * `link_ends_list`: Link-end sets to build partials for.
/// * `catalog`, `settings`, `position_provider`: As in [`create_single_link_partials`].
/// * `light_time_corrections`: Optional per-link-end-set corrections; a set without an entry
///   has no light-time correction partials. An entry that does not hold two legs, including
///   an empty one, is reported with a warning.
///
/// Return
/// ----------
/// * The partial maps keyed by link-end set.
///
/// Errors
/// ----------
/// * Any error of [`create_single_link_partials`]. A leg count other than 0 or 2 is first
///   reported with a warning here, then rejected by the per-link builder; an empty entry is
///   only warned about.
pub fn create_multi_link_partials<C: ParameterCatalog + ?Sized>(
    link_ends_list: &[LinkEnds],
    catalog: &C,
    settings: &PartialSettings,
    position_provider: &dyn PositionPartialProvider,
    light_time_corrections: Option<&BTreeMap<LinkEnds, LightTimeCorrectionList>>,
) -> Result<MultiLinkPartialMap, PartialsError> {
    let mut partial_map = MultiLinkPartialMap::new();

    for link_ends in link_ends_list {
        let corrections: &[Vec<Arc<dyn LightTimeCorrection>>] =
            match light_time_corrections.and_then(|map| map.get(link_ends)) {
                Some(list) => {
                    if list.len() != REQUIRED_LIGHT_TIME_LEGS {
                        warn!(
                            "Light time corrections for {} links found for {} link ends {link_ends}, \
                             instead of {REQUIRED_LIGHT_TIME_LEGS}",
                            list.len(),
                            settings.observable()
                        );
                    }
                    list.as_slice()
                }
                None => &[],
            };

        let single_link = create_single_link_partials(
            link_ends,
            catalog,
            settings,
            position_provider,
            corrections,
        )?;
        partial_map.insert(link_ends.clone(), single_link);
    }

    Ok(partial_map)
}

#[cfg(test)]
mod mutual_approximation_partials_test {
    use nalgebra::{dvector, Vector3, Vector6};

    use super::*;
    use crate::link_ends::LinkEndType;
    use crate::parameters::catalog::EstimatableParameterSet;
    use crate::position_partials::EnvironmentPositionPartials;

    fn link_ends() -> LinkEnds {
        LinkEnds::new()
            .with(LinkEndType::Transmitter, "Io")
            .with(LinkEndType::Transmitter2, "Europa")
            .with(LinkEndType::Receiver, "Earth")
    }

    #[test]
    fn test_initial_state_blocks_are_consecutive() {
        let a = EstimatableParameter::initial_body_state("Io", Vector6::zeros());
        let b = EstimatableParameter::initial_body_state("Europa", Vector6::zeros());
        let c = EstimatableParameter::arc_wise_initial_body_state("Ganymede", 1, Vector6::zeros());
        let blocks = initial_state_blocks(&[&a, &b, &c]);
        let starts: Vec<_> = blocks.iter().map(|(_, index)| index.start).collect();
        assert_eq!(starts, vec![0, 6, 12]);
    }

    #[test]
    fn test_partials_of_translational_states() {
        let set = EstimatableParameterSet::new(vec![
            EstimatableParameter::initial_body_state("Io", Vector6::zeros()),
            EstimatableParameter::initial_body_state("Ganymede", Vector6::zeros()),
            EstimatableParameter::initial_body_state("Earth", Vector6::zeros()),
            EstimatableParameter::gravitational_parameter("Jupiter", 1.26686534e17),
        ])
        .unwrap();

        let partials = create_single_link_partials(
            &link_ends(),
            &set,
            &PartialSettings::default(),
            &EnvironmentPositionPartials::new(),
            &[],
        )
        .unwrap();

        assert_eq!(
            partials.indices(),
            vec![ParameterIndex::new(0, 6), ParameterIndex::new(12, 6)]
        );
    }

    #[test]
    fn test_rotational_state_is_not_identified() {
        let set = EstimatableParameterSet::new(vec![
            EstimatableParameter::initial_body_state("Io", Vector6::zeros()),
            EstimatableParameter::initial_rotational_body_state(
                "Io",
                nalgebra::SVector::<f64, 7>::zeros(),
            ),
        ])
        .unwrap();

        let err = create_single_link_partials(
            &link_ends(),
            &set,
            &PartialSettings::default(),
            &EnvironmentPositionPartials::new(),
            &[],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PartialsError::UnidentifiedInitialStateParameter { .. }
        ));
        assert!(err.to_string().contains("could not identify parameter"));
    }

    #[test]
    fn test_initial_state_without_body_is_not_identified() {
        let anonymous = EstimatableParameter::new(
            ParameterIdentifier::new(EstimatableParameterKind::InitialBodyState, None, None),
            crate::parameters::ParameterValue::Vector(nalgebra::DVector::zeros(6)),
        )
        .unwrap();
        let set = EstimatableParameterSet::new(vec![anonymous]).unwrap();

        let err = create_single_link_partials(
            &link_ends(),
            &set,
            &PartialSettings::default(),
            &EnvironmentPositionPartials::new(),
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err,
            PartialsError::UnidentifiedInitialStateParameter {
                observable: ObservableType::MutualApproximation,
                parameter: "translational initial state".to_string(),
            }
        );
    }

    #[test]
    fn test_bias_partial_inserted_at_vector_key() {
        let observable = ObservableType::MutualApproximationWithImpactParameter;
        let set = EstimatableParameterSet::new(vec![
            EstimatableParameter::initial_body_state("Europa", Vector6::zeros()),
            EstimatableParameter::ground_station_position("Earth", "Station-A", Vector3::x()),
            EstimatableParameter::observation_bias(
                false,
                link_ends(),
                observable,
                dvector![0.0, 0.0],
            )
            .unwrap(),
        ])
        .unwrap();
        let settings = PartialSettings::builder()
            .observable(observable)
            .build()
            .unwrap();

        let partials = create_single_link_partials(
            &link_ends(),
            &set,
            &settings,
            &EnvironmentPositionPartials::new(),
            &[],
        )
        .unwrap();

        // The receiver is the Earth center of mass, not Station-A: no station partial.
        assert_eq!(
            partials.indices(),
            vec![ParameterIndex::new(0, 6), ParameterIndex::new(9, 2)]
        );
        let bias = partials.get(&ParameterIndex::new(9, 2)).unwrap();
        assert_eq!(bias.parameter_size(), 2);
        assert_eq!(bias.observable_size(), 2);
    }
}
