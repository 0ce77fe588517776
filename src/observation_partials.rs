//! # Observation partials
//!
//! An observation partial is the analytic sensitivity `∂obs/∂p` (`M × N`) of one observable
//! of one link-end set to one estimated parameter. Partials are built once by
//! [`crate::estimation_setup`] and evaluated at every observation epoch, after the shared
//! scaling has been refreshed for that epoch.
//!
//! ## Overview
//!
//! - [`ObservationPartial`] – common interface.
//! - [`ApproximationPartial`] – mutual-approximation partial: chains link-end position partials
//!   and light-time correction partials through the link's [`SharedScaling`].
//! - [`ObservationBiasPartial`] – partial w.r.t. a constant observation bias (a link property),
//!   independent of the geometry.
//!
//! ## See also
//! ------------
//! * [`crate::scaling::ObservableScaling`] – Per-epoch factors shared by all partials of a link.
//! * [`crate::design_matrix`] – Assembles the partials of a link into design-matrix rows.
use std::fmt;

use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;

use crate::constants::REQUIRED_LIGHT_TIME_LEGS;
use crate::link_ends::{link_end_state, LinkEndStates, LinkEnds, ObservableType};
use crate::light_time_corrections::{LightTimePartialFunction, LIGHT_TIME_LEG_ROLES};
use crate::parameters::{EstimatableParameter, EstimatableParameterKind, ParameterIdentifier};
use crate::partials_errors::PartialsError;
use crate::position_partials::PositionPartialMap;
use crate::scaling::SharedScaling;

/// Sensitivity of one observable to one estimated parameter.
pub trait ObservationPartial: Send + Sync + fmt::Debug {
    fn parameter_identifier(&self) -> &ParameterIdentifier;

    /// Number of columns `N` of the partial.
    fn parameter_size(&self) -> usize;

    /// Number of rows `M` of the partial.
    fn observable_size(&self) -> usize;

    /// Evaluate `∂obs/∂p` for the current epoch.
    ///
    /// Arguments
    /// -----------------
    /// * `states`: Link-end states of the observation.
    /// * `observation`: Current value of the observable, required by relative-bias partials.
    ///
    /// Return
    /// ----------
    /// * The `M × N` partial.
    fn calculate_partial(
        &self,
        states: &LinkEndStates,
        observation: Option<&DVector<f64>>,
    ) -> Result<DMatrix<f64>, PartialsError>;

    /// Number of light-time legs this partial carries correction data for (0 or 2).
    fn light_time_leg_count(&self) -> usize {
        0
    }

    /// Number of light-time correction partial functions, over all legs.
    fn number_of_light_time_correction_partial_functions(&self) -> usize {
        0
    }
}

/// Light-time partial functions of one parameter, one list per leg.
pub type LegPartialFunctions =
    SmallVec<[Vec<LightTimePartialFunction>; REQUIRED_LIGHT_TIME_LEGS]>;

/// Mutual-approximation partial w.r.t. one parameter.
///
/// ```text
/// ∂obs/∂p = Σ_role scaling(role) · ∂r_role/∂p  +  Σ_leg scaling(leg) · Σ_fn ∂Δt_fn/∂p
/// ```
pub struct ApproximationPartial {
    parameter: ParameterIdentifier,
    parameter_size: usize,
    scaling: SharedScaling,
    position_partials: PositionPartialMap,
    light_time_partials: LegPartialFunctions,
}

impl ApproximationPartial {
    /// Arguments
    /// -----------------
    /// * `parameter`, `parameter_size`: Identity and width of the parameter.
    /// * `scaling`: Scaling shared by the partials of the link-end set.
    /// * `position_partials`: Link-end positions depending on the parameter.
    /// * `light_time_partials`: Per-leg correction partial functions depending on the
    ///   parameter; empty, or one entry per leg.
    pub fn new(
        parameter: ParameterIdentifier,
        parameter_size: usize,
        scaling: SharedScaling,
        position_partials: PositionPartialMap,
        light_time_partials: LegPartialFunctions,
    ) -> Self {
        ApproximationPartial {
            parameter,
            parameter_size,
            scaling,
            position_partials,
            light_time_partials,
        }
    }

    pub fn position_partials(&self) -> &PositionPartialMap {
        &self.position_partials
    }

    pub fn scaling(&self) -> &SharedScaling {
        &self.scaling
    }

    /// Whether the parameter influences the observable at all.
    pub fn has_dependency(&self) -> bool {
        !self.position_partials.is_empty()
            || self.number_of_light_time_correction_partial_functions() > 0
    }

    fn check_width(&self, block: &DMatrix<f64>) -> Result<(), PartialsError> {
        if block.ncols() != self.parameter_size {
            return Err(PartialsError::DesignMatrixShape {
                parameter: self.parameter.to_string(),
                start: 0,
                end: self.parameter_size,
                rows: block.nrows(),
                columns: block.ncols(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ApproximationPartial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApproximationPartial")
            .field("parameter", &self.parameter)
            .field("parameter_size", &self.parameter_size)
            .field("scaling", &self.scaling.variant())
            .field("position_partials", &self.position_partials)
            .field(
                "light_time_partials",
                &self.light_time_partials.iter().map(Vec::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ObservationPartial for ApproximationPartial {
    fn parameter_identifier(&self) -> &ParameterIdentifier {
        &self.parameter
    }

    fn parameter_size(&self) -> usize {
        self.parameter_size
    }

    fn observable_size(&self) -> usize {
        self.scaling.observable_size()
    }

    fn calculate_partial(
        &self,
        states: &LinkEndStates,
        _observation: Option<&DVector<f64>>,
    ) -> Result<DMatrix<f64>, PartialsError> {
        let mut partial = DMatrix::zeros(self.observable_size(), self.parameter_size);

        for (role, position_partial) in &self.position_partials {
            let state = link_end_state(states, *role)?;
            let block = position_partial.wrt_parameter(state);
            self.check_width(&block)?;
            partial += self.scaling.scaling_factor(*role)? * block;
        }

        for (leg, functions) in self.light_time_partials.iter().enumerate() {
            if functions.is_empty() {
                continue;
            }
            let Some(&(transmitter_role, receiver_role)) = LIGHT_TIME_LEG_ROLES.get(leg) else {
                return Err(PartialsError::LightTimeLegCount {
                    observable: self.scaling.observable_type(),
                    found: self.light_time_partials.len(),
                    expected: REQUIRED_LIGHT_TIME_LEGS,
                });
            };
            let transmitter = link_end_state(states, transmitter_role)?;
            let receiver = link_end_state(states, receiver_role)?;
            let leg_scaling = self.scaling.light_time_correction_scaling(leg)?;
            for function in functions {
                let block = function(transmitter, receiver)?;
                self.check_width(&block)?;
                partial += &leg_scaling * block;
            }
        }

        Ok(partial)
    }

    fn light_time_leg_count(&self) -> usize {
        self.light_time_partials.len()
    }

    fn number_of_light_time_correction_partial_functions(&self) -> usize {
        self.light_time_partials.iter().map(Vec::len).sum()
    }
}

/// Partial w.r.t. a constant observation bias of a link.
///
/// * absolute bias (`obs + b`): identity, `M × M`
/// * relative bias (`obs · (1 + b)`): `diag(obs)`, `M × M`
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationBiasPartial {
    parameter: ParameterIdentifier,
    observable_size: usize,
    relative: bool,
}

impl ObservationBiasPartial {
    pub fn new(parameter: ParameterIdentifier, observable_size: usize, relative: bool) -> Self {
        ObservationBiasPartial {
            parameter,
            observable_size,
            relative,
        }
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }
}

impl ObservationPartial for ObservationBiasPartial {
    fn parameter_identifier(&self) -> &ParameterIdentifier {
        &self.parameter
    }

    fn parameter_size(&self) -> usize {
        self.observable_size
    }

    fn observable_size(&self) -> usize {
        self.observable_size
    }

    fn calculate_partial(
        &self,
        _states: &LinkEndStates,
        observation: Option<&DVector<f64>>,
    ) -> Result<DMatrix<f64>, PartialsError> {
        if !self.relative {
            return Ok(DMatrix::identity(self.observable_size, self.observable_size));
        }
        match observation {
            Some(value) if value.len() == self.observable_size => {
                Ok(DMatrix::from_diagonal(value))
            }
            _ => Err(PartialsError::MissingObservation(self.parameter.to_string())),
        }
    }
}

/// Create the partial w.r.t. a link-property parameter.
///
/// Link properties never go through position partials. The partial exists only when the
/// parameter targets the same link ends and observable.
///
/// Return
/// ----------
/// * `Some(partial)` for a bias of this link and observable, `None` otherwise.
pub fn create_observation_partial_wrt_link_property(
    link_ends: &LinkEnds,
    observable: ObservableType,
    parameter: &EstimatableParameter,
) -> Option<Box<dyn ObservationPartial>> {
    let link = parameter.observation_link()?;
    if link.link_ends != *link_ends || link.observable != observable {
        return None;
    }
    let relative = match parameter.kind() {
        EstimatableParameterKind::ConstantAdditiveObservationBias => false,
        EstimatableParameterKind::ConstantRelativeObservationBias => true,
        _ => return None,
    };
    Some(Box::new(ObservationBiasPartial::new(
        parameter.identifier().clone(),
        observable.observable_size(),
        relative,
    )))
}
