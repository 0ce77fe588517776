//! # Link-end position partials
//!
//! Every mutual-approximation partial is built on the same substrate: the sensitivity of a
//! link end's inertial position to an estimated parameter, a `3 × N` matrix evaluated at the
//! link end's own epoch.
//!
//! ## Overview
//!
//! - [`PositionPartial`] – one `3 × N` sensitivity, refreshed per epoch from the link-end state.
//!   - [`CurrentStatePositionPartial`] – `∂r/∂(r, v) = [I₃ | 0₃]` for the body's current state.
//!   - [`GroundStationPositionPartial`] – `∂r/∂r_bf = R(t)`, the body-fixed → inertial rotation.
//! - [`PositionPartialProvider`] – answers "which link ends of this set move with this parameter"
//!   as a [`PositionPartialMap`] (role → partial). An empty map is the "no dependency" answer.
//! - [`EnvironmentPositionPartials`] – default provider, backed by per-body rotation models.
//!
//! Propagated sensitivities (state transition of an initial state to the epoch) are applied
//! afterwards by [`crate::design_matrix`]; the partials here are w.r.t. the *current* state.
//!
//! ## See also
//! ------------
//! * [`crate::observation_partials::ApproximationPartial`] – Chains these with the observable scaling.
//! * [`BodyRotationProvider`] – Rotation model consumed by ground-station partials.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use hifitime::Epoch;
use log::warn;
use nalgebra::{DMatrix, Matrix3, Rotation3, Vector3};

use crate::constants::{GROUND_STATION_POSITION_SIZE, INITIAL_STATE_SIZE};
use crate::link_ends::{LinkEndState, LinkEndType, LinkEnds};
use crate::parameters::{EstimatableParameter, EstimatableParameterKind};

/// Sensitivity of one link end's inertial position to one parameter.
pub trait PositionPartial: Send + Sync + fmt::Debug {
    /// Number of columns `N` of [`PositionPartial::wrt_parameter`].
    fn parameter_size(&self) -> usize;

    /// `3 × N` partial of the inertial position, evaluated at `state.time`.
    fn wrt_parameter(&self, state: &LinkEndState) -> DMatrix<f64>;
}

/// Role → position partial, for the link ends of one set that depend on a parameter.
pub type PositionPartialMap = BTreeMap<LinkEndType, Box<dyn PositionPartial>>;

/// Partial of a body's position w.r.t. its own current Cartesian state `(r, v)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentStatePositionPartial;

impl PositionPartial for CurrentStatePositionPartial {
    fn parameter_size(&self) -> usize {
        INITIAL_STATE_SIZE
    }

    fn wrt_parameter(&self, _state: &LinkEndState) -> DMatrix<f64> {
        let mut partial = DMatrix::zeros(3, INITIAL_STATE_SIZE);
        partial.fixed_view_mut::<3, 3>(0, 0).fill_with_identity();
        partial
    }
}

/// Orientation of a body's fixed frame w.r.t. the inertial frame.
pub trait BodyRotationProvider: Send + Sync + fmt::Debug {
    /// Rotation `R(t)` such that `r_inertial = R(t) · r_body_fixed`.
    fn body_fixed_to_inertial(&self, epoch: Epoch) -> Rotation3<f64>;
}

/// Uniform rotation about the body-fixed z axis.
///
/// `θ(t) = θ₀ + ω (t − t₀)`, with `ω` in rad/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleRotation {
    pub reference_epoch: Epoch,
    pub angle_at_reference: f64,
    pub rotation_rate: f64,
}

impl SimpleRotation {
    pub fn new(reference_epoch: Epoch, angle_at_reference: f64, rotation_rate: f64) -> Self {
        SimpleRotation {
            reference_epoch,
            angle_at_reference,
            rotation_rate,
        }
    }

    pub fn angle(&self, epoch: Epoch) -> f64 {
        self.angle_at_reference + self.rotation_rate * (epoch - self.reference_epoch).to_seconds()
    }
}

impl BodyRotationProvider for SimpleRotation {
    fn body_fixed_to_inertial(&self, epoch: Epoch) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::z_axis(), self.angle(epoch))
    }
}

/// Partial of a ground station's inertial position w.r.t. its body-fixed position.
#[derive(Debug, Clone)]
pub struct GroundStationPositionPartial {
    rotation: Arc<dyn BodyRotationProvider>,
}

impl GroundStationPositionPartial {
    pub fn new(rotation: Arc<dyn BodyRotationProvider>) -> Self {
        GroundStationPositionPartial { rotation }
    }
}

impl PositionPartial for GroundStationPositionPartial {
    fn parameter_size(&self) -> usize {
        GROUND_STATION_POSITION_SIZE
    }

    fn wrt_parameter(&self, state: &LinkEndState) -> DMatrix<f64> {
        let rotation: Matrix3<f64> = self.rotation.body_fixed_to_inertial(state.time).into_inner();
        DMatrix::from_iterator(3, 3, rotation.iter().copied())
    }
}

/// Source of link-end position partials for the partial builders.
///
/// Both queries return an empty map, never an error, when no link end of the set depends on
/// the body or parameter.
pub trait PositionPartialProvider {
    /// Partials w.r.t. the current Cartesian state of `body`, for every role located on it.
    fn position_partials_wrt_body(&self, link_ends: &LinkEnds, body: &str) -> PositionPartialMap;

    /// Partials w.r.t. an arbitrary (non link-property) parameter.
    fn position_partials_wrt_parameter(
        &self,
        link_ends: &LinkEnds,
        parameter: &EstimatableParameter,
    ) -> PositionPartialMap;
}

/// Position-partial provider backed by the environment's rotation models.
///
/// Ground-station position partials need the rotation of the station's body; register it
/// with [`EnvironmentPositionPartials::with_body_rotation`].
#[derive(Debug, Clone, Default)]
pub struct EnvironmentPositionPartials {
    rotations: HashMap<String, Arc<dyn BodyRotationProvider>>,
}

impl EnvironmentPositionPartials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body_rotation(
        mut self,
        body: impl Into<String>,
        rotation: Arc<dyn BodyRotationProvider>,
    ) -> Self {
        self.rotations.insert(body.into(), rotation);
        self
    }

    fn ground_station_partials(
        &self,
        link_ends: &LinkEnds,
        body: &str,
        station: Option<&str>,
    ) -> PositionPartialMap {
        let roles: Vec<LinkEndType> = link_ends
            .iter()
            .filter(|(_, id)| id.body == body && id.reference_point.as_deref() == station)
            .map(|(role, _)| *role)
            .collect();
        if roles.is_empty() {
            return PositionPartialMap::new();
        }

        let Some(rotation) = self.rotations.get(body) else {
            warn!(
                "No rotation model for body {body}; ground station {} position partials not created",
                station.unwrap_or("")
            );
            return PositionPartialMap::new();
        };

        roles
            .into_iter()
            .map(|role| {
                let partial: Box<dyn PositionPartial> =
                    Box::new(GroundStationPositionPartial::new(Arc::clone(rotation)));
                (role, partial)
            })
            .collect()
    }
}

impl PositionPartialProvider for EnvironmentPositionPartials {
    fn position_partials_wrt_body(&self, link_ends: &LinkEnds, body: &str) -> PositionPartialMap {
        link_ends
            .roles_on_body(body)
            .map(|role| {
                let partial: Box<dyn PositionPartial> = Box::new(CurrentStatePositionPartial);
                (role, partial)
            })
            .collect()
    }

    fn position_partials_wrt_parameter(
        &self,
        link_ends: &LinkEnds,
        parameter: &EstimatableParameter,
    ) -> PositionPartialMap {
        let identifier = parameter.identifier();
        match identifier.kind {
            EstimatableParameterKind::InitialBodyState
            | EstimatableParameterKind::ArcWiseInitialBodyState => {
                self.position_partials_wrt_body(link_ends, identifier.body_name())
            }
            EstimatableParameterKind::GroundStationPosition => self.ground_station_partials(
                link_ends,
                identifier.body_name(),
                identifier.sub_kind.as_deref(),
            ),
            _ => PositionPartialMap::new(),
        }
    }
}
