//! # Estimated parameters
//!
//! This module defines the parameter model consumed by the partial builders:
//!
//! - [`EstimatableParameterKind`] – what a parameter physically is, and which pass of the
//!   builder handles it (initial state, scalar, vector, link property).
//! - [`ParameterIdentifier`] – `(kind, owning body or none, sub-kind)`, the stable identity
//!   of a parameter carried by every partial.
//! - [`ParameterValue`] – tagged union over scalar and vector values with an explicit
//!   [`width`](ParameterValue::width).
//! - [`EstimatableParameter`] – identifier + value (+ target link for link properties).
//! - [`ParameterIndex`] – `(start column, block width)` in the global parameter vector.
//!
//! The ordered catalog and its index assignment live in [`catalog`].
//!
//! ## Categories
//!
//! ```text
//! initial state  : InitialBodyState (6), ArcWiseInitialBodyState (6 per arc), InitialRotationalBodyState (7)
//! scalar         : GravitationalParameter, PpnParameterGamma, RadiationPressureCoefficient
//! vector         : GroundStationPosition (3)
//! link property  : ConstantAdditiveObservationBias, ConstantRelativeObservationBias (observable size)
//! ```
pub mod catalog;

use std::fmt;

use nalgebra::{DVector, SVector, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::constants::{GROUND_STATION_POSITION_SIZE, INITIAL_STATE_SIZE, ROTATIONAL_STATE_SIZE};
use crate::link_ends::{LinkEnds, ObservableType};
use crate::partials_errors::PartialsError;

/// Physical kind of an estimated parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatableParameterKind {
    InitialBodyState,
    ArcWiseInitialBodyState,
    InitialRotationalBodyState,
    GravitationalParameter,
    PpnParameterGamma,
    RadiationPressureCoefficient,
    GroundStationPosition,
    ConstantAdditiveObservationBias,
    ConstantRelativeObservationBias,
}

impl EstimatableParameterKind {
    /// Whether the parameter belongs to the initial-state pass of the catalog.
    pub fn is_initial_state(&self) -> bool {
        matches!(
            self,
            EstimatableParameterKind::InitialBodyState
                | EstimatableParameterKind::ArcWiseInitialBodyState
                | EstimatableParameterKind::InitialRotationalBodyState
        )
    }

    /// Whether the parameter is a property of an observation link (bias-like) rather than
    /// of the dynamics or environment. Such parameters never go through position partials.
    pub fn is_observation_link_property(&self) -> bool {
        matches!(
            self,
            EstimatableParameterKind::ConstantAdditiveObservationBias
                | EstimatableParameterKind::ConstantRelativeObservationBias
        )
    }

    /// Whether the value of this kind is a single `f64`.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            EstimatableParameterKind::GravitationalParameter
                | EstimatableParameterKind::PpnParameterGamma
                | EstimatableParameterKind::RadiationPressureCoefficient
        )
    }

    /// Fixed width of the kind, `None` when the width depends on the observable.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            EstimatableParameterKind::InitialBodyState
            | EstimatableParameterKind::ArcWiseInitialBodyState => Some(INITIAL_STATE_SIZE),
            EstimatableParameterKind::InitialRotationalBodyState => Some(ROTATIONAL_STATE_SIZE),
            EstimatableParameterKind::GravitationalParameter
            | EstimatableParameterKind::PpnParameterGamma
            | EstimatableParameterKind::RadiationPressureCoefficient => Some(1),
            EstimatableParameterKind::GroundStationPosition => Some(GROUND_STATION_POSITION_SIZE),
            EstimatableParameterKind::ConstantAdditiveObservationBias
            | EstimatableParameterKind::ConstantRelativeObservationBias => None,
        }
    }
}

impl fmt::Display for EstimatableParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EstimatableParameterKind::InitialBodyState => "translational initial state",
            EstimatableParameterKind::ArcWiseInitialBodyState => {
                "arc-wise translational initial state"
            }
            EstimatableParameterKind::InitialRotationalBodyState => "rotational initial state",
            EstimatableParameterKind::GravitationalParameter => "gravitational parameter",
            EstimatableParameterKind::PpnParameterGamma => "PPN parameter gamma",
            EstimatableParameterKind::RadiationPressureCoefficient => {
                "radiation pressure coefficient"
            }
            EstimatableParameterKind::GroundStationPosition => "ground station position",
            EstimatableParameterKind::ConstantAdditiveObservationBias => {
                "absolute observation bias"
            }
            EstimatableParameterKind::ConstantRelativeObservationBias => {
                "relative observation bias"
            }
        };
        f.write_str(name)
    }
}

/// Stable identity of an estimated parameter: `(kind, owning body, sub-kind)`.
///
/// The sub-kind disambiguates parameters of the same kind and body, e.g. the station
/// name of a ground-station position or the arc number of an arc-wise initial state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterIdentifier {
    pub kind: EstimatableParameterKind,
    pub body: Option<String>,
    pub sub_kind: Option<String>,
}

impl ParameterIdentifier {
    pub fn new(
        kind: EstimatableParameterKind,
        body: Option<String>,
        sub_kind: Option<String>,
    ) -> Self {
        ParameterIdentifier {
            kind,
            body,
            sub_kind,
        }
    }

    /// Body associated with the parameter, empty string when global.
    pub fn body_name(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ParameterIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match (&self.body, &self.sub_kind) {
            (Some(body), Some(sub)) => write!(f, " of ({body}, {sub})"),
            (Some(body), None) => write!(f, " of ({body})"),
            (None, Some(sub)) => write!(f, " ({sub})"),
            (None, None) => Ok(()),
        }
    }
}

/// Current value of an estimated parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Scalar(f64),
    Vector(DVector<f64>),
}

impl ParameterValue {
    /// Number of columns the parameter occupies in the design matrix.
    pub fn width(&self) -> usize {
        match self {
            ParameterValue::Scalar(_) => 1,
            ParameterValue::Vector(v) => v.len(),
        }
    }

    /// Flatten into a column vector.
    pub fn as_vector(&self) -> DVector<f64> {
        match self {
            ParameterValue::Scalar(x) => DVector::from_element(1, *x),
            ParameterValue::Vector(v) => v.clone(),
        }
    }
}

/// Link ends and observable a link-property parameter applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservationLink {
    pub link_ends: LinkEnds,
    pub observable: ObservableType,
}

/// One entry of the estimated-parameter vector.
///
/// Construct through the kind-specific constructors, or through [`EstimatableParameter::new`]
/// which validates the value against the kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatableParameter {
    identifier: ParameterIdentifier,
    value: ParameterValue,
    observation_link: Option<ObservationLink>,
}

impl EstimatableParameter {
    /// Build a parameter from its identifier and value.
    ///
    /// Arguments
    /// -----------------
    /// * `identifier`: Identity of the parameter.
    /// * `value`: Current value; must be scalar for scalar kinds and have the kind's fixed
    ///   width otherwise.
    ///
    /// Return
    /// ----------
    /// * The parameter, or [`PartialsError::InvalidParameter`] on a value/kind mismatch
    ///   (link-property kinds must use [`EstimatableParameter::observation_bias`]).
    pub fn new(
        identifier: ParameterIdentifier,
        value: ParameterValue,
    ) -> Result<Self, PartialsError> {
        let kind = identifier.kind;
        if kind.is_observation_link_property() {
            return Err(PartialsError::InvalidParameter(format!(
                "{identifier} must be created with the link it applies to"
            )));
        }
        let scalar_value = matches!(value, ParameterValue::Scalar(_));
        if kind.is_scalar() != scalar_value || kind.fixed_width() != Some(value.width()) {
            return Err(PartialsError::InvalidParameter(format!(
                "{identifier} cannot hold a value of width {}",
                value.width()
            )));
        }
        Ok(EstimatableParameter {
            identifier,
            value,
            observation_link: None,
        })
    }

    /// Translational initial state of `body`.
    pub fn initial_body_state(body: &str, state: Vector6<f64>) -> Self {
        EstimatableParameter {
            identifier: ParameterIdentifier::new(
                EstimatableParameterKind::InitialBodyState,
                Some(body.to_string()),
                None,
            ),
            value: ParameterValue::Vector(DVector::from_column_slice(state.as_slice())),
            observation_link: None,
        }
    }

    /// Translational initial state of `body` at the start of arc `arc`.
    pub fn arc_wise_initial_body_state(body: &str, arc: usize, state: Vector6<f64>) -> Self {
        EstimatableParameter {
            identifier: ParameterIdentifier::new(
                EstimatableParameterKind::ArcWiseInitialBodyState,
                Some(body.to_string()),
                Some(format!("arc {arc}")),
            ),
            value: ParameterValue::Vector(DVector::from_column_slice(state.as_slice())),
            observation_link: None,
        }
    }

    /// Rotational initial state (quaternion, angular velocity) of `body`.
    pub fn initial_rotational_body_state(body: &str, state: SVector<f64, 7>) -> Self {
        EstimatableParameter {
            identifier: ParameterIdentifier::new(
                EstimatableParameterKind::InitialRotationalBodyState,
                Some(body.to_string()),
                None,
            ),
            value: ParameterValue::Vector(DVector::from_column_slice(state.as_slice())),
            observation_link: None,
        }
    }

    /// Gravitational parameter μ of `body`, m³/s².
    pub fn gravitational_parameter(body: &str, mu: f64) -> Self {
        EstimatableParameter {
            identifier: ParameterIdentifier::new(
                EstimatableParameterKind::GravitationalParameter,
                Some(body.to_string()),
                None,
            ),
            value: ParameterValue::Scalar(mu),
            observation_link: None,
        }
    }

    /// Post-Newtonian parameter γ (global).
    pub fn ppn_gamma(gamma: f64) -> Self {
        EstimatableParameter {
            identifier: ParameterIdentifier::new(
                EstimatableParameterKind::PpnParameterGamma,
                None,
                None,
            ),
            value: ParameterValue::Scalar(gamma),
            observation_link: None,
        }
    }

    pub fn radiation_pressure_coefficient(body: &str, coefficient: f64) -> Self {
        EstimatableParameter {
            identifier: ParameterIdentifier::new(
                EstimatableParameterKind::RadiationPressureCoefficient,
                Some(body.to_string()),
                None,
            ),
            value: ParameterValue::Scalar(coefficient),
            observation_link: None,
        }
    }

    /// Body-fixed position of ground station `station` on `body`, m.
    pub fn ground_station_position(body: &str, station: &str, position: Vector3<f64>) -> Self {
        EstimatableParameter {
            identifier: ParameterIdentifier::new(
                EstimatableParameterKind::GroundStationPosition,
                Some(body.to_string()),
                Some(station.to_string()),
            ),
            value: ParameterValue::Vector(DVector::from_column_slice(position.as_slice())),
            observation_link: None,
        }
    }

    /// Constant observation bias for one link and observable.
    ///
    /// Arguments
    /// -----------------
    /// * `relative`: `false` for an additive bias, `true` for a bias relative to the observation.
    /// * `link_ends`, `observable`: The link the bias applies to.
    /// * `bias`: Bias value, one entry per observable row.
    ///
    /// Return
    /// ----------
    /// * The parameter, or [`PartialsError::InvalidParameter`] if `bias` does not match the
    ///   observable size.
    pub fn observation_bias(
        relative: bool,
        link_ends: LinkEnds,
        observable: ObservableType,
        bias: DVector<f64>,
    ) -> Result<Self, PartialsError> {
        let kind = if relative {
            EstimatableParameterKind::ConstantRelativeObservationBias
        } else {
            EstimatableParameterKind::ConstantAdditiveObservationBias
        };
        if bias.len() != observable.observable_size() {
            return Err(PartialsError::InvalidParameter(format!(
                "{kind} for {observable} needs {} entries, got {}",
                observable.observable_size(),
                bias.len()
            )));
        }
        Ok(EstimatableParameter {
            identifier: ParameterIdentifier::new(kind, None, Some(link_ends.to_string())),
            value: ParameterValue::Vector(bias),
            observation_link: Some(ObservationLink {
                link_ends,
                observable,
            }),
        })
    }

    pub fn identifier(&self) -> &ParameterIdentifier {
        &self.identifier
    }

    pub fn kind(&self) -> EstimatableParameterKind {
        self.identifier.kind
    }

    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    pub fn width(&self) -> usize {
        self.value.width()
    }

    pub fn observation_link(&self) -> Option<&ObservationLink> {
        self.observation_link.as_ref()
    }

    pub fn is_observation_link_property(&self) -> bool {
        self.kind().is_observation_link_property()
    }
}

/// Position of a parameter block in the global parameter vector: `(start column, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterIndex {
    pub start: usize,
    pub width: usize,
}

impl ParameterIndex {
    pub fn new(start: usize, width: usize) -> Self {
        ParameterIndex { start, width }
    }

    /// One past the last column of the block.
    pub fn end(&self) -> usize {
        self.start + self.width
    }

    pub fn overlaps(&self, other: &ParameterIndex) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

impl fmt::Display for ParameterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.width)
    }
}

#[cfg(test)]
mod parameters_test {
    use nalgebra::dvector;

    use super::*;
    use crate::link_ends::LinkEndType;

    #[test]
    fn test_parameter_widths() {
        assert_eq!(
            EstimatableParameter::initial_body_state("Io", Vector6::zeros()).width(),
            6
        );
        assert_eq!(
            EstimatableParameter::gravitational_parameter("Jupiter", 1.26686534e17).width(),
            1
        );
        assert_eq!(
            EstimatableParameter::ground_station_position("Earth", "Station-A", Vector3::x())
                .width(),
            3
        );
    }

    #[test]
    fn test_new_rejects_mismatched_value() {
        let id = ParameterIdentifier::new(
            EstimatableParameterKind::GravitationalParameter,
            Some("Jupiter".into()),
            None,
        );
        assert!(EstimatableParameter::new(id.clone(), ParameterValue::Scalar(1.0)).is_ok());
        assert!(matches!(
            EstimatableParameter::new(id, ParameterValue::Vector(dvector![1.0, 2.0])),
            Err(PartialsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_observation_bias_width() {
        let link_ends = LinkEnds::new()
            .with(LinkEndType::Transmitter, "Io")
            .with(LinkEndType::Transmitter2, "Europa")
            .with(LinkEndType::Receiver, "Earth");
        let bias = EstimatableParameter::observation_bias(
            false,
            link_ends.clone(),
            ObservableType::MutualApproximationWithImpactParameter,
            dvector![0.0, 0.0],
        )
        .unwrap();
        assert!(bias.is_observation_link_property());
        assert_eq!(bias.width(), 2);

        assert!(EstimatableParameter::observation_bias(
            true,
            link_ends,
            ObservableType::MutualApproximation,
            dvector![0.0, 0.0],
        )
        .is_err());
    }

    #[test]
    fn test_parameter_index_overlap() {
        let a = ParameterIndex::new(0, 6);
        let b = ParameterIndex::new(6, 1);
        let c = ParameterIndex::new(5, 3);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert_eq!(a.to_string(), "(0, 6)");
    }

    #[test]
    fn test_identifier_display() {
        let id = EstimatableParameter::ground_station_position("Earth", "Station-A", Vector3::x());
        assert_eq!(
            id.identifier().to_string(),
            "ground station position of (Earth, Station-A)"
        );
        assert_eq!(
            EstimatableParameter::ppn_gamma(1.0).identifier().to_string(),
            "PPN parameter gamma"
        );
    }
}
