//! # Link ends, observable types and link-end states
//!
//! A tracking observable is defined by a **set of link ends**: every role in the
//! tracking geometry (transmitter, secondary transmitter, receiver, …) is bound to a
//! body, optionally refined by a reference point on that body (e.g. a ground station).
//!
//! ```text
//! LinkEnds
//! ├── Transmitter   → Io
//! ├── Transmitter2  → Europa
//! └── Receiver      → Earth / Station-A
//! ```
//!
//! Each [`ObservableType`] declares the exact roles it requires through
//! [`ObservableType::required_link_ends`]; [`check_required_link_ends`] turns a missing
//! role into a [`PartialsError::MissingLinkEnd`].
//!
//! At evaluation time the observation model hands over one [`LinkEndState`] per role
//! (epoch, inertial position and velocity), gathered in [`LinkEndStates`].
//!
//! ## See also
//! ------------
//! * [`crate::scaling`] – Consumes [`LinkEndStates`] once per epoch.
//! * [`crate::estimation_setup`] – Validates link ends before building partials.
use std::collections::BTreeMap;
use std::fmt;

use hifitime::Epoch;
use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::partials_errors::PartialsError;

/// Role of a link end in a tracking geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkEndType {
    Transmitter,
    Transmitter2,
    Reflector,
    Receiver,
}

impl fmt::Display for LinkEndType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkEndType::Transmitter => "transmitter",
            LinkEndType::Transmitter2 => "transmitter2",
            LinkEndType::Reflector => "reflector",
            LinkEndType::Receiver => "receiver",
        };
        f.write_str(name)
    }
}

/// Body (and optional reference point on it) occupying a link-end role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEndId {
    pub body: String,
    pub reference_point: Option<String>,
}

impl LinkEndId {
    /// Link end located at the center of mass of `body`.
    pub fn body(body: impl Into<String>) -> Self {
        LinkEndId {
            body: body.into(),
            reference_point: None,
        }
    }

    /// Link end located at a named reference point (ground station, lander, …) of `body`.
    pub fn station(body: impl Into<String>, station: impl Into<String>) -> Self {
        LinkEndId {
            body: body.into(),
            reference_point: Some(station.into()),
        }
    }
}

impl fmt::Display for LinkEndId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference_point {
            Some(point) => write!(f, "{}/{}", self.body, point),
            None => write!(f, "{}", self.body),
        }
    }
}

impl From<&str> for LinkEndId {
    fn from(body: &str) -> Self {
        LinkEndId::body(body)
    }
}

/// Mapping from link-end role to the body occupying it.
///
/// `LinkEnds` is ordered and hashable so that it can key the per-link-end maps
/// produced by [`crate::estimation_setup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEnds(BTreeMap<LinkEndType, LinkEndId>);

impl LinkEnds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a role.
    pub fn with(mut self, role: LinkEndType, id: impl Into<LinkEndId>) -> Self {
        self.0.insert(role, id.into());
        self
    }

    pub fn insert(&mut self, role: LinkEndType, id: impl Into<LinkEndId>) -> Option<LinkEndId> {
        self.0.insert(role, id.into())
    }

    pub fn get(&self, role: LinkEndType) -> Option<&LinkEndId> {
        self.0.get(&role)
    }

    pub fn contains(&self, role: LinkEndType) -> bool {
        self.0.contains_key(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkEndType, &LinkEndId)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Roles whose link end sits on `body` (any reference point).
    pub fn roles_on_body<'a>(&'a self, body: &'a str) -> impl Iterator<Item = LinkEndType> + 'a {
        self.0
            .iter()
            .filter(move |(_, id)| id.body == body)
            .map(|(role, _)| *role)
    }
}

impl fmt::Display for LinkEnds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.0
                .iter()
                .map(|(role, id)| format!("{role}: {id}"))
                .join(", ")
        )
    }
}

impl FromIterator<(LinkEndType, LinkEndId)> for LinkEnds {
    fn from_iter<T: IntoIterator<Item = (LinkEndType, LinkEndId)>>(iter: T) -> Self {
        LinkEnds(iter.into_iter().collect())
    }
}

/// Observable families handled by the partial builders.
///
/// Variants
/// ---------
/// * `MutualApproximation` – central instant of an apparent close approach of two
///   transmitters as seen from the receiver (size 1).
/// * `MutualApproximationWithImpactParameter` – central instant and minimum apparent
///   distance, stacked (size 2).
/// * `ImpactParameterMutualApprox` – minimum apparent distance only (size 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservableType {
    MutualApproximation,
    MutualApproximationWithImpactParameter,
    ImpactParameterMutualApprox,
}

const MUTUAL_APPROXIMATION_LINK_ENDS: [LinkEndType; 3] = [
    LinkEndType::Transmitter,
    LinkEndType::Transmitter2,
    LinkEndType::Receiver,
];

impl ObservableType {
    /// Roles that must be present in a link-end set for this observable.
    pub fn required_link_ends(&self) -> &'static [LinkEndType] {
        match self {
            ObservableType::MutualApproximation
            | ObservableType::MutualApproximationWithImpactParameter
            | ObservableType::ImpactParameterMutualApprox => &MUTUAL_APPROXIMATION_LINK_ENDS,
        }
    }

    /// Number of rows of a single observation (and of every partial of it).
    pub fn observable_size(&self) -> usize {
        match self {
            ObservableType::MutualApproximationWithImpactParameter => 2,
            ObservableType::MutualApproximation | ObservableType::ImpactParameterMutualApprox => 1,
        }
    }
}

impl fmt::Display for ObservableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObservableType::MutualApproximation => "mutual approximation",
            ObservableType::MutualApproximationWithImpactParameter => {
                "mutual approximation with impact parameter"
            }
            ObservableType::ImpactParameterMutualApprox => {
                "impact parameter (for mutual approximation)"
            }
        };
        f.write_str(name)
    }
}

/// Check that `link_ends` holds every role required by `observable`.
///
/// Arguments
/// -----------------
/// * `link_ends`: The link-end set to validate.
/// * `observable`: The observable whose role requirements apply.
///
/// Return
/// ----------
/// * `Ok(())` when all roles are present.
///
/// Errors
/// ----------
/// * [`PartialsError::MissingLinkEnd`] naming the first missing role and the link-end set.
pub fn check_required_link_ends(
    link_ends: &LinkEnds,
    observable: ObservableType,
) -> Result<(), PartialsError> {
    match observable
        .required_link_ends()
        .iter()
        .find(|role| !link_ends.contains(**role))
    {
        Some(missing) => Err(PartialsError::MissingLinkEnd {
            observable,
            missing: *missing,
            link_ends: link_ends.to_string(),
        }),
        None => Ok(()),
    }
}

/// Inertial state of one link end at its own epoch (transmission or reception time).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkEndState {
    pub time: Epoch,
    /// Inertial position, m.
    pub position: Vector3<f64>,
    /// Inertial velocity, m/s.
    pub velocity: Vector3<f64>,
}

impl LinkEndState {
    pub fn new(time: Epoch, position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        LinkEndState {
            time,
            position,
            velocity,
        }
    }
}

/// States of all link ends of one observation.
pub type LinkEndStates = BTreeMap<LinkEndType, LinkEndState>;

/// Fetch the state of `role`, failing with [`PartialsError::MissingLinkEndState`].
pub fn link_end_state(
    states: &LinkEndStates,
    role: LinkEndType,
) -> Result<&LinkEndState, PartialsError> {
    states
        .get(&role)
        .ok_or(PartialsError::MissingLinkEndState(role))
}

#[cfg(test)]
mod link_ends_test {
    use super::*;

    fn mutual_link_ends() -> LinkEnds {
        LinkEnds::new()
            .with(LinkEndType::Transmitter, "Io")
            .with(LinkEndType::Transmitter2, "Europa")
            .with(LinkEndType::Receiver, LinkEndId::station("Earth", "Station-A"))
    }

    #[test]
    fn test_display_link_ends() {
        assert_eq!(
            mutual_link_ends().to_string(),
            "{transmitter: Io, transmitter2: Europa, receiver: Earth/Station-A}"
        );
    }

    #[test]
    fn test_required_link_ends() {
        let link_ends = mutual_link_ends();
        assert!(check_required_link_ends(&link_ends, ObservableType::MutualApproximation).is_ok());

        let incomplete = LinkEnds::new()
            .with(LinkEndType::Transmitter, "Io")
            .with(LinkEndType::Receiver, "Earth");
        let err = check_required_link_ends(&incomplete, ObservableType::ImpactParameterMutualApprox)
            .unwrap_err();
        assert_eq!(
            err,
            PartialsError::MissingLinkEnd {
                observable: ObservableType::ImpactParameterMutualApprox,
                missing: LinkEndType::Transmitter2,
                link_ends: "{transmitter: Io, receiver: Earth}".to_string(),
            }
        );
        assert!(err.to_string().contains("did not find transmitter2"));
    }

    #[test]
    fn test_roles_on_body() {
        let link_ends = mutual_link_ends();
        let roles: Vec<_> = link_ends.roles_on_body("Earth").collect();
        assert_eq!(roles, vec![LinkEndType::Receiver]);
        assert_eq!(link_ends.roles_on_body("Ganymede").count(), 0);
    }

    #[test]
    fn test_observable_size() {
        assert_eq!(ObservableType::MutualApproximation.observable_size(), 1);
        assert_eq!(
            ObservableType::MutualApproximationWithImpactParameter.observable_size(),
            2
        );
        assert_eq!(ObservableType::ImpactParameterMutualApprox.observable_size(), 1);
    }
}
