//! # Light-time corrections and their partials
//!
//! A mutual-approximation link has two independent signal paths, each with its own
//! light-time correction models:
//!
//! ```text
//! leg 0 : Transmitter  ──► Receiver
//! leg 1 : Transmitter2 ──► Receiver
//! ```
//!
//! ## Overview
//!
//! - [`LightTimeCorrection`] – raw correction model (external collaborator), able to create
//!   its own [`LightTimeCorrectionPartial`] when one exists.
//! - [`FirstOrderRelativisticCorrection`] – Shapiro delay of a set of perturbing bodies, with
//!   partials w.r.t. their gravitational parameters and the PPN parameter γ.
//! - [`create_light_time_correction_partials`] – one leg: raw models → partial models
//!   (models without a partial are skipped with a warning).
//! - [`create_leg_correction_partials`] – all legs of a link, with the two-leg rule enforced.
//!
//! Partial *functions* ([`LightTimePartialFunction`]) are extracted per parameter by the
//! builders; a parameter that none of the corrections depends on gets none.
//!
//! ## See also
//! ------------
//! * [`crate::scaling::ObservableScaling::light_time_correction_scaling`] – Converts a
//!   per-leg delay sensitivity into an observable sensitivity.
use std::fmt;
use std::sync::Arc;

use hifitime::Epoch;
use log::warn;
use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::{BodyName, Meter, Second, REQUIRED_LIGHT_TIME_LEGS, SPEED_OF_LIGHT_CUBED};
use crate::link_ends::{LinkEndState, LinkEndType, ObservableType};
use crate::parameters::{EstimatableParameterKind, ParameterIdentifier};
use crate::partials_errors::PartialsError;

/// `(transmitting role, receiving role)` of each light-time leg, indexed by leg number.
pub const LIGHT_TIME_LEG_ROLES: [(LinkEndType, LinkEndType); REQUIRED_LIGHT_TIME_LEGS] = [
    (LinkEndType::Transmitter, LinkEndType::Receiver),
    (LinkEndType::Transmitter2, LinkEndType::Receiver),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightTimeCorrectionType {
    FirstOrderRelativistic,
    Tropospheric,
    Ionospheric,
    Other,
}

/// Sensitivity `∂Δt/∂p` (`1 × N`, seconds per unit parameter) of one correction on one leg.
pub type LightTimePartialFunction = Box<
    dyn Fn(&LinkEndState, &LinkEndState) -> Result<DMatrix<f64>, PartialsError> + Send + Sync,
>;

/// Raw light-time correction model of one leg.
pub trait LightTimeCorrection: Send + Sync + fmt::Debug {
    fn correction_type(&self) -> LightTimeCorrectionType;

    /// Correction to the light time, s, for the given transmitter and receiver states.
    fn calculate(
        &self,
        transmitter: &LinkEndState,
        receiver: &LinkEndState,
    ) -> Result<Second, PartialsError>;

    /// Partial model of the correction, `None` when none is available.
    fn create_partial(&self) -> Option<Box<dyn LightTimeCorrectionPartial>> {
        None
    }
}

/// Parameter sensitivities of one light-time correction model.
pub trait LightTimeCorrectionPartial: Send + Sync + fmt::Debug {
    fn correction_type(&self) -> LightTimeCorrectionType;

    /// Partial function w.r.t. `parameter`, `None` when the correction does not depend on it.
    fn light_time_partial_function(
        &self,
        parameter: &ParameterIdentifier,
    ) -> Option<LightTimePartialFunction>;
}

/// Raw correction models, one inner list per light-time leg.
pub type LightTimeCorrectionList = Vec<Vec<Arc<dyn LightTimeCorrection>>>;

/// Correction partial models, one inner list per light-time leg.
pub type LegCorrectionPartials =
    SmallVec<[Vec<Box<dyn LightTimeCorrectionPartial>>; REQUIRED_LIGHT_TIME_LEGS]>;

/// Inertial positions of the perturbing bodies of a relativistic correction.
pub trait BodyEphemeris: Send + Sync + fmt::Debug {
    fn position(&self, body: &str, epoch: Epoch) -> Option<Vector3<f64>>;
}

/// Perturbing body of a [`FirstOrderRelativisticCorrection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbingBody {
    pub name: BodyName,
    /// μ, m³/s²
    pub gravitational_parameter: f64,
}

impl PerturbingBody {
    pub fn new(name: impl Into<BodyName>, gravitational_parameter: f64) -> Self {
        PerturbingBody {
            name: name.into(),
            gravitational_parameter,
        }
    }
}

/// First-order relativistic (Shapiro) light-time correction.
///
/// For each perturbing body `b` of gravitational parameter `μ_b`:
///
/// ```text
/// Δt_b = (1 + γ) μ_b / c³ · ln((r_t + r_r + r_tr) / (r_t + r_r − r_tr))
/// ```
///
/// with `r_t`, `r_r` the distances of transmitter and receiver to the body and `r_tr` the
/// transmitter–receiver distance. Perturbers are evaluated at the mid-point of the leg.
#[derive(Debug, Clone)]
pub struct FirstOrderRelativisticCorrection {
    perturbing_bodies: Vec<PerturbingBody>,
    ppn_gamma: f64,
    ephemeris: Arc<dyn BodyEphemeris>,
}

impl FirstOrderRelativisticCorrection {
    pub fn new(
        perturbing_bodies: Vec<PerturbingBody>,
        ppn_gamma: f64,
        ephemeris: Arc<dyn BodyEphemeris>,
    ) -> Self {
        FirstOrderRelativisticCorrection {
            perturbing_bodies,
            ppn_gamma,
            ephemeris,
        }
    }

    pub fn perturbing_bodies(&self) -> &[PerturbingBody] {
        &self.perturbing_bodies
    }
}

/// `ln((r_t + r_r + r_tr) / (r_t + r_r − r_tr))` for one perturber, i.e. `Δt_b c³ / ((1+γ) μ_b)`.
fn shapiro_log_term(
    ephemeris: &dyn BodyEphemeris,
    body: &str,
    transmitter: &LinkEndState,
    receiver: &LinkEndState,
) -> Result<f64, PartialsError> {
    let mid_epoch = transmitter.time + (receiver.time - transmitter.time) * 0.5;
    let body_position =
        ephemeris
            .position(body, mid_epoch)
            .ok_or_else(|| PartialsError::MissingEphemeris {
                body: body.to_string(),
                epoch: mid_epoch.to_string(),
            })?;

    let r_t: Meter = (transmitter.position - body_position).norm();
    let r_r: Meter = (receiver.position - body_position).norm();
    let r_tr: Meter = (receiver.position - transmitter.position).norm();
    let denominator = r_t + r_r - r_tr;
    if denominator <= 0.0 {
        return Err(PartialsError::DegenerateGeometry(format!(
            "light path grazes the center of {body}"
        )));
    }
    Ok(((r_t + r_r + r_tr) / denominator).ln())
}

impl LightTimeCorrection for FirstOrderRelativisticCorrection {
    fn correction_type(&self) -> LightTimeCorrectionType {
        LightTimeCorrectionType::FirstOrderRelativistic
    }

    fn calculate(
        &self,
        transmitter: &LinkEndState,
        receiver: &LinkEndState,
    ) -> Result<Second, PartialsError> {
        self.perturbing_bodies.iter().try_fold(0.0, |total, body| {
            let log_term =
                shapiro_log_term(self.ephemeris.as_ref(), &body.name, transmitter, receiver)?;
            Ok::<_, PartialsError>(
                total
                    + (1.0 + self.ppn_gamma) * body.gravitational_parameter
                        / SPEED_OF_LIGHT_CUBED
                        * log_term,
            )
        })
    }

    fn create_partial(&self) -> Option<Box<dyn LightTimeCorrectionPartial>> {
        Some(Box::new(FirstOrderRelativisticPartial {
            correction: self.clone(),
        }))
    }
}

/// Partials of a [`FirstOrderRelativisticCorrection`] w.r.t. perturber μ and PPN γ.
#[derive(Debug, Clone)]
pub struct FirstOrderRelativisticPartial {
    correction: FirstOrderRelativisticCorrection,
}

impl LightTimeCorrectionPartial for FirstOrderRelativisticPartial {
    fn correction_type(&self) -> LightTimeCorrectionType {
        LightTimeCorrectionType::FirstOrderRelativistic
    }

    fn light_time_partial_function(
        &self,
        parameter: &ParameterIdentifier,
    ) -> Option<LightTimePartialFunction> {
        let ephemeris = Arc::clone(&self.correction.ephemeris);
        match parameter.kind {
            EstimatableParameterKind::GravitationalParameter => {
                let body = self
                    .correction
                    .perturbing_bodies
                    .iter()
                    .find(|b| Some(b.name.as_str()) == parameter.body.as_deref())?
                    .name
                    .clone();
                let gamma = self.correction.ppn_gamma;
                Some(Box::new(
                    move |transmitter: &LinkEndState,
                          receiver: &LinkEndState|
                          -> Result<DMatrix<f64>, PartialsError> {
                    let log_term =
                        shapiro_log_term(ephemeris.as_ref(), &body, transmitter, receiver)?;
                    Ok(DMatrix::from_element(
                        1,
                        1,
                        (1.0 + gamma) / SPEED_OF_LIGHT_CUBED * log_term,
                    ))
                },
                ))
            }
            EstimatableParameterKind::PpnParameterGamma => {
                if self.correction.perturbing_bodies.is_empty() {
                    return None;
                }
                let bodies = self.correction.perturbing_bodies.clone();
                Some(Box::new(
                    move |transmitter: &LinkEndState,
                          receiver: &LinkEndState|
                          -> Result<DMatrix<f64>, PartialsError> {
                    let partial = bodies.iter().try_fold(0.0, |total, body| {
                        let log_term = shapiro_log_term(
                            ephemeris.as_ref(),
                            &body.name,
                            transmitter,
                            receiver,
                        )?;
                        Ok::<_, PartialsError>(
                            total + body.gravitational_parameter / SPEED_OF_LIGHT_CUBED * log_term,
                        )
                    })?;
                    Ok(DMatrix::from_element(1, 1, partial))
                },
                ))
            }
            _ => None,
        }
    }
}

/// Create the partial models of the corrections of one leg.
///
/// Corrections that provide no partial model are skipped with a warning; the resulting
/// partials then ignore their parameter dependencies.
pub fn create_light_time_correction_partials(
    corrections: &[Arc<dyn LightTimeCorrection>],
) -> Vec<Box<dyn LightTimeCorrectionPartial>> {
    corrections
        .iter()
        .filter_map(|correction| {
            let partial = correction.create_partial();
            if partial.is_none() {
                warn!(
                    "No light-time correction partial available for {:?}, its parameter dependencies are ignored",
                    correction.correction_type()
                );
            }
            partial
        })
        .collect()
}

/// Create the correction partial models of every leg of a mutual-approximation link.
///
/// Arguments
/// -----------------
/// * `observable`: Observable the partials are built for (used in error messages).
/// * `corrections`: Raw correction models, one inner list per leg.
///
/// Return
/// ----------
/// * One list of partial models per leg; empty when `corrections` is empty.
///
/// Errors
/// ----------
/// * [`PartialsError::LightTimeLegCount`] when `corrections` is non-empty but does not hold
///   exactly two legs.
pub fn create_leg_correction_partials(
    observable: ObservableType,
    corrections: &[Vec<Arc<dyn LightTimeCorrection>>],
) -> Result<LegCorrectionPartials, PartialsError> {
    if corrections.is_empty() {
        return Ok(LegCorrectionPartials::new());
    }
    if corrections.len() != REQUIRED_LIGHT_TIME_LEGS {
        return Err(PartialsError::LightTimeLegCount {
            observable,
            found: corrections.len(),
            expected: REQUIRED_LIGHT_TIME_LEGS,
        });
    }
    Ok(corrections
        .iter()
        .map(|leg| create_light_time_correction_partials(leg))
        .collect())
}
