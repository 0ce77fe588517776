//! # Observable scalings
//!
//! An observable scaling converts link-end position sensitivities (`3 × N`, one per role)
//! into sensitivities of the observable itself (`M × N`), by providing an `M × 3` factor per
//! role:
//!
//! ```text
//! ∂obs/∂p = Σ_role  scaling_factor(role) · ∂r_role/∂p
//!         + Σ_leg   light_time_correction_scaling(leg) · ∂Δt_leg/∂p
//! ```
//!
//! One scaling object is created per link-end set and shared (as a [`SharedScaling`]) by every
//! partial of that set. Its factors depend on the observation geometry only, so they are
//! computed once per epoch by [`ObservableScaling::update`] and then read by all partials.
//!
//! ## Variants
//!
//! | variant | observable | factor |
//! |---|---|---|
//! | [`ScalingVariant::CentralInstant`] | mutual approximation | `∂t_c/∂r = −(∂f/∂r) / ḟ` |
//! | [`ScalingVariant::ModifiedCentralInstant`] | mutual approximation | `∂ṡ/∂r` |
//! | [`ScalingVariant::ImpactParameter`] | impact parameter | `∂s/∂r + ṡ ∂t_c/∂r` |
//! | [`ScalingVariant::CentralInstantWithImpactParameter`] | both, stacked | `[∂t_c/∂r ; ∂b/∂r]` |
//!
//! The two mutual-approximation variants describe the same event and are selected by the
//! explicit `central_instant_as_observable` flag (see [`ScalingVariant::select`]).
//!
//! ## Concurrency
//!
//! The per-epoch cache sits behind an [`RwLock`]: one writer refreshes it, then any number of
//! readers evaluate partials for that epoch. Refreshing the same scaling for two epochs at
//! once is not supported.
//!
//! ## See also
//! ------------
//! * [`geometry`] – Apparent-separation kinematics and sensitivities.
//! * [`crate::observation_partials::ApproximationPartial`] – Consumer of the factors.
pub mod geometry;
pub mod impact_parameter;
pub mod mutual_approximation;

use std::fmt;
use std::sync::{Arc, RwLock};

use hifitime::Epoch;
use nalgebra::{DMatrix, DVector, RowVector3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::REQUIRED_LIGHT_TIME_LEGS;
use crate::link_ends::{LinkEndStates, LinkEndType, LinkEnds, ObservableType};
use crate::partials_errors::PartialsError;

use self::geometry::ApparentSeparation;
pub use self::impact_parameter::{
    ImpactParameterScaling, MutualApproximationWithImpactParameterScaling,
};
pub use self::mutual_approximation::{
    ModifiedMutualApproximationScaling, MutualApproximationScaling,
};

/// Scaling law of a mutual-approximation partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingVariant {
    CentralInstant,
    ModifiedCentralInstant,
    ImpactParameter,
    CentralInstantWithImpactParameter,
}

impl ScalingVariant {
    /// Select the scaling variant of `observable`.
    ///
    /// Arguments
    /// -----------------
    /// * `observable`: The observable the partials are built for.
    /// * `central_instant_as_observable`: For [`ObservableType::MutualApproximation`], `true`
    ///   selects [`ScalingVariant::CentralInstant`] and `false` the derivative formulation
    ///   [`ScalingVariant::ModifiedCentralInstant`].
    ///
    /// Errors
    /// ----------
    /// * [`PartialsError::InvalidSettings`] if the flag is `false` for an observable that has
    ///   no modified formulation.
    pub fn select(
        observable: ObservableType,
        central_instant_as_observable: bool,
    ) -> Result<Self, PartialsError> {
        match (observable, central_instant_as_observable) {
            (ObservableType::MutualApproximation, true) => Ok(ScalingVariant::CentralInstant),
            (ObservableType::MutualApproximation, false) => {
                Ok(ScalingVariant::ModifiedCentralInstant)
            }
            (ObservableType::ImpactParameterMutualApprox, true) => {
                Ok(ScalingVariant::ImpactParameter)
            }
            (ObservableType::MutualApproximationWithImpactParameter, true) => {
                Ok(ScalingVariant::CentralInstantWithImpactParameter)
            }
            (_, false) => Err(PartialsError::InvalidSettings(format!(
                "central_instant_as_observable = false is only defined for {}, not for {observable}",
                ObservableType::MutualApproximation
            ))),
        }
    }

    pub fn observable_type(&self) -> ObservableType {
        match self {
            ScalingVariant::CentralInstant | ScalingVariant::ModifiedCentralInstant => {
                ObservableType::MutualApproximation
            }
            ScalingVariant::ImpactParameter => ObservableType::ImpactParameterMutualApprox,
            ScalingVariant::CentralInstantWithImpactParameter => {
                ObservableType::MutualApproximationWithImpactParameter
            }
        }
    }
}

impl fmt::Display for ScalingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalingVariant::CentralInstant => "mutual approximation scaling",
            ScalingVariant::ModifiedCentralInstant => "modified mutual approximation scaling",
            ScalingVariant::ImpactParameter => "impact parameter scaling",
            ScalingVariant::CentralInstantWithImpactParameter => {
                "mutual approximation with impact parameter scaling"
            }
        };
        f.write_str(name)
    }
}

/// Supplier of dependent variables of the propagation (body accelerations).
pub trait DependentVariablesInterface: Send + Sync + fmt::Debug {
    /// Total inertial acceleration of `body` at `epoch`, m/s².
    fn body_acceleration(&self, body: &str, epoch: Epoch) -> Option<Vector3<f64>>;
}

/// Scaling factors of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingFactors {
    pub epoch: Epoch,
    /// `M × 3` factors w.r.t. the positions of `Transmitter` and `Transmitter2`.
    pub transmitter_factors: [DMatrix<f64>; 2],
    /// `M` factors w.r.t. the light time of leg 0 and leg 1.
    pub leg_scalings: [DVector<f64>; REQUIRED_LIGHT_TIME_LEGS],
}

impl ScalingFactors {
    /// Build the factors from the per-transmitter rows.
    ///
    /// A light-time increase `δτ` on a leg moves the transmitter's evaluated position by
    /// `−v δτ`, hence the leg scaling `−factor · v`.
    pub fn new(
        epoch: Epoch,
        transmitter_rows: [&[RowVector3<f64>]; 2],
        velocities: [Vector3<f64>; 2],
    ) -> Self {
        let transmitter_factors = transmitter_rows.map(stack_rows);
        let leg_scalings = [0, 1].map(|i| {
            let velocity = DVector::from_column_slice(velocities[i].as_slice());
            -(&transmitter_factors[i] * velocity)
        });
        ScalingFactors {
            epoch,
            transmitter_factors,
            leg_scalings,
        }
    }

    /// `M × 3` factor of `role`; zero for roles outside the mutual geometry.
    pub fn factor(&self, role: LinkEndType) -> DMatrix<f64> {
        ApparentSeparation::role_partial(role, &self.transmitter_factors).unwrap_or_else(|| {
            DMatrix::zeros(self.transmitter_factors[0].nrows(), 3)
        })
    }
}

fn stack_rows(rows: &[RowVector3<f64>]) -> DMatrix<f64> {
    let mut matrix = DMatrix::zeros(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        matrix.row_mut(i).copy_from(row);
    }
    matrix
}

/// Epoch cache of a scaling (single writer, many readers).
#[derive(Debug, Default)]
pub struct ScalingCache {
    factors: RwLock<Option<ScalingFactors>>,
}

impl ScalingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, factors: ScalingFactors) -> Result<(), PartialsError> {
        let mut guard = self
            .factors
            .write()
            .map_err(|_| PartialsError::PoisonedScalingCache)?;
        *guard = Some(factors);
        Ok(())
    }

    /// Read the current factors.
    ///
    /// Errors
    /// ----------
    /// * [`PartialsError::ScalingNotUpdated`] before the first [`ScalingCache::store`].
    pub fn read<T>(
        &self,
        observable: ObservableType,
        read: impl FnOnce(&ScalingFactors) -> T,
    ) -> Result<T, PartialsError> {
        let guard = self
            .factors
            .read()
            .map_err(|_| PartialsError::PoisonedScalingCache)?;
        guard
            .as_ref()
            .map(read)
            .ok_or(PartialsError::ScalingNotUpdated(observable))
    }
}

/// Link ends and optional acceleration supplier from which a scaling computes its geometry.
#[derive(Debug, Clone)]
pub struct GeometrySource {
    link_ends: LinkEnds,
    dependent_variables: Option<Arc<dyn DependentVariablesInterface>>,
}

impl GeometrySource {
    pub fn new(
        link_ends: LinkEnds,
        dependent_variables: Option<Arc<dyn DependentVariablesInterface>>,
    ) -> Self {
        GeometrySource {
            link_ends,
            dependent_variables,
        }
    }

    pub fn link_ends(&self) -> &LinkEnds {
        &self.link_ends
    }

    /// Apparent-separation geometry at the link-end states.
    ///
    /// Accelerations come from the dependent-variable supplier; they are zero when no supplier
    /// is configured or when it has none for a body.
    pub fn apparent_separation(
        &self,
        states: &LinkEndStates,
    ) -> Result<ApparentSeparation, PartialsError> {
        let acceleration = |role: LinkEndType| -> Vector3<f64> {
            match (&self.dependent_variables, self.link_ends.get(role), states.get(&role)) {
                (Some(supplier), Some(id), Some(state)) => supplier
                    .body_acceleration(&id.body, state.time)
                    .unwrap_or_else(Vector3::zeros),
                _ => Vector3::zeros(),
            }
        };
        ApparentSeparation::compute(
            states,
            [
                acceleration(LinkEndType::Transmitter),
                acceleration(LinkEndType::Transmitter2),
                acceleration(LinkEndType::Receiver),
            ],
        )
    }
}

/// Observable-specific conversion of position sensitivities, refreshed once per epoch.
pub trait ObservableScaling: Send + Sync + fmt::Debug {
    fn variant(&self) -> ScalingVariant;

    /// Epoch cache holding the factors of the last [`ObservableScaling::update`].
    fn cache(&self) -> &ScalingCache;

    /// Recompute the factors for the observation at `epoch`.
    ///
    /// Errors
    /// ----------
    /// * [`PartialsError::MissingLinkEndState`] / [`PartialsError::DegenerateGeometry`] from
    ///   the geometry; the previous factors are kept in that case.
    fn update(&self, states: &LinkEndStates, epoch: Epoch) -> Result<(), PartialsError>;

    fn observable_type(&self) -> ObservableType {
        self.variant().observable_type()
    }

    fn observable_size(&self) -> usize {
        self.observable_type().observable_size()
    }

    /// `M × 3` factor of the position of `role`.
    fn scaling_factor(&self, role: LinkEndType) -> Result<DMatrix<f64>, PartialsError> {
        self.cache()
            .read(self.observable_type(), |factors| factors.factor(role))
    }

    /// `M` factor of the light time of `leg` (0: transmitter, 1: transmitter2).
    fn light_time_correction_scaling(&self, leg: usize) -> Result<DVector<f64>, PartialsError> {
        let observable = self.observable_type();
        self.cache()
            .read(observable, |factors| factors.leg_scalings.get(leg).cloned())?
            .ok_or_else(|| PartialsError::LightTimeLegCount {
                observable,
                found: leg + 1,
                expected: REQUIRED_LIGHT_TIME_LEGS,
            })
    }

    /// Epoch of the cached factors, `None` before the first update.
    fn current_epoch(&self) -> Option<Epoch> {
        self.cache()
            .read(self.observable_type(), |factors| factors.epoch)
            .ok()
    }
}

/// Scaling shared by all partials of one link-end set.
pub type SharedScaling = Arc<dyn ObservableScaling>;

/// Create the scaling object of one link-end set.
pub fn create_observable_scaling(
    variant: ScalingVariant,
    link_ends: &LinkEnds,
    dependent_variables: Option<Arc<dyn DependentVariablesInterface>>,
) -> SharedScaling {
    let source = GeometrySource::new(link_ends.clone(), dependent_variables);
    match variant {
        ScalingVariant::CentralInstant => Arc::new(MutualApproximationScaling::new(source)),
        ScalingVariant::ModifiedCentralInstant => {
            Arc::new(ModifiedMutualApproximationScaling::new(source))
        }
        ScalingVariant::ImpactParameter => Arc::new(ImpactParameterScaling::new(source)),
        ScalingVariant::CentralInstantWithImpactParameter => {
            Arc::new(MutualApproximationWithImpactParameterScaling::new(source))
        }
    }
}
