//! Scalings of the mutual-approximation central instant.
//!
//! Two formulations of the same event coexist:
//!
//! * [`MutualApproximationScaling`] treats the central instant `t_c` as the observable and
//!   differentiates the implicit condition `f(t_c) = d·ḋ = 0`.
//! * [`ModifiedMutualApproximationScaling`] uses the apparent-distance rate `ṡ` at the
//!   observation epoch, which vanishes at `t_c`. No second derivative of the geometry is
//!   involved, so the dependent-variable accelerations are not needed.
use hifitime::Epoch;

use crate::link_ends::LinkEndStates;
use crate::partials_errors::PartialsError;
use crate::scaling::{
    GeometrySource, ObservableScaling, ScalingCache, ScalingFactors, ScalingVariant,
};

/// `∂t_c/∂r = −(∂f/∂r) / ḟ`
#[derive(Debug)]
pub struct MutualApproximationScaling {
    source: GeometrySource,
    cache: ScalingCache,
}

impl MutualApproximationScaling {
    pub fn new(source: GeometrySource) -> Self {
        MutualApproximationScaling {
            source,
            cache: ScalingCache::new(),
        }
    }
}

impl ObservableScaling for MutualApproximationScaling {
    fn variant(&self) -> ScalingVariant {
        ScalingVariant::CentralInstant
    }

    fn cache(&self) -> &ScalingCache {
        &self.cache
    }

    fn update(&self, states: &LinkEndStates, epoch: Epoch) -> Result<(), PartialsError> {
        let geometry = self.source.apparent_separation(states)?;
        let rows = [
            geometry.central_instant_partial(0)?,
            geometry.central_instant_partial(1)?,
        ];
        self.cache.store(ScalingFactors::new(
            epoch,
            [&rows[..1], &rows[1..]],
            geometry.transmitter_velocities,
        ))
    }
}

/// `∂ṡ/∂r`, with `ṡ` the apparent-distance rate
#[derive(Debug)]
pub struct ModifiedMutualApproximationScaling {
    source: GeometrySource,
    cache: ScalingCache,
}

impl ModifiedMutualApproximationScaling {
    pub fn new(source: GeometrySource) -> Self {
        ModifiedMutualApproximationScaling {
            source,
            cache: ScalingCache::new(),
        }
    }
}

impl ObservableScaling for ModifiedMutualApproximationScaling {
    fn variant(&self) -> ScalingVariant {
        ScalingVariant::ModifiedCentralInstant
    }

    fn cache(&self) -> &ScalingCache {
        &self.cache
    }

    fn update(&self, states: &LinkEndStates, epoch: Epoch) -> Result<(), PartialsError> {
        let geometry = self.source.apparent_separation(states)?;
        let rows = geometry.d_apparent_distance_rate;
        self.cache.store(ScalingFactors::new(
            epoch,
            [&rows[..1], &rows[1..]],
            geometry.transmitter_velocities,
        ))
    }
}
