//! Scalings involving the impact parameter of a mutual approximation.
//!
//! The impact parameter `b = s(t_c)` is the minimum apparent distance. Its total sensitivity
//! includes the shift of the central instant:
//!
//! ```text
//! ∂b/∂r = ∂s/∂r + ṡ ∂t_c/∂r
//! ```
//!
//! At the central instant `ṡ = 0` and only the first term remains; away from it both
//! contribute.
use hifitime::Epoch;

use crate::link_ends::LinkEndStates;
use crate::partials_errors::PartialsError;
use crate::scaling::{
    GeometrySource, ObservableScaling, ScalingCache, ScalingFactors, ScalingVariant,
};

#[derive(Debug)]
pub struct ImpactParameterScaling {
    source: GeometrySource,
    cache: ScalingCache,
}

impl ImpactParameterScaling {
    pub fn new(source: GeometrySource) -> Self {
        ImpactParameterScaling {
            source,
            cache: ScalingCache::new(),
        }
    }
}

impl ObservableScaling for ImpactParameterScaling {
    fn variant(&self) -> ScalingVariant {
        ScalingVariant::ImpactParameter
    }

    fn cache(&self) -> &ScalingCache {
        &self.cache
    }

    fn update(&self, states: &LinkEndStates, epoch: Epoch) -> Result<(), PartialsError> {
        let geometry = self.source.apparent_separation(states)?;
        let rows = [
            geometry.impact_parameter_partial(0)?,
            geometry.impact_parameter_partial(1)?,
        ];
        self.cache.store(ScalingFactors::new(
            epoch,
            [&rows[..1], &rows[1..]],
            geometry.transmitter_velocities,
        ))
    }
}

/// Central instant (row 0) and impact parameter (row 1), stacked.
#[derive(Debug)]
pub struct MutualApproximationWithImpactParameterScaling {
    source: GeometrySource,
    cache: ScalingCache,
}

impl MutualApproximationWithImpactParameterScaling {
    pub fn new(source: GeometrySource) -> Self {
        MutualApproximationWithImpactParameterScaling {
            source,
            cache: ScalingCache::new(),
        }
    }
}

impl ObservableScaling for MutualApproximationWithImpactParameterScaling {
    fn variant(&self) -> ScalingVariant {
        ScalingVariant::CentralInstantWithImpactParameter
    }

    fn cache(&self) -> &ScalingCache {
        &self.cache
    }

    fn update(&self, states: &LinkEndStates, epoch: Epoch) -> Result<(), PartialsError> {
        let geometry = self.source.apparent_separation(states)?;
        let transmitter = [
            geometry.central_instant_partial(0)?,
            geometry.impact_parameter_partial(0)?,
        ];
        let transmitter2 = [
            geometry.central_instant_partial(1)?,
            geometry.impact_parameter_partial(1)?,
        ];
        self.cache.store(ScalingFactors::new(
            epoch,
            [&transmitter, &transmitter2],
            geometry.transmitter_velocities,
        ))
    }
}
