//! # Estimation setup: partial settings and partial maps
//!
//! This module holds the configuration of the mutual-approximation partial builders and the
//! containers they produce. The builders themselves live in [`mutual_approximation_partials`].
//!
//! ## Overview
//!
//! - [`PartialSettings`] / [`PartialSettingsBuilder`] – observable type, scaling formulation and
//!   optional dependent-variable supplier, validated at [`PartialSettingsBuilder::build`].
//! - [`SingleLinkPartialList`] – sparse map `ParameterIndex → partial` for one link-end set.
//! - [`SingleLinkPartials`] – that map plus the scaling shared by its partials.
//! - [`MultiLinkPartialMap`] – `LinkEnds → SingleLinkPartials`, for all link-end sets.
//!
//! ```text
//! MultiLinkPartialMap
//! └── {transmitter: Io, transmitter2: Europa, receiver: Earth}
//!     ├── scaling   : Arc<dyn ObservableScaling>   (refreshed once per epoch)
//!     └── partials  : (0, 6) → Io initial state
//!                     (6, 6) → Europa initial state
//!                     (13, 1) → PPN γ               (light-time only)
//! ```
//!
//! ## See also
//! ------------
//! * [`mutual_approximation_partials::create_single_link_partials`] – Strict per-link builder.
//! * [`mutual_approximation_partials::create_multi_link_partials`] – Permissive multi-link builder.
//! * [`crate::design_matrix::evaluate_single_link_partials`] – Per-epoch evaluation.
pub mod mutual_approximation_partials;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::link_ends::{LinkEnds, ObservableType};
use crate::observation_partials::ObservationPartial;
use crate::parameters::ParameterIndex;
use crate::partials_errors::PartialsError;
use crate::scaling::{DependentVariablesInterface, ScalingVariant, SharedScaling};

/// Configuration of the mutual-approximation partial builders.
#[derive(Debug, Clone)]
pub struct PartialSettings {
    observable: ObservableType,
    central_instant_as_observable: bool,
    scaling_variant: ScalingVariant,
    dependent_variables: Option<Arc<dyn DependentVariablesInterface>>,
}

impl PartialSettings {
    /// Settings for `observable` with the central instant as observable and no dependent
    /// variables (zero accelerations in the scaling).
    pub fn new(observable: ObservableType) -> Self {
        PartialSettings {
            observable,
            central_instant_as_observable: true,
            scaling_variant: match observable {
                ObservableType::MutualApproximation => ScalingVariant::CentralInstant,
                ObservableType::MutualApproximationWithImpactParameter => {
                    ScalingVariant::CentralInstantWithImpactParameter
                }
                ObservableType::ImpactParameterMutualApprox => ScalingVariant::ImpactParameter,
            },
            dependent_variables: None,
        }
    }

    /// Create a new [`PartialSettingsBuilder`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use odpartials::estimation_setup::PartialSettings;
    /// use odpartials::link_ends::ObservableType;
    /// use odpartials::scaling::ScalingVariant;
    ///
    /// let settings = PartialSettings::builder()
    ///     .observable(ObservableType::MutualApproximation)
    ///     .central_instant_as_observable(false)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(settings.scaling_variant(), ScalingVariant::ModifiedCentralInstant);
    /// ```
    pub fn builder() -> PartialSettingsBuilder {
        PartialSettingsBuilder::new()
    }

    pub fn observable(&self) -> ObservableType {
        self.observable
    }

    pub fn central_instant_as_observable(&self) -> bool {
        self.central_instant_as_observable
    }

    pub fn scaling_variant(&self) -> ScalingVariant {
        self.scaling_variant
    }

    pub fn dependent_variables(&self) -> Option<Arc<dyn DependentVariablesInterface>> {
        self.dependent_variables.clone()
    }
}

impl Default for PartialSettings {
    fn default() -> Self {
        PartialSettings::new(ObservableType::MutualApproximation)
    }
}

/// Builder for [`PartialSettings`], with validation.
#[derive(Debug, Clone)]
pub struct PartialSettingsBuilder {
    observable: ObservableType,
    central_instant_as_observable: bool,
    dependent_variables: Option<Arc<dyn DependentVariablesInterface>>,
}

impl Default for PartialSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialSettingsBuilder {
    pub fn new() -> Self {
        Self {
            observable: ObservableType::MutualApproximation,
            central_instant_as_observable: true,
            dependent_variables: None,
        }
    }

    pub fn observable(mut self, v: ObservableType) -> Self {
        self.observable = v;
        self
    }

    pub fn central_instant_as_observable(mut self, v: bool) -> Self {
        self.central_instant_as_observable = v;
        self
    }

    /// Supplier of body accelerations used by the instant-based scalings.
    pub fn dependent_variables(mut self, v: Arc<dyn DependentVariablesInterface>) -> Self {
        self.dependent_variables = Some(v);
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `central_instant_as_observable = false` is only accepted for
    ///   [`ObservableType::MutualApproximation`].
    ///
    /// Returns
    /// -----------------
    /// * `Ok(PartialSettings)` with the selected [`ScalingVariant`].
    /// * `Err(PartialsError::InvalidSettings)` if a validation rule fails.
    pub fn build(self) -> Result<PartialSettings, PartialsError> {
        let scaling_variant =
            ScalingVariant::select(self.observable, self.central_instant_as_observable)?;
        Ok(PartialSettings {
            observable: self.observable,
            central_instant_as_observable: self.central_instant_as_observable,
            scaling_variant,
            dependent_variables: self.dependent_variables,
        })
    }
}

/// Sparse partials of one link-end set, keyed by the parameter's column block.
pub type SingleLinkPartialList = BTreeMap<ParameterIndex, Box<dyn ObservationPartial>>;

/// Partials of one link-end set and the scaling they share.
#[derive(Debug)]
pub struct SingleLinkPartials {
    pub partials: SingleLinkPartialList,
    pub scaling: SharedScaling,
}

impl SingleLinkPartials {
    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Column blocks holding a partial, in column order.
    pub fn indices(&self) -> Vec<ParameterIndex> {
        self.partials.keys().copied().collect()
    }

    pub fn get(&self, index: &ParameterIndex) -> Option<&dyn ObservationPartial> {
        self.partials.get(index).map(|partial| partial.as_ref())
    }
}

/// Partials of every link-end set.
pub type MultiLinkPartialMap = BTreeMap<LinkEnds, SingleLinkPartials>;
