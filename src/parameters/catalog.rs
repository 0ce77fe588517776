//! # Parameter catalog and index assignment
//!
//! The builders never walk a flat parameter list: they consume three ordered views of
//! the estimated parameters through the [`ParameterCatalog`] trait.
//!
//! ```text
//! columns  0 ........ 6k-1 | 6k ....... 6k+s-1 | 6k+s ....................... P-1
//!          initial states  | scalar parameters | vector parameters (own widths)
//!          (6-wide blocks) | (1-wide)          |
//! ```
//!
//! [`EstimatableParameterSet`] is the provided implementation. Index assignment is a
//! pure fold over each ordered pass, so blocks are contiguous, non-overlapping and
//! deterministic for a given input order. Scalar and vector views are keyed by the start
//! column of the parameter, which doubles as its stable integer id.
use std::collections::{BTreeMap, HashSet};

use nalgebra::DVector;

use crate::parameters::{EstimatableParameter, ParameterIdentifier, ParameterIndex};
use crate::partials_errors::PartialsError;

/// Read-only views of an estimated-parameter set, as consumed by the partial builders.
pub trait ParameterCatalog {
    /// Initial-state parameters, in estimation order.
    fn initial_state_parameters(&self) -> Vec<&EstimatableParameter>;

    /// Scalar parameters keyed by their start column.
    fn scalar_parameters(&self) -> BTreeMap<usize, &EstimatableParameter>;

    /// Vector parameters keyed by their start column.
    fn vector_parameters(&self) -> BTreeMap<usize, &EstimatableParameter>;
}

/// Assign consecutive blocks to `parameters`, starting at `first_column`.
///
/// Return
/// ----------
/// * The `(index, parameter)` pairs in input order, and the first free column after them.
fn assign_blocks(
    parameters: Vec<EstimatableParameter>,
    first_column: usize,
) -> (Vec<(ParameterIndex, EstimatableParameter)>, usize) {
    parameters.into_iter().fold(
        (Vec::new(), first_column),
        |(mut blocks, start), parameter| {
            let index = ParameterIndex::new(start, parameter.width());
            blocks.push((index, parameter));
            (blocks, index.end())
        },
    )
}

/// Ordered set of estimated parameters with its global index assignment.
#[derive(Debug, Clone, Default)]
pub struct EstimatableParameterSet {
    initial_states: Vec<(ParameterIndex, EstimatableParameter)>,
    scalars: BTreeMap<usize, EstimatableParameter>,
    vectors: BTreeMap<usize, EstimatableParameter>,
    total_size: usize,
}

impl EstimatableParameterSet {
    /// Partition `parameters` into the three passes and assign their indices.
    ///
    /// Relative order inside each pass follows the input order. Initial-state kinds go
    /// first, then scalar-valued parameters, then every other vector-valued parameter.
    ///
    /// Arguments
    /// -----------------
    /// * `parameters`: All estimated parameters.
    ///
    /// Return
    /// ----------
    /// * The catalog, or [`PartialsError::InvalidParameter`] if two parameters share an
    ///   identifier (for link properties: the same kind, link ends and observable).
    pub fn new(parameters: Vec<EstimatableParameter>) -> Result<Self, PartialsError> {
        let mut seen = HashSet::new();
        for parameter in &parameters {
            let key = (
                parameter.identifier().clone(),
                parameter.observation_link().map(|link| link.observable),
            );
            if !seen.insert(key) {
                return Err(PartialsError::InvalidParameter(format!(
                    "{} is estimated more than once",
                    parameter.identifier()
                )));
            }
        }

        let (initial, rest): (Vec<_>, Vec<_>) = parameters
            .into_iter()
            .partition(|p| p.kind().is_initial_state());
        let (scalar, vector): (Vec<_>, Vec<_>) =
            rest.into_iter().partition(|p| p.kind().is_scalar());

        let (initial_states, after_initial) = assign_blocks(initial, 0);
        let (scalars, after_scalar) = assign_blocks(scalar, after_initial);
        let (vectors, total_size) = assign_blocks(vector, after_scalar);

        Ok(EstimatableParameterSet {
            initial_states,
            scalars: scalars
                .into_iter()
                .map(|(index, p)| (index.start, p))
                .collect(),
            vectors: vectors
                .into_iter()
                .map(|(index, p)| (index.start, p))
                .collect(),
            total_size,
        })
    }

    /// Total number of columns of the design matrix.
    pub fn total_parameter_size(&self) -> usize {
        self.total_size
    }

    pub fn len(&self) -> usize {
        self.initial_states.len() + self.scalars.len() + self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All `(index, identifier)` pairs in column order.
    pub fn parameter_indices(&self) -> Vec<(ParameterIndex, &ParameterIdentifier)> {
        self.initial_states
            .iter()
            .map(|(index, p)| (*index, p.identifier()))
            .chain(
                self.scalars
                    .iter()
                    .chain(self.vectors.iter())
                    .map(|(start, p)| (ParameterIndex::new(*start, p.width()), p.identifier())),
            )
            .collect()
    }

    /// Column block assigned to the parameter with this identifier.
    pub fn parameter_index(&self, identifier: &ParameterIdentifier) -> Option<ParameterIndex> {
        self.parameter_indices()
            .into_iter()
            .find(|(_, id)| *id == identifier)
            .map(|(index, _)| index)
    }

    /// Concatenated current values of all parameters, in column order.
    pub fn parameter_values(&self) -> DVector<f64> {
        let mut values = DVector::zeros(self.total_size);
        let blocks = self
            .initial_states
            .iter()
            .map(|(index, p)| (*index, p))
            .chain(
                self.scalars
                    .iter()
                    .chain(self.vectors.iter())
                    .map(|(start, p)| (ParameterIndex::new(*start, p.width()), p)),
            );
        for (index, parameter) in blocks {
            values
                .rows_mut(index.start, index.width)
                .copy_from(&parameter.value().as_vector());
        }
        values
    }
}

impl ParameterCatalog for EstimatableParameterSet {
    fn initial_state_parameters(&self) -> Vec<&EstimatableParameter> {
        self.initial_states.iter().map(|(_, p)| p).collect()
    }

    fn scalar_parameters(&self) -> BTreeMap<usize, &EstimatableParameter> {
        self.scalars.iter().map(|(k, p)| (*k, p)).collect()
    }

    fn vector_parameters(&self) -> BTreeMap<usize, &EstimatableParameter> {
        self.vectors.iter().map(|(k, p)| (*k, p)).collect()
    }
}
