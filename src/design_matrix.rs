//! # Design-matrix rows
//!
//! Per-epoch evaluation of the partials of one link-end set into the `M × P` block-row of
//! the design matrix, `P` being the total size of the estimated-parameter vector.
//!
//! The shared scaling of the link is refreshed first; every partial then reads it. Partials
//! w.r.t. initial states give `∂obs/∂x(t)`; when the propagator supplies state transition
//! matrices they are mapped to `∂obs/∂x(t₀) = ∂obs/∂x(t) · Φ(t, t₀)`.
use hifitime::Epoch;
use nalgebra::{DMatrix, DVector};

use crate::constants::INITIAL_STATE_SIZE;
use crate::estimation_setup::SingleLinkPartials;
use crate::link_ends::LinkEndStates;
use crate::observation_partials::ObservationPartial;
use crate::parameters::{ParameterIdentifier, ParameterIndex};
use crate::partials_errors::PartialsError;

/// Propagator-side sensitivity of the current state to an initial state.
pub trait InitialStateSensitivity {
    /// `Φ(t, t₀)` (6 × 6) of the state identified by `parameter`, `None` if not propagated.
    fn state_transition(&self, parameter: &ParameterIdentifier, epoch: Epoch)
        -> Option<DMatrix<f64>>;
}

fn shape_error(
    partial: &dyn ObservationPartial,
    index: &ParameterIndex,
    block: &DMatrix<f64>,
) -> PartialsError {
    PartialsError::DesignMatrixShape {
        parameter: partial.parameter_identifier().to_string(),
        start: index.start,
        end: index.end(),
        rows: block.nrows(),
        columns: block.ncols(),
    }
}

/// Evaluate the partials of one link-end set into a design-matrix block-row.
///
/// Arguments
/// -----------------
/// * `link_partials`: Partials and shared scaling of the link-end set.
/// * `states`: Link-end states of the observation.
/// * `epoch`: Observation epoch; the scaling cache is refreshed for it.
/// * `observation`: Current observable value, needed by relative-bias partials.
/// * `total_parameter_size`: Number of columns `P`.
/// * `initial_state_sensitivity`: Optional state transition supplier.
///
/// Return
/// ----------
/// * The `M × P` rows, zero outside the blocks holding a partial.
///
/// Errors
/// ----------
/// * [`PartialsError::DesignMatrixShape`] if a partial does not fit its block or the block
///   lies outside the `P` columns.
/// * Any error raised by the scaling update or by a partial.
pub fn evaluate_single_link_partials(
    link_partials: &SingleLinkPartials,
    states: &LinkEndStates,
    epoch: Epoch,
    observation: Option<&DVector<f64>>,
    total_parameter_size: usize,
    initial_state_sensitivity: Option<&dyn InitialStateSensitivity>,
) -> Result<DMatrix<f64>, PartialsError> {
    link_partials.scaling.update(states, epoch)?;

    let observable_size = link_partials.scaling.observable_size();
    let mut rows = DMatrix::zeros(observable_size, total_parameter_size);

    for (index, partial) in &link_partials.partials {
        let mut block = partial.calculate_partial(states, observation)?;

        let identifier = partial.parameter_identifier();
        if let Some(sensitivity) = initial_state_sensitivity {
            if identifier.kind.is_initial_state() {
                let transition = sensitivity.state_transition(identifier, epoch).ok_or_else(
                    || {
                        PartialsError::InvalidParameter(format!(
                            "no state transition available for {identifier} at {epoch}"
                        ))
                    },
                )?;
                if transition.shape() != (INITIAL_STATE_SIZE, INITIAL_STATE_SIZE)
                    || block.ncols() != INITIAL_STATE_SIZE
                {
                    return Err(shape_error(partial.as_ref(), index, &transition));
                }
                block = block * transition;
            }
        }

        if block.nrows() != observable_size
            || block.ncols() != index.width
            || index.end() > total_parameter_size
        {
            return Err(shape_error(partial.as_ref(), index, &block));
        }
        rows.view_mut((0, index.start), (observable_size, index.width))
            .copy_from(&block);
    }

    Ok(rows)
}
