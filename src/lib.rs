//! Observation partials of mutual-approximation observables for orbit determination.
//!
//! A mutual approximation is the instant (and minimum apparent distance) at which two bodies,
//! seen from a receiver, come closest on the sky. This crate builds, for every link-end set,
//! the sparse map of analytic partials `∂obs/∂p` w.r.t. the estimated parameters, and
//! evaluates them into design-matrix rows at each observation epoch.
//!
//! Entry points:
//! * [`estimation_setup::mutual_approximation_partials::create_multi_link_partials`]
//! * [`design_matrix::evaluate_single_link_partials`]
pub mod constants;
pub mod design_matrix;
pub mod estimation_setup;
pub mod light_time_corrections;
pub mod link_ends;
pub mod observation_partials;
pub mod parameters;
pub mod partials_errors;
pub mod position_partials;
pub mod scaling;

pub use estimation_setup::mutual_approximation_partials::{
    create_multi_link_partials, create_single_link_partials,
};
pub use estimation_setup::{MultiLinkPartialMap, PartialSettings, SingleLinkPartials};
pub use link_ends::{LinkEndType, LinkEnds, ObservableType};
pub use partials_errors::PartialsError;
