use thiserror::Error;

use crate::link_ends::{LinkEndType, ObservableType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartialsError {
    #[error(
        "Error when making {observable} partials, did not find {missing} in link ends {link_ends} \
         (transmitter, transmitter2 and receiver are required)"
    )]
    MissingLinkEnd {
        observable: ObservableType,
        missing: LinkEndType,
        link_ends: String,
    },

    #[error(
        "Error when making {observable} partials, light time corrections for {found} links found, instead of {expected}."
    )]
    LightTimeLegCount {
        observable: ObservableType,
        found: usize,
        expected: usize,
    },

    #[error("Error when making {observable} partials, could not identify parameter {parameter}")]
    UnidentifiedInitialStateParameter {
        observable: ObservableType,
        parameter: String,
    },

    #[error("Invalid partial settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid estimated parameter: {0}")]
    InvalidParameter(String),

    #[error("{0} scaling queried before any epoch update")]
    ScalingNotUpdated(ObservableType),

    #[error("No state available for link end {0}")]
    MissingLinkEndState(LinkEndType),

    #[error("Degenerate observation geometry: {0}")]
    DegenerateGeometry(String),

    #[error("No ephemeris available for body {body} at {epoch}")]
    MissingEphemeris { body: String, epoch: String },

    #[error("Partial w.r.t. {0} requires the current observation value")]
    MissingObservation(String),

    #[error(
        "Design matrix block {start}..{end} for {parameter} does not fit {rows}x{columns} partial rows"
    )]
    DesignMatrixShape {
        parameter: String,
        start: usize,
        end: usize,
        rows: usize,
        columns: usize,
    },

    #[error("Scaling cache lock poisoned by a panicking writer")]
    PoisonedScalingCache,
}
