//! # Constants and type definitions for odpartials
//!
//! This module centralizes the **physical constants**, **block sizes**, and **common type
//! aliases** shared by the partial-assembly pipeline.
//!
//! ## Overview
//!
//! - Sizes of the estimated blocks (Cartesian initial state, rotational state,
//!   ground-station position)
//! - Number of light-time legs of a three-body (mutual) observable
//! - Speed of light for light-time correction models
//! - Unit aliases used in signatures (SI throughout: m, m/s, s)

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// Speed of light in vacuum, m/s (IAU 2012)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// c³, used by first-order relativistic light-time corrections
pub const SPEED_OF_LIGHT_CUBED: f64 = SPEED_OF_LIGHT * SPEED_OF_LIGHT * SPEED_OF_LIGHT;

// -------------------------------------------------------------------------------------------------
// Block sizes
// -------------------------------------------------------------------------------------------------

/// Width of a translational initial-state block (position + velocity)
pub const INITIAL_STATE_SIZE: usize = 6;

/// Width of a rotational initial-state block (quaternion + angular velocity)
pub const ROTATIONAL_STATE_SIZE: usize = 7;

/// Width of a ground-station position parameter (body-fixed Cartesian)
pub const GROUND_STATION_POSITION_SIZE: usize = 3;

/// Number of independent propagation legs of a mutual-approximation link
/// (transmitter → receiver and transmitter2 → receiver)
pub const REQUIRED_LIGHT_TIME_LEGS: usize = 2;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Distance in meters
pub type Meter = f64;
/// Duration in seconds
pub type Second = f64;
/// Name of a body in the environment (e.g. `"Io"`, `"Earth"`)
pub type BodyName = String;
