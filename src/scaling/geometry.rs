//! # Apparent-separation geometry
//!
//! Kinematics of the apparent separation of two transmitters on the receiver's sky, and its
//! sensitivities to the relative positions `ρᵢ = rᵢ − r_R` (velocities and accelerations held
//! fixed).
//!
//! ```text
//! uᵢ = ρᵢ / nᵢ                    (unit line of sight)
//! u̇ᵢ = Pᵢ wᵢ / nᵢ                  Pᵢ = I − uᵢ uᵢᵀ
//! üᵢ = (Pᵢ αᵢ − uᵢ (u̇ᵢ·wᵢ)) / nᵢ − 2 u̇ᵢ (uᵢ·wᵢ) / nᵢ
//! d = u₂ − u₁,  s = |d|,  f = d·ḋ,  ḟ = ḋ·ḋ + d·d̈,  ṡ = f / s
//! ```
//!
//! `f` vanishes at the central instant of the mutual approximation; `s` at that instant is
//! the impact parameter (in radians).
use nalgebra::{Matrix3, RowVector3, Vector3};

use crate::link_ends::{link_end_state, LinkEndStates, LinkEndType};
use crate::partials_errors::PartialsError;

/// Line-of-sight kinematics of one transmitter as seen from the receiver.
#[derive(Debug, Clone, Copy)]
struct LineOfSight {
    direction: Vector3<f64>,
    direction_rate: Vector3<f64>,
    direction_acceleration: Vector3<f64>,
    /// `∂u/∂ρ`
    d_direction: Matrix3<f64>,
    /// `∂u̇/∂ρ`
    d_direction_rate: Matrix3<f64>,
}

impl LineOfSight {
    fn new(
        relative_position: Vector3<f64>,
        relative_velocity: Vector3<f64>,
        relative_acceleration: Vector3<f64>,
    ) -> Result<Self, PartialsError> {
        let range = relative_position.norm();
        if range == 0.0 || !range.is_finite() {
            return Err(PartialsError::DegenerateGeometry(
                "transmitter and receiver positions coincide".into(),
            ));
        }
        let u = relative_position / range;
        let w = relative_velocity;
        let projector = Matrix3::identity() - u * u.transpose();
        let range_rate = u.dot(&w);

        let u_dot = projector * w / range;
        let u_ddot = (projector * relative_acceleration - u * u_dot.dot(&w)) / range
            - 2.0 * u_dot * range_rate / range;

        let d_direction = projector / range;
        let d_direction_rate = -(projector * range_rate + u * (w.transpose() * projector))
            / (range * range)
            - u_dot * u.transpose() / range;

        Ok(LineOfSight {
            direction: u,
            direction_rate: u_dot,
            direction_acceleration: u_ddot,
            d_direction,
            d_direction_rate,
        })
    }
}

/// Apparent separation of `Transmitter` and `Transmitter2` seen from `Receiver`, with its
/// position sensitivities.
///
/// Sensitivities are row vectors w.r.t. `ρ₁` (index 0) and `ρ₂` (index 1). The sensitivity
/// w.r.t. a link end's inertial position follows from [`ApparentSeparation::role_partial`].
#[derive(Debug, Clone, Copy)]
pub struct ApparentSeparation {
    /// `d = u₂ − u₁`
    pub separation: Vector3<f64>,
    pub separation_rate: Vector3<f64>,
    /// `s = |d|`, rad
    pub apparent_distance: f64,
    /// `f = d·ḋ`
    pub closest_approach_function: f64,
    /// `ḟ = ḋ·ḋ + d·d̈`
    pub closest_approach_function_rate: f64,
    /// `ṡ = f / s`
    pub apparent_distance_rate: f64,
    /// Inertial velocities of `Transmitter` and `Transmitter2`.
    pub transmitter_velocities: [Vector3<f64>; 2],
    /// `∂f/∂ρᵢ`
    pub d_closest_approach_function: [RowVector3<f64>; 2],
    /// `∂s/∂ρᵢ`
    pub d_apparent_distance: [RowVector3<f64>; 2],
    /// `∂ṡ/∂ρᵢ`
    pub d_apparent_distance_rate: [RowVector3<f64>; 2],
}

impl ApparentSeparation {
    /// Compute the apparent-separation geometry from the link-end states.
    ///
    /// Arguments
    /// -----------------
    /// * `states`: States of `Transmitter`, `Transmitter2` and `Receiver`.
    /// * `accelerations`: Inertial accelerations of `[Transmitter, Transmitter2, Receiver]`.
    ///
    /// Errors
    /// ----------
    /// * [`PartialsError::MissingLinkEndState`] if a role has no state.
    /// * [`PartialsError::DegenerateGeometry`] on a zero range or coincident apparent directions.
    pub fn compute(
        states: &LinkEndStates,
        accelerations: [Vector3<f64>; 3],
    ) -> Result<Self, PartialsError> {
        let receiver = link_end_state(states, LinkEndType::Receiver)?;
        let transmitters = [
            link_end_state(states, LinkEndType::Transmitter)?,
            link_end_state(states, LinkEndType::Transmitter2)?,
        ];

        let los = [0, 1].map(|i| {
            LineOfSight::new(
                transmitters[i].position - receiver.position,
                transmitters[i].velocity - receiver.velocity,
                accelerations[i] - accelerations[2],
            )
        });
        let [los_1, los_2] = los;
        let los = [los_1?, los_2?];

        let separation = los[1].direction - los[0].direction;
        let separation_rate = los[1].direction_rate - los[0].direction_rate;
        let separation_acceleration = los[1].direction_acceleration - los[0].direction_acceleration;

        let apparent_distance = separation.norm();
        if apparent_distance == 0.0 || !apparent_distance.is_finite() {
            return Err(PartialsError::DegenerateGeometry(
                "apparent directions of both transmitters coincide".into(),
            ));
        }

        let f = separation.dot(&separation_rate);
        let f_dot = separation_rate.norm_squared() + separation.dot(&separation_acceleration);
        let s_dot = f / apparent_distance;

        let sign = [-1.0, 1.0];
        let d_f = [0, 1].map(|i| {
            sign[i]
                * (separation_rate.transpose() * los[i].d_direction
                    + separation.transpose() * los[i].d_direction_rate)
        });
        let d_s = [0, 1].map(|i| {
            sign[i] * separation.transpose() * los[i].d_direction / apparent_distance
        });
        let d_s_dot = [0, 1].map(|i| {
            d_f[i] / apparent_distance - d_s[i] * (f / (apparent_distance * apparent_distance))
        });

        Ok(ApparentSeparation {
            separation,
            separation_rate,
            apparent_distance,
            closest_approach_function: f,
            closest_approach_function_rate: f_dot,
            apparent_distance_rate: s_dot,
            transmitter_velocities: [transmitters[0].velocity, transmitters[1].velocity],
            d_closest_approach_function: d_f,
            d_apparent_distance: d_s,
            d_apparent_distance_rate: d_s_dot,
        })
    }

    /// `∂t_c/∂ρᵢ = −(∂f/∂ρᵢ) / ḟ`.
    ///
    /// Errors
    /// ----------
    /// * [`PartialsError::DegenerateGeometry`] when `ḟ` vanishes (no isolated closest approach).
    pub fn central_instant_partial(
        &self,
        transmitter: usize,
    ) -> Result<RowVector3<f64>, PartialsError> {
        let f_dot = self.closest_approach_function_rate;
        if f_dot == 0.0 || !f_dot.is_finite() {
            return Err(PartialsError::DegenerateGeometry(
                "apparent distance has no isolated minimum (vanishing d(d·ḋ)/dt)".into(),
            ));
        }
        Ok(-self.d_closest_approach_function[transmitter] / f_dot)
    }

    /// `∂b/∂ρᵢ = ∂s/∂ρᵢ + ṡ ∂t_c/∂ρᵢ`.
    pub fn impact_parameter_partial(
        &self,
        transmitter: usize,
    ) -> Result<RowVector3<f64>, PartialsError> {
        Ok(self.d_apparent_distance[transmitter]
            + self.apparent_distance_rate * self.central_instant_partial(transmitter)?)
    }

    /// Map per-transmitter sensitivities onto a link-end role.
    ///
    /// `Receiver` moves both lines of sight, hence the negated sum. Roles outside the
    /// geometry get `None`.
    pub fn role_partial<T>(
        role: LinkEndType,
        per_transmitter: &[T; 2],
    ) -> Option<T>
    where
        T: Clone + std::ops::Add<Output = T> + std::ops::Neg<Output = T>,
    {
        match role {
            LinkEndType::Transmitter => Some(per_transmitter[0].clone()),
            LinkEndType::Transmitter2 => Some(per_transmitter[1].clone()),
            LinkEndType::Receiver => {
                Some(-(per_transmitter[0].clone() + per_transmitter[1].clone()))
            }
            LinkEndType::Reflector => None,
        }
    }
}
