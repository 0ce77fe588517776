#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hifitime::{Epoch, TimeScale};
use nalgebra::Vector3;
use odpartials::light_time_corrections::{
    BodyEphemeris, FirstOrderRelativisticCorrection, LightTimeCorrection, LightTimeCorrectionList,
    PerturbingBody,
};
use odpartials::link_ends::{LinkEndState, LinkEndStates, LinkEndType, LinkEnds};
use odpartials::parameters::EstimatableParameter;
use odpartials::position_partials::{
    CurrentStatePositionPartial, EnvironmentPositionPartials, PositionPartial, PositionPartialMap,
    PositionPartialProvider,
};

pub const JUPITER_MU: f64 = 1.26686534e17;

pub fn reference_epoch() -> Epoch {
    Epoch::from_mjd_in_time_scale(60000.0, TimeScale::TDB)
}

pub fn link_ends(transmitter: &str, transmitter2: &str, receiver: &str) -> LinkEnds {
    LinkEnds::new()
        .with(LinkEndType::Transmitter, transmitter)
        .with(LinkEndType::Transmitter2, transmitter2)
        .with(LinkEndType::Receiver, receiver)
}

/// Two satellites in rectilinear motion approaching each other on the sky of the receiver.
pub fn approach_states() -> LinkEndStates {
    let epoch = reference_epoch();
    LinkEndStates::from([
        (
            LinkEndType::Transmitter,
            LinkEndState::new(
                epoch,
                Vector3::new(1.0e8, 0.0, 0.0),
                Vector3::new(0.0, 1.0e3, 2.0),
            ),
        ),
        (
            LinkEndType::Transmitter2,
            LinkEndState::new(
                epoch,
                Vector3::new(1.2e8, 5.0e5, 1.0e4),
                Vector3::new(50.0, -1.0e3, 0.0),
            ),
        ),
        (
            LinkEndType::Receiver,
            LinkEndState::new(epoch, Vector3::zeros(), Vector3::new(3.0, 20.0, -1.0)),
        ),
    ])
}

/// Counts the queries reaching the wrapped provider.
#[derive(Default)]
pub struct CountingProvider {
    inner: EnvironmentPositionPartials,
    pub wrt_body_calls: AtomicUsize,
    pub wrt_parameter_calls: AtomicUsize,
}

impl CountingProvider {
    pub fn total_calls(&self) -> usize {
        self.wrt_body_calls.load(Ordering::SeqCst) + self.wrt_parameter_calls.load(Ordering::SeqCst)
    }
}

impl PositionPartialProvider for CountingProvider {
    fn position_partials_wrt_body(&self, link_ends: &LinkEnds, body: &str) -> PositionPartialMap {
        self.wrt_body_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.position_partials_wrt_body(link_ends, body)
    }

    fn position_partials_wrt_parameter(
        &self,
        link_ends: &LinkEnds,
        parameter: &EstimatableParameter,
    ) -> PositionPartialMap {
        self.wrt_parameter_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.position_partials_wrt_parameter(link_ends, parameter)
    }
}

/// Reports a state sensitivity for one body at the secondary transmitter, whatever the link ends.
pub struct SecondaryTransmitterProvider {
    pub body: String,
}

impl PositionPartialProvider for SecondaryTransmitterProvider {
    fn position_partials_wrt_body(&self, _link_ends: &LinkEnds, body: &str) -> PositionPartialMap {
        let mut partials = PositionPartialMap::new();
        if body == self.body {
            let partial: Box<dyn PositionPartial> = Box::new(CurrentStatePositionPartial);
            partials.insert(LinkEndType::Transmitter2, partial);
        }
        partials
    }

    fn position_partials_wrt_parameter(
        &self,
        _link_ends: &LinkEnds,
        _parameter: &EstimatableParameter,
    ) -> PositionPartialMap {
        PositionPartialMap::new()
    }
}

/// Never reports any sensitivity.
pub struct EmptyProvider;

impl PositionPartialProvider for EmptyProvider {
    fn position_partials_wrt_body(&self, _link_ends: &LinkEnds, _body: &str) -> PositionPartialMap {
        PositionPartialMap::new()
    }

    fn position_partials_wrt_parameter(
        &self,
        _link_ends: &LinkEnds,
        _parameter: &EstimatableParameter,
    ) -> PositionPartialMap {
        PositionPartialMap::new()
    }
}

#[derive(Debug)]
pub struct FixedEphemeris(pub HashMap<String, Vector3<f64>>);

impl BodyEphemeris for FixedEphemeris {
    fn position(&self, body: &str, _epoch: Epoch) -> Option<Vector3<f64>> {
        self.0.get(body).copied()
    }
}

/// Shapiro delay of a Jupiter-like body fixed off the light paths.
pub fn shapiro_correction() -> Arc<dyn LightTimeCorrection> {
    let ephemeris = FixedEphemeris(HashMap::from([(
        "Jupiter".to_string(),
        Vector3::new(5.0e7, -3.0e7, 1.0e7),
    )]));
    Arc::new(FirstOrderRelativisticCorrection::new(
        vec![PerturbingBody::new("Jupiter", JUPITER_MU)],
        1.0,
        Arc::new(ephemeris),
    ))
}

/// The same correction on `legs` legs.
pub fn shapiro_legs(legs: usize) -> LightTimeCorrectionList {
    (0..legs).map(|_| vec![shapiro_correction()]).collect()
}
