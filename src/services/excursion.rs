//! Temperature excursion evaluation
//!
//! Pure transition detection: an alert fires only when a reading enters an
//! excursion type different from the one currently open. Consecutive
//! readings inside the same excursion stay silent, and a reading back in
//! band closes the open state implicitly - no close record exists.

use crate::domain::{
    ExcursionType, SensorReading, ShipmentStatus, StatusEvent, TemperatureAlert, TemperatureBand,
};

/// Alert produced on transition into an excursion
///
/// Carries the alert row plus the companion `temperature_excursion` status
/// history event, both stamped with the triggering reading's timestamp.
#[derive(Debug, Clone)]
pub struct AlertDecision {
    pub alert: TemperatureAlert,
    pub status_event: StatusEvent,
}

/// Outcome of evaluating one reading
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Excursion state after this reading (feeds the next evaluation)
    pub state: Option<ExcursionType>,
    /// Alert to raise, present only on a transition
    pub decision: Option<AlertDecision>,
}

/// Classify a temperature against the band
///
/// Strict inequalities: readings equal to a boundary are in band.
#[inline]
pub fn classify(temperature: f64, band: &TemperatureBand) -> Option<ExcursionType> {
    if temperature < band.min {
        Some(ExcursionType::BelowMin)
    } else if temperature > band.max {
        Some(ExcursionType::AboveMax)
    } else {
        None
    }
}

/// Evaluate one reading against the band and the currently open excursion
pub fn evaluate(
    reading: &SensorReading,
    band: &TemperatureBand,
    open: Option<ExcursionType>,
) -> Evaluation {
    let state = classify(reading.temperature, band);

    let decision = match state {
        // Transition into a (different) excursion type - this includes
        // flipping directly from below_min to above_max
        Some(excursion) if open != Some(excursion) => {
            let alert = TemperatureAlert {
                shipment_id: reading.shipment_id.clone(),
                timestamp: reading.timestamp,
                temperature: reading.temperature,
                alert_type: excursion,
            };
            let mut status_event = StatusEvent::new(
                reading.shipment_id.clone(),
                ShipmentStatus::TemperatureExcursion,
                reading.timestamp,
            );
            status_event.location = reading.location.clone();
            Some(AlertDecision { alert, status_event })
        }
        _ => None,
    };

    Evaluation { state, decision }
}
