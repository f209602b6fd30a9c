//! Pickup gesture debounce

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::{SensorEvent, SensorHandle, SensorHandler};
use crate::actuators::DozeActuator;
use crate::shared::{best_effort, format_duration};

/// Sensor code reported when the device is picked up
pub const PICKUP_TRIGGER: i32 = 1;

/// Minimum spacing between two forwarded pulses
pub const MIN_PULSE_INTERVAL: Duration = Duration::from_millis(2500);

pub struct PickupDebouncer {
    actuator: Arc<dyn DozeActuator>,
    last: Option<Instant>,
}

impl PickupDebouncer {
    pub fn new(actuator: Arc<dyn DozeActuator>) -> Self {
        Self { actuator, last: None }
    }

    /// Decide whether a reading at `now` is forwarded, recording it if so.
    pub fn accept(&mut self, code: Option<i32>, now: Instant) -> bool {
        if code != Some(PICKUP_TRIGGER) {
            return false;
        }
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < MIN_PULSE_INTERVAL {
                tracing::debug!("pickup: dropped, {} since last", format_duration(elapsed));
                return false;
            }
        }
        self.last = Some(now);
        true
    }

    pub fn reset(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

impl SensorHandler for PickupDebouncer {
    fn on_enable(&mut self, _sensor: &SensorHandle, now: Instant) {
        self.reset(now);
    }

    fn on_event(&mut self, event: &SensorEvent) {
        if self.accept(event.code(), event.timestamp) {
            tracing::info!("pickup: pulse");
            best_effort("pickup pulse", self.actuator.wake_or_launch_pulse());
        }
    }
}
