//! Handwave and pocket gestures from proximity readings
//!
//! A pulse is considered on every near -> far transition. Handwave wants the
//! object gone quickly, pocket wants it to have stayed a while.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::{SensorEvent, SensorHandle, SensorHandler};
use crate::actuators::DozeActuator;
use crate::config::PolicySource;
use crate::shared::{best_effort, format_duration};

/// A wave must clear the sensor within this window
pub const HANDWAVE_MAX_DELTA: Duration = Duration::from_millis(150);

/// Leaving a pocket counts only after the sensor was covered this long
pub const POCKET_MIN_DELTA: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GestureFlags {
    pub handwave: bool,
    pub pocket: bool,
}

/// Whether a near -> far transition after `covered` should pulse
pub fn should_pulse(flags: GestureFlags, covered: Duration) -> bool {
    match (flags.handwave, flags.pocket) {
        (true, true) => true,
        (true, false) => covered < HANDWAVE_MAX_DELTA,
        (false, true) => covered >= POCKET_MIN_DELTA,
        (false, false) => false,
    }
}

pub struct ProximityGestures {
    policy: Arc<dyn PolicySource>,
    actuator: Arc<dyn DozeActuator>,
    flags: GestureFlags,
    max_range: f32,
    saw_near: bool,
    covered_since: Option<Instant>,
}

impl ProximityGestures {
    pub fn new(policy: Arc<dyn PolicySource>, actuator: Arc<dyn DozeActuator>) -> Self {
        Self {
            policy,
            actuator,
            flags: GestureFlags::default(),
            max_range: f32::MAX,
            saw_near: false,
            covered_since: None,
        }
    }
}

impl SensorHandler for ProximityGestures {
    fn on_enable(&mut self, sensor: &SensorHandle, now: Instant) {
        let policy = self.policy.snapshot();
        self.flags = GestureFlags {
            handwave: policy.handwave_enabled,
            pocket: policy.pocket_enabled,
        };
        self.max_range = sensor.max_range;
        self.saw_near = false;
        self.covered_since = Some(now);
    }

    fn on_event(&mut self, event: &SensorEvent) {
        let near = event.value < self.max_range;

        if self.saw_near && !near {
            let covered = self
                .covered_since
                .map(|since| event.timestamp.saturating_duration_since(since))
                .unwrap_or_default();
            if should_pulse(self.flags, covered) {
                tracing::info!("proximity: pulse after {} covered", format_duration(covered));
                best_effort("proximity pulse", self.actuator.wake_or_launch_pulse());
            } else {
                tracing::debug!("proximity: no gesture after {} covered", format_duration(covered));
            }
        } else {
            self.covered_since = Some(event.timestamp);
        }
        self.saw_near = near;
    }
}
