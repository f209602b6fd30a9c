//! Sensors - subscription primitives and the per-channel handlers
//!
//! `SensorService` is the OS-facing capability. Everything above it talks in
//! logical channel names and never touches a listener registration directly.

pub mod ambient;
pub mod channel;
pub mod pickup;
pub mod proximity;
pub mod virtual_service;

use tokio::time::Instant;

use crate::error::Result;

pub use channel::{EventSink, SensorChannel};

/// Opaque handle returned by a sensor lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorHandle {
    pub id: String,
    /// Largest value the sensor reports (proximity: "far").
    pub max_range: f32,
}

/// Delivery rate requested when subscribing. Gesture sensors only need the
/// platform's normal rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingRate {
    Normal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub value: f32,
    /// Monotonic delivery time.
    pub timestamp: Instant,
}

impl SensorEvent {
    pub fn new(value: f32, timestamp: Instant) -> Self {
        Self { value, timestamp }
    }

    /// The raw value as an integral code, if it is one.
    pub fn code(&self) -> Option<i32> {
        if self.value.fract() == 0.0 && self.value.is_finite() {
            Some(self.value as i32)
        } else {
            None
        }
    }
}

/// OS sensor subscription capability.
pub trait SensorService: Send + Sync {
    /// Look up a sensor by vendor identifier. Absence is not an error.
    fn get_sensor(&self, name: &str) -> Option<SensorHandle>;

    fn register_listener(&self, handle: &SensorHandle, rate: SamplingRate, sink: EventSink)
        -> Result<()>;

    fn unregister_listener(&self, handle: &SensorHandle);
}

/// Callback side of a channel. Runs on the channel's worker only.
pub trait SensorHandler: Send {
    /// Called after every disabled -> enabled transition.
    fn on_enable(&mut self, _sensor: &SensorHandle, _now: Instant) {}

    fn on_event(&mut self, event: &SensorEvent);
}
