//! Recording actuator for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{DozeActuator, DozeMode, DozeStatus};
use crate::error::{DozeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Mode(DozeMode),
    Status(DozeStatus),
    Pulse,
}

#[derive(Debug, Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<Call>>,
    fail: AtomicBool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls but report every one of them as a failed write
    pub fn failing() -> Self {
        let actuator = Self::default();
        actuator.fail.store(true, Ordering::SeqCst);
        actuator
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pulses(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Pulse).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DozeError::ActuatorWrite {
                path: "/dev/null/doze".into(),
                value: format!("{:?}", call),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        Ok(())
    }
}

impl DozeActuator for RecordingActuator {
    fn set_doze_mode(&self, mode: DozeMode) -> Result<()> {
        self.record(Call::Mode(mode))
    }

    fn set_doze_status(&self, status: DozeStatus) -> Result<()> {
        self.record(Call::Status(status))
    }

    fn wake_or_launch_pulse(&self) -> Result<()> {
        self.record(Call::Pulse)
    }
}
