//! Actuators - the shared doze brightness / status / pulse capability
//!
//! One actuator instance is injected into the orchestrator and every channel
//! handler. Implementations must tolerate concurrent calls from several
//! channel workers. The daemon puts the device actuator behind
//! `queued::QueuedActuator`, so no caller waits on a device write.

pub mod queued;
pub mod sysfs;

#[cfg(test)]
pub mod recording;

use crate::error::Result;

/// Panel brightness mode while dozing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DozeMode {
    /// Low brightness mode
    Lbm,
    /// High brightness mode
    Hbm,
}

/// Global always-on doze switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DozeStatus {
    Enabled,
    Disabled,
}

pub trait DozeActuator: Send + Sync {
    fn set_doze_mode(&self, mode: DozeMode) -> Result<()>;

    fn set_doze_status(&self, status: DozeStatus) -> Result<()>;

    /// One-shot wake or doze pulse after a gesture.
    fn wake_or_launch_pulse(&self) -> Result<()>;
}

/// Actuator that only logs. Used by `dozed run --dry-run`.
#[derive(Debug, Default)]
pub struct LoggingActuator;

impl DozeActuator for LoggingActuator {
    fn set_doze_mode(&self, mode: DozeMode) -> Result<()> {
        tracing::info!("[dry-run] doze mode -> {:?}", mode);
        Ok(())
    }

    fn set_doze_status(&self, status: DozeStatus) -> Result<()> {
        tracing::info!("[dry-run] doze status -> {:?}", status);
        Ok(())
    }

    fn wake_or_launch_pulse(&self) -> Result<()> {
        tracing::info!("[dry-run] doze pulse");
        Ok(())
    }
}
