//! Error taxonomy for the doze core

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DozeError {
    /// The device has no sensor with this identifier.
    #[error("sensor '{0}' is not available on this device")]
    SensorUnavailable(String),

    #[error("sensor service refused listener for '{sensor}': {reason}")]
    Subscription { sensor: String, reason: String },

    #[error("failed to write '{value}' to {}: {source}", .path.display())]
    ActuatorWrite {
        path: PathBuf,
        value: String,
        #[source]
        source: std::io::Error,
    },

    /// The channel worker has exited and no longer accepts requests.
    #[error("channel '{0}' is closed")]
    ChannelClosed(String),

    #[error("malformed feed line '{line}': {reason}")]
    Feed { line: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DozeError>;
