//! Actuator write queue
//!
//! Screen transitions and channel workers hand their calls to a single
//! worker task. It runs each write on the blocking pool, one at a time and
//! in submission order, so callers never wait on a device file.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{DozeActuator, DozeMode, DozeStatus};
use crate::error::{DozeError, Result};
use crate::shared::best_effort;

#[derive(Debug, Clone, Copy)]
enum Command {
    Mode(DozeMode),
    Status(DozeStatus),
    Pulse,
}

impl Command {
    fn label(self) -> &'static str {
        match self {
            Command::Mode(_) => "set doze mode",
            Command::Status(_) => "set doze status",
            Command::Pulse => "doze pulse",
        }
    }

    fn apply(self, actuator: &dyn DozeActuator) -> Result<()> {
        match self {
            Command::Mode(mode) => actuator.set_doze_mode(mode),
            Command::Status(status) => actuator.set_doze_status(status),
            Command::Pulse => actuator.wake_or_launch_pulse(),
        }
    }
}

/// Fire-and-forget front for a blocking actuator. A returned `Ok` means the
/// call was queued; write failures are logged by the worker.
pub struct QueuedActuator {
    tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueuedActuator {
    /// Start the write worker. Must be called from within a tokio runtime.
    pub fn spawn(inner: Arc<dyn DozeActuator>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(drain(inner, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop accepting calls and wait for the queued ones to finish.
    pub async fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            *tx = None;
        }
        let worker = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("actuator worker failed: {}", e);
            }
        }
    }

    fn submit(&self, command: Command) -> Result<()> {
        let queued = self
            .tx
            .lock()
            .ok()
            .and_then(|tx| tx.as_ref().map(|tx| tx.send(command).is_ok()))
            .unwrap_or(false);
        if queued {
            Ok(())
        } else {
            Err(DozeError::ChannelClosed("actuator".into()))
        }
    }
}

async fn drain(inner: Arc<dyn DozeActuator>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        let actuator = inner.clone();
        match tokio::task::spawn_blocking(move || command.apply(actuator.as_ref())).await {
            Ok(result) => {
                best_effort(command.label(), result);
            }
            Err(e) => tracing::error!("{} did not complete: {}", command.label(), e),
        }
    }
    tracing::debug!("actuator worker stopped");
}

impl DozeActuator for QueuedActuator {
    fn set_doze_mode(&self, mode: DozeMode) -> Result<()> {
        self.submit(Command::Mode(mode))
    }

    fn set_doze_status(&self, status: DozeStatus) -> Result<()> {
        self.submit(Command::Status(status))
    }

    fn wake_or_launch_pulse(&self) -> Result<()> {
        self.submit(Command::Pulse)
    }
}
