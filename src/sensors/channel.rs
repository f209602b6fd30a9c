//! Serialized sensor channel
//!
//! Each channel owns a single tokio task draining one queue. Enable, disable
//! and every event delivered by the sensor service go through that queue, so
//! for a given sensor they run strictly one after another in submission
//! order. Different channels never share a lock.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
#[cfg(test)]
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{SamplingRate, SensorEvent, SensorHandle, SensorHandler, SensorService};
use crate::error::{DozeError, Result};

enum Request {
    Enable,
    Disable,
    Event(SensorEvent),
    #[cfg(test)]
    Query(oneshot::Sender<bool>),
    Shutdown,
}

/// Handed to the sensor service on registration; feeds the channel queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Enable => f.write_str("Enable"),
            Request::Disable => f.write_str("Disable"),
            Request::Event(event) => write!(f, "Event({})", event.value),
            #[cfg(test)]
            Request::Query(_) => f.write_str("Query"),
            Request::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl EventSink {
    /// Queue an event behind everything already submitted to the channel.
    /// Returns false once the channel has shut down.
    pub fn deliver(&self, event: SensorEvent) -> bool {
        self.tx.send(Request::Event(event)).is_ok()
    }
}

pub struct SensorChannel {
    name: String,
    available: bool,
    tx: mpsc::UnboundedSender<Request>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SensorChannel {
    /// Look up `sensor_id` and start the channel worker. Must be called from
    /// within a tokio runtime.
    pub fn spawn(
        name: impl Into<String>,
        sensor_id: &str,
        service: Arc<dyn SensorService>,
        handler: Box<dyn SensorHandler>,
    ) -> Self {
        let name = name.into();
        let handle = service.get_sensor(sensor_id);
        if handle.is_none() {
            tracing::debug!("{}: {}", name, DozeError::SensorUnavailable(sensor_id.to_string()));
        }

        let available = handle.is_some();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            name: name.clone(),
            service,
            handle,
            handler,
            sink: EventSink { tx: tx.clone() },
            subscribed: false,
        };
        let join = tokio::spawn(worker.run(rx));

        Self {
            name,
            available,
            tx,
            worker: Mutex::new(Some(join)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the underlying sensor exists on this device.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Request a subscription. Returns immediately.
    pub fn enable(&self) {
        tracing::debug!("{}: enable requested", self.name);
        self.submit(Request::Enable);
    }

    /// Request unsubscription. Returns immediately.
    pub fn disable(&self) {
        tracing::debug!("{}: disable requested", self.name);
        self.submit(Request::Disable);
    }

    /// Subscription state after every request submitted so far has run.
    #[cfg(test)]
    pub async fn is_enabled(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Query(reply))
            .map_err(|_| DozeError::ChannelClosed(self.name.clone()))?;
        rx.await.map_err(|_| DozeError::ChannelClosed(self.name.clone()))
    }

    /// Wait until everything submitted so far has been processed.
    #[cfg(test)]
    pub async fn flush(&self) -> Result<()> {
        self.is_enabled().await.map(|_| ())
    }

    /// Unsubscribe if needed, stop the worker and wait for it to exit.
    pub async fn close(&self) {
        let _ = self.tx.send(Request::Shutdown);
        let join = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(join) = join {
            if let Err(e) = join.await {
                tracing::error!("{}: channel worker failed: {}", self.name, e);
            }
        }
    }

    fn submit(&self, request: Request) {
        if self.tx.send(request).is_err() {
            tracing::warn!("{}", DozeError::ChannelClosed(self.name.clone()));
        }
    }
}

impl Drop for SensorChannel {
    fn drop(&mut self) {
        // The worker holds a sender of its own, so it only stops on request.
        let _ = self.tx.send(Request::Shutdown);
    }
}

struct Worker {
    name: String,
    service: Arc<dyn SensorService>,
    handle: Option<SensorHandle>,
    handler: Box<dyn SensorHandler>,
    sink: EventSink,
    subscribed: bool,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        while let Some(request) = rx.recv().await {
            tracing::trace!("{}: {:?}", self.name, request);
            match request {
                Request::Enable => self.enable(),
                Request::Disable => self.disable(),
                Request::Event(event) => self.dispatch(event),
                #[cfg(test)]
                Request::Query(reply) => {
                    let _ = reply.send(self.subscribed);
                }
                Request::Shutdown => {
                    self.disable();
                    break;
                }
            }
        }
        tracing::debug!("{}: channel worker stopped", self.name);
    }

    fn enable(&mut self) {
        if self.subscribed {
            return;
        }
        let Some(handle) = self.handle.as_ref() else {
            return;
        };

        match self
            .service
            .register_listener(handle, SamplingRate::Normal, self.sink.clone())
        {
            Ok(()) => {
                self.subscribed = true;
                self.handler.on_enable(handle, Instant::now());
                tracing::info!("{}: enabled ({})", self.name, handle.id);
            }
            Err(e) => tracing::warn!("{}: enable failed: {}", self.name, e),
        }
    }

    fn disable(&mut self) {
        if !self.subscribed {
            return;
        }
        if let Some(handle) = self.handle.as_ref() {
            self.service.unregister_listener(handle);
        }
        self.subscribed = false;
        tracing::info!("{}: disabled", self.name);
    }

    fn dispatch(&mut self, event: SensorEvent) {
        if !self.subscribed {
            tracing::trace!("{}: dropping stale event {}", self.name, event.value);
            return;
        }
        self.handler.on_event(&event);
    }
}
