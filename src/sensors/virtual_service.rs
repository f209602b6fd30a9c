//! In-process sensor service
//!
//! Holds a fixed set of sensors and the listener registered for each. Events
//! come from whoever calls `inject` (the stdin feed in the daemon, the test
//! body in tests) and are stamped with the monotonic clock on delivery.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::time::Instant;

use super::{EventSink, SamplingRate, SensorEvent, SensorHandle, SensorService};
use crate::error::{DozeError, Result};

#[derive(Debug, Default)]
pub struct VirtualSensorService {
    sensors: HashMap<String, SensorHandle>,
    listeners: Mutex<HashMap<String, EventSink>>,
    #[cfg(test)]
    hooks: TestHooks,
}

/// Call counters and failure injection for tests
#[cfg(test)]
#[derive(Debug, Default)]
struct TestHooks {
    refuse: AtomicBool,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
}

impl VirtualSensorService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a sensor present on this device
    pub fn with_sensor(mut self, id: impl Into<String>, max_range: f32) -> Self {
        let id = id.into();
        self.sensors.insert(
            id.clone(),
            SensorHandle {
                id,
                max_range,
            },
        );
        self
    }

    /// Deliver a reading to the sensor's listener. Returns false if nobody is
    /// listening or the listener's channel has gone away.
    pub fn inject(&self, id: &str, value: f32) -> bool {
        let sink = match self.listeners.lock() {
            Ok(listeners) => listeners.get(id).cloned(),
            Err(_) => None,
        };
        match sink {
            Some(sink) => sink.deliver(SensorEvent::new(value, Instant::now())),
            None => false,
        }
    }

    pub fn sensor_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sensors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
impl VirtualSensorService {
    pub fn is_registered(&self, id: &str) -> bool {
        self.listeners.lock().unwrap().contains_key(id)
    }

    /// Make every subsequent registration fail
    pub fn refuse_registrations(&self, refuse: bool) {
        self.hooks.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn register_calls(&self) -> usize {
        self.hooks.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.hooks.unregister_calls.load(Ordering::SeqCst)
    }
}

impl SensorService for VirtualSensorService {
    fn get_sensor(&self, name: &str) -> Option<SensorHandle> {
        self.sensors.get(name).cloned()
    }

    fn register_listener(&self, handle: &SensorHandle, rate: SamplingRate, sink: EventSink) -> Result<()> {
        #[cfg(test)]
        {
            self.hooks.register_calls.fetch_add(1, Ordering::SeqCst);
            if self.hooks.refuse.load(Ordering::SeqCst) {
                return Err(DozeError::Subscription {
                    sensor: handle.id.clone(),
                    reason: "registrations refused".into(),
                });
            }
        }

        let mut listeners = self.listeners.lock().map_err(|_| DozeError::Subscription {
            sensor: handle.id.clone(),
            reason: "listener table poisoned".into(),
        })?;
        listeners.insert(handle.id.clone(), sink);
        tracing::debug!("Registered listener for {} at {:?} rate", handle.id, rate);
        Ok(())
    }

    fn unregister_listener(&self, handle: &SensorHandle) {
        #[cfg(test)]
        self.hooks.unregister_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&handle.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_absent_sensor() {
        let service = VirtualSensorService::new().with_sensor("xiaomi.sensor.pickup", 1.0);
        assert!(service.get_sensor("xiaomi.sensor.pickup").is_some());
        assert!(service.get_sensor("xiaomi.sensor.aod").is_none());
    }

    #[test]
    fn test_inject_without_listener() {
        let service = VirtualSensorService::new().with_sensor("xiaomi.sensor.pickup", 1.0);
        assert!(!service.inject("xiaomi.sensor.pickup", 1.0));
        assert!(!service.inject("unknown", 1.0));
    }

    #[test]
    fn test_sensor_ids_sorted() {
        let service = VirtualSensorService::new()
            .with_sensor("b", 1.0)
            .with_sensor("a", 1.0);
        assert_eq!(service.sensor_ids(), vec!["a", "b"]);
    }
}
