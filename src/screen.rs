//! Screen power-state signal
//!
//! Observer-style subscription: listeners are invoked synchronously on the
//! thread that broadcasts, once per event, in no particular order relative to
//! each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    On,
    Off,
}

pub trait ScreenStateListener: Send + Sync {
    fn on_screen_event(&self, event: ScreenEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub trait ScreenStateSource: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn ScreenStateListener>) -> SubscriptionId;

    /// Returns false if the subscription was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

#[derive(Default)]
pub struct ScreenBroadcaster {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn ScreenStateListener>)>>,
}

impl ScreenBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every current subscriber. Returns how many were
    /// notified.
    pub fn broadcast(&self, event: ScreenEvent) -> usize {
        // Snapshot so listeners may unsubscribe from inside the callback
        let listeners: Vec<_> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect(),
            Err(_) => return 0,
        };
        tracing::debug!("Screen {:?} -> {} listener(s)", event, listeners.len());
        for listener in &listeners {
            listener.on_screen_event(event);
        }
        listeners.len()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl ScreenStateSource for ScreenBroadcaster {
    fn subscribe(&self, listener: Arc<dyn ScreenStateListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, listener));
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}
