//! Doze service lifecycle: wiring at start, teardown at stop

use std::sync::Arc;

use crate::actuators::DozeActuator;
use crate::config::{PolicySource, SensorsConfig};
use crate::orchestrator::{Channels, DozeOrchestrator};
use crate::screen::{ScreenStateSource, SubscriptionId};
use crate::sensors::ambient::AmbientBrightnessMapper;
use crate::sensors::pickup::PickupDebouncer;
use crate::sensors::proximity::ProximityGestures;
use crate::sensors::{SensorChannel, SensorService};

pub struct DozeService {
    orchestrator: Arc<DozeOrchestrator>,
    screen: Arc<dyn ScreenStateSource>,
    subscription: SubscriptionId,
}

impl DozeService {
    /// Create the three channels, wire the orchestrator and subscribe it to
    /// screen transitions. Must be called from within a tokio runtime.
    pub fn start(
        sensors: Arc<dyn SensorService>,
        sensor_ids: &SensorsConfig,
        actuator: Arc<dyn DozeActuator>,
        policy: Arc<dyn PolicySource>,
        screen: Arc<dyn ScreenStateSource>,
    ) -> Self {
        tracing::info!("Starting doze service");

        let channels = Channels {
            pickup: Arc::new(SensorChannel::spawn(
                "pickup",
                &sensor_ids.pickup,
                sensors.clone(),
                Box::new(PickupDebouncer::new(actuator.clone())),
            )),
            proximity: Arc::new(SensorChannel::spawn(
                "proximity",
                &sensor_ids.proximity,
                sensors.clone(),
                Box::new(ProximityGestures::new(policy.clone(), actuator.clone())),
            )),
            ambient: Arc::new(SensorChannel::spawn(
                "ambient",
                &sensor_ids.ambient,
                sensors,
                Box::new(AmbientBrightnessMapper::new(actuator.clone())),
            )),
        };

        for channel in channels.all() {
            if !channel.is_available() {
                tracing::info!("{}: sensor not present, channel inactive", channel.name());
            }
        }

        let orchestrator = Arc::new(DozeOrchestrator::new(policy, actuator, channels));
        let subscription = screen.subscribe(orchestrator.clone());

        Self {
            orchestrator,
            screen,
            subscription,
        }
    }

    #[cfg(test)]
    pub fn orchestrator(&self) -> &Arc<DozeOrchestrator> {
        &self.orchestrator
    }

    /// Detach from screen events, disable every channel and wait for the
    /// channel workers to exit.
    pub async fn stop(self) {
        tracing::info!("Stopping doze service");
        if !self.screen.unsubscribe(self.subscription) {
            tracing::warn!("Screen subscription was already gone");
        }

        // Ambient is released too, not only pickup and proximity
        self.orchestrator.disable_all();
        for channel in self.orchestrator.channels().all() {
            channel.close().await;
        }
        tracing::info!("Doze service stopped");
    }
}
