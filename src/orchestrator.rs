//! Screen-driven doze orchestration
//!
//! Every transition re-reads the policy and applies each flag on its own.
//! Nothing here waits for a channel to finish: enable/disable are queued and
//! the handler returns.

use std::sync::{Arc, Mutex};

use crate::actuators::{DozeActuator, DozeStatus};
use crate::config::PolicySource;
use crate::screen::{ScreenEvent, ScreenStateListener};
use crate::sensors::SensorChannel;
use crate::shared::best_effort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    On,
    Off,
}

/// The three channels the orchestrator drives
#[derive(Clone)]
pub struct Channels {
    pub pickup: Arc<SensorChannel>,
    pub proximity: Arc<SensorChannel>,
    pub ambient: Arc<SensorChannel>,
}

impl Channels {
    pub fn all(&self) -> [&Arc<SensorChannel>; 3] {
        [&self.pickup, &self.proximity, &self.ambient]
    }
}

pub struct DozeOrchestrator {
    policy: Arc<dyn PolicySource>,
    actuator: Arc<dyn DozeActuator>,
    channels: Channels,
    display: Mutex<DisplayState>,
}

impl DozeOrchestrator {
    pub fn new(policy: Arc<dyn PolicySource>, actuator: Arc<dyn DozeActuator>, channels: Channels) -> Self {
        Self {
            policy,
            actuator,
            channels,
            // Sensors start disabled, which is the screen-on configuration
            display: Mutex::new(DisplayState::On),
        }
    }

    #[cfg(test)]
    pub fn display_state(&self) -> DisplayState {
        self.display
            .lock()
            .map(|state| *state)
            .unwrap_or(DisplayState::On)
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn on_display_on(&self) {
        let policy = self.policy.snapshot();
        tracing::info!("Display on");
        tracing::debug!(?policy, "policy snapshot");
        self.set_display(DisplayState::On);

        if policy.always_on_enabled {
            best_effort("disable doze status", self.actuator.set_doze_status(DozeStatus::Disabled));
        }
        if policy.pickup_enabled {
            self.channels.pickup.disable();
        }
        if policy.proximity_wanted() {
            self.channels.proximity.disable();
        }
        if policy.doze_auto_brightness_enabled {
            self.channels.ambient.disable();
        }
    }

    pub fn on_display_off(&self) {
        let policy = self.policy.snapshot();
        tracing::info!("Display off");
        tracing::debug!(?policy, "policy snapshot");
        self.set_display(DisplayState::Off);

        if policy.always_on_enabled {
            best_effort("enable doze status", self.actuator.set_doze_status(DozeStatus::Enabled));
        }
        if policy.pickup_enabled {
            self.channels.pickup.enable();
        }
        if policy.proximity_wanted() {
            self.channels.proximity.enable();
        }
        if policy.doze_auto_brightness_enabled {
            self.channels.ambient.enable();
        }
    }

    /// Disable every channel regardless of policy
    pub fn disable_all(&self) {
        for channel in self.channels.all() {
            channel.disable();
        }
    }

    fn set_display(&self, state: DisplayState) {
        if let Ok(mut display) = self.display.lock() {
            if *display == state {
                tracing::debug!("Display already {:?}, reapplying policy", state);
            }
            *display = state;
        }
    }
}

impl ScreenStateListener for DozeOrchestrator {
    fn on_screen_event(&self, event: ScreenEvent) {
        match event {
            ScreenEvent::On => self.on_display_on(),
            ScreenEvent::Off => self.on_display_off(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::recording::{Call, RecordingActuator};
    use crate::config::Policy;
    use crate::sensors::ambient::AmbientBrightnessMapper;
    use crate::sensors::pickup::PickupDebouncer;
    use crate::sensors::proximity::ProximityGestures;
    use crate::sensors::virtual_service::VirtualSensorService;
    use crate::sensors::SensorService;
    use std::sync::RwLock;

    const PICKUP: &str = "xiaomi.sensor.pickup";
    const AMBIENT: &str = "xiaomi.sensor.aod";
    const PROXIMITY: &str = "android.sensor.proximity";

    struct Rig {
        service: Arc<VirtualSensorService>,
        actuator: Arc<RecordingActuator>,
        policy: Arc<RwLock<Policy>>,
        orchestrator: DozeOrchestrator,
    }

    impl Rig {
        fn new(policy: Policy, actuator: RecordingActuator) -> Self {
            let service = Arc::new(
                VirtualSensorService::new()
                    .with_sensor(PICKUP, 1.0)
                    .with_sensor(AMBIENT, 10.0)
                    .with_sensor(PROXIMITY, 5.0),
            );
            let actuator = Arc::new(actuator);
            let policy = Arc::new(RwLock::new(policy));
            let dyn_service: Arc<dyn SensorService> = service.clone();
            let channels = Channels {
                pickup: Arc::new(SensorChannel::spawn(
                    "pickup",
                    PICKUP,
                    dyn_service.clone(),
                    Box::new(PickupDebouncer::new(actuator.clone())),
                )),
                proximity: Arc::new(SensorChannel::spawn(
                    "proximity",
                    PROXIMITY,
                    dyn_service.clone(),
                    Box::new(ProximityGestures::new(policy.clone(), actuator.clone())),
                )),
                ambient: Arc::new(SensorChannel::spawn(
                    "ambient",
                    AMBIENT,
                    dyn_service,
                    Box::new(AmbientBrightnessMapper::new(actuator.clone())),
                )),
            };
            let orchestrator = DozeOrchestrator::new(policy.clone(), actuator.clone(), channels);
            Self {
                service,
                actuator,
                policy,
                orchestrator,
            }
        }

        async fn enabled(&self) -> [bool; 3] {
            let c = self.orchestrator.channels();
            [
                c.pickup.is_enabled().await.unwrap(),
                c.proximity.is_enabled().await.unwrap(),
                c.ambient.is_enabled().await.unwrap(),
            ]
        }
    }

    fn aod_and_pickup() -> Policy {
        Policy {
            always_on_enabled: true,
            pickup_enabled: true,
            ..Policy::default()
        }
    }

    #[tokio::test]
    async fn test_aod_pickup_cycle() {
        let rig = Rig::new(aod_and_pickup(), RecordingActuator::new());
        assert_eq!(rig.orchestrator.display_state(), DisplayState::On);

        rig.orchestrator.on_screen_event(ScreenEvent::Off);
        assert_eq!(rig.orchestrator.display_state(), DisplayState::Off);
        assert_eq!(rig.actuator.calls(), vec![Call::Status(DozeStatus::Enabled)]);
        assert_eq!(rig.enabled().await, [true, false, false]);
        assert_eq!(rig.service.register_calls(), 1);

        rig.orchestrator.on_screen_event(ScreenEvent::On);
        assert_eq!(
            rig.actuator.calls(),
            vec![Call::Status(DozeStatus::Enabled), Call::Status(DozeStatus::Disabled)]
        );
        assert_eq!(rig.enabled().await, [false, false, false]);
        // Proximity and ambient were never touched
        assert_eq!(rig.service.register_calls(), 1);
        assert_eq!(rig.service.unregister_calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_policy_without_aod() {
        let policy = Policy {
            pocket_enabled: true,
            doze_auto_brightness_enabled: true,
            ..Policy::default()
        };
        let rig = Rig::new(policy, RecordingActuator::new());

        rig.orchestrator.on_display_off();
        assert_eq!(rig.enabled().await, [false, true, true]);
        assert!(rig.actuator.calls().is_empty());

        rig.orchestrator.on_display_on();
        assert_eq!(rig.enabled().await, [false, false, false]);
        assert!(rig.actuator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_handwave_alone_enables_proximity() {
        let policy = Policy {
            handwave_enabled: true,
            ..Policy::default()
        };
        let rig = Rig::new(policy, RecordingActuator::new());

        rig.orchestrator.on_display_off();
        assert_eq!(rig.enabled().await, [false, true, false]);
    }

    #[tokio::test]
    async fn test_policy_read_fresh_each_transition() {
        let rig = Rig::new(Policy::default(), RecordingActuator::new());

        rig.orchestrator.on_display_off();
        assert_eq!(rig.enabled().await, [false, false, false]);

        rig.policy.write().unwrap().pickup_enabled = true;
        rig.orchestrator.on_display_off();
        assert_eq!(rig.enabled().await, [true, false, false]);

        // Flag turned off while the screen was off: screen-on leaves it alone
        rig.policy.write().unwrap().pickup_enabled = false;
        rig.orchestrator.on_display_on();
        assert_eq!(rig.enabled().await, [true, false, false]);
    }

    #[tokio::test]
    async fn test_actuator_failure_does_not_stop_transition() {
        let rig = Rig::new(aod_and_pickup(), RecordingActuator::failing());

        rig.orchestrator.on_display_off();
        assert_eq!(rig.actuator.calls(), vec![Call::Status(DozeStatus::Enabled)]);
        assert_eq!(rig.enabled().await, [true, false, false]);
    }

    #[tokio::test]
    async fn test_channel_events_flow_to_actuator() {
        let policy = Policy {
            doze_auto_brightness_enabled: true,
            ..Policy::default()
        };
        let rig = Rig::new(policy, RecordingActuator::new());

        rig.orchestrator.on_display_off();
        rig.orchestrator.channels().ambient.flush().await.unwrap();
        assert!(rig.service.inject(AMBIENT, 4.0));
        assert!(rig.service.inject(AMBIENT, 3.0));
        rig.orchestrator.channels().ambient.flush().await.unwrap();

        assert_eq!(
            rig.actuator.calls(),
            vec![Call::Mode(crate::actuators::DozeMode::Hbm), Call::Mode(crate::actuators::DozeMode::Lbm)]
        );
    }

    #[tokio::test]
    async fn test_disable_all_ignores_policy() {
        let policy = Policy {
            pickup_enabled: true,
            handwave_enabled: true,
            doze_auto_brightness_enabled: true,
            ..Policy::default()
        };
        let rig = Rig::new(policy, RecordingActuator::new());

        rig.orchestrator.on_display_off();
        assert_eq!(rig.enabled().await, [true, true, true]);

        *rig.policy.write().unwrap() = Policy::default();
        rig.orchestrator.disable_all();
        assert_eq!(rig.enabled().await, [false, false, false]);
    }
}
