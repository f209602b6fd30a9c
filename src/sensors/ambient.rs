//! Ambient light code -> doze brightness mode

use std::sync::Arc;

use super::{SensorEvent, SensorHandler};
use crate::actuators::{DozeActuator, DozeMode};
use crate::shared::best_effort;

/// Map a raw ambient code to a brightness mode. `None` leaves the panel alone.
pub fn map_code(code: i32) -> Option<DozeMode> {
    match code {
        3 | 5 => Some(DozeMode::Lbm),
        4 => Some(DozeMode::Hbm),
        _ => None,
    }
}

pub struct AmbientBrightnessMapper {
    actuator: Arc<dyn DozeActuator>,
}

impl AmbientBrightnessMapper {
    pub fn new(actuator: Arc<dyn DozeActuator>) -> Self {
        Self { actuator }
    }
}

impl SensorHandler for AmbientBrightnessMapper {
    fn on_event(&mut self, event: &SensorEvent) {
        let Some(mode) = event.code().and_then(map_code) else {
            return;
        };
        tracing::debug!("ambient: code {} -> {:?}", event.value, mode);
        best_effort("set doze mode", self.actuator.set_doze_mode(mode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::recording::{Call, RecordingActuator};
    use tokio::time::Instant;

    #[test]
    fn test_code_table() {
        assert_eq!(map_code(3), Some(DozeMode::Lbm));
        assert_eq!(map_code(5), Some(DozeMode::Lbm));
        assert_eq!(map_code(4), Some(DozeMode::Hbm));
        for code in [-1, 0, 1, 2, 6, 100] {
            assert_eq!(map_code(code), None);
        }
    }

    #[test]
    fn test_every_qualifying_event_reapplies() {
        let actuator = Arc::new(RecordingActuator::new());
        let mut mapper = AmbientBrightnessMapper::new(actuator.clone());
        let now = Instant::now();

        for value in [3.0, 3.0, 4.0, 7.0, 4.5, 5.0] {
            mapper.on_event(&SensorEvent::new(value, now));
        }

        assert_eq!(
            actuator.calls(),
            vec![
                Call::Mode(DozeMode::Lbm),
                Call::Mode(DozeMode::Lbm),
                Call::Mode(DozeMode::Hbm),
                Call::Mode(DozeMode::Lbm),
            ]
        );
    }
}
