//! Doze control through panel device files

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use super::{DozeActuator, DozeMode, DozeStatus};
use crate::config::ActuatorConfig;
use crate::error::{DozeError, Result};

#[derive(Debug)]
pub struct SysfsActuator {
    config: ActuatorConfig,
    // Channel workers may write concurrently
    write_lock: Mutex<()>,
}

impl SysfsActuator {
    pub fn new(config: ActuatorConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    fn write(&self, path: &Path, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        fs::write(path, value).map_err(|source| DozeError::ActuatorWrite {
            path: path.to_path_buf(),
            value: value.to_string(),
            source,
        })?;
        tracing::debug!("Wrote '{}' to {}", value, path.display());
        Ok(())
    }
}

impl DozeActuator for SysfsActuator {
    fn set_doze_mode(&self, mode: DozeMode) -> Result<()> {
        let value = match mode {
            DozeMode::Lbm => &self.config.doze_mode_lbm,
            DozeMode::Hbm => &self.config.doze_mode_hbm,
        };
        self.write(&self.config.doze_mode_path, value)
    }

    fn set_doze_status(&self, status: DozeStatus) -> Result<()> {
        let value = match status {
            DozeStatus::Enabled => &self.config.doze_status_enabled,
            DozeStatus::Disabled => &self.config.doze_status_disabled,
        };
        self.write(&self.config.doze_status_path, value)
    }

    fn wake_or_launch_pulse(&self) -> Result<()> {
        match &self.config.pulse_path {
            Some(path) => self.write(path, &self.config.pulse_value),
            None => {
                tracing::info!("Doze pulse requested (no pulse path configured)");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dozed-sysfs-{}-{}", std::process::id(), name));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_in(dir: &Path) -> ActuatorConfig {
        ActuatorConfig {
            doze_mode_path: dir.join("doze_mode"),
            doze_status_path: dir.join("doze_status"),
            pulse_path: Some(dir.join("pulse")),
            ..ActuatorConfig::default()
        }
    }

    #[test]
    fn test_writes_configured_values() {
        let dir = scratch_dir("values");
        let actuator = SysfsActuator::new(config_in(&dir));

        actuator.set_doze_mode(DozeMode::Lbm).unwrap();
        assert_eq!(fs::read_to_string(dir.join("doze_mode")).unwrap(), "1");
        actuator.set_doze_mode(DozeMode::Hbm).unwrap();
        assert_eq!(fs::read_to_string(dir.join("doze_mode")).unwrap(), "0");

        actuator.set_doze_status(DozeStatus::Enabled).unwrap();
        assert_eq!(fs::read_to_string(dir.join("doze_status")).unwrap(), "1");
        actuator.set_doze_status(DozeStatus::Disabled).unwrap();
        assert_eq!(fs::read_to_string(dir.join("doze_status")).unwrap(), "0");

        actuator.wake_or_launch_pulse().unwrap();
        assert_eq!(fs::read_to_string(dir.join("pulse")).unwrap(), "1");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_device_file_reports_write_failure() {
        let dir = scratch_dir("missing");
        let mut config = config_in(&dir);
        config.doze_mode_path = dir.join("no-such-dir").join("doze_mode");
        let actuator = SysfsActuator::new(config);

        let err = actuator.set_doze_mode(DozeMode::Lbm).unwrap_err();
        assert!(matches!(err, DozeError::ActuatorWrite { .. }));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_pulse_without_path_is_ok() {
        let actuator = SysfsActuator::new(ActuatorConfig::default());
        assert!(actuator.wake_or_launch_pulse().is_ok());
    }
}
