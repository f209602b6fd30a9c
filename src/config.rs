//! Configuration module for doze policy and device wiring
//!
//! Reads configuration from ~/.config/dozed/doze.toml

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// Commented template written by `dozed config` when no file exists yet
pub const TEMPLATE: &str = include_str!("../doze.toml.example");

/// How often the daemon re-reads the policy from disk
pub const POLICY_RELOAD_INTERVAL: Duration = Duration::from_secs(1);

/// User doze settings. The daemon never writes these; they come from the
/// settings UI through the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub doze_enabled: bool,
    pub always_on_enabled: bool,
    pub pickup_enabled: bool,
    pub handwave_enabled: bool,
    pub pocket_enabled: bool,
    pub doze_auto_brightness_enabled: bool,
    pub proximity_required: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            doze_enabled: true,
            always_on_enabled: false,
            pickup_enabled: false,
            handwave_enabled: false,
            pocket_enabled: false,
            doze_auto_brightness_enabled: false,
            proximity_required: false,
        }
    }
}

impl Policy {
    /// Whether any gesture needs the proximity sensor
    pub fn proximity_wanted(&self) -> bool {
        self.handwave_enabled || self.pocket_enabled
    }
}

/// Source of policy snapshots. Consulted once per screen transition.
pub trait PolicySource: Send + Sync {
    fn snapshot(&self) -> Policy;
}

impl PolicySource for Policy {
    fn snapshot(&self) -> Policy {
        self.clone()
    }
}

impl PolicySource for RwLock<Policy> {
    fn snapshot(&self) -> Policy {
        match self.read() {
            Ok(policy) => policy.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Policy kept in memory and refreshed from the config file on the blocking
/// pool. `snapshot` never touches the disk.
#[derive(Debug)]
pub struct ReloadingPolicy {
    path: Option<PathBuf>,
    current: RwLock<Policy>,
    /// Modification time of the file behind `current`
    seen: Mutex<Option<SystemTime>>,
}

impl ReloadingPolicy {
    pub fn new(path: Option<PathBuf>, initial: Policy) -> Self {
        Self {
            path,
            current: RwLock::new(initial),
            seen: Mutex::new(None),
        }
    }

    /// Re-read the file if it changed since the last reload
    pub async fn reload(&self) {
        let path = self.path.clone().or_else(Config::path);
        let seen = self.seen.lock().map(|seen| *seen).unwrap_or(None);
        let loaded = tokio::task::spawn_blocking(move || {
            let modified = path
                .as_deref()
                .and_then(|path| fs::metadata(path).and_then(|meta| meta.modified()).ok());
            if modified.is_some() && modified == seen {
                return None;
            }
            Some((modified, Config::load_from(path.as_deref()).policy))
        })
        .await;

        let (modified, policy) = match loaded {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return,
            Err(e) => {
                tracing::error!("Policy reload did not complete: {}", e);
                return;
            }
        };
        if let Ok(mut seen) = self.seen.lock() {
            *seen = modified;
        }

        let mut current = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current != policy {
            tracing::info!("Policy changed");
            tracing::debug!(?policy, "new policy");
            *current = policy;
        }
    }

    /// Reload every `period` until the policy is dropped or the task aborted
    pub fn spawn_reloader(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let policy: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires at once; the caller already loaded the file
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(policy) = policy.upgrade() else {
                    break;
                };
                policy.reload().await;
            }
        })
    }
}

impl PolicySource for ReloadingPolicy {
    fn snapshot(&self) -> Policy {
        self.current.snapshot()
    }
}

/// Sensor identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub pickup: String,
    pub ambient: String,
    pub proximity: String,
    /// Sensors present on this device, for the virtual sensor service
    pub present: Vec<PresentSensor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentSensor {
    pub id: String,
    #[serde(default = "default_max_range")]
    pub max_range: f32,
}

fn default_max_range() -> f32 {
    5.0
}

impl Default for SensorsConfig {
    fn default() -> Self {
        let pickup = "xiaomi.sensor.pickup".to_string();
        let ambient = "xiaomi.sensor.aod".to_string();
        let proximity = "android.sensor.proximity".to_string();
        let present = [&pickup, &ambient, &proximity]
            .into_iter()
            .map(|id| PresentSensor {
                id: id.clone(),
                max_range: default_max_range(),
            })
            .collect();
        Self {
            pickup,
            ambient,
            proximity,
            present,
        }
    }
}

impl SensorsConfig {
    /// Resolve a logical channel name to its sensor identifier. Anything
    /// else is taken as an identifier already.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        match name {
            "pickup" => self.pickup.as_str(),
            "ambient" | "aod" => self.ambient.as_str(),
            "proximity" => self.proximity.as_str(),
            other => other,
        }
    }
}

/// Device files and the values written to them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub doze_mode_path: PathBuf,
    pub doze_mode_lbm: String,
    pub doze_mode_hbm: String,
    pub doze_status_path: PathBuf,
    pub doze_status_enabled: String,
    pub doze_status_disabled: String,
    /// Written on pulse. Without it a pulse is only logged.
    pub pulse_path: Option<PathBuf>,
    pub pulse_value: String,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        let panel = PathBuf::from("/sys/devices/platform/soc/soc:qcom,dsi-display-primary");
        Self {
            doze_mode_path: panel.join("doze_mode"),
            doze_mode_lbm: "1".into(),
            doze_mode_hbm: "0".into(),
            doze_status_path: panel.join("doze_status"),
            doze_status_enabled: "1".into(),
            doze_status_disabled: "0".into(),
            pulse_path: None,
            pulse_value: "1".into(),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: Policy,
    pub sensors: SensorsConfig,
    pub actuator: ActuatorConfig,
}

impl Config {
    /// Get the default config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dozed").join("doze.toml"))
    }

    /// Load config from `path` (or the default path), falling back to
    /// defaults when the file is missing or unreadable
    pub fn load_from(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::path) else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("No config file found at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::read(&path) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Read and parse `path` strictly
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write `TEMPLATE` to `path` unless a file is already there. Returns
    /// whether it was created.
    pub fn write_template(path: &Path) -> anyhow::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, TEMPLATE).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }
}
