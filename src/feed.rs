//! Line-oriented event feed
//!
//! The daemon reads screen transitions and sensor readings from stdin, one
//! command per line:
//!
//! ```text
//! screen off
//! sensor pickup 1
//! sleep 3000
//! sensor xiaomi.sensor.aod 4
//! screen on
//! ```

use std::io::BufRead;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::SensorsConfig;
use crate::error::{DozeError, Result};
use crate::screen::{ScreenBroadcaster, ScreenEvent};
use crate::sensors::virtual_service::VirtualSensorService;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    Screen(ScreenEvent),
    Sensor { name: String, value: f32 },
    Sleep(Duration),
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<FeedCommand>> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let malformed = |reason: &str| DozeError::Feed {
        line: line.to_string(),
        reason: reason.to_string(),
    };
    let parts: Vec<&str> = line.split_whitespace().collect();

    let command = match parts.as_slice() {
        ["screen", "on"] => FeedCommand::Screen(ScreenEvent::On),
        ["screen", "off"] => FeedCommand::Screen(ScreenEvent::Off),
        ["screen", ..] => return Err(malformed("expected 'screen on' or 'screen off'")),
        ["sensor", name, value] => {
            let value = value
                .parse::<f32>()
                .map_err(|_| malformed("sensor value is not a number"))?;
            FeedCommand::Sensor {
                name: name.to_string(),
                value,
            }
        }
        ["sensor", ..] => return Err(malformed("expected 'sensor <name> <value>'")),
        ["sleep", millis] => {
            let millis = millis
                .parse::<u64>()
                .map_err(|_| malformed("sleep takes milliseconds"))?;
            FeedCommand::Sleep(Duration::from_millis(millis))
        }
        _ => return Err(malformed("unknown command")),
    };
    Ok(Some(command))
}

/// Where feed commands are delivered
pub struct FeedTargets<'a> {
    pub screen: &'a ScreenBroadcaster,
    pub sensors: &'a VirtualSensorService,
    pub sensor_ids: &'a SensorsConfig,
}

impl FeedTargets<'_> {
    pub async fn apply(&self, command: FeedCommand) {
        match command {
            FeedCommand::Screen(event) => {
                self.screen.broadcast(event);
            }
            FeedCommand::Sensor { name, value } => {
                let id = self.sensor_ids.resolve(&name);
                if !self.sensors.inject(id, value) {
                    tracing::debug!("No listener on {}, reading {} dropped", id, value);
                }
            }
            FeedCommand::Sleep(duration) => tokio::time::sleep(duration).await,
        }
    }
}

/// Read lines on a dedicated thread. A blocked read never holds up runtime
/// shutdown; the thread ends at EOF or once the receiver is gone.
pub fn spawn_reader<R>(reader: R) -> std::io::Result<mpsc::Receiver<std::io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    std::thread::Builder::new()
        .name("feed-reader".into())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Run the feed until EOF. Malformed lines are logged and skipped.
pub async fn run(
    mut lines: mpsc::Receiver<std::io::Result<String>>,
    targets: FeedTargets<'_>,
) -> std::io::Result<usize> {
    let mut applied = 0;

    while let Some(line) = lines.recv().await {
        let line = line?;
        match parse_line(&line) {
            Ok(Some(command)) => {
                targets.apply(command).await;
                applied += 1;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{}", e),
        }
    }

    tracing::info!("Event feed closed after {} command(s)", applied);
    Ok(applied)
}
