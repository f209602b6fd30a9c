//! Shared utilities for dozed

use std::time::Duration;

use crate::error::Result;

/// Format an interval for log lines
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        let secs = millis / 1000;
        let rest = millis % 1000;
        if rest == 0 {
            format!("{}s", secs)
        } else {
            format!("{}.{:03}s", secs, rest)
        }
    } else {
        let mins = millis / 60_000;
        let secs = (millis % 60_000) / 1000;
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    }
}

/// Log a failed best-effort actuator call. Returns whether it succeeded.
pub fn best_effort(action: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{} failed: {}", action, e);
            false
        }
    }
}
