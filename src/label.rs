//! Human-readable text for the tray tooltip and menu.

use std::time::{Duration, SystemTime};

use onair_core::DerivedStatus;
use onair_engine::DeviceHealth;

/// Away deadlines further out than this read as plain "Away".
const AWAY_COUNTDOWN_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

/// One-line status, e.g. `● In Meeting • zoom`.
pub fn status_text(status: &DerivedStatus, now: SystemTime) -> String {
    let overrides = &status.overrides;
    if let Some(away) = overrides.ignore_until() {
        match away.remaining(now) {
            Some(left) if left <= AWAY_COUNTDOWN_LIMIT => {
                format!("◐ Away ({}m left)", left.as_secs() / 60)
            }
            _ => "◐ Away".to_string(),
        }
    } else if overrides.manual_busy() {
        "● Do Not Disturb (Busy)".to_string()
    } else if overrides.manual_free() || !status.effective_in_use {
        "○ Available".to_string()
    } else {
        match status.using_apps.first() {
            Some(app) => format!("● In Meeting • {}", app),
            None => "● In Meeting".to_string(),
        }
    }
}

/// What the microphone alone says.
pub fn microphone_text(status: &DerivedStatus) -> String {
    if status.overrides.ignore_until().is_some() {
        "Microphone ignored".to_string()
    } else if !status.detected_in_use {
        "Microphone not in use".to_string()
    } else if status.using_apps.is_empty() {
        "Microphone in use".to_string()
    } else {
        format!("Microphone in use by {}", status.using_apps.join(", "))
    }
}

/// One device's health, e.g. `flag: Red` or `flag: not connected`.
pub fn device_text(health: &DeviceHealth) -> String {
    let state = if health.connected {
        health
            .last_color
            .map(|color| color.name())
            .unwrap_or_else(|| "connected".to_string())
    } else {
        health
            .last_error
            .clone()
            .unwrap_or_else(|| "not connected".to_string())
    };
    format!("{}: {}", health.name, state)
}
