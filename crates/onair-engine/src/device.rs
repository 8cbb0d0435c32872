//! The status device capability.
//!
//! A status device is any sink that renders the derived status: a tray icon,
//! a USB light, a notification. Devices get one rich command per cycle and
//! are free to ignore the parts they have no use for. Simple RGB devices
//! only implement `set_color` and inherit `set_status`.

use std::time::SystemTime;

use onair_core::{AwayUntil, Category, DerivedStatus, Rgb};
use thiserror::Error;

/// Errors reported by status devices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device is not reachable
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// The device is reachable but rejected or failed the command
    #[error("device command failed: {0}")]
    CommandFailed(String),
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Everything a device might want to know about the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCommand {
    pub category: Category,
    pub color: Rgb,
    pub effective_in_use: bool,
    pub manual_busy: bool,
    pub manual_free: bool,
    pub ignore_until: Option<AwayUntil>,
}

impl From<&DerivedStatus> for StatusCommand {
    fn from(status: &DerivedStatus) -> Self {
        Self {
            category: status.category,
            color: status.category.color(),
            effective_in_use: status.effective_in_use,
            manual_busy: status.overrides.manual_busy(),
            manual_free: status.overrides.manual_free(),
            ignore_until: status.overrides.ignore_until(),
        }
    }
}

/// What a device reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_color: Option<Rgb>,
}

/// Trait for status devices.
///
/// Methods take `&self` because the engine calls them without holding its
/// own lock; implementations keep whatever state they need behind their own
/// synchronization.
pub trait StatusDevice: Send + Sync {
    /// Returns the name of this device for logging and display.
    fn name(&self) -> &str;

    /// Open the device. Called at startup and whenever the engine finds the
    /// device disconnected.
    fn connect(&self) -> Result<()>;

    /// Close the device. Whether that turns it off is up to the device.
    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    fn set_color(&self, color: Rgb) -> Result<()>;

    /// Render a status. The default shows the category color.
    fn set_status(&self, command: &StatusCommand) -> Result<()> {
        self.set_color(command.color)
    }

    fn status(&self) -> DeviceStatus;
}

/// The engine's view of one attached device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHealth {
    pub name: String,
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_command_at: Option<SystemTime>,
    pub last_color: Option<Rgb>,
}

impl DeviceHealth {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            last_error: None,
            last_command_at: None,
            last_color: None,
        }
    }

    pub(crate) fn record_success(&mut self, color: Rgb, at: SystemTime) {
        self.connected = true;
        self.last_error = None;
        self.last_command_at = Some(at);
        self.last_color = Some(color);
    }

    pub(crate) fn record_failure(&mut self, error: &DeviceError) {
        self.connected = false;
        self.last_error = Some(error.to_string());
    }
}
