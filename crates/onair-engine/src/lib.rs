//! Status reconciliation for onair.
//!
//! The [`Engine`] merges the user's overrides with the latest microphone
//! reading, derives one status, and pushes the matching command to every
//! attached [`StatusDevice`]. The [`Monitor`] drives the engine on a fixed
//! cadence from a background runtime.

mod device;
mod engine;
mod monitor;

#[cfg(test)]
mod testing;

pub use device::{DeviceError, DeviceHealth, DeviceStatus, Result, StatusCommand, StatusDevice};
pub use engine::{Engine, StatusSnapshot};
pub use monitor::Monitor;
pub use onair_core::{AwayUntil, Category, DerivedStatus, InvalidArgument, Rgb};
