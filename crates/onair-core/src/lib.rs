//! Core types and configuration for onair.
//!
//! This crate holds the platform-agnostic status model: the user's override
//! state, the raw microphone reading, and the derivation that turns the two
//! into a single status. Nothing in here performs I/O besides config files.

mod clock;
mod color;
mod config;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use color::Rgb;
pub use config::{Config, ConfigManager, LightConfig};
pub use state::{AwayUntil, Category, DerivedStatus, MicReading, OverrideState};

use thiserror::Error;

/// Application name
pub const APP_NAME: &str = "onair";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "On Air";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Rejected override parameters, such as a zero duration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument: {0}")]
pub struct InvalidArgument(pub String);
