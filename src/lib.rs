// Re-export from sub-crates
pub use onair_core::{
    APP_NAME, APP_NAME_PRETTY, Category, Config, ConfigManager, DEFAULT_LOG_LEVEL, Rgb,
};
pub use onair_engine::{Engine, Monitor, StatusDevice, StatusSnapshot};
pub use onair_probe::{MicProbe, default_probe};

// App-specific modules
pub mod action;
pub mod devices;
pub mod event;
pub mod icon;
pub mod label;
pub mod menu;
pub mod notify;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
