//! Status devices shipped with the app.

mod command;
mod notify;
mod tray;

use std::sync::Arc;

pub use command::CommandDevice;
pub use notify::NotifyDevice;
use onair_core::Config;
use onair_engine::StatusDevice;
use tao::event_loop::EventLoopProxy;
pub use tray::TrayDevice;

use crate::event::OnAirEvent;

/// Every device the config asks for, tray icon first.
pub fn from_config(
    config: &Config,
    event_sender: EventLoopProxy<OnAirEvent>,
) -> Vec<Arc<dyn StatusDevice>> {
    let mut devices: Vec<Arc<dyn StatusDevice>> = vec![Arc::new(TrayDevice::new(event_sender))];
    if config.notifications {
        devices.push(Arc::new(NotifyDevice::new()));
    }
    for light in &config.lights {
        devices.push(Arc::new(CommandDevice::from_config(light)));
    }
    devices
}
