use onair_core::Rgb;
use onair_engine::{DeviceError, DeviceStatus, Result, StatusDevice};
use parking_lot::Mutex;
use tao::event_loop::EventLoopProxy;

use crate::event::OnAirEvent;

/// The tray icon as a status device. The icon lives on the UI thread, so
/// colors travel there as event loop events; once the loop is gone the
/// device reports itself disconnected.
pub struct TrayDevice {
    event_sender: Mutex<EventLoopProxy<OnAirEvent>>,
    status: Mutex<DeviceStatus>,
}

impl TrayDevice {
    pub fn new(event_sender: EventLoopProxy<OnAirEvent>) -> Self {
        Self {
            event_sender: Mutex::new(event_sender),
            status: Mutex::new(DeviceStatus::default()),
        }
    }
}

impl StatusDevice for TrayDevice {
    fn name(&self) -> &str {
        "Tray icon"
    }

    fn connect(&self) -> Result<()> {
        let mut status = self.status.lock();
        status.connected = true;
        status.last_error = None;
        Ok(())
    }

    fn disconnect(&self) {
        self.status.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.status.lock().connected
    }

    fn set_color(&self, color: Rgb) -> Result<()> {
        let sent = self
            .event_sender
            .lock()
            .send_event(OnAirEvent::SetIcon(color));

        let mut status = self.status.lock();
        match sent {
            Ok(()) => {
                status.last_color = Some(color);
                status.last_error = None;
                Ok(())
            }
            Err(_) => {
                let error = DeviceError::Disconnected("event loop closed".to_string());
                status.connected = false;
                status.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn status(&self) -> DeviceStatus {
        self.status.lock().clone()
    }
}
