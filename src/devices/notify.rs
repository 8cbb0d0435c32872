//! Desktop notifications as a status device.

use onair_core::{Category, Rgb};
use onair_engine::{DeviceError, DeviceStatus, Result, StatusCommand, StatusDevice};
use parking_lot::Mutex;

use crate::notify::show;

#[derive(Default)]
struct State {
    status: DeviceStatus,
    /// Category of the last command, notified or not
    last_category: Option<Category>,
}

/// Pops a notification whenever the category changes. The status at startup
/// is not announced.
#[derive(Default)]
pub struct NotifyDevice {
    state: Mutex<State>,
}

impl NotifyDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Summary and body for a status change.
fn notification_text(command: &StatusCommand) -> (&'static str, &'static str) {
    match command.category {
        Category::Away => ("Away", "Microphone is ignored until you come back."),
        Category::Busy if command.manual_busy => ("Do Not Disturb", "Showing busy until you change it."),
        Category::Busy => ("In a call", "Your microphone is in use."),
        Category::Available => ("Available", "Free to talk."),
    }
}

/// Record the category and decide whether it is news.
fn is_change(last: &mut Option<Category>, category: Category) -> bool {
    let previous = last.replace(category);
    previous.is_some_and(|previous| previous != category)
}

impl StatusDevice for NotifyDevice {
    fn name(&self) -> &str {
        "Notifications"
    }

    fn connect(&self) -> Result<()> {
        self.state.lock().status.connected = true;
        Ok(())
    }

    fn disconnect(&self) {
        self.state.lock().status.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().status.connected
    }

    /// Notifications have no color.
    fn set_color(&self, color: Rgb) -> Result<()> {
        self.state.lock().status.last_color = Some(color);
        Ok(())
    }

    fn set_status(&self, command: &StatusCommand) -> Result<()> {
        let mut state = self.state.lock();
        state.status.last_color = Some(command.color);
        if !is_change(&mut state.last_category, command.category) {
            return Ok(());
        }

        let (summary, body) = notification_text(command);
        match show(summary, body) {
            Ok(()) => {
                state.status.last_error = None;
                Ok(())
            }
            Err(e) => {
                let error = DeviceError::CommandFailed(e.to_string());
                state.status.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn status(&self) -> DeviceStatus {
        self.state.lock().status.clone()
    }
}
