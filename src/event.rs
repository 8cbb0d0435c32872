//! Application events for the tao event loop.

use onair_core::Rgb;

/// Events for the tao event loop, sent from the monitor's threads.
#[derive(Debug, Clone)]
pub enum OnAirEvent {
    /// Recolor the tray icon
    SetIcon(Rgb),
}
