//! What the user can ask for from the tray menu.

use std::time::Duration;

use onair_core::InvalidArgument;
use onair_engine::Engine;

/// A menu choice. Minutes of `None` mean "until I change it".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Available(Option<u32>),
    DoNotDisturb(Option<u32>),
    Away(Option<u32>),
    Auto,
    CopyConfigPath,
    Quit,
}

impl MenuAction {
    /// Apply a status choice to the engine. App-level actions are no-ops
    /// here and handled by the event loop.
    pub fn apply(&self, engine: &Engine) -> Result<(), InvalidArgument> {
        match *self {
            MenuAction::Available(None) => engine.set_manual_free(),
            MenuAction::Available(Some(m)) => engine.set_manual_free_for(minutes(m))?,
            MenuAction::DoNotDisturb(None) => engine.set_manual_busy(),
            MenuAction::DoNotDisturb(Some(m)) => engine.set_manual_busy_for(minutes(m))?,
            MenuAction::Away(None) => engine.away_indefinitely(),
            MenuAction::Away(Some(m)) => engine.ignore_for(minutes(m))?,
            MenuAction::Auto => engine.clear_override(),
            MenuAction::CopyConfigPath | MenuAction::Quit => {}
        }
        Ok(())
    }
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}
