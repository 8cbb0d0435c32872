//! The tray menu. Built once, then refreshed from engine snapshots.

use std::time::SystemTime;

use onair_core::Config;
use onair_engine::StatusSnapshot;
use tray_icon::menu::{
    AboutMetadataBuilder, CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu,
};

use crate::action::MenuAction;
use crate::label::{device_text, microphone_text, status_text};
use crate::{APP_NAME_PRETTY, VERSION};

pub struct TrayMenu {
    menu: Menu,
    status: MenuItem,
    microphone: MenuItem,
    auto: CheckMenuItem,
    devices: Vec<MenuItem>,
    actions: Vec<(MenuId, MenuAction)>,
}

impl TrayMenu {
    /// Build the menu with one health line per device name.
    pub fn new(config: &Config, device_names: &[String]) -> anyhow::Result<Self> {
        let mut actions = Vec::new();
        let mut item = |text: &str, action: MenuAction| {
            let item = MenuItem::new(text, true, None);
            actions.push((item.id().clone(), action));
            item
        };

        let available = Submenu::new("○ Available (Free to Talk)", true);
        let dnd = Submenu::new("● Do Not Disturb (Busy)", true);
        let away = Submenu::new("◐ Away", true);

        available.append(&item("Until I change it", MenuAction::Available(None)))?;
        dnd.append(&item("Until I change it", MenuAction::DoNotDisturb(None)))?;
        away.append(&item("Until I change it", MenuAction::Away(None)))?;
        available.append(&PredefinedMenuItem::separator())?;
        dnd.append(&PredefinedMenuItem::separator())?;
        away.append(&PredefinedMenuItem::separator())?;
        for &minutes in &config.timed_presets {
            available.append(&item(&preset_text(minutes), MenuAction::Available(Some(minutes))))?;
            dnd.append(&item(&preset_text(minutes), MenuAction::DoNotDisturb(Some(minutes))))?;
        }
        for &minutes in &config.away_presets {
            away.append(&item(&preset_text(minutes), MenuAction::Away(Some(minutes))))?;
        }

        let copy_config = item("Copy config path", MenuAction::CopyConfigPath);
        let quit = item("Quit", MenuAction::Quit);

        let auto = CheckMenuItem::new("Auto Mode (follow microphone)", true, true, None);
        actions.push((auto.id().clone(), MenuAction::Auto));

        let status = MenuItem::new("Status: ○ Available", false, None);
        let microphone = MenuItem::new("Microphone not in use", false, None);
        let devices: Vec<MenuItem> = device_names
            .iter()
            .map(|name| MenuItem::new(name, false, None))
            .collect();

        let menu = Menu::new();
        menu.append_items(&[
            &MenuItem::new(APP_NAME_PRETTY, false, None),
            &status,
            &microphone,
            &PredefinedMenuItem::separator(),
            &available,
            &dnd,
            &away,
            &PredefinedMenuItem::separator(),
            &auto,
            &PredefinedMenuItem::separator(),
        ])?;
        for device in &devices {
            menu.append(device)?;
        }
        menu.append_items(&[
            &PredefinedMenuItem::separator(),
            &PredefinedMenuItem::about(
                None,
                Some(
                    AboutMetadataBuilder::new()
                        .version(Some(VERSION.to_owned()))
                        .build(),
                ),
            ),
            &copy_config,
            &PredefinedMenuItem::separator(),
            &quit,
        ])?;

        Ok(Self {
            menu,
            status,
            microphone,
            auto,
            devices,
            actions,
        })
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn action_for(&self, id: &MenuId) -> Option<MenuAction> {
        self.actions
            .iter()
            .find(|(item, _)| item == id)
            .map(|(_, action)| *action)
    }

    /// Update every text and check mark from a snapshot.
    pub fn refresh(&self, snapshot: &StatusSnapshot, now: SystemTime) {
        let status = &snapshot.status;
        self.status
            .set_text(format!("Status: {}", status_text(status, now)));
        self.microphone.set_text(microphone_text(status));
        self.auto.set_checked(status.overrides.is_automatic(now));
        for (item, health) in self.devices.iter().zip(&snapshot.devices) {
            item.set_text(device_text(health));
        }
    }
}

fn preset_text(minutes: u32) -> String {
    match minutes {
        60 => "1 hour".to_string(),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        m => format!("{} minutes", m),
    }
}
