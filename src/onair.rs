use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use arboard::Clipboard;
use onair::action::MenuAction;
use onair::event::OnAirEvent;
use onair::label::status_text;
use onair::menu::TrayMenu;
use onair::notify::NotificationLayer;
use onair::{ConfigManager, DEFAULT_LOG_LEVEL, Engine, Monitor, default_probe, devices, icon};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tray_icon::TrayIconBuilder;
use tray_icon::menu::MenuEvent;

/// How often the menu and tooltip re-read the engine's status.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    // Load config first, it decides whether warnings pop up as notifications
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;

    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ONAIR_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .finish()
        .with(config.notifications.then(NotificationLayer::new))
        .init();

    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;

    let mut clipboard = Clipboard::new()?;

    let event_loop: EventLoop<OnAirEvent> = EventLoopBuilder::with_user_event().build();
    let event_sender = event_loop.create_proxy();

    // Wire the engine: platform probe in, every configured device out
    let status_devices = devices::from_config(&config, event_sender);
    let device_names: Vec<String> = status_devices
        .iter()
        .map(|device| device.name().to_string())
        .collect();
    let probe = default_probe();
    info!(probe = probe.name(), devices = ?device_names, "starting engine");
    let engine = Arc::new(Engine::new(Arc::from(probe), status_devices));
    let mut monitor = Some(Monitor::start(engine.clone(), config.poll_interval()?)?);

    let tray_menu = TrayMenu::new(&config, &device_names).context("Failed to build tray menu")?;
    let mut icon_tray = None;
    let menu_channel = MenuEvent::receiver();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::WaitUntil(Instant::now() + REFRESH_INTERVAL);

        match event {
            Event::NewEvents(StartCause::Init) => {
                // We create the icon once the event loop is actually running
                // to prevent issues like https://github.com/tauri-apps/tray-icon/issues/90
                let tray = icon::icon(None).and_then(|icon| {
                    TrayIconBuilder::new()
                        .with_menu(Box::new(tray_menu.menu().clone()))
                        .with_tooltip("On Air")
                        .with_icon(icon)
                        .build()
                        .context("Failed to build tray icon")
                });
                match tray {
                    Ok(tray) => {
                        icon_tray.replace(tray);
                    }
                    Err(e) => error!(error = ?e, "tray icon unavailable"),
                }

                // We have to request a redraw here to have the icon actually show up.
                // Tao only exposes a redraw method on the Window so we use core-foundation directly.
                #[cfg(target_os = "macos")]
                unsafe {
                    use core_foundation::runloop::{CFRunLoopGetMain, CFRunLoopWakeUp};

                    let rl = CFRunLoopGetMain();
                    CFRunLoopWakeUp(rl);
                }

                info!("On Air ready");
            }
            Event::UserEvent(OnAirEvent::SetIcon(color)) => {
                if let Some(tray) = icon_tray.as_ref() {
                    match icon::icon(Some(color)) {
                        Ok(icon) => {
                            if let Err(e) = tray.set_icon(Some(icon)) {
                                warn!("Failed to update tray icon: {}", e);
                            }
                        }
                        Err(e) => warn!("Failed to draw tray icon: {}", e),
                    }
                }
            }
            _ => {}
        }

        if let Ok(event) = menu_channel.try_recv() {
            match tray_menu.action_for(&event.id) {
                Some(MenuAction::Quit) => {
                    icon_tray.take();
                    if let Some(monitor) = monitor.take() {
                        monitor.stop();
                    }
                    *control_flow = ControlFlow::Exit;
                    return;
                }
                Some(MenuAction::CopyConfigPath) => {
                    if let Err(e) = clipboard
                        .set_text(config_manager.config_path().to_string_lossy().into_owned())
                    {
                        error!("Failed to copy config path to clipboard: {}", e);
                    }
                }
                Some(action) => {
                    info!(?action, "status selected");
                    if let Err(e) = action.apply(&engine) {
                        warn!("Failed to apply {:?}: {}", action, e);
                    }
                }
                None => {}
            }
        }

        // Presentation only reads the engine's published status.
        let snapshot = engine.status();
        let now = SystemTime::now();
        tray_menu.refresh(&snapshot, now);
        if let Some(tray) = icon_tray.as_ref() {
            tray.set_tooltip(Some(status_text(&snapshot.status, now))).ok();
        }
    });
}
