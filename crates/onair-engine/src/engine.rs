//! The status reconciliation engine.
//!
//! One cycle: snapshot the overrides under the lock, poll the probe and talk
//! to devices without it, then take the lock again to publish the new status
//! and device health. Cycles never fail. Probe errors fall back to "not in
//! use" and device errors end up in that device's health entry.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use onair_core::{
    Clock, DerivedStatus, InvalidArgument, MicReading, OverrideState, SystemClock,
};
use onair_probe::MicProbe;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::device::{DeviceError, DeviceHealth, StatusCommand, StatusDevice};

/// A copy of the engine's published state, safe to hold while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: DerivedStatus,
    pub devices: Vec<DeviceHealth>,
}

struct Shared {
    overrides: OverrideState,
    /// Bumped on every override change so a cycle can tell it raced a setter
    revision: u64,
    /// Latest successful probe reading, `None` after a failed poll
    last_reading: Option<MicReading>,
    status: DerivedStatus,
    health: Vec<DeviceHealth>,
}

impl Shared {
    fn publish(&mut self, status: DerivedStatus) {
        if status.category != self.status.category {
            info!(
                from = %self.status.category,
                to = %status.category,
                using_apps = ?status.using_apps,
                "status changed"
            );
        }
        self.status = status;
    }
}

enum Outcome {
    Sent,
    Failed(DeviceError),
}

pub struct Engine {
    probe: Arc<dyn MicProbe>,
    devices: Vec<Arc<dyn StatusDevice>>,
    clock: Arc<dyn Clock>,
    shared: Mutex<Shared>,
    wake: Notify,
}

impl Engine {
    /// Create an engine in automatic mode. No I/O happens until the first
    /// cycle or [`Engine::connect_devices`].
    pub fn new(probe: Arc<dyn MicProbe>, devices: Vec<Arc<dyn StatusDevice>>) -> Self {
        let health = devices.iter().map(|d| DeviceHealth::new(d.name())).collect();
        Self {
            probe,
            devices,
            clock: Arc::new(SystemClock),
            shared: Mutex::new(Shared {
                overrides: OverrideState::default(),
                revision: 0,
                last_reading: None,
                status: DerivedStatus::default(),
                health,
            }),
            wake: Notify::new(),
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_manual_busy(&self) {
        self.change_overrides(|overrides, _| {
            overrides.set_manual_busy();
            Ok(())
        })
        .ok();
    }

    pub fn set_manual_free(&self) {
        self.change_overrides(|overrides, _| {
            overrides.set_manual_free();
            Ok(())
        })
        .ok();
    }

    /// Busy for `duration`, then back to automatic mode.
    pub fn set_manual_busy_for(&self, duration: Duration) -> Result<(), InvalidArgument> {
        self.change_overrides(|overrides, now| overrides.set_manual_busy_for(now, duration))
    }

    /// Available for `duration`, then back to automatic mode.
    pub fn set_manual_free_for(&self, duration: Duration) -> Result<(), InvalidArgument> {
        self.change_overrides(|overrides, now| overrides.set_manual_free_for(now, duration))
    }

    /// Away for `duration`, ignoring the microphone. Replaces any earlier
    /// Away deadline.
    pub fn ignore_for(&self, duration: Duration) -> Result<(), InvalidArgument> {
        self.change_overrides(|overrides, now| overrides.ignore_for(now, duration))
    }

    /// Away until another override replaces it.
    pub fn away_indefinitely(&self) {
        self.change_overrides(|overrides, _| {
            overrides.away_indefinitely();
            Ok(())
        })
        .ok();
    }

    /// Return to automatic, microphone-driven mode.
    pub fn clear_override(&self) {
        self.change_overrides(|overrides, _| {
            overrides.clear();
            Ok(())
        })
        .ok();
    }

    /// Apply an override change and republish from the last reading, so
    /// queries see the change before the next cycle reaches the devices.
    fn change_overrides<F>(&self, change: F) -> Result<(), InvalidArgument>
    where
        F: FnOnce(&mut OverrideState, SystemTime) -> Result<(), InvalidArgument>,
    {
        let now = self.clock.now();
        {
            let mut shared = self.shared.lock();
            change(&mut shared.overrides, now)?;
            shared.revision += 1;
            debug!(overrides = ?shared.overrides, "overrides changed");
            let status = shared.overrides.derive(shared.last_reading.as_ref(), now);
            shared.publish(status);
        }
        self.wake.notify_one();
        Ok(())
    }

    /// The last published status and device health. Never touches the probe.
    pub fn status(&self) -> StatusSnapshot {
        let shared = self.shared.lock();
        StatusSnapshot {
            status: shared.status.clone(),
            devices: shared.health.clone(),
        }
    }

    /// Run one reconciliation cycle and return the status it published.
    pub fn reconcile(&self) -> DerivedStatus {
        let now = self.clock.now();
        let (overrides, revision, connected) = {
            let mut shared = self.shared.lock();
            if shared.overrides.expire(now) {
                shared.revision += 1;
                info!("timed override expired, back to automatic mode");
            }
            let connected: Vec<bool> = shared.health.iter().map(|h| h.connected).collect();
            (shared.overrides.clone(), shared.revision, connected)
        };

        let reading = match self.probe.poll() {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!(probe = self.probe.name(), error = %e, "microphone probe failed, assuming not in use");
                None
            }
        };

        let status = overrides.derive(reading.as_ref(), now);
        let command = StatusCommand::from(&status);
        let outcomes: Vec<Outcome> = self
            .devices
            .iter()
            .zip(connected)
            .map(|(device, connected)| send(device.as_ref(), connected, &command))
            .collect();

        let mut shared = self.shared.lock();
        shared.last_reading = reading;
        for (health, outcome) in shared.health.iter_mut().zip(&outcomes) {
            match outcome {
                Outcome::Sent => health.record_success(command.color, now),
                Outcome::Failed(e) => health.record_failure(e),
            }
        }
        // A setter ran while we were unlocked, its overrides win. The wake
        // it left behind gets devices the fresh command next cycle.
        let status = if shared.revision == revision {
            status
        } else {
            shared.overrides.derive(shared.last_reading.as_ref(), now)
        };
        shared.publish(status.clone());
        status
    }

    /// Try to open every device once, recording the outcome in its health.
    pub fn connect_devices(&self) {
        let results: Vec<_> = self
            .devices
            .iter()
            .map(|device| {
                let result = device.connect();
                match &result {
                    Ok(()) => info!(device = device.name(), "device connected"),
                    Err(e) => warn!(device = device.name(), error = %e, "device not available"),
                }
                result
            })
            .collect();

        let mut shared = self.shared.lock();
        for (health, result) in shared.health.iter_mut().zip(results) {
            match result {
                Ok(()) => {
                    health.connected = true;
                    health.last_error = None;
                }
                Err(e) => health.record_failure(&e),
            }
        }
    }

    /// Close every device. Devices keep whatever they last showed unless
    /// their own disconnect turns them off.
    pub fn disconnect_devices(&self) {
        for device in &self.devices {
            device.disconnect();
            debug!(device = device.name(), status = ?device.status(), "device disconnected");
        }
        let mut shared = self.shared.lock();
        for health in shared.health.iter_mut() {
            health.connected = false;
        }
    }

    /// Resolves after an override change asks for a prompt cycle.
    pub(crate) async fn woken(&self) {
        self.wake.notified().await
    }
}

/// Push one command to one device, reconnecting once if it looks closed.
fn send(device: &dyn StatusDevice, connected: bool, command: &StatusCommand) -> Outcome {
    if !connected || !device.is_connected() {
        if let Err(e) = device.connect() {
            let e = match e {
                DeviceError::Disconnected(_) => e,
                other => DeviceError::Disconnected(other.to_string()),
            };
            warn!(device = device.name(), error = %e, "device reconnect failed");
            return Outcome::Failed(e);
        }
        info!(device = device.name(), "device reconnected");
    }

    match device.set_status(command) {
        Ok(()) => Outcome::Sent,
        Err(e) => {
            warn!(device = device.name(), error = %e, "device command failed");
            Outcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use onair_core::{AwayUntil, Category, ManualClock, Rgb};

    use super::*;
    use crate::testing::{FakeDevice, FakeProbe};

    const MINUTE: Duration = Duration::from_secs(60);

    struct Harness {
        engine: Engine,
        probe: Arc<FakeProbe>,
        clock: Arc<ManualClock>,
        devices: Vec<Arc<FakeDevice>>,
    }

    fn harness(reading: MicReading, device_names: &[&str]) -> Harness {
        let probe = Arc::new(FakeProbe::new(reading));
        let clock = Arc::new(ManualClock::default());
        let devices: Vec<Arc<FakeDevice>> = device_names
            .iter()
            .map(|name| Arc::new(FakeDevice::new(name)))
            .collect();
        let attached: Vec<Arc<dyn StatusDevice>> = devices
            .iter()
            .map(|d| d.clone() as Arc<dyn StatusDevice>)
            .collect();
        let engine = Engine::new(probe.clone(), attached).with_clock(clock.clone());
        Harness {
            engine,
            probe,
            clock,
            devices,
        }
    }

    #[test]
    fn test_idle_microphone_is_available() {
        let h = harness(MicReading::idle(), &["light"]);
        h.engine.reconcile();

        let snapshot = h.engine.status();
        assert_eq!(snapshot.status.category, Category::Available);
        assert_eq!(h.devices[0].last_color(), Some(Rgb::new(0, 255, 0)));
        assert!(snapshot.devices[0].connected);
        assert!(snapshot.devices[0].last_command_at.is_some());
    }

    #[test]
    fn test_microphone_in_use_is_busy() {
        let h = harness(MicReading::in_use_by(["Zoom"]), &["light"]);
        h.engine.reconcile();

        let status = h.engine.status().status;
        assert_eq!(status.category, Category::Busy);
        assert_eq!(status.using_apps, vec!["Zoom".to_string()]);
        assert_eq!(h.devices[0].last_color(), Some(Rgb::new(255, 0, 0)));
    }

    #[test]
    fn test_ignore_shows_away_over_microphone() {
        let h = harness(MicReading::in_use_by(["Zoom"]), &["light"]);
        h.engine.ignore_for(30 * MINUTE).unwrap();
        h.engine.reconcile();

        let status = h.engine.status().status;
        assert_eq!(status.category, Category::Away);
        assert!(!status.effective_in_use);
        assert_eq!(h.devices[0].last_color(), Some(Rgb::new(255, 255, 0)));
    }

    #[test]
    fn test_manual_busy_holds_while_microphone_flips() {
        let h = harness(MicReading::idle(), &["light"]);
        h.engine.set_manual_busy();
        for cycle in 0..10 {
            if cycle % 2 == 0 {
                h.probe.set(MicReading::in_use_by(["Zoom"]));
            } else {
                h.probe.set(MicReading::idle());
            }
            assert_eq!(h.engine.reconcile().category, Category::Busy);
            h.clock.advance(Duration::from_secs(1));
        }
        assert!(h.devices[0].colors.lock().iter().all(|c| *c == Rgb::RED));
    }

    #[test]
    fn test_ignore_expires_back_to_automatic() {
        let h = harness(MicReading::idle(), &["light"]);
        h.engine.ignore_for(MINUTE).unwrap();
        assert_eq!(h.engine.reconcile().category, Category::Away);

        h.clock.advance(MINUTE + Duration::from_secs(1));
        assert_eq!(h.engine.reconcile().category, Category::Available);
        assert_eq!(h.engine.status().status.overrides, OverrideState::default());
    }

    #[test]
    fn test_second_ignore_replaces_deadline() {
        let h = harness(MicReading::in_use_by(["Meet"]), &[]);
        h.engine.ignore_for(60 * MINUTE).unwrap();
        h.engine.ignore_for(2 * MINUTE).unwrap();

        h.clock.advance(MINUTE);
        assert_eq!(h.engine.reconcile().category, Category::Away);
        h.clock.advance(MINUTE + Duration::from_secs(1));
        assert_eq!(h.engine.reconcile().category, Category::Busy);
    }

    #[test]
    fn test_timed_manual_reverts() {
        let h = harness(MicReading::in_use_by(["Zoom"]), &[]);
        h.engine.set_manual_free_for(30 * MINUTE).unwrap();
        assert_eq!(h.engine.reconcile().category, Category::Available);

        // A newer untimed override is not undone by the old deadline.
        h.engine.set_manual_free();
        h.clock.advance(31 * MINUTE);
        assert_eq!(h.engine.reconcile().category, Category::Available);

        h.engine.set_manual_busy_for(MINUTE).unwrap();
        assert_eq!(h.engine.reconcile().category, Category::Busy);
        h.clock.advance(2 * MINUTE);
        h.probe.set(MicReading::idle());
        assert_eq!(h.engine.reconcile().category, Category::Available);
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let h = harness(MicReading::idle(), &[]);
        h.engine.set_manual_busy();
        assert!(h.engine.ignore_for(Duration::ZERO).is_err());
        assert!(h.engine.set_manual_busy_for(Duration::ZERO).is_err());
        assert!(h.engine.status().status.overrides.manual_busy());
    }

    #[test]
    fn test_probe_failure_falls_back_to_available() {
        let h = harness(MicReading::in_use_by(["Zoom"]), &["light"]);
        assert_eq!(h.engine.reconcile().category, Category::Busy);

        h.probe.fail();
        let status = h.engine.reconcile();
        assert_eq!(status.category, Category::Available);
        assert!(!status.effective_in_use);
        assert_eq!(h.devices[0].last_color(), Some(Rgb::GREEN));
    }

    #[test]
    fn test_failing_device_does_not_block_others() {
        let h = harness(MicReading::idle(), &["first", "second"]);
        h.devices[0].fail_commands.store(true, Ordering::SeqCst);
        h.engine.reconcile();

        let snapshot = h.engine.status();
        assert!(!snapshot.devices[0].connected);
        assert!(snapshot.devices[0].last_error.is_some());
        assert!(snapshot.devices[1].connected);
        assert_eq!(snapshot.devices[1].last_error, None);
        assert_eq!(h.devices[1].last_color(), Some(Rgb::GREEN));
    }

    #[test]
    fn test_reconnects_once_per_cycle() {
        let h = harness(MicReading::idle(), &["light"]);
        h.devices[0].fail_connect.store(true, Ordering::SeqCst);
        h.engine.reconcile();
        assert_eq!(h.devices[0].connects.load(Ordering::SeqCst), 1);
        let health = &h.engine.status().devices[0];
        assert!(!health.connected);
        assert!(health.last_error.as_deref().unwrap().contains("disconnected"));
        assert_eq!(h.devices[0].sent(), 0);

        // Plugged back in: next cycle reconnects and sends.
        h.devices[0].fail_connect.store(false, Ordering::SeqCst);
        h.engine.reconcile();
        assert_eq!(h.devices[0].connects.load(Ordering::SeqCst), 2);
        assert_eq!(h.devices[0].sent(), 1);
        assert!(h.engine.status().devices[0].connected);
    }

    #[test]
    fn test_connected_device_is_not_reconnected() {
        let h = harness(MicReading::idle(), &["light"]);
        h.engine.connect_devices();
        h.engine.reconcile();
        h.engine.reconcile();
        assert_eq!(h.devices[0].connects.load(Ordering::SeqCst), 1);
        assert_eq!(h.devices[0].sent(), 2);
    }

    #[test]
    fn test_clear_restores_automatic_category() {
        for reading in [MicReading::idle(), MicReading::in_use_by(["Zoom"])] {
            let h = harness(reading, &[]);
            let automatic = h.engine.reconcile().category;

            h.engine.set_manual_busy();
            assert_eq!(h.engine.reconcile().category, Category::Busy);
            h.engine.clear_override();
            assert_eq!(h.engine.reconcile().category, automatic);

            h.engine.set_manual_free();
            assert_eq!(h.engine.reconcile().category, Category::Available);
            h.engine.clear_override();
            assert_eq!(h.engine.reconcile().category, automatic);
        }
    }

    #[tokio::test]
    async fn test_setter_during_cycle_wins() {
        let probe = Arc::new(FakeProbe::new(MicReading::idle()));
        let device = Arc::new(FakeDevice::new("light"));
        let engine = Arc::new(Engine::new(
            probe.clone(),
            vec![device.clone() as Arc<dyn StatusDevice>],
        ));

        let weak = Arc::downgrade(&engine);
        probe.on_next_poll(move || {
            if let Some(engine) = weak.upgrade() {
                engine.set_manual_busy();
            }
        });

        // The cycle sent the command it derived before the setter ran...
        let status = engine.reconcile();
        assert_eq!(device.last_color(), Some(Rgb::GREEN));

        // ...but publishes the setter's outcome.
        assert_eq!(status.category, Category::Busy);
        assert!(status.overrides.manual_busy());
        assert_eq!(engine.status().status.category, Category::Busy);

        // The setter left a wake behind for the monitor.
        tokio::time::timeout(Duration::from_millis(100), engine.woken())
            .await
            .unwrap();

        engine.reconcile();
        assert_eq!(device.last_color(), Some(Rgb::RED));
    }

    #[test]
    fn test_setter_publishes_without_probe() {
        let h = harness(MicReading::in_use_by(["Zoom"]), &[]);
        h.engine.reconcile();
        let polls = h.probe.polls.load(Ordering::SeqCst);

        h.engine.away_indefinitely();
        let status = h.engine.status().status;
        assert_eq!(status.category, Category::Away);
        assert_eq!(status.overrides.ignore_until(), Some(AwayUntil::Indefinitely));

        h.engine.clear_override();
        assert_eq!(h.engine.status().status.category, Category::Busy);
        assert_eq!(h.probe.polls.load(Ordering::SeqCst), polls);
    }

    #[test]
    fn test_disconnect_devices() {
        let h = harness(MicReading::idle(), &["a", "b"]);
        h.engine.reconcile();
        h.engine.disconnect_devices();
        for device in &h.devices {
            assert_eq!(device.disconnects.load(Ordering::SeqCst), 1);
        }
        assert!(h.engine.status().devices.iter().all(|d| !d.connected));
    }
}
