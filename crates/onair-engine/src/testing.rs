//! Scriptable probe and device doubles for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use onair_core::{MicReading, Rgb};
use onair_probe::{MicProbe, ProbeError};
use parking_lot::Mutex;

use crate::{DeviceError, DeviceStatus, StatusDevice};

type PollHook = Box<dyn FnOnce() + Send>;

/// Probe returning whatever was last scripted.
pub struct FakeProbe {
    next: Mutex<Option<MicReading>>,
    on_poll: Mutex<Option<PollHook>>,
    pub polls: AtomicUsize,
}

impl FakeProbe {
    pub fn new(reading: MicReading) -> Self {
        Self {
            next: Mutex::new(Some(reading)),
            on_poll: Mutex::new(None),
            polls: AtomicUsize::new(0),
        }
    }

    /// Run `hook` during the next poll, before the reading is returned.
    pub fn on_next_poll(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_poll.lock() = Some(Box::new(hook));
    }

    pub fn set(&self, reading: MicReading) {
        *self.next.lock() = Some(reading);
    }

    /// Make every following poll fail.
    pub fn fail(&self) {
        *self.next.lock() = None;
    }
}

impl MicProbe for FakeProbe {
    fn poll(&self) -> onair_probe::Result<MicReading> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_poll.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        self.next
            .lock()
            .clone()
            .ok_or_else(|| ProbeError::Unavailable("scripted failure".into()))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Device that records every color it is sent.
pub struct FakeDevice {
    name: String,
    connected: AtomicBool,
    pub fail_commands: AtomicBool,
    pub fail_connect: AtomicBool,
    pub colors: Mutex<Vec<Rgb>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FakeDevice {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connected: AtomicBool::new(false),
            fail_commands: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            colors: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn last_color(&self) -> Option<Rgb> {
        self.colors.lock().last().copied()
    }

    pub fn sent(&self) -> usize {
        self.colors.lock().len()
    }
}

impl StatusDevice for FakeDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> crate::Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected("unplugged".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_color(&self, color: Rgb) -> crate::Result<()> {
        if self.fail_commands.load(Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(DeviceError::CommandFailed("write failed".into()));
        }
        self.colors.lock().push(color);
        Ok(())
    }

    fn status(&self) -> DeviceStatus {
        DeviceStatus {
            connected: self.is_connected(),
            last_error: None,
            last_color: self.last_color(),
        }
    }
}
