//! ALSA capture detection through procfs.
//!
//! Every open capture substream shows up under
//! `asound/card<N>/pcm<D>c/sub<S>/status`; a stream that is actually
//! recording reports `state: RUNNING`. The processes responsible are the
//! ones holding `/dev/snd/pcmC<N>D<D>c` open. With PipeWire or PulseAudio in
//! between, the sound server is what shows up as the culprit.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::{MicProbe, MicReading, ProbeError, Result};

const DEFAULT_PROC_ROOT: &str = "/proc";

/// Linux probe reading ALSA state from procfs.
#[derive(Debug, Clone)]
pub struct ProcfsProbe {
    root: PathBuf,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsProbe {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_PROC_ROOT)
    }

    /// Read from a procfs mounted (or mocked) somewhere other than `/proc`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Capture devices with a running substream, as `(card, device)`.
    fn running_captures(&self) -> Result<Vec<(u32, u32)>> {
        let asound = self.root.join("asound");
        let cards = fs::read_dir(&asound).map_err(|e| {
            ProbeError::Unavailable(format!("cannot read {}: {}", asound.display(), e))
        })?;

        let mut running = Vec::new();
        for card in cards {
            let card = card?;
            let Some(card_no) = numeric_suffix(&card.file_name(), "card", "") else {
                continue;
            };
            for pcm in read_dir_or_empty(&card.path())? {
                let Some(device_no) = numeric_suffix(&pcm.file_name(), "pcm", "c") else {
                    continue;
                };
                if any_substream_running(&pcm.path())? {
                    running.push((card_no, device_no));
                }
            }
        }
        running.sort_unstable();
        Ok(running)
    }

    /// Names of processes holding any of the given device nodes open.
    fn holders(&self, devices: &[String]) -> Result<Vec<String>> {
        let mut pids: Vec<u32> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();

        let mut apps = Vec::new();
        for pid in pids {
            let proc_dir = self.root.join(pid.to_string());
            // Other users' fd tables are not readable, skip them.
            let Ok(fds) = fs::read_dir(proc_dir.join("fd")) else {
                continue;
            };
            let holds_device = fds.filter_map(|fd| fd.ok()).any(|fd| {
                fs::read_link(fd.path())
                    .map(|target| devices.iter().any(|dev| target.as_path() == Path::new(dev)))
                    .unwrap_or(false)
            });
            if !holds_device {
                continue;
            }
            let name = fs::read_to_string(proc_dir.join("comm"))
                .map(|comm| comm.trim().to_string())
                .unwrap_or_else(|_| format!("pid {}", pid));
            trace!(pid, name = %name, "capture device holder");
            if !apps.contains(&name) {
                apps.push(name);
            }
        }
        Ok(apps)
    }
}

impl MicProbe for ProcfsProbe {
    fn poll(&self) -> Result<MicReading> {
        let running = self.running_captures()?;
        if running.is_empty() {
            return Ok(MicReading::idle());
        }

        let devices: Vec<String> = running
            .iter()
            .map(|(card, device)| format!("/dev/snd/pcmC{}D{}c", card, device))
            .collect();
        let using_apps = self.holders(&devices)?;
        debug!(?devices, ?using_apps, "capture running");

        Ok(MicReading {
            in_use: true,
            using_apps,
        })
    }

    fn name(&self) -> &str {
        "procfs"
    }
}

/// Parse `<prefix><number><suffix>`, e.g. `pcm0c` with prefix `pcm` and
/// suffix `c`.
fn numeric_suffix(name: &std::ffi::OsStr, prefix: &str, suffix: &str) -> Option<u32> {
    name.to_str()?
        .strip_prefix(prefix)?
        .strip_suffix(suffix)?
        .parse()
        .ok()
}

fn read_dir_or_empty(path: &Path) -> Result<Vec<fs::DirEntry>> {
    match fs::read_dir(path) {
        Ok(entries) => Ok(entries.collect::<io::Result<_>>()?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn any_substream_running(pcm: &Path) -> Result<bool> {
    for sub in read_dir_or_empty(pcm)? {
        if !sub.file_name().to_string_lossy().starts_with("sub") {
            continue;
        }
        let status = match fs::read_to_string(sub.path().join("status")) {
            Ok(status) => status,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if is_running(&status) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// A closed substream reads just `closed`; an open one lists `key: value`
/// lines starting with `state:`.
fn is_running(status: &str) -> bool {
    status
        .lines()
        .filter_map(|line| line.split_once(':'))
        .any(|(key, value)| key.trim() == "state" && value.trim() == "RUNNING")
}
