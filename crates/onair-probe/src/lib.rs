//! Microphone-in-use probes for onair.
//!
//! A probe answers one question when polled: is something recording from the
//! microphone right now, and who. Probes are polled on the engine's cadence
//! and may block, so callers must not hold locks around `poll`.

mod procfs;

pub use onair_core::MicReading;
pub use procfs::ProcfsProbe;
use thiserror::Error;

/// Errors that can occur while probing the microphone.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("microphone probe unavailable: {0}")]
    Unavailable(String),

    #[error("microphone probing is not supported on this platform")]
    Unsupported,

    #[error("probe I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Trait for microphone probes.
///
/// Implement this trait to add detection for a new platform or source.
pub trait MicProbe: Send + Sync {
    /// Take a fresh reading.
    fn poll(&self) -> Result<MicReading>;

    /// Returns the name of this probe for logging/debugging.
    fn name(&self) -> &str;
}

/// Probe used where no detection is implemented. Always fails, which the
/// engine treats as "not in use".
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedProbe;

impl MicProbe for UnsupportedProbe {
    fn poll(&self) -> Result<MicReading> {
        Err(ProbeError::Unsupported)
    }

    fn name(&self) -> &str {
        "unsupported"
    }
}

/// The probe for the platform we were built for.
pub fn default_probe() -> Box<dyn MicProbe> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcfsProbe::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        tracing::warn!("microphone detection is not implemented for this platform");
        Box::new(UnsupportedProbe)
    }
}
