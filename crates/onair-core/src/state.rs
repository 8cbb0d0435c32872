//! Override state and status derivation.
//!
//! The user can assert a status that beats microphone detection. Overrides
//! with a deadline are never cleared by a timer: every read compares the
//! deadline against the current time and treats a passed deadline as absent.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::{InvalidArgument, Rgb};

/// The single status everyone else consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    /// Free to talk. Also the fail-safe when nothing else is known.
    #[default]
    Available,
    /// In a call, or deliberately do-not-disturb
    Busy,
    /// Stepped out, microphone ignored
    Away,
}

impl Category {
    pub fn color(&self) -> Rgb {
        match self {
            Category::Available => Rgb::GREEN,
            Category::Busy => Rgb::RED,
            Category::Away => Rgb::YELLOW,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Available => write!(f, "Available"),
            Category::Busy => write!(f, "Busy"),
            Category::Away => write!(f, "Away"),
        }
    }
}

/// How long an Away override lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwayUntil {
    /// Away until the deadline has passed
    At(SystemTime),
    /// Away until another override replaces it
    Indefinitely,
}

impl AwayUntil {
    pub fn is_active(&self, now: SystemTime) -> bool {
        match self {
            AwayUntil::At(deadline) => !has_passed(*deadline, now),
            AwayUntil::Indefinitely => true,
        }
    }

    /// Time left before the deadline, `None` when indefinite.
    pub fn remaining(&self, now: SystemTime) -> Option<Duration> {
        match self {
            AwayUntil::At(deadline) => Some(deadline.duration_since(now).unwrap_or_default()),
            AwayUntil::Indefinitely => None,
        }
    }
}

/// A deadline has passed once the current time is strictly after it.
fn has_passed(deadline: SystemTime, now: SystemTime) -> bool {
    now > deadline
}

fn deadline(now: SystemTime, duration: Duration) -> Result<SystemTime, InvalidArgument> {
    if duration.is_zero() {
        return Err(InvalidArgument("duration must be positive".to_string()));
    }
    now.checked_add(duration)
        .ok_or_else(|| InvalidArgument(format!("duration {:?} is out of range", duration)))
}

/// User-asserted overrides. `manual_busy` and `manual_free` are never both
/// set; every setter leaves at most one kind of override in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideState {
    manual_busy: bool,
    manual_free: bool,
    manual_until: Option<SystemTime>,
    ignore_until: Option<AwayUntil>,
}

impl OverrideState {
    pub fn manual_busy(&self) -> bool {
        self.manual_busy
    }

    pub fn manual_free(&self) -> bool {
        self.manual_free
    }

    /// Deadline after which a manual busy/free reverts to automatic mode.
    pub fn manual_until(&self) -> Option<SystemTime> {
        self.manual_until
    }

    pub fn ignore_until(&self) -> Option<AwayUntil> {
        self.ignore_until
    }

    pub fn set_manual_busy(&mut self) {
        *self = Self {
            manual_busy: true,
            ..Self::default()
        };
    }

    pub fn set_manual_free(&mut self) {
        *self = Self {
            manual_free: true,
            ..Self::default()
        };
    }

    /// Manual busy that reverts to automatic mode after `duration`.
    pub fn set_manual_busy_for(
        &mut self,
        now: SystemTime,
        duration: Duration,
    ) -> Result<(), InvalidArgument> {
        let until = deadline(now, duration)?;
        self.set_manual_busy();
        self.manual_until = Some(until);
        Ok(())
    }

    /// Manual free that reverts to automatic mode after `duration`.
    pub fn set_manual_free_for(
        &mut self,
        now: SystemTime,
        duration: Duration,
    ) -> Result<(), InvalidArgument> {
        let until = deadline(now, duration)?;
        self.set_manual_free();
        self.manual_until = Some(until);
        Ok(())
    }

    /// Suppress the microphone for `duration`. Replaces any earlier deadline,
    /// even a later one.
    pub fn ignore_for(&mut self, now: SystemTime, duration: Duration) -> Result<(), InvalidArgument> {
        let until = deadline(now, duration)?;
        *self = Self {
            ignore_until: Some(AwayUntil::At(until)),
            ..Self::default()
        };
        Ok(())
    }

    pub fn away_indefinitely(&mut self) {
        *self = Self {
            ignore_until: Some(AwayUntil::Indefinitely),
            ..Self::default()
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drop overrides whose deadline has passed. Returns true if anything
    /// was cleared.
    pub fn expire(&mut self, now: SystemTime) -> bool {
        let mut changed = false;
        if self.ignore_until.is_some_and(|away| !away.is_active(now)) {
            self.ignore_until = None;
            changed = true;
        }
        if self.manual_until.is_some_and(|until| has_passed(until, now)) {
            self.manual_busy = false;
            self.manual_free = false;
            self.manual_until = None;
            changed = true;
        }
        changed
    }

    /// A copy with expired overrides removed.
    pub fn effective(&self, now: SystemTime) -> Self {
        let mut effective = self.clone();
        effective.expire(now);
        effective
    }

    /// True when nothing overrides the microphone at `now`.
    pub fn is_automatic(&self, now: SystemTime) -> bool {
        let effective = self.effective(now);
        !effective.manual_busy && !effective.manual_free && effective.ignore_until.is_none()
    }

    /// Combine the overrides with a microphone reading. Precedence is fixed:
    /// active Away, then manual busy, then manual free, then the microphone.
    /// `None` means no reading was available and falls back to Available.
    pub fn derive(&self, reading: Option<&MicReading>, now: SystemTime) -> DerivedStatus {
        let overrides = self.effective(now);
        let detected = reading.is_some_and(|r| r.in_use);
        let using_apps = reading.map(|r| r.using_apps.clone()).unwrap_or_default();

        let (category, effective_in_use, using_apps, detected) = if overrides.ignore_until.is_some() {
            (Category::Away, false, Vec::new(), false)
        } else if overrides.manual_busy {
            (Category::Busy, true, using_apps, detected)
        } else if overrides.manual_free {
            (Category::Available, false, using_apps, detected)
        } else if detected {
            (Category::Busy, true, using_apps, detected)
        } else {
            (Category::Available, false, using_apps, detected)
        };

        DerivedStatus {
            effective_in_use,
            category,
            using_apps,
            detected_in_use: detected,
            overrides,
            computed_at: now,
        }
    }
}

/// One poll of the microphone probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicReading {
    pub in_use: bool,
    /// Applications suspected of holding the microphone, in probe order
    pub using_apps: Vec<String>,
}

impl MicReading {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn in_use_by<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            in_use: true,
            using_apps: apps.into_iter().map(Into::into).collect(),
        }
    }
}

/// The authoritative status for one reconciliation cycle. Replaced wholesale
/// every cycle, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedStatus {
    pub effective_in_use: bool,
    pub category: Category,
    pub using_apps: Vec<String>,
    /// What the microphone alone says, suppressed while Away
    pub detected_in_use: bool,
    /// Overrides in effect when this status was computed
    pub overrides: OverrideState,
    pub computed_at: SystemTime,
}

impl Default for DerivedStatus {
    fn default() -> Self {
        OverrideState::default().derive(None, SystemTime::UNIX_EPOCH)
    }
}
