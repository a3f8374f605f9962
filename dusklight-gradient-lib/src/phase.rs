//! Day/night phase selection
//!
//! The phase is recomputed from the time of day on every query. Edge
//! detection lives in [`PhaseTracker`], which the polling loop owns.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::params::ParamsError;
use crate::payload::{self, PayloadError};

/// Which parameter set is in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[display("day")]
    Day,
    #[display("night")]
    Night,
}

impl Phase {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Day => Self::Night,
            Self::Night => Self::Day,
        }
    }

    /// Storage namespace holding this phase's parameter records
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
        }
    }
}

/// `h + m / 60`
#[must_use]
pub fn decimal_hour(hour: u8, minute: u8) -> f32 {
    f32::from(hour) + f32::from(minute) / 60.0
}

/// Whether `now` (decimal hours) falls into the day window.
///
/// When `night_start < day_start` the day window wraps across midnight.
/// Equal boundaries leave no day window at all.
#[must_use]
pub fn is_day(now: f32, day_start: f32, night_start: f32) -> bool {
    (now >= day_start && now < night_start)
        || (now >= day_start && night_start < day_start)
        || (now < night_start && day_start > night_start)
}

/// A phase start time of day, `H:MM` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhaseBoundary {
    hour: u8,
    minute: u8,
}

impl PhaseBoundary {
    pub const fn new(hour: u8, minute: u8) -> Result<Self, ParamsError> {
        if hour > 23 || minute > 59 {
            return Err(ParamsError::Boundary { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    /// Inverse of [`Self::minutes_since_midnight`]
    pub fn from_minutes(minutes: u16) -> Result<Self, ParamsError> {
        let hour = u8::try_from(minutes / 60).unwrap_or(u8::MAX);
        // minutes % 60 < 60
        let minute = u8::try_from(minutes % 60).unwrap_or(u8::MAX);
        Self::new(hour, minute)
    }

    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    #[must_use]
    pub fn decimal_hour(self) -> f32 {
        decimal_hour(self.hour, self.minute)
    }

    #[must_use]
    pub const fn minutes_since_midnight(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl fmt::Display for PhaseBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&payload::format_boundary(*self))
    }
}

impl FromStr for PhaseBoundary {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        payload::parse_boundary(s)
    }
}

impl TryFrom<String> for PhaseBoundary {
    type Error = PayloadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PhaseBoundary> for String {
    fn from(boundary: PhaseBoundary) -> Self {
        boundary.to_string()
    }
}

/// The two configured phase boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseClock {
    day_start: PhaseBoundary,
    night_start: PhaseBoundary,
}

impl PhaseClock {
    #[must_use]
    pub const fn new(day_start: PhaseBoundary, night_start: PhaseBoundary) -> Self {
        Self {
            day_start,
            night_start,
        }
    }

    #[must_use]
    pub const fn day_start(&self) -> PhaseBoundary {
        self.day_start
    }

    #[must_use]
    pub const fn night_start(&self) -> PhaseBoundary {
        self.night_start
    }

    pub fn set_day_start(&mut self, boundary: PhaseBoundary) {
        self.day_start = boundary;
    }

    pub fn set_night_start(&mut self, boundary: PhaseBoundary) {
        self.night_start = boundary;
    }

    /// Phase at `now`, given in decimal hours
    #[must_use]
    pub fn phase_at(&self, now: f32) -> Phase {
        if is_day(
            now,
            self.day_start.decimal_hour(),
            self.night_start.decimal_hour(),
        ) {
            Phase::Day
        } else {
            Phase::Night
        }
    }
}

/// Edge detector over successive phase observations.
///
/// Remembers the phase seen on the previous poll and reports a transition
/// only when it changes. The very first observation always counts as a
/// transition so the caller activates the starting phase once.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    last: Option<Phase>,
}

impl PhaseTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Record the current phase; `Some(phase)` when it differs from the last one.
    pub fn observe(&mut self, phase: Phase) -> Option<Phase> {
        if self.last == Some(phase) {
            return None;
        }
        self.last = Some(phase);
        Some(phase)
    }

    /// Forget the last phase so the next observation fires again
    pub fn reset(&mut self) {
        self.last = None;
    }

    #[must_use]
    pub const fn last(&self) -> Option<Phase> {
        self.last
    }
}
