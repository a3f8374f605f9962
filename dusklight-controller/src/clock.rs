use chrono::{Local, Timelike};
use dusklight_gradient_lib::phase::decimal_hour;
use dusklight_gradient_lib::PhaseBoundary;

/// Source of the current time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallClock {
    /// System local time
    Local,
    /// A pinned time of day, for testing layouts without waiting
    Fixed(PhaseBoundary),
}

impl WallClock {
    /// Decimal hour of day, `None` when the time is not known
    pub fn now(self) -> Option<f32> {
        match self {
            Self::Local => {
                let now = Local::now();
                let hour = u8::try_from(now.hour()).ok()?;
                let minute = u8::try_from(now.minute()).ok()?;
                Some(decimal_hour(hour, minute))
            }
            Self::Fixed(boundary) => Some(boundary.decimal_hour()),
        }
    }
}
