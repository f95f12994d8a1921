//! Astronomical capability consumed by the formula executor.
//!
//! The executor never computes sun positions itself; it asks an
//! [`Astronomy`] implementation for the day's sun times and for the moments
//! the sun crosses a given depression angle. [`NoaaCalculator`] is the
//! bundled implementation.

mod noaa;

pub use noaa::NoaaCalculator;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::Serialize;

pub type Time = DateTime<FixedOffset>;

/// Where the zmanim are computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Degrees, north positive.
    pub latitude: f64,
    /// Degrees, east positive.
    pub longitude: f64,
    /// Meters above sea level.
    pub elevation: f64,
    pub timezone: FixedOffset,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, elevation: f64, timezone: FixedOffset) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
            timezone,
        }
    }
}

/// The day's fixed sun events. Rise and set are absent when the sun never
/// crosses the horizon on that date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SunTimes {
    pub sunrise: Option<Time>,
    pub sunset: Option<Time>,
    /// Rise and set seen from the location's elevation.
    pub visible_sunrise: Option<Time>,
    pub visible_sunset: Option<Time>,
    pub solar_noon: Time,
    pub solar_midnight: Time,
    /// Minutes between sunrise and sunset; 0 in polar night, 1440 under the
    /// midnight sun.
    pub day_length: f64,
}

/// Times at which the sun is a given number of degrees below the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarAngleTimes {
    /// Morning crossing.
    pub ascending: Option<Time>,
    /// Evening crossing.
    pub descending: Option<Time>,
}

pub trait Astronomy: Send + Sync {
    fn sun_times(&self, date: NaiveDate, location: &Location) -> SunTimes;

    fn solar_angle(&self, date: NaiveDate, location: &Location, degrees: f64) -> SolarAngleTimes;

    /// Time `hours` proportional hours into the span `start..end`, where the
    /// span holds twelve such hours. `None` when the result is not a
    /// representable time.
    fn proportional_hours(&self, start: Time, end: Time, hours: f64) -> Option<Time> {
        let hour = minutes_between(start, end) / 12.0;
        self.add_minutes(start, hour * hours)
    }

    fn midpoint(&self, a: Time, b: Time) -> Time {
        a + (b - a) / 2
    }

    /// Shifts `time` by a signed number of minutes; `None` on overflow or a
    /// non-finite offset.
    fn add_minutes(&self, time: Time, minutes: f64) -> Option<Time> {
        time.checked_add_signed(duration_from_minutes(minutes)?)
    }
}

/// Signed minutes from `from` to `to`, with sub-second precision.
pub fn minutes_between(from: Time, to: Time) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Millisecond-rounded duration, or `None` when `minutes` is not finite or
/// does not fit a `Duration`.
pub fn duration_from_minutes(minutes: f64) -> Option<Duration> {
    let millis = (minutes * 60_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}
