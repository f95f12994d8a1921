//! Per-request evaluation state.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use zman_astro::{Astronomy, Location, NoaaCalculator, SolarAngleTimes, SunTimes, Time};
use zman_syntax::error::Error;

/// Everything one evaluation needs: the date and place, the astronomical
/// backend, and the zman cache that `@references` resolve from.
///
/// A context is owned by a single evaluation at a time. Concurrent
/// evaluations each get their own context; ASTs can be shared freely.
pub struct ExecutionContext {
    date: NaiveDate,
    location: Location,
    astronomy: Arc<dyn Astronomy>,
    sun_times: Option<SunTimes>,
    /// Solar-angle crossings keyed by the bit pattern of the angle.
    solar_angles: IndexMap<u64, SolarAngleTimes>,
    zman_cache: IndexMap<String, Time>,
    /// Function results keyed by canonical call text. Any write to the zman
    /// cache drops them, since a call may read `@references`.
    memo: IndexMap<String, Time>,
    pub(crate) errors: Vec<Error>,
}

impl ExecutionContext {
    pub fn new(date: NaiveDate, location: Location) -> Self {
        Self::with_astronomy(date, location, Arc::new(NoaaCalculator))
    }

    pub fn with_astronomy(date: NaiveDate, location: Location, astronomy: Arc<dyn Astronomy>) -> Self {
        Self {
            date,
            location,
            astronomy,
            sun_times: None,
            solar_angles: IndexMap::new(),
            zman_cache: IndexMap::new(),
            memo: IndexMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn latitude(&self) -> f64 {
        self.location.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.location.longitude
    }

    pub fn elevation(&self) -> f64 {
        self.location.elevation
    }

    pub fn astronomy(&self) -> Arc<dyn Astronomy> {
        Arc::clone(&self.astronomy)
    }

    /// Moves the context to another date. The sun snapshot and every cached
    /// time belong to the old date, so both are dropped.
    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
        self.invalidate();
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = location;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.sun_times = None;
        self.solar_angles.clear();
        self.clear_cache();
    }

    /// The day's sun times, computed on first use.
    pub fn sun_times(&mut self) -> &SunTimes {
        let (astronomy, date, location) = (&self.astronomy, self.date, &self.location);
        self.sun_times
            .get_or_insert_with(|| astronomy.sun_times(date, location))
    }

    /// Crossings of the sun `degrees` below the horizon, computed once per
    /// date and place.
    pub fn solar_angle(&mut self, degrees: f64) -> SolarAngleTimes {
        let (astronomy, date, location) = (&self.astronomy, self.date, &self.location);
        *self
            .solar_angles
            .entry(degrees.to_bits())
            .or_insert_with(|| astronomy.solar_angle(date, location, degrees))
    }

    pub fn cached(&self, key: &str) -> Option<Time> {
        self.zman_cache.get(key).copied()
    }

    pub fn cache(&self) -> &IndexMap<String, Time> {
        &self.zman_cache
    }

    /// Stores `time` under `key`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, time: Time) {
        self.zman_cache.insert(key.into(), time);
        self.memo.clear();
    }

    /// Stores `time` under `key` unless the key is already present.
    pub fn remember(&mut self, key: impl Into<String>, time: Time) {
        self.zman_cache.entry(key.into()).or_insert(time);
    }

    /// Pre-populates the cache with already evaluated results.
    pub fn seed(&mut self, entries: impl IntoIterator<Item = (String, Time)>) {
        self.zman_cache.extend(entries);
        self.memo.clear();
    }

    pub fn clear_cache(&mut self) {
        self.zman_cache.clear();
        self.memo.clear();
    }

    /// A function result computed earlier against the current cache.
    pub fn memoized(&self, call: &str) -> Option<Time> {
        self.memo.get(call).copied()
    }

    pub fn memoize(&mut self, call: impl Into<String>, time: Time) {
        self.memo.insert(call.into(), time);
    }

    /// Runtime errors recorded by the evaluation in progress.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("date", &self.date)
            .field("location", &self.location)
            .field("cached", &self.zman_cache.len())
            .finish()
    }
}
