//! Memoization of computed sun and moon tables.
//!
//! One cache is owned by the configuration layer and shared by every node that
//! resolves times for the same location. Entries are keyed by location and
//! calendar day, so a lookup for today can never return yesterday's table;
//! tables for days that are already over are evicted on each new day.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::moon::{MoonTimes, compute_moon_times};
use super::sun::{SunTimes, SunTimesOptions, compute_sun_times_with};
use super::{DayBoundary, GeoCoordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    latitude_bits: u64,
    longitude_bits: u64,
    boundary: DayBoundary,
    day: NaiveDate,
}

impl CacheKey {
    fn new(coord: &GeoCoordinate, boundary: &DayBoundary, day: NaiveDate) -> Self {
        Self {
            latitude_bits: coord.latitude().to_bits(),
            longitude_bits: coord.longitude().to_bits(),
            boundary: *boundary,
            day,
        }
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    sun: Option<Arc<SunTimes>>,
    moon: Option<MoonTimes>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    current_day: Option<NaiveDate>,
    hits: u64,
    misses: u64,
}

/// Shared table cache.
#[derive(Debug, Default)]
pub struct AstroCache {
    options: SunTimesOptions,
    state: Mutex<CacheState>,
}

impl AstroCache {
    pub fn new(options: SunTimesOptions) -> Self {
        Self {
            options,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Note the current day; tables for earlier days are dropped when it changes.
    pub fn roll_to(&self, today: NaiveDate) {
        let mut state = self.lock();
        if state.current_day == Some(today) {
            return;
        }
        state.current_day = Some(today);
        state.entries.retain(|key, _| key.day >= today);
    }

    /// Sun table for a calendar day.
    pub fn sun_times(
        &self,
        coord: &GeoCoordinate,
        boundary: &DayBoundary,
        day: NaiveDate,
    ) -> Arc<SunTimes> {
        let key = CacheKey::new(coord, boundary, day);
        let mut state = self.lock();
        if let Some(sun) = state.entries.get(&key).and_then(|e| e.sun.clone()) {
            state.hits += 1;
            return sun;
        }

        state.misses += 1;
        let anchor = boundary.at(day, NaiveTime::MIN);
        let sun = Arc::new(compute_sun_times_with(anchor, coord, boundary, &self.options));
        state.entries.entry(key).or_default().sun = Some(sun.clone());
        sun
    }

    /// Moon rise/set for a calendar day.
    pub fn moon_times(
        &self,
        coord: &GeoCoordinate,
        boundary: &DayBoundary,
        day: NaiveDate,
    ) -> MoonTimes {
        let key = CacheKey::new(coord, boundary, day);
        let mut state = self.lock();
        if let Some(moon) = state.entries.get(&key).and_then(|e| e.moon) {
            state.hits += 1;
            return moon;
        }

        state.misses += 1;
        let anchor: DateTime<Utc> = boundary.at(day, NaiveTime::MIN);
        let moon = compute_moon_times(anchor, coord, boundary);
        state.entries.entry(key).or_default().moon = Some(moon);
        moon
    }

    /// Number of cached (location, day) entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        let state = self.lock();
        (state.hits, state.misses)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // The state holds plain values; a panicking holder cannot leave it half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
