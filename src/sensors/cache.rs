/// Freshest-known sensor values plus the sticky motion indicator
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::models::Reading;
use crate::sensors::source::SensorSource;

#[derive(Debug, Default)]
struct CacheState {
    reading: Reading,
    // Level seen on the previous tick, used for edge detection
    prev_motion_level: bool,
    motion_latched: bool,
}

/// Read failure counters since startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub temperature_failures: u64,
    pub illuminance_failures: u64,
}

/// Shared between the sampler (writer) and the assembler (reader + latch clear).
///
/// All fields sit behind a single mutex, so setting the latch on a rising edge
/// and reading-then-clearing it in `latch_and_fetch` can never interleave.
#[derive(Debug, Default)]
pub struct SensorCache {
    state: Mutex<CacheState>,
    temperature_failures: AtomicU64,
    illuminance_failures: AtomicU64,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Every critical section leaves the state consistent, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read every sensor once and fold the results into the cache
    ///
    /// Bus reads happen before the lock is taken; a failed read keeps the previous value.
    pub fn tick(&self, source: &dyn SensorSource) {
        let temperature = match source.read_temperature() {
            Ok(t) => Some(t),
            Err(e) => {
                self.temperature_failures.fetch_add(1, Ordering::Relaxed);
                debug!("Temperature read failed, keeping previous value: {}", e);
                None
            }
        };

        let illuminance = match source.read_illuminance() {
            Ok(lux) => Some(lux),
            Err(e) => {
                self.illuminance_failures.fetch_add(1, Ordering::Relaxed);
                debug!("Illuminance read failed, keeping previous value: {}", e);
                None
            }
        };

        let motion_level = source.read_motion_level();

        let mut state = self.lock();
        if let Some(t) = temperature {
            state.reading.temperature_c = t;
        }
        if let Some(lux) = illuminance {
            state.reading.illuminance_lux = lux;
        }

        if motion_level != state.prev_motion_level {
            state.prev_motion_level = motion_level;
            state.reading.motion_instant = motion_level;
            if motion_level {
                state.motion_latched = true;
            }
            info!(
                "PIR {}",
                if motion_level {
                    "HIGH (motion)"
                } else {
                    "LOW (no motion)"
                }
            );
        }
    }

    pub fn latest(&self) -> Reading {
        self.lock().reading
    }

    /// Whether motion was seen since the last clear
    pub fn latched_motion(&self) -> bool {
        self.lock().motion_latched
    }

    pub fn clear_latch(&self) {
        self.lock().motion_latched = false;
    }

    /// Snapshot the reading and the latch, then clear the latch, in one critical section
    pub fn latch_and_fetch(&self) -> (Reading, bool) {
        let mut state = self.lock();
        let latched = state.motion_latched;
        state.motion_latched = false;
        (state.reading, latched)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            temperature_failures: self.temperature_failures.load(Ordering::Relaxed),
            illuminance_failures: self.illuminance_failures.load(Ordering::Relaxed),
        }
    }
}
