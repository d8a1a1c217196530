//! # Profiling Counters
//!
//! Per-event statistics from the last profiled run. The profiler writes them
//! from its own thread while the editor reads them for display, so the
//! duration and the percentage are always published together.

use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Statistics of one event for the last profiled session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileSample {
    /// Total time spent in the event during the last session
    pub total_time_during_last_session: Duration,
    /// Share of the whole run time, in percent
    pub percent_during_last_session: f32,
}

impl ProfileSample {
    pub fn new(total_time: Duration, percent: f32) -> Self {
        Self {
            total_time_during_last_session: total_time,
            percent_during_last_session: percent,
        }
    }

    /// Build a sample from the event's own time and the duration of the whole run.
    pub fn from_run(event_time: Duration, run_time: Duration) -> Self {
        let percent = if run_time.is_zero() {
            0.0
        } else {
            (event_time.as_secs_f64() / run_time.as_secs_f64() * 100.0) as f32
        };
        Self::new(event_time, percent)
    }
}

/// Counter pair guarded so readers never see a duration without its percentage.
#[derive(Debug, Default)]
pub struct ProfilingCounters {
    sample: RwLock<ProfileSample>,
}

impl ProfilingCounters {
    pub fn new(sample: ProfileSample) -> Self {
        Self {
            sample: RwLock::new(sample),
        }
    }

    pub fn publish(&self, sample: ProfileSample) {
        *self.sample.write() = sample;
    }

    pub fn snapshot(&self) -> ProfileSample {
        *self.sample.read()
    }

    pub fn reset(&self) {
        self.publish(ProfileSample::default());
    }
}
