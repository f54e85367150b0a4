//! Replay window detector and the closed-form replay-storm model.
//!
//! ## Window algorithm
//! ```text
//! for seq in stream:
//!     evict every retained value < seq - window
//!     replay |= seq in retained
//!     insert seq
//! ```
//! Only an exact repeat inside the window is a replay; distance alone
//! never is. State is owned by one scenario and never reset mid-stream.
//!
//! ## Storm model
//! ```text
//! total      = burst_rate * duration_ms
//! capacity   = capacity_per_ms * duration_ms + window
//! drop_ratio = clamp((total - capacity) / total, 0, 1)      (0 when total <= 0)
//! ```
//! An analytic approximation of sustained window admission, not an
//! event simulation. See [`crate::storm`] for the queued simulator.

use std::collections::BTreeSet;

use crate::constants::DEFAULT_STORM_TOLERANCE;

/// Sliding replay window over signed sequence numbers.
#[derive(Debug, Clone)]
pub struct ReplayWindow {
    window: i64,
    retained: BTreeSet<i64>,
}

impl ReplayWindow {
    pub fn new(window: i64) -> Self {
        Self {
            window,
            retained: BTreeSet::new(),
        }
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    /// Feed one sequence number. Returns `true` if it is a replay.
    pub fn observe(&mut self, seq: i64) -> bool {
        let cutoff = seq.saturating_sub(self.window);
        if self.retained.first().is_some_and(|&low| low < cutoff) {
            self.retained = self.retained.split_off(&cutoff);
        }
        !self.retained.insert(seq)
    }

    /// Values currently inside the window.
    pub fn retained(&self) -> usize {
        self.retained.len()
    }
}

/// Run a whole stream through a fresh window.
pub fn detect_replay(sequence_numbers: &[i64], window: i64) -> bool {
    let mut detector = ReplayWindow::new(window);
    let mut detected = false;
    for &seq in sequence_numbers {
        if detector.observe(seq) {
            detected = true;
        }
    }
    detected
}

/// Closed-form storm outcome for one burst profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StormOutcome {
    pub total: f64,
    pub capacity: f64,
    pub drop_ratio: f64,
}

/// Analytic admission model for a window under sustained load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StormModel {
    pub window: i64,
    pub capacity_per_ms: f64,
}

impl StormModel {
    pub fn new(window: i64, capacity_per_ms: f64) -> Self {
        Self {
            window,
            capacity_per_ms,
        }
    }

    pub fn evaluate(&self, burst_rate: f64, duration_ms: f64) -> StormOutcome {
        let total = burst_rate * duration_ms;
        let capacity = self.capacity_per_ms * duration_ms + self.window as f64;
        let drop_ratio = if total <= 0.0 {
            0.0
        } else {
            ((total - capacity).max(0.0) / total).min(1.0)
        };
        StormOutcome {
            total,
            capacity,
            drop_ratio,
        }
    }

    /// True when the model's drop ratio is within `DEFAULT_STORM_TOLERANCE`
    /// of `expected`.
    pub fn matches(&self, burst_rate: f64, duration_ms: f64, expected_drop_ratio: f64) -> bool {
        within_tolerance(
            self.evaluate(burst_rate, duration_ms).drop_ratio,
            expected_drop_ratio,
            DEFAULT_STORM_TOLERANCE,
        )
    }
}

/// Absolute-difference comparison, inclusive.
pub fn within_tolerance(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= tolerance
}
