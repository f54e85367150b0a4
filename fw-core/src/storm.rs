//! Queued replay-storm profile simulator.
//!
//! A per-millisecond queue model that complements the closed-form
//! estimate in [`crate::replay::StormModel`]:
//!
//! ```text
//! each ms:  pending += burst_rate
//!           pending -= min(pending, capacity_per_ms)        (processed)
//!           overflow = max(pending - queue_limit, 0)       (dropped)
//! ```
//!
//! Profiles also declare an alert threshold; an alert fires when the
//! drop ratio reaches it.

use serde::Deserialize;

use crate::constants::{DEFAULT_PROFILE_TOLERANCE, DEFAULT_QUEUE_LIMIT_FACTOR};
use crate::corpus::Corpus;
use crate::errors::OracleError;
use crate::replay::within_tolerance;
use crate::report::{ScenarioReport, Summary};

#[derive(Debug, Clone, Deserialize)]
pub struct StormProfile {
    pub profile_id: String,
    pub burst_rate: f64,
    pub duration_ms: f64,
    pub expected_drop_ratio: f64,
    pub alert_threshold: f64,
    pub expected_alert: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StormProfileSet {
    #[serde(default)]
    pub description: String,
    pub window_size: f64,
    pub capacity_per_ms: f64,
    #[serde(default)]
    pub queue_limit: Option<f64>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    pub profiles: Vec<StormProfile>,
}

fn default_tolerance() -> f64 {
    DEFAULT_PROFILE_TOLERANCE
}

impl Corpus for StormProfileSet {
    fn scenario_count(&self) -> usize {
        self.profiles.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StormMetrics {
    pub drop_ratio: f64,
    pub delivery_ratio: f64,
    pub max_queue_depth: f64,
    pub latency_penalty: f64,
    pub alert_triggered: bool,
}

/// Queue parameters, clamped to sane minimums on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueSimulator {
    pub window_size: f64,
    pub capacity_per_ms: f64,
    pub queue_limit: f64,
}

impl QueueSimulator {
    /// `queue_limit` defaults to `window * 8` and is computed before the
    /// window is clamped.
    pub fn new(window: f64, capacity_per_ms: f64, queue_limit: Option<f64>) -> Self {
        let limit = queue_limit.unwrap_or(window * DEFAULT_QUEUE_LIMIT_FACTOR);
        Self {
            window_size: window.max(1.0),
            capacity_per_ms: capacity_per_ms.max(0.0),
            queue_limit: limit.max(1.0),
        }
    }

    pub fn from_set(set: &StormProfileSet) -> Self {
        Self::new(set.window_size, set.capacity_per_ms, set.queue_limit)
    }

    pub fn simulate(&self, profile: &StormProfile) -> StormMetrics {
        let mut pending = 0.0_f64;
        let mut processed = 0.0_f64;
        let mut dropped = 0.0_f64;
        let mut total = 0.0_f64;
        let mut max_queue = 0.0_f64;
        let mut latency_integral = 0.0_f64;

        // Whole milliseconds only; a fractional tail is not simulated.
        let steps = profile.duration_ms.max(0.0) as u64;
        for _ in 0..steps {
            pending += profile.burst_rate;
            total += profile.burst_rate;

            let served = pending.min(self.capacity_per_ms);
            pending -= served;
            processed += served;

            let overflow = (pending - self.queue_limit).max(0.0);
            pending -= overflow;
            dropped += overflow;

            max_queue = max_queue.max(pending);
            latency_integral += pending;
        }

        let drop_ratio = if total > 0.0 { (dropped / total).min(1.0) } else { 0.0 };
        let delivery_ratio = if total > 0.0 { processed / total } else { 0.0 };
        let latency_penalty = if profile.duration_ms > 0.0 {
            latency_integral / profile.duration_ms
        } else {
            latency_integral
        };
        StormMetrics {
            drop_ratio,
            delivery_ratio,
            max_queue_depth: max_queue,
            latency_penalty,
            alert_triggered: drop_ratio >= profile.alert_threshold,
        }
    }
}

/// Simulate every profile and compare against its expectations.
pub fn run_profiles(set: &StormProfileSet) -> Result<Summary, OracleError> {
    let simulator = QueueSimulator::from_set(set);
    let mut summary = Summary::new("rust", "replay_storm");
    for profile in &set.profiles {
        let metrics = simulator.simulate(profile);
        let delta = (metrics.drop_ratio - profile.expected_drop_ratio).abs();

        let mut report = ScenarioReport::new(profile.profile_id.as_str());
        report.set_metric("drop_ratio", metrics.drop_ratio);
        report.set_metric("expected_drop_ratio", profile.expected_drop_ratio);
        report.set_metric("drop_ratio_delta", delta);
        report.set_metric("delivery_ratio", metrics.delivery_ratio);
        report.set_metric("max_queue_depth", metrics.max_queue_depth);
        report.set_metric("latency_penalty", metrics.latency_penalty);
        report.set_metric("alert_triggered", metrics.alert_triggered);
        report.set_metric("queue_limit", simulator.queue_limit);
        report.check(
            within_tolerance(metrics.drop_ratio, profile.expected_drop_ratio, set.tolerance),
            || format!("drop_ratio {:.4} outside ±{} of {}", metrics.drop_ratio, set.tolerance, profile.expected_drop_ratio),
        );
        report.check(metrics.alert_triggered == profile.expected_alert, || {
            format!(
                "alert expected={}, observed={}",
                profile.expected_alert, metrics.alert_triggered
            )
        });
        if let Some(notes) = profile.notes.as_deref().filter(|n| !n.is_empty()) {
            report.notes.push(notes.to_owned());
        }
        summary.record(report)?;
    }
    tracing::info!(
        passed = summary.passed,
        failed = summary.failed,
        queue_limit = simulator.queue_limit,
        "replay storm profiles"
    );
    Ok(summary)
}
