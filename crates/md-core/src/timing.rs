//! Lightweight performance timing utilities.
//!
//! This module provides simple timing infrastructure for measuring
//! where runtime is being spent in the step pipeline. Can be enabled/disabled
//! via environment variable (`MD_TIMING`) or programmatically.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("MD_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }

    /// Stop the timer and log the result if enabled.
    pub fn stop_and_log(self) {
        let label = self.label;
        if let Some(elapsed) = self.stop() {
            tracing::info!(target: "md::timing", "{}: {:.3}s", label, elapsed);
        }
    }
}

/// Accumulating timer for tracking total time across multiple calls.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    /// Create a new accumulating timer.
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an event without a duration.
    pub fn tick(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Get number of calls.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    /// Reset the timer.
    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Process-wide step pipeline counters.
pub mod pipeline_timing {
    use super::AccumulatingTimer;

    /// Time spent executing timeblocks (all steps of one block)
    pub static TIMEBLOCKS: AccumulatingTimer = AccumulatingTimer::new();
    /// Time spent copying action buffers to the output store
    pub static OUTPUT_FLUSH: AccumulatingTimer = AccumulatingTimer::new();
    /// Neighbor list rebuilds (count only)
    pub static NEIGHBOR_REBUILDS: AccumulatingTimer = AccumulatingTimer::new();

    /// Reset all pipeline timers.
    pub fn reset_all() {
        TIMEBLOCKS.reset();
        OUTPUT_FLUSH.reset();
        NEIGHBOR_REBUILDS.reset();
    }

    /// Log pipeline timing summary.
    pub fn log_summary() {
        if !super::is_enabled() {
            return;
        }

        let blocks = TIMEBLOCKS.count();
        if blocks > 0 {
            tracing::info!(
                target: "md::timing",
                "timeblocks: {} blocks, {:.3}s total, {:.4}ms avg",
                blocks,
                TIMEBLOCKS.total_seconds(),
                TIMEBLOCKS.average_seconds() * 1000.0
            );
        }

        let flushes = OUTPUT_FLUSH.count();
        if flushes > 0 {
            tracing::info!(
                target: "md::timing",
                "output flush: {} calls, {:.3}s total",
                flushes,
                OUTPUT_FLUSH.total_seconds()
            );
        }

        tracing::info!(
            target: "md::timing",
            "neighbor list rebuilds: {}",
            NEIGHBOR_REBUILDS.count()
        );
    }
}

/// Performance statistics collector.
#[derive(Debug, Clone, Default)]
pub struct PerfStats {
    pub setup_time_s: f64,
    pub run_time_s: f64,
    pub flush_time_s: f64,
    pub steps: usize,
    pub particles: usize,
}

impl PerfStats {
    /// Timesteps per second over all recorded runs.
    pub fn steps_per_second(&self) -> f64 {
        if self.run_time_s > 0.0 {
            self.steps as f64 / self.run_time_s
        } else {
            0.0
        }
    }

    /// Particle updates per second, the usual MD throughput figure.
    pub fn particle_steps_per_second(&self) -> f64 {
        self.steps_per_second() * self.particles as f64
    }

    /// Log a formatted summary of the statistics.
    pub fn log_summary(&self) {
        if !is_enabled() {
            return;
        }

        tracing::info!(target: "md::timing", "setup time: {:.3}s", self.setup_time_s);
        if self.steps > 0 {
            tracing::info!(
                target: "md::timing",
                "run: {} steps in {:.3}s ({:.1} TPS, {:.3e} particle-steps/s)",
                self.steps,
                self.run_time_s,
                self.steps_per_second(),
                self.particle_steps_per_second()
            );
        }
        if self.flush_time_s > 0.0 {
            tracing::info!(target: "md::timing", "output flush: {:.3}s", self.flush_time_s);
        }

        pipeline_timing::log_summary();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulating_timer_averages() {
        let t = AccumulatingTimer::new();
        t.record(0.5);
        t.record(1.5);
        assert_eq!(t.count(), 2);
        assert!((t.average_seconds() - 1.0).abs() < 1e-6);
        t.reset();
        assert_eq!(t.count(), 0);
        assert_eq!(t.average_seconds(), 0.0);
    }

    #[test]
    fn perf_stats_throughput() {
        let stats = PerfStats {
            run_time_s: 2.0,
            steps: 1000,
            particles: 500,
            ..Default::default()
        };
        assert_eq!(stats.steps_per_second(), 500.0);
        assert_eq!(stats.particle_steps_per_second(), 250_000.0);
    }
}
