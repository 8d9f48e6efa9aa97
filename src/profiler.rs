//! Lightweight tick profiling.
//!
//! [`Profiler`] collects timing for named sections of the fixed update and
//! flags ticks that run longer than the configured lag threshold. The engine
//! keeps one per [`SimWorld`](crate::api::SimWorld); the summary is emitted
//! through `tracing` so it lands wherever the application routes its logs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Statistics for a profiled section
#[derive(Debug, Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

/// Per-section and per-tick timing.
#[derive(Debug, Default)]
pub struct Profiler {
    sections: HashMap<&'static str, SectionStats>,
    ticks: SectionStats,
    lagged_ticks: u64,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time a section using a closure.
    pub fn time_section<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.sections.entry(name).or_default().record(start.elapsed());
        result
    }

    /// Record a whole tick. Returns `true` and logs a warning when it took
    /// longer than `lag_threshold_ms`.
    pub fn record_tick(&mut self, tick: u64, elapsed: Duration, lag_threshold_ms: f32) -> bool {
        self.ticks.record(elapsed);
        let elapsed_ms = elapsed.as_secs_f32() * 1000.0;
        if elapsed_ms > lag_threshold_ms {
            self.lagged_ticks += 1;
            warn!(tick, elapsed_ms, threshold_ms = lag_threshold_ms, "Simulation tick lagging");
            return true;
        }
        false
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.call_count
    }

    pub fn lagged_ticks(&self) -> u64 {
        self.lagged_ticks
    }

    pub fn tick_stats(&self) -> &SectionStats {
        &self.ticks
    }

    pub fn get_section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> Vec<&'static str> {
        self.sections.keys().copied().collect()
    }

    /// Log a summary of every section, slowest first.
    pub fn log_summary(&self) {
        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));

        info!(
            ticks = self.ticks.call_count,
            lagged = self.lagged_ticks,
            avg_ms = self.ticks.avg_time().as_secs_f64() * 1000.0,
            max_ms = self.ticks.max_time.unwrap_or_default().as_secs_f64() * 1000.0,
            "Profiler summary"
        );
        for (name, stats) in sections {
            info!(
                section = *name,
                calls = stats.call_count,
                total_ms = stats.total_time.as_secs_f64() * 1000.0,
                avg_ms = stats.avg_time().as_secs_f64() * 1000.0,
                "Profiler section"
            );
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
