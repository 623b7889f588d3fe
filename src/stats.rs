//! Performance statistics collection for `--stats` output.

use std::time::{Duration, Instant};

/// Collects phase timings and solve counters.
///
/// Created when `--stats` is passed. Zero cost when `None`: no timing
/// calls, no counter updates.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub backend: &'static str,
    pub m: usize,
    pub nnz: usize,
    pub allocations: usize,
    pub native_calls: usize,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            backend: "",
            m: 0,
            nnz: 0,
            allocations: 0,
            native_calls: 0,
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== qrsolve Performance Stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        eprintln!("  Backend:                {}", self.backend);
        eprintln!("  System:                 m={}  nnz={}", self.m, self.nnz);
        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
        eprintln!("  Allocations:            {}", self.allocations);
        eprintln!("  Native calls:           {}", self.native_calls);
    }
}
