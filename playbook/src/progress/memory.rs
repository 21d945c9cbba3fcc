//! Process memory telemetry and advisory store compaction.

use crate::context::RunContext;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, info};

/// Default minimum time between compactions.
pub const DEFAULT_COMPACT_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of processed steps between telemetry log lines.
pub const DEFAULT_TELEMETRY_EVERY: usize = 10;

const MIB: u64 = 1024 * 1024;

/// A point-in-time view of process memory and store occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Resident set size in MiB.
    pub rss_mb: u64,
    /// Virtual memory size in MiB.
    pub virtual_mb: u64,
    /// Records waiting in buffers.
    pub buffered_items: usize,
    /// Records held in collections.
    pub collection_items: usize,
}

/// Samples process memory and decides when to compact the run's stores.
///
/// Nothing here affects correctness. If the current process cannot be
/// inspected, the memory figures are reported as zero.
pub struct ResourceMonitor {
    system: System,
    pid: Option<Pid>,
    compact_interval: Duration,
    telemetry_every: usize,
    last_compaction: Instant,
    compactions: usize,
    samples: usize,
}

impl ResourceMonitor {
    /// Creates a monitor. A `telemetry_every` of zero disables periodic
    /// telemetry.
    #[must_use]
    pub fn new(compact_interval: Duration, telemetry_every: usize) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(error = %e, "Process memory telemetry unavailable");
                None
            }
        };

        Self {
            system: System::new(),
            pid,
            compact_interval,
            telemetry_every,
            last_compaction: Instant::now(),
            compactions: 0,
            samples: 0,
        }
    }

    /// Takes a sample for `ctx`.
    pub fn sample(&mut self, ctx: &RunContext) -> MemoryStats {
        let (buffered_items, collection_items) = ctx.stored_items();
        let (rss_mb, virtual_mb) = self.process_memory();
        MemoryStats {
            rss_mb,
            virtual_mb,
            buffered_items,
            collection_items,
        }
    }

    fn process_memory(&mut self) -> (u64, u64) {
        self.samples += 1;
        let Some(pid) = self.pid else {
            return (0, 0);
        };
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system
            .process(pid)
            .map_or((0, 0), |p| (p.memory() / MIB, p.virtual_memory() / MIB))
    }

    /// Shrinks the run's stores if at least the compaction interval has
    /// passed since the last compaction. Returns whether it ran.
    pub fn maybe_compact(&mut self, ctx: &mut RunContext) -> bool {
        if self.last_compaction.elapsed() < self.compact_interval {
            return false;
        }

        ctx.shrink_to_fit();
        self.last_compaction = Instant::now();
        self.compactions += 1;

        let stats = self.sample(ctx);
        info!(
            rss_mb = stats.rss_mb,
            buffered = stats.buffered_items,
            collections = stats.collection_items,
            "Compacted run stores"
        );
        true
    }

    /// Returns true if a telemetry line is due after `steps_processed`.
    #[must_use]
    pub fn is_log_due(&self, steps_processed: usize) -> bool {
        self.telemetry_every > 0
            && steps_processed > 0
            && steps_processed % self.telemetry_every == 0
    }

    /// Logs a telemetry line every `telemetry_every` processed steps.
    pub fn maybe_log(&mut self, steps_processed: usize, ctx: &RunContext) {
        if !self.is_log_due(steps_processed) {
            return;
        }
        let stats = self.sample(ctx);
        info!(
            steps = steps_processed,
            rss_mb = stats.rss_mb,
            virtual_mb = stats.virtual_mb,
            buffered = stats.buffered_items,
            collections = stats.collection_items,
            "Memory usage"
        );
    }

    /// Number of compactions performed.
    #[must_use]
    pub fn compactions(&self) -> usize {
        self.compactions
    }

    /// Number of times process memory was read.
    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_COMPACT_INTERVAL, DEFAULT_TELEMETRY_EVERY)
    }
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("pid", &self.pid)
            .field("compact_interval", &self.compact_interval)
            .field("telemetry_every", &self.telemetry_every)
            .field("compactions", &self.compactions)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> RunContext {
        RunContext::new(HashMap::new(), serde_json::Map::new())
    }

    #[test]
    fn test_sample_counts_store_items() {
        let mut ctx = ctx();
        ctx.collections.set("a", vec![json!(1), json!(2)]);
        ctx.buffers.append("b", json!([1, 2, 3]), 10).unwrap();

        let stats = ResourceMonitor::default().sample(&ctx);
        assert_eq!(stats.buffered_items, 3);
        assert_eq!(stats.collection_items, 2);
    }

    #[test]
    fn test_compaction_respects_interval() {
        let mut ctx = ctx();
        let mut eager = ResourceMonitor::new(Duration::ZERO, 0);
        assert!(eager.maybe_compact(&mut ctx));
        assert!(eager.maybe_compact(&mut ctx));
        assert_eq!(eager.compactions(), 2);

        let mut lazy = ResourceMonitor::new(Duration::from_secs(3600), 0);
        assert!(!lazy.maybe_compact(&mut ctx));
        assert_eq!(lazy.compactions(), 0);
    }

    #[test]
    fn test_compaction_keeps_data() {
        let mut ctx = ctx();
        ctx.collections.set("a", vec![json!({"id": 1})]);
        ResourceMonitor::new(Duration::ZERO, 0).maybe_compact(&mut ctx);
        assert_eq!(ctx.collections.get("a"), Some(&[json!({"id": 1})][..]));
    }

    #[test]
    fn test_telemetry_only_samples_when_due() {
        let ctx = ctx();
        let mut monitor = ResourceMonitor::new(Duration::from_secs(3600), 3);
        for step in 1..=7 {
            monitor.maybe_log(step, &ctx);
        }
        assert_eq!(monitor.samples(), 2);

        let mut silent = ResourceMonitor::new(Duration::from_secs(3600), 0);
        silent.maybe_log(10, &ctx);
        assert_eq!(silent.samples(), 0);
    }
}
