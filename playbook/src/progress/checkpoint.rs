//! Periodic progress snapshots.

use super::memory::MemoryStats;
use crate::utils::iso_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default progress file, relative to the working directory.
pub const DEFAULT_PROGRESS_FILE: &str = "workflow-progress.json";

/// Default checkpoint cadence in steps.
pub const DEFAULT_CHECKPOINT_EVERY: usize = 5;

/// The JSON document written to the progress file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// ISO-8601 time the snapshot was taken.
    pub timestamp: String,
    /// Steps processed so far, including skipped and failed ones.
    pub steps_processed: usize,
    /// Records fetched from external sources so far.
    #[serde(default)]
    pub records_processed: u64,
    /// Milliseconds since the run started.
    pub elapsed_ms: u64,
    /// Memory telemetry at snapshot time.
    pub memory_stats: MemoryStats,
    /// Caller-defined payload; the runner stores the current step here.
    #[serde(default)]
    pub custom_data: Value,
}

/// Writes a [`ProgressSnapshot`] every `every` steps.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// readers never see a half-written document. Failures are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct CheckpointManager {
    path: PathBuf,
    every: usize,
    started: Instant,
    writes: usize,
}

impl CheckpointManager {
    /// Creates a manager writing to `path`. A cadence of zero disables
    /// checkpointing.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, every: usize) -> Self {
        Self {
            path: path.into(),
            every,
            started: Instant::now(),
            writes: 0,
        }
    }

    /// The progress file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshots written so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Returns true if the 1-based `step_index` falls on the cadence.
    #[must_use]
    pub fn is_due(&self, step_index: usize) -> bool {
        self.every > 0 && step_index > 0 && step_index % self.every == 0
    }

    /// Writes a snapshot if `step_index` (1-based) is due. Returns whether
    /// a snapshot was written. `memory_stats` is only called for due steps.
    pub async fn maybe_checkpoint(
        &mut self,
        step_index: usize,
        total: usize,
        step_name: &str,
        records_processed: u64,
        memory_stats: impl FnOnce() -> MemoryStats,
    ) -> bool {
        if !self.is_due(step_index) {
            return false;
        }

        let snapshot = ProgressSnapshot {
            timestamp: iso_timestamp(),
            steps_processed: step_index,
            records_processed,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            memory_stats: memory_stats(),
            custom_data: json!({
                "current_step": step_name,
                "step_index": step_index,
                "total_steps": total,
            }),
        };

        match self.write(&snapshot).await {
            Ok(()) => {
                self.writes += 1;
                info!(step = step_index, total, path = %self.path.display(), "Progress saved");
                true
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to save progress");
                false
            }
        }
    }

    async fn write(&self, snapshot: &ProgressSnapshot) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.path).await
    }
}

impl Default for CheckpointManager {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_FILE, DEFAULT_CHECKPOINT_EVERY)
    }
}

/// Reads a previously written snapshot. Returns `None` if the file is
/// missing or unreadable.
pub async fn load_progress(path: impl AsRef<Path>) -> Option<ProgressSnapshot> {
    let path = path.as_ref();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, path = %path.display(), "No previous progress found");
            return None;
        }
    };

    match serde_json::from_slice::<ProgressSnapshot>(&bytes) {
        Ok(snapshot) => {
            info!(timestamp = %snapshot.timestamp, "Loaded progress");
            Some(snapshot)
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Ignoring unreadable progress file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cadence() {
        let manager = CheckpointManager::new("unused.json", 5);
        let due: Vec<usize> = (1..=12).filter(|i| manager.is_due(*i)).collect();
        assert_eq!(due, vec![5, 10]);

        let disabled = CheckpointManager::new("unused.json", 0);
        assert!(!disabled.is_due(5));
    }

    #[tokio::test]
    async fn test_writes_and_reloads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut manager = CheckpointManager::new(&path, 2);

        assert!(!manager.maybe_checkpoint(1, 4, "one", 0, || unreachable!()).await);
        assert!(manager.maybe_checkpoint(2, 4, "two", 7, MemoryStats::default).await);
        assert!(manager.maybe_checkpoint(4, 4, "four", 9, MemoryStats::default).await);
        assert_eq!(manager.writes(), 2);

        let snapshot = load_progress(&path).await.unwrap();
        assert_eq!(snapshot.steps_processed, 4);
        assert_eq!(snapshot.records_processed, 9);
        assert_eq!(snapshot.custom_data["current_step"], "four");
        assert!(!dir.path().join("progress.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("progress.json");
        let mut manager = CheckpointManager::new(path, 1);

        assert!(!manager.maybe_checkpoint(1, 1, "only", 0, MemoryStats::default).await);
        assert_eq!(manager.writes(), 0);
    }

    #[tokio::test]
    async fn test_load_progress_missing_or_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_progress(dir.path().join("nope.json")).await.is_none());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert!(load_progress(&corrupt).await.is_none());
    }
}
