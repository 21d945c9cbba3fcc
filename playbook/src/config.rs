//! Engine configuration.
//!
//! Settings that control how a run is executed rather than what it does.
//! Playbook documents carry their own `config` section; this is the
//! operator-side counterpart.

use crate::progress::{
    DEFAULT_CHECKPOINT_EVERY, DEFAULT_COMPACT_INTERVAL, DEFAULT_PROGRESS_FILE,
    DEFAULT_TELEMETRY_EVERY,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding [`EngineConfig::progress_file`].
pub const ENV_PROGRESS_FILE: &str = "PLAYBOOK_PROGRESS_FILE";
/// Environment variable overriding [`EngineConfig::checkpoint_every`].
pub const ENV_CHECKPOINT_EVERY: &str = "PLAYBOOK_CHECKPOINT_EVERY";
/// Environment variable overriding [`EngineConfig::compact_interval`], in ms.
pub const ENV_COMPACT_INTERVAL_MS: &str = "PLAYBOOK_COMPACT_INTERVAL_MS";

/// Runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Where progress snapshots are written.
    pub progress_file: PathBuf,
    /// Snapshot cadence in steps; zero disables snapshots.
    pub checkpoint_every: usize,
    /// Minimum time between store compactions.
    pub compact_interval: Duration,
    /// Steps between memory telemetry lines; zero disables them.
    pub telemetry_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_file: PathBuf::from(DEFAULT_PROGRESS_FILE),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            compact_interval: DEFAULT_COMPACT_INTERVAL,
            telemetry_every: DEFAULT_TELEMETRY_EVERY,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Reads overrides from an environment snapshot. Unparseable values are
    /// logged and ignored.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = vars.get(ENV_PROGRESS_FILE).filter(|v| !v.trim().is_empty()) {
            config.progress_file = PathBuf::from(path.trim());
        }
        if let Some(every) = parse_var::<usize>(vars, ENV_CHECKPOINT_EVERY) {
            config.checkpoint_every = every;
        }
        if let Some(ms) = parse_var::<u64>(vars, ENV_COMPACT_INTERVAL_MS) {
            config.compact_interval = Duration::from_millis(ms);
        }
        config
    }

    /// Sets the progress file.
    #[must_use]
    pub fn with_progress_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.progress_file = path.into();
        self
    }

    /// Sets the checkpoint cadence.
    #[must_use]
    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every;
        self
    }

    /// Sets the compaction interval.
    #[must_use]
    pub fn with_compact_interval(mut self, interval: Duration) -> Self {
        self.compact_interval = interval;
        self
    }

    /// Sets the telemetry cadence.
    #[must_use]
    pub fn with_telemetry_every(mut self, every: usize) -> Self {
        self.telemetry_every = every;
        self
    }
}

fn parse_var<T: std::str::FromStr>(vars: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = vars.get(key)?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = raw.parse().ok();
    if parsed.is_none() {
        warn!(variable = key, value = raw, "Ignoring unparseable setting");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.progress_file, PathBuf::from("workflow-progress.json"));
        assert_eq!(config.checkpoint_every, 5);
        assert_eq!(config.compact_interval, Duration::from_secs(30));
        assert_eq!(config.telemetry_every, 10);
    }

    #[test]
    fn test_from_vars_overrides() {
        let vars: HashMap<String, String> = [
            (ENV_PROGRESS_FILE, "/tmp/p.json"),
            (ENV_CHECKPOINT_EVERY, "3"),
            (ENV_COMPACT_INTERVAL_MS, "250"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = EngineConfig::from_vars(&vars);
        assert_eq!(config.progress_file, PathBuf::from("/tmp/p.json"));
        assert_eq!(config.checkpoint_every, 3);
        assert_eq!(config.compact_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_from_vars_ignores_garbage() {
        let mut vars = HashMap::new();
        vars.insert(ENV_CHECKPOINT_EVERY.to_string(), "often".to_string());
        assert_eq!(EngineConfig::from_vars(&vars).checkpoint_every, 5);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_progress_file("p.json")
            .with_checkpoint_every(0)
            .with_compact_interval(Duration::ZERO)
            .with_telemetry_every(1);
        assert_eq!(config.checkpoint_every, 0);
        assert_eq!(config.telemetry_every, 1);
        assert_eq!(config.progress_file, PathBuf::from("p.json"));
    }
}
