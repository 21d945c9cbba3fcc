//! Sequential step execution.

use super::summary::RunSummary;
use crate::actions::ActionRegistry;
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::core::{RunState, StepStatus};
use crate::document::{Playbook, Step};
use crate::errors::{ActionError, LoadError, PlaybookError};
use crate::events::{kinds, EventSink, NoOpEventSink};
use crate::progress::{CheckpointManager, ResourceMonitor};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};

/// Executes playbooks one step at a time.
///
/// A runner can execute several playbooks in turn; each run gets a fresh
/// [`RunContext`]. Runs that should proceed concurrently need separate
/// runners.
pub struct PipelineRunner {
    registry: Arc<ActionRegistry>,
    config: EngineConfig,
    events: Arc<dyn EventSink>,
    cancellation: Arc<CancellationToken>,
    state: RunState,
}

impl PipelineRunner {
    /// Creates a runner dispatching through `registry`.
    #[must_use]
    pub fn new(registry: ActionRegistry) -> Self {
        Self::with_shared_registry(Arc::new(registry))
    }

    /// Creates a runner over a registry shared with other runners.
    #[must_use]
    pub fn with_shared_registry(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            events: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
            state: RunState::Idle,
        }
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// The token that cancels this runner's runs.
    #[must_use]
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancellation)
    }

    /// The state of the current or most recent run.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads the playbook at `path` and runs it.
    ///
    /// # Errors
    ///
    /// `Load` when the document cannot be read or is malformed, otherwise
    /// as [`PipelineRunner::run`].
    pub async fn run_file(
        &mut self,
        path: impl AsRef<Path>,
        environment: HashMap<String, String>,
    ) -> Result<RunSummary, PlaybookError> {
        self.state = RunState::Loading;
        match Playbook::load(path).await {
            Ok(playbook) => self.run(&playbook, environment).await,
            Err(e) => {
                self.state = RunState::Failed;
                error!(error = %e, "Playbook execution failed");
                self.events
                    .emit(kinds::RUN_FAILED, Some(json!({ "error": e.to_string() })))
                    .await;
                Err(e.into())
            }
        }
    }

    /// Runs `playbook` with the given environment snapshot.
    ///
    /// Collections and buffers are dropped when the run ends, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// `Load(NoSteps)` for an empty playbook, `StepFailed` for the first
    /// failing step without `ignore_errors`, `Cancelled` if the run was
    /// cancelled.
    pub async fn run(
        &mut self,
        playbook: &Playbook,
        environment: HashMap<String, String>,
    ) -> Result<RunSummary, PlaybookError> {
        let config = playbook.resolved_config(&environment);
        let mut ctx =
            RunContext::new(environment, config).with_cancellation(Arc::clone(&self.cancellation));
        self.execute(playbook, &mut ctx).await
    }

    /// Runs `playbook` against a caller-provided context.
    ///
    /// The context's collections and buffers are cleared when the run ends;
    /// `vars` and the records counter are left for the caller to inspect.
    /// Results are moved into the returned summary. Cancellation is read
    /// from the context's token.
    ///
    /// # Errors
    ///
    /// As [`PipelineRunner::run`].
    pub async fn execute(
        &mut self,
        playbook: &Playbook,
        ctx: &mut RunContext,
    ) -> Result<RunSummary, PlaybookError> {
        self.state = RunState::Loading;
        if playbook.steps.is_empty() {
            self.state = RunState::Failed;
            return Err(LoadError::NoSteps.into());
        }

        let mut summary = RunSummary::new(playbook.display_name(), ctx.run_id());
        let started = Instant::now();

        info!(
            playbook = %summary.playbook,
            run_id = %summary.run_id,
            steps = playbook.steps.len(),
            "Starting playbook"
        );
        if let Some(description) = &playbook.description {
            info!(description = %description, "Playbook description");
        }
        self.events
            .emit(
                kinds::RUN_STARTED,
                Some(json!({
                    "run_id": summary.run_id.to_string(),
                    "playbook": summary.playbook,
                    "steps": playbook.steps.len(),
                })),
            )
            .await;

        let span = info_span!("run", run_id = %summary.run_id);
        let outcome = self
            .execute_steps(&playbook.steps, ctx, &mut summary)
            .instrument(span)
            .await;

        ctx.cleanup();
        summary.elapsed = started.elapsed();
        summary.records_processed = ctx.records_processed();

        match outcome {
            Ok(()) => {
                self.state = RunState::Completed;
                summary.results = std::mem::take(&mut ctx.results);
                info!(
                    playbook = %summary.playbook,
                    elapsed_ms = millis(summary.elapsed),
                    "Playbook completed successfully"
                );
                self.events
                    .emit(
                        kinds::RUN_COMPLETED,
                        Some(json!({
                            "run_id": summary.run_id.to_string(),
                            "steps_completed": summary.steps_completed,
                            "steps_skipped": summary.steps_skipped,
                            "steps_failed_ignored": summary.steps_failed_ignored,
                            "elapsed_ms": millis(summary.elapsed),
                        })),
                    )
                    .await;
                Ok(summary)
            }
            Err(e) => {
                self.state = RunState::Failed;
                error!(error = %e, "Playbook execution failed");
                self.events
                    .emit(
                        kinds::RUN_FAILED,
                        Some(json!({
                            "run_id": summary.run_id.to_string(),
                            "step": e.step_name(),
                            "error": e.to_string(),
                        })),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn execute_steps(
        &mut self,
        steps: &[Step],
        ctx: &mut RunContext,
        summary: &mut RunSummary,
    ) -> Result<(), PlaybookError> {
        let total = steps.len();
        let mut checkpoints =
            CheckpointManager::new(&self.config.progress_file, self.config.checkpoint_every);
        let mut monitor =
            ResourceMonitor::new(self.config.compact_interval, self.config.telemetry_every);

        for (index, step) in steps.iter().enumerate() {
            if ctx.is_cancelled() {
                let reason = ctx
                    .cancellation()
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                warn!(step = index + 1, reason = %reason, "Run cancelled before step");
                summary.checkpoints_written = checkpoints.writes();
                return Err(PlaybookError::Cancelled(reason));
            }

            self.state = RunState::Running(index);
            let outcome = self.execute_step(index, step, ctx).await;
            if let Ok(status) = &outcome {
                summary.record(*status);
            }

            let step_number = index + 1;
            let label = step.name.as_deref().unwrap_or_default();
            let records = ctx.records_processed();
            checkpoints
                .maybe_checkpoint(step_number, total, label, records, || monitor.sample(ctx))
                .await;
            monitor.maybe_compact(ctx);
            monitor.maybe_log(step_number, ctx);
            summary.checkpoints_written = checkpoints.writes();

            outcome?;
        }
        Ok(())
    }

    async fn execute_step(
        &self,
        index: usize,
        step: &Step,
        ctx: &mut RunContext,
    ) -> Result<StepStatus, PlaybookError> {
        let number = index + 1;
        let Some((name, action)) = step.runnable() else {
            warn!(step = number, "Missing name or action, skipping");
            self.events
                .emit(
                    kinds::STEP_SKIPPED,
                    Some(json!({ "index": number, "reason": "missing name or action" })),
                )
                .await;
            return Ok(StepStatus::Skipped);
        };

        if !step.should_run(ctx) {
            info!(step = number, name = %name, "Condition not met, skipping");
            self.events
                .emit(
                    kinds::STEP_SKIPPED,
                    Some(json!({ "index": number, "step": name, "reason": "condition not met" })),
                )
                .await;
            return Ok(StepStatus::Skipped);
        }

        info!(step = number, name = %name, action = %action, "Running step");
        self.events
            .emit(
                kinds::STEP_STARTED,
                Some(json!({ "index": number, "step": name, "action": action })),
            )
            .await;

        let params = ctx.resolve_params(&step.params);
        let started = Instant::now();
        let span = info_span!("step", index = number, name = %name, action = %action);
        let result = self
            .registry
            .dispatch(action, &params, ctx)
            .instrument(span)
            .await;
        let duration_ms = millis(started.elapsed());

        match result {
            Ok(value) => {
                if let Some(var) = step.register.as_deref().filter(|v| !v.is_empty()) {
                    info!(variable = %var, "Registered result");
                    ctx.vars.insert(var.to_string(), value.clone());
                }
                if step.track_result {
                    ctx.results.insert(name.to_string(), value);
                }
                info!(step = number, name = %name, duration_ms, "Step completed");
                self.events
                    .emit(
                        kinds::STEP_COMPLETED,
                        Some(json!({ "index": number, "step": name, "duration_ms": duration_ms })),
                    )
                    .await;
                Ok(StepStatus::Completed)
            }
            Err(e) => {
                error!(step = number, name = %name, error = %e, "Step failed");
                let ignored = step.ignore_errors && !matches!(e, ActionError::Cancelled(_));
                self.events
                    .emit(
                        kinds::STEP_FAILED,
                        Some(json!({
                            "index": number,
                            "step": name,
                            "error": e.to_string(),
                            "ignored": ignored,
                            "duration_ms": duration_ms,
                        })),
                    )
                    .await;

                match e {
                    ActionError::Cancelled(reason) => Err(PlaybookError::Cancelled(reason)),
                    _ if ignored => {
                        warn!(step = number, name = %name, "Ignoring error and continuing");
                        Ok(StepStatus::FailedIgnored)
                    }
                    source => Err(PlaybookError::StepFailed {
                        step: name.to_string(),
                        source,
                    }),
                }
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
