//! Timer-driven auto-save.
//!
//! At most one timer exists. [`AutoSaveScheduler::reschedule`] stops the
//! current timer before installing a new one, and is called whenever the
//! settings change or authorization completes.
//!
//! Stopping only prevents future ticks. A cycle that already started runs
//! to completion, since interrupting an overwrite between deleting and
//! re-pushing its tag would lose the checkpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{CheckpointEngine, OverwriteMode};
use crate::error::EngineError;

/// Why a cycle did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "operation")]
pub enum SkipReason {
    NotAuthorized,
    Disabled,
    NoTarget,
    /// Another operation held the lock.
    Busy(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Saved { tag: String },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchedulerState {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub target_tag: Option<String>,
    /// A timer is installed.
    pub running: bool,
    /// Cycles run since the process started.
    pub cycles: u64,
}

/// An installed timer task and its stop signal.
#[derive(Debug)]
struct Timer {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Timer {
    /// Ask the task to exit before its next tick.
    fn stop(self) -> JoinHandle<()> {
        let _ = self.stop.send(true);
        self.task
    }
}

#[derive(Debug)]
pub struct AutoSaveScheduler {
    engine: Arc<CheckpointEngine>,
    timer: Mutex<Option<Timer>>,
    cycles: Arc<AtomicU64>,
}

impl AutoSaveScheduler {
    pub fn new(engine: Arc<CheckpointEngine>) -> Self {
        Self {
            engine,
            timer: Mutex::new(None),
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Re-derive the timer from the current settings.
    pub async fn reschedule(&self) -> SchedulerState {
        let config = self.engine.config_store().get().await;
        let auto = &config.auto_save;
        let wanted = config.is_authorized && auto.enabled && auto.target().is_some();

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = timer.take() {
            drop(old.stop());
            debug!("Auto-save timer cleared");
        }

        if wanted {
            let period = auto.effective_interval();
            let engine = Arc::clone(&self.engine);
            let cycles = Arc::clone(&self.cycles);
            let (stop, mut stopped) = watch::channel(false);
            let task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        _ = stopped.changed() => break,
                        _ = ticker.tick() => {}
                    }
                    let outcome = run_cycle(&engine).await;
                    cycles.fetch_add(1, Ordering::SeqCst);
                    debug!(?outcome, "Auto-save cycle finished");
                }
            });
            *timer = Some(Timer { stop, task });
            info!(
                minutes = auto.effective_minutes(),
                tag = auto.target().unwrap_or_default(),
                "Auto-save scheduled"
            );
        }

        SchedulerState {
            enabled: auto.enabled,
            interval_minutes: auto.effective_minutes(),
            target_tag: auto.target().map(str::to_string),
            running: timer.is_some(),
            cycles: self.cycles(),
        }
    }

    /// Current state without touching the timer.
    pub async fn state(&self) -> SchedulerState {
        let config = self.engine.config_store().get().await;
        let auto = &config.auto_save;
        SchedulerState {
            enabled: auto.enabled,
            interval_minutes: auto.effective_minutes(),
            target_tag: auto.target().map(str::to_string),
            running: self.is_running(),
            cycles: self.cycles(),
        }
    }

    /// Stop future ticks. A cycle in progress keeps running.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        timer.map(|timer| {
            info!("Auto-save stopped");
            timer.stop()
        })
    }

    /// Stop the timer and wait for a cycle in progress to finish.
    pub async fn shutdown(&self) {
        if let Some(task) = self.stop() {
            if let Err(e) = task.await {
                warn!(error = %e, "Auto-save task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.task.is_finished())
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// One auto-save attempt, outside the timer.
    pub async fn run_once(&self) -> CycleOutcome {
        let outcome = run_cycle(&self.engine).await;
        self.cycles.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        drop(self.stop());
    }
}

/// Overwrite the target checkpoint if every precondition holds.
async fn run_cycle(engine: &CheckpointEngine) -> CycleOutcome {
    let config = engine.config_store().get().await;
    if !config.is_authorized {
        return CycleOutcome::Skipped(SkipReason::NotAuthorized);
    }
    if !config.auto_save.enabled {
        return CycleOutcome::Skipped(SkipReason::Disabled);
    }
    let Some(target) = config.auto_save.target() else {
        return CycleOutcome::Skipped(SkipReason::NoTarget);
    };
    if let Some(operation) = engine.current_operation() {
        debug!(operation, "Auto-save skipped, operation in progress");
        return CycleOutcome::Skipped(SkipReason::Busy(operation.to_string()));
    }

    match engine.overwrite(target, OverwriteMode::Autonomous).await {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                warn!(tag = target, %warning, "Auto-save completed with warning");
            }
            info!(tag = target, "Auto-save completed");
            CycleOutcome::Saved {
                tag: target.to_string(),
            }
        }
        Err(EngineError::Busy { operation }) => CycleOutcome::Skipped(SkipReason::Busy(operation)),
        Err(e) => {
            warn!(tag = target, error = %e, "Auto-save failed");
            CycleOutcome::Failed(e.to_string())
        }
    }
}
