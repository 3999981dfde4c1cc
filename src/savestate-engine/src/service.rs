//! Long-lived service context shared by every request handler.

use std::sync::Arc;

use savestate_storage::{ConfigPatch, ConfigView, SaveStatePaths};
use serde::Serialize;
use tracing::info;

use crate::checkpoint::Checkpoint;
use crate::engine::{
    AuthorizeReport, CheckpointEngine, CreatedCheckpoint, DeleteReport, DiffReport,
    EngineStatus, InterruptedWorkReport, LoadReport, OverwriteMode, OverwriteReport,
    RenameReport, UpdateReport,
};
use crate::error::Result;
use crate::outcome::Outcome;
use crate::scheduler::{AutoSaveScheduler, SchedulerState};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceStatus {
    #[serde(flatten)]
    pub engine: EngineStatus,
    pub auto_save: SchedulerState,
}

/// The engine plus the auto-save timer, with the rescheduling rules applied.
#[derive(Debug)]
pub struct SaveStateService {
    engine: Arc<CheckpointEngine>,
    scheduler: AutoSaveScheduler,
}

impl SaveStateService {
    pub fn new(engine: Arc<CheckpointEngine>) -> Self {
        let scheduler = AutoSaveScheduler::new(Arc::clone(&engine));
        Self { engine, scheduler }
    }

    pub async fn open(paths: SaveStatePaths) -> Result<Self> {
        let engine = CheckpointEngine::open(paths).await?;
        Ok(Self::new(Arc::new(engine)))
    }

    /// Install the auto-save timer from the persisted settings.
    pub async fn start(&self) -> SchedulerState {
        let state = self.scheduler.reschedule().await;
        info!(auto_save = state.running, "SaveState service started");
        state
    }

    pub fn engine(&self) -> &Arc<CheckpointEngine> {
        &self.engine
    }

    pub fn scheduler(&self) -> &AutoSaveScheduler {
        &self.scheduler
    }

    pub async fn get_config(&self) -> ConfigView {
        self.engine.config_store().get().await.view()
    }

    pub async fn save_config(&self, patch: ConfigPatch) -> Result<Outcome<ConfigView>> {
        let effect = self.engine.config_store().merge(patch).await?;
        self.scheduler.reschedule().await;

        let message = if effect.connection_changed {
            "Settings saved; reconnect to authorize the new repository"
        } else {
            "Settings saved"
        };
        Ok(Outcome::new(self.get_config().await, message))
    }

    pub async fn authorize(&self, branch: Option<&str>) -> Result<Outcome<AuthorizeReport>> {
        let outcome = self.engine.authorize(branch).await?;
        self.scheduler.reschedule().await;
        Ok(outcome)
    }

    pub async fn force_reinitialize(&self) -> Result<Outcome<AuthorizeReport>> {
        let result = self.engine.force_reinitialize().await;
        // Authorization was reset even when the new attempt failed.
        self.scheduler.reschedule().await;
        result
    }

    pub async fn status(&self) -> Result<ServiceStatus> {
        Ok(ServiceStatus {
            engine: self.engine.status().await?,
            auto_save: self.scheduler.state().await,
        })
    }

    pub async fn list(&self) -> Result<Vec<Checkpoint>> {
        self.engine.list().await
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Outcome<CreatedCheckpoint>> {
        self.engine.create(name, description).await
    }

    pub async fn load(&self, tag: &str) -> Result<Outcome<LoadReport>> {
        self.engine.load(tag).await
    }

    pub async fn delete(&self, tag: &str) -> Result<Outcome<DeleteReport>> {
        self.engine.delete(tag).await
    }

    pub async fn rename(
        &self,
        tag: &str,
        new_name: &str,
        description: Option<&str>,
    ) -> Result<Outcome<RenameReport>> {
        self.engine.rename(tag, new_name, description).await
    }

    pub async fn overwrite(&self, tag: &str) -> Result<Outcome<OverwriteReport>> {
        self.engine.overwrite(tag, OverwriteMode::Manual).await
    }

    pub async fn diff(&self, ref1: &str, ref2: &str) -> Result<DiffReport> {
        self.engine.diff(ref1, ref2).await
    }

    pub async fn apply_interrupted_work(&self) -> Result<Outcome<InterruptedWorkReport>> {
        self.engine.apply_interrupted_work().await
    }

    pub async fn discard_interrupted_work(&self) -> Result<Outcome<InterruptedWorkReport>> {
        self.engine.discard_interrupted_work().await
    }

    pub async fn check_for_update(&self) -> Result<UpdateReport> {
        self.engine.check_for_update().await
    }
}
