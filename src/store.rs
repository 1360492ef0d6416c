use crate::error::Result;
use crate::types::{PersistedPlan, SyncConfig, SyncRun};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Storage trait for the plan catalog, pricing config, and sync audit
/// log. The production document store lives behind this seam.
#[async_trait]
pub trait PlanStore: Send + Sync {
    // Plan operations
    async fn get_plan(&self, id: &str) -> Result<Option<PersistedPlan>>;
    /// Transactionally upsert one batch of plan documents. The batch either
    /// commits whole or not at all; callers cap batch size at the store's
    /// transactional limit.
    async fn commit_batch(&self, batch: &[PersistedPlan]) -> Result<()>;
    async fn list_plans(&self) -> Result<Vec<PersistedPlan>>;

    // Config operations
    async fn get_sync_config(&self) -> Result<Option<SyncConfig>>;
    async fn set_sync_config(&self, config: SyncConfig) -> Result<()>;

    // Audit log operations
    async fn append_sync_run(&self, run: &mut SyncRun) -> Result<()>;
    async fn list_sync_runs(&self) -> Result<Vec<SyncRun>>;
}

/// In-memory store implementation for development/testing
pub struct InMemoryPlanStore {
    plans: Arc<Mutex<HashMap<String, PersistedPlan>>>,
    sync_config: Arc<Mutex<Option<SyncConfig>>>,
    sync_runs: Arc<Mutex<Vec<SyncRun>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self {
            plans: Arc::new(Mutex::new(HashMap::new())),
            sync_config: Arc::new(Mutex::new(None)),
            sync_runs: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for InMemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn get_plan(&self, id: &str) -> Result<Option<PersistedPlan>> {
        let plans = self.plans.lock().unwrap();
        Ok(plans.get(id).cloned())
    }

    async fn commit_batch(&self, batch: &[PersistedPlan]) -> Result<()> {
        let mut plans = self.plans.lock().unwrap();
        for plan in batch {
            plans.insert(plan.id.clone(), plan.clone());
        }
        debug!("Committed batch of {} plans", batch.len());
        Ok(())
    }

    async fn list_plans(&self) -> Result<Vec<PersistedPlan>> {
        let plans = self.plans.lock().unwrap();
        Ok(plans.values().cloned().collect())
    }

    async fn get_sync_config(&self) -> Result<Option<SyncConfig>> {
        let config = self.sync_config.lock().unwrap();
        Ok(config.clone())
    }

    async fn set_sync_config(&self, config: SyncConfig) -> Result<()> {
        let mut stored = self.sync_config.lock().unwrap();
        *stored = Some(config);
        Ok(())
    }

    async fn append_sync_run(&self, run: &mut SyncRun) -> Result<()> {
        let id = Uuid::new_v4();
        run.id = Some(id);

        let mut runs = self.sync_runs.lock().unwrap();
        runs.push(run.clone());

        debug!("Recorded sync run {} with status {}", id, run.status.as_str());
        Ok(())
    }

    async fn list_sync_runs(&self) -> Result<Vec<SyncRun>> {
        let runs = self.sync_runs.lock().unwrap();
        Ok(runs.clone())
    }
}
