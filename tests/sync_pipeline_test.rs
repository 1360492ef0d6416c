use anyhow::Result;
use async_trait::async_trait;
use esim_sync::error::{FetchError, SyncError};
use esim_sync::orchestrator::SyncOrchestrator;
use esim_sync::store::{InMemoryPlanStore, PlanStore};
use esim_sync::types::{
    CatalogSource, PersistedPlan, RawPackageRecord, SyncConfig, SyncRun, SyncStatus, SyncTarget,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Catalog source returning a fixed record list.
struct StubCatalog {
    records: Vec<RawPackageRecord>,
}

#[async_trait]
impl CatalogSource for StubCatalog {
    fn source_name(&self) -> &'static str {
        "stub_catalog"
    }

    async fn fetch_catalog(&self) -> std::result::Result<Vec<RawPackageRecord>, FetchError> {
        Ok(self.records.clone())
    }
}

/// Catalog source that always fails with a fixed fetch error.
struct FailingCatalog {
    error: fn() -> FetchError,
}

#[async_trait]
impl CatalogSource for FailingCatalog {
    fn source_name(&self) -> &'static str {
        "failing_catalog"
    }

    async fn fetch_catalog(&self) -> std::result::Result<Vec<RawPackageRecord>, FetchError> {
        Err((self.error)())
    }
}

/// Store wrapper that fails the Nth batch commit (1-based).
struct FlakyStore {
    inner: InMemoryPlanStore,
    fail_on: usize,
    commits: AtomicUsize,
}

impl FlakyStore {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: InMemoryPlanStore::new(),
            fail_on,
            commits: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PlanStore for FlakyStore {
    async fn get_plan(&self, id: &str) -> esim_sync::error::Result<Option<PersistedPlan>> {
        self.inner.get_plan(id).await
    }

    async fn commit_batch(&self, batch: &[PersistedPlan]) -> esim_sync::error::Result<()> {
        let attempt = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_on {
            return Err(SyncError::Store {
                message: "simulated commit failure".to_string(),
            });
        }
        self.inner.commit_batch(batch).await
    }

    async fn list_plans(&self) -> esim_sync::error::Result<Vec<PersistedPlan>> {
        self.inner.list_plans().await
    }

    async fn get_sync_config(&self) -> esim_sync::error::Result<Option<SyncConfig>> {
        self.inner.get_sync_config().await
    }

    async fn set_sync_config(&self, config: SyncConfig) -> esim_sync::error::Result<()> {
        self.inner.set_sync_config(config).await
    }

    async fn append_sync_run(&self, run: &mut SyncRun) -> esim_sync::error::Result<()> {
        self.inner.append_sync_run(run).await
    }

    async fn list_sync_runs(&self) -> esim_sync::error::Result<Vec<SyncRun>> {
        self.inner.list_sync_runs().await
    }
}

/// A small catalog covering every classification path: a global bundle
/// with nested children (one unpriceable), a regional leaf, a country
/// leaf, a topup plan, and a record without an id.
fn fixture_catalog() -> Vec<RawPackageRecord> {
    vec![
        json!({
            "slug": "discover-plus",
            "name": "Discover+",
            "type": "global",
            "description": "Worldwide coverage",
            "currency": "USD",
            "period": 30,
            "countries": [],
            "operators": [{
                "name": "GlobalOp",
                "packages": [
                    {"id": "7d-1gb", "price": 9.0, "capacity": 1, "day": 7},
                    {"id": "30d-10gb", "price": 59.0, "capacity": 10, "day": 30},
                    {"id": "unpriced", "capacity": 5}
                ]
            }]
        }),
        json!({
            "slug": "asia-7days-3gb",
            "name": "Asia 3GB",
            "price": 7.5,
            "capacity": 3,
            "period": 7,
            "countries": [{"country_code": "JP"}, {"country_code": "KR"}]
        }),
        json!({
            "slug": "usa-7days-3gb",
            "name": "USA 3GB",
            "price": 5.0,
            "capacity": 3,
            "period": 7,
            "country_code": "US"
        }),
        json!({
            "slug": "usa-7days-1gb-topup",
            "name": "USA Topup 1GB",
            "price": 3.0,
            "capacity": 1,
            "period": 7,
            "country_code": "US"
        }),
        json!({"name": "No Id Here", "price": 4.0}),
    ]
}

fn orchestrator_with(
    records: Vec<RawPackageRecord>,
    store: Arc<dyn PlanStore>,
) -> SyncOrchestrator {
    SyncOrchestrator::new(Box::new(StubCatalog { records }), store)
}

#[tokio::test]
async fn full_pass_classifies_expands_and_persists() -> Result<()> {
    let store = Arc::new(InMemoryPlanStore::new());
    let orchestrator = orchestrator_with(fixture_catalog(), store.clone());

    let summary = orchestrator.run_sync(SyncTarget::Packages).await;

    assert!(summary.success);
    assert_eq!(summary.status, SyncStatus::Completed);
    // 2 bundle children + container + regional leaf + country leaf + topup
    assert_eq!(summary.total_synced, 6);
    assert_eq!(summary.global_count, 3);
    assert_eq!(summary.regional_count, 1);
    assert_eq!(summary.other_count, 2);
    assert_eq!(summary.topup_count, 1);
    assert_eq!(summary.skipped_count, 1);

    // Container: zero-priced, never purchasable, counts all raw children.
    let container = store.get_plan("discover-plus").await?.unwrap();
    assert!(container.is_container);
    assert_eq!(container.retail_price, 0.0);
    assert_eq!(container.child_count, Some(3));
    assert!(!container.available_for_purchase);

    // Child: stable composite id, default 17% markup applied.
    let child = store.get_plan("discover-plus_7d-1gb").await?.unwrap();
    assert_eq!(child.parent_id.as_deref(), Some("discover-plus"));
    assert_eq!(child.source_price, 9.0);
    assert_eq!(child.retail_price, 10.53);
    assert_eq!(child.validity_days, 7);

    // The unpriceable child was dropped, not zero-priced.
    assert!(store.get_plan("discover-plus_unpriced").await?.is_none());

    // Topup classification forces availability flags.
    let topup = store.get_plan("usa-7days-1gb-topup").await?.unwrap();
    assert!(topup.available_for_topup);
    assert!(!topup.available_for_purchase);

    let purchase = store.get_plan("usa-7days-3gb").await?.unwrap();
    assert!(purchase.available_for_purchase);
    assert!(!purchase.available_for_topup);

    // One completed audit entry.
    let runs = store.list_sync_runs().await?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncStatus::Completed);
    assert_eq!(runs[0].synced_count, 6);
    assert_eq!(runs[0].skipped_count, 1);

    Ok(())
}

#[tokio::test]
async fn markup_is_read_from_the_config_store() -> Result<()> {
    let store = Arc::new(InMemoryPlanStore::new());
    store
        .set_sync_config(SyncConfig {
            markup_percentage: 20.0,
        })
        .await?;
    let orchestrator = orchestrator_with(fixture_catalog(), store.clone());

    orchestrator.run_sync(SyncTarget::Packages).await;

    let plan = store.get_plan("usa-7days-3gb").await?.unwrap();
    assert_eq!(plan.retail_price, 6.0);
    Ok(())
}

#[tokio::test]
async fn resync_of_unchanged_catalog_is_idempotent() -> Result<()> {
    let store = Arc::new(InMemoryPlanStore::new());
    let orchestrator = orchestrator_with(fixture_catalog(), store.clone());

    orchestrator.run_sync(SyncTarget::Packages).await;
    let mut first: Vec<PersistedPlan> = store.list_plans().await?;
    first.sort_by(|a, b| a.id.cmp(&b.id));

    orchestrator.run_sync(SyncTarget::Packages).await;
    let mut second: Vec<PersistedPlan> = store.list_plans().await?;
    second.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(first.len(), second.len());
    for (before, mut after) in first.into_iter().zip(second) {
        // Only the sync timestamp may move between identical passes.
        after.synced_at = before.synced_at;
        assert_eq!(before, after);
    }
    Ok(())
}

#[tokio::test]
async fn operator_overrides_survive_resync() -> Result<()> {
    let store = Arc::new(InMemoryPlanStore::new());
    let orchestrator = orchestrator_with(fixture_catalog(), store.clone());
    orchestrator.run_sync(SyncTarget::Packages).await;

    // Operator pulls a purchase plan from sale and disables it outright.
    let mut plan = store.get_plan("usa-7days-3gb").await?.unwrap();
    plan.available_for_purchase = false;
    plan.enabled = false;
    store.commit_batch(&[plan]).await?;

    // Operator (incorrectly) marks a topup plan purchasable.
    let mut topup = store.get_plan("usa-7days-1gb-topup").await?.unwrap();
    topup.available_for_purchase = true;
    store.commit_batch(&[topup]).await?;

    orchestrator.run_sync(SyncTarget::Packages).await;

    // Purchase availability is operator-authoritative and sticky.
    let plan = store.get_plan("usa-7days-3gb").await?.unwrap();
    assert!(!plan.available_for_purchase);
    assert!(!plan.enabled);

    // Topup status is catalog-authoritative and always reasserted.
    let topup = store.get_plan("usa-7days-1gb-topup").await?.unwrap();
    assert!(!topup.available_for_purchase);
    assert!(topup.available_for_topup);
    Ok(())
}

#[tokio::test]
async fn topups_target_only_syncs_topup_plans() -> Result<()> {
    let store = Arc::new(InMemoryPlanStore::new());
    let orchestrator = orchestrator_with(fixture_catalog(), store.clone());

    let summary = orchestrator.run_sync(SyncTarget::Topups).await;

    assert!(summary.success);
    assert_eq!(summary.total_synced, 1);
    assert_eq!(summary.topup_count, 1);

    let plans = store.list_plans().await?;
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].id, "usa-7days-1gb-topup");
    Ok(())
}

#[tokio::test]
async fn failed_batch_aborts_remaining_batches_only() -> Result<()> {
    // 1100 single-country plans fill three store batches (500/500/100).
    let records: Vec<RawPackageRecord> = (0..1100)
        .map(|i| {
            json!({
                "slug": format!("usa-plan-{i}"),
                "name": format!("USA Plan {i}"),
                "price": 5.0,
                "country_code": "US"
            })
        })
        .collect();

    let store = Arc::new(FlakyStore::new(2));
    let orchestrator = orchestrator_with(records, store.clone());

    let summary = orchestrator.run_sync(SyncTarget::Packages).await;

    assert!(!summary.success);
    assert_eq!(summary.status, SyncStatus::Partial);
    // Only batch 1 committed; its counts are the reported counts.
    assert_eq!(summary.total_synced, 500);
    assert_eq!(summary.other_count, 500);
    assert!(summary.error.is_some());

    // Batch 1 landed, batch 3 was never attempted.
    assert_eq!(store.list_plans().await?.len(), 500);
    assert_eq!(store.commits.load(Ordering::SeqCst), 2);

    let runs = store.list_sync_runs().await?;
    assert_eq!(runs[0].status, SyncStatus::Partial);
    assert_eq!(runs[0].synced_count, 500);
    Ok(())
}

#[tokio::test]
async fn fetch_failures_abort_before_any_write() -> Result<()> {
    let store = Arc::new(InMemoryPlanStore::new());
    let orchestrator = SyncOrchestrator::new(
        Box::new(FailingCatalog {
            error: || FetchError::EmptyCatalog,
        }),
        store.clone(),
    );

    let summary = orchestrator.run_sync(SyncTarget::Packages).await;

    assert!(!summary.success);
    assert_eq!(summary.status, SyncStatus::Failed);
    assert_eq!(summary.total_synced, 0);
    assert!(store.list_plans().await?.is_empty());

    // An empty catalog reads as a data incident, not a connectivity fault.
    let message = summary.error.unwrap();
    assert!(message.contains("zero records"));

    let runs = store.list_sync_runs().await?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncStatus::Failed);

    let unavailable = SyncOrchestrator::new(
        Box::new(FailingCatalog {
            error: || FetchError::Unavailable("connection refused".to_string()),
        }),
        store.clone(),
    );
    let summary = unavailable.run_sync(SyncTarget::Packages).await;
    assert!(summary.error.unwrap().contains("unavailable"));
    Ok(())
}
