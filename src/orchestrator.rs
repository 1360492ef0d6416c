use crate::classifier::{classify_commercial, classify_geo, extract_country_codes};
use crate::constants::{UPDATED_BY_PACKAGES, UPDATED_BY_TOPUPS};
use crate::expander;
use crate::pricing;
use crate::reconcile::{ReconciliationWriter, WriteContext};
use crate::store::PlanStore;
use crate::types::{
    CatalogSource, CommercialClass, SyncRun, SyncStatus, SyncSummary, SyncTarget,
};
use chrono::Utc;
use metrics::{counter, histogram};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Drives one end-to-end sync pass: fetch, classify, expand, price,
/// reconcile, audit. Re-entrant and safe to re-run; passes are idempotent.
/// Concurrent passes against the same store are not serialized here —
/// operators trigger syncs through an external single-flight lock.
pub struct SyncOrchestrator {
    source: Box<dyn CatalogSource>,
    store: Arc<dyn PlanStore>,
    writer: ReconciliationWriter,
}

impl SyncOrchestrator {
    pub fn new(source: Box<dyn CatalogSource>, store: Arc<dyn PlanStore>) -> Self {
        let writer = ReconciliationWriter::new(store.clone());
        Self {
            source,
            store,
            writer,
        }
    }

    #[instrument(skip(self), fields(source = self.source.source_name()))]
    pub async fn run_sync(&self, target: SyncTarget) -> SyncSummary {
        info!(component = "orchestrator", target = %target, "starting sync pass");
        counter!("esim_sync_runs_total", "target" => target.as_str()).increment(1);
        let started = std::time::Instant::now();

        if let Err(e) = self.source.reconnect_if_needed() {
            error!(component = "orchestrator", error = %e, "catalog client unavailable");
            return self.finish_failed(target, e.to_string()).await;
        }

        let records = match self.source.fetch_catalog().await {
            Ok(records) => records,
            Err(e) => {
                error!(
                    component = "orchestrator",
                    target = %target,
                    error = %e,
                    "catalog fetch failed, aborting pass before any writes"
                );
                return self.finish_failed(target, e.to_string()).await;
            }
        };

        let markup_percentage = pricing::load_markup_percentage(self.store.as_ref()).await;
        info!(
            component = "orchestrator",
            records = records.len(),
            markup = markup_percentage,
            "catalog fetched"
        );

        let mut plans = Vec::new();
        let mut skipped = 0usize;
        for record in &records {
            let commercial_class = classify_commercial(record);
            if target == SyncTarget::Topups && commercial_class != CommercialClass::Topup {
                continue;
            }
            let geo_class = classify_geo(record);
            let country_codes = extract_country_codes(record);
            let expanded = expander::expand(record, geo_class, &country_codes);
            if expanded.is_empty() {
                skipped += 1;
                continue;
            }
            plans.extend(expanded);
        }
        counter!("esim_sync_records_skipped_total", "target" => target.as_str())
            .increment(skipped as u64);

        let ctx = WriteContext {
            markup_percentage,
            updated_by: match target {
                SyncTarget::Packages => UPDATED_BY_PACKAGES,
                SyncTarget::Topups => UPDATED_BY_TOPUPS,
            }
            .to_string(),
            synced_at: Utc::now(),
        };
        let write = self.writer.upsert(&plans, &ctx).await;

        let status = if write.batches_committed == write.batches_total {
            SyncStatus::Completed
        } else if write.batches_committed > 0 {
            SyncStatus::Partial
        } else {
            SyncStatus::Failed
        };

        let mut run = SyncRun::new(target, status);
        run.synced_count = write.written;
        run.global_count = write.global_count;
        run.regional_count = write.regional_count;
        run.other_count = write.other_count;
        run.skipped_count = skipped;
        if let Err(e) = self.store.append_sync_run(&mut run).await {
            warn!(component = "orchestrator", error = %e, "failed to record sync run");
        }

        histogram!("esim_sync_pass_duration_seconds", "target" => target.as_str())
            .record(started.elapsed().as_secs_f64());
        info!(
            component = "orchestrator",
            target = %target,
            status = status.as_str(),
            synced = write.written,
            skipped,
            "sync pass finished"
        );

        SyncSummary {
            success: status == SyncStatus::Completed,
            status,
            target,
            total_synced: write.written,
            global_count: write.global_count,
            regional_count: write.regional_count,
            other_count: write.other_count,
            topup_count: write.topup_count,
            skipped_count: skipped,
            error: write.error,
        }
    }

    /// Record the failed pass in the audit log; no plan writes happened.
    async fn finish_failed(&self, target: SyncTarget, error: String) -> SyncSummary {
        counter!("esim_sync_failed_runs_total", "target" => target.as_str()).increment(1);
        let mut run = SyncRun::new(target, SyncStatus::Failed);
        if let Err(e) = self.store.append_sync_run(&mut run).await {
            warn!(component = "orchestrator", error = %e, "failed to record sync run");
        }
        SyncSummary::failed(target, error)
    }
}
