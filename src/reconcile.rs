use crate::constants::MAX_BATCH_SIZE;
use crate::pricing;
use crate::store::PlanStore;
use crate::types::{ClassifiedPackage, CommercialClass, GeoClass, PersistedPlan};
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Pass-wide inputs the writer stamps on every document.
#[derive(Debug, Clone)]
pub struct WriteContext {
    pub markup_percentage: f64,
    pub updated_by: String,
    pub synced_at: DateTime<Utc>,
}

/// What one upsert call actually committed. All counts cover committed
/// batches only; a failed batch and everything after it are excluded.
#[derive(Debug, Default)]
pub struct WriteSummary {
    pub written: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub global_count: usize,
    pub regional_count: usize,
    pub other_count: usize,
    pub purchase_count: usize,
    pub topup_count: usize,
    pub batches_total: usize,
    pub batches_committed: usize,
    pub error: Option<String>,
}

#[derive(Default)]
struct BatchCounts {
    created: usize,
    updated: usize,
    unchanged: usize,
    global: usize,
    regional: usize,
    other: usize,
    purchase: usize,
    topup: usize,
}

impl BatchCounts {
    fn add(&mut self, existing: Option<&PersistedPlan>, merged: &PersistedPlan) {
        match existing {
            None => self.created += 1,
            Some(prev) if plan_has_changes(prev, merged) => self.updated += 1,
            Some(_) => self.unchanged += 1,
        }
        match merged.geo_class {
            GeoClass::Global => self.global += 1,
            GeoClass::Regional => self.regional += 1,
            GeoClass::Other => self.other += 1,
        }
        match merged.commercial_class {
            CommercialClass::Purchase => self.purchase += 1,
            CommercialClass::Topup => self.topup += 1,
        }
    }
}

/// Idempotently reconciles classified packages into the plan store in
/// bounded batches, preserving operator overrides on merge.
pub struct ReconciliationWriter {
    store: Arc<dyn PlanStore>,
    batch_size: usize,
}

impl ReconciliationWriter {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self {
            store,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Override the batch limit, for stores with a different transactional
    /// ceiling and for tests.
    pub fn with_batch_size(store: Arc<dyn PlanStore>, batch_size: usize) -> Self {
        Self { store, batch_size }
    }

    /// Merge-upsert all plans. Batches commit independently; the first
    /// failing batch aborts the remaining ones, and the summary reports
    /// only what actually landed.
    #[instrument(skip(self, plans, ctx), fields(plan_count = plans.len()))]
    pub async fn upsert(&self, plans: &[ClassifiedPackage], ctx: &WriteContext) -> WriteSummary {
        let mut summary = WriteSummary {
            batches_total: plans.chunks(self.batch_size).count(),
            ..WriteSummary::default()
        };

        'batches: for (batch_index, chunk) in plans.chunks(self.batch_size).enumerate() {
            let mut batch = Vec::with_capacity(chunk.len());
            let mut counts = BatchCounts::default();

            for pkg in chunk {
                let retail = if pkg.is_container {
                    0.0
                } else {
                    pricing::retail_price(pkg.source_price, ctx.markup_percentage)
                };
                let draft =
                    PersistedPlan::from_classified(pkg, retail, ctx.synced_at, &ctx.updated_by);

                let existing = match self.store.get_plan(&pkg.id).await {
                    Ok(existing) => existing,
                    Err(e) => {
                        error!(
                            component = "writer",
                            record_id = %pkg.id,
                            error = %e,
                            "failed to read existing plan, aborting remaining batches"
                        );
                        summary.error = Some(e.to_string());
                        break 'batches;
                    }
                };

                let merged = merge_with_existing(draft, existing.as_ref());
                counts.add(existing.as_ref(), &merged);
                debug!(
                    component = "writer",
                    record_id = %merged.id,
                    outcome = if existing.is_some() { "merged" } else { "created" },
                    "prepared plan write"
                );
                batch.push(merged);
            }

            match self.store.commit_batch(&batch).await {
                Ok(()) => {
                    summary.written += batch.len();
                    summary.created += counts.created;
                    summary.updated += counts.updated;
                    summary.unchanged += counts.unchanged;
                    summary.global_count += counts.global;
                    summary.regional_count += counts.regional;
                    summary.other_count += counts.other;
                    summary.purchase_count += counts.purchase;
                    summary.topup_count += counts.topup;
                    summary.batches_committed += 1;
                    counter!("esim_sync_batches_committed_total").increment(1);
                    counter!("esim_sync_plans_written_total").increment(batch.len() as u64);
                    info!(
                        component = "writer",
                        batch = batch_index,
                        written = batch.len(),
                        outcome = "written",
                        "committed batch"
                    );
                }
                Err(e) => {
                    counter!("esim_sync_batch_failures_total").increment(1);
                    error!(
                        component = "writer",
                        batch = batch_index,
                        error = %e,
                        "batch commit failed, aborting remaining batches"
                    );
                    summary.error = Some(e.to_string());
                    break 'batches;
                }
            }
        }

        summary
    }
}

/// Apply the override-preservation rules to a write draft.
///
/// Topup classification is catalog-authoritative and always wins;
/// purchase availability is operator-authoritative and sticky. A stored
/// `enabled` value likewise survives the merge. Containers are never
/// purchasable, whatever was stored before.
pub fn merge_with_existing(
    mut draft: PersistedPlan,
    existing: Option<&PersistedPlan>,
) -> PersistedPlan {
    if draft.is_container {
        draft.available_for_purchase = false;
        draft.available_for_topup = false;
    } else {
        match draft.commercial_class {
            CommercialClass::Topup => {
                draft.available_for_purchase = false;
                draft.available_for_topup = true;
            }
            CommercialClass::Purchase => match existing {
                Some(prev) => {
                    draft.available_for_purchase = prev.available_for_purchase;
                    draft.available_for_topup = prev.available_for_topup;
                }
                None => {
                    draft.available_for_purchase = true;
                    draft.available_for_topup = false;
                }
            },
        }
    }
    if let Some(prev) = existing {
        draft.enabled = prev.enabled;
    }
    draft
}

/// Check whether a plan write would change anything beyond `synced_at`.
pub fn plan_has_changes(existing: &PersistedPlan, updated: &PersistedPlan) -> bool {
    existing.name != updated.name
        || existing.description != updated.description
        || existing.source_price != updated.source_price
        || existing.retail_price != updated.retail_price
        || existing.currency != updated.currency
        || existing.country_codes != updated.country_codes
        || existing.region != updated.region
        || existing.geo_class != updated.geo_class
        || existing.commercial_class != updated.commercial_class
        || existing.parent_id != updated.parent_id
        || existing.is_container != updated.is_container
        || existing.child_count != updated.child_count
        || existing.data_capacity != updated.data_capacity
        || existing.validity_days != updated.validity_days
        || existing.operator != updated.operator
        || existing.provider != updated.provider
        || existing.enabled != updated.enabled
        || existing.available_for_purchase != updated.available_for_purchase
        || existing.available_for_topup != updated.available_for_topup
        || existing.updated_by != updated.updated_by
}
