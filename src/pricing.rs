use crate::constants::DEFAULT_MARKUP_PERCENTAGE;
use crate::store::PlanStore;
use tracing::warn;

/// Derive the retail price from the wholesale price and a markup
/// percentage, rounded half-up to 2 decimal places.
///
/// Callers must only pass `source_price > 0`; records without a resolvable
/// positive price are skipped upstream, never zero-priced.
pub fn retail_price(source_price: f64, markup_percentage: f64) -> f64 {
    ((source_price * (1.0 + markup_percentage / 100.0)) * 100.0).round() / 100.0
}

/// Read the markup percentage from the config store. Missing or
/// unreachable config falls back to the default without aborting the pass.
pub async fn load_markup_percentage(store: &dyn PlanStore) -> f64 {
    match store.get_sync_config().await {
        Ok(Some(config)) => config.markup_percentage,
        Ok(None) => DEFAULT_MARKUP_PERCENTAGE,
        Err(e) => {
            warn!(component = "pricing", error = %e, "could not load markup config, using default");
            DEFAULT_MARKUP_PERCENTAGE
        }
    }
}
