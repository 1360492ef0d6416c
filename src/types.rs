use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw package data as returned from the upstream catalog. Field names and
/// shapes vary per product, so this stays untyped until classification.
pub type RawPackageRecord = serde_json::Value;

/// Coverage breadth of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoClass {
    Global,
    Regional,
    Other,
}

impl GeoClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoClass::Global => "global",
            GeoClass::Regional => "regional",
            GeoClass::Other => "other",
        }
    }
}

impl std::fmt::Display for GeoClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a plan is a standalone purchasable product or an add-on applied
/// to an already-provisioned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommercialClass {
    Purchase,
    Topup,
}

impl CommercialClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommercialClass::Purchase => "purchase",
            CommercialClass::Topup => "topup",
        }
    }
}

impl std::fmt::Display for CommercialClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which slice of the catalog a pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTarget {
    Packages,
    Topups,
}

impl SyncTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTarget::Packages => "packages",
            SyncTarget::Topups => "topups",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "packages" => Some(SyncTarget::Packages),
            "topups" => Some(SyncTarget::Topups),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Completed,
    Partial,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
        }
    }
}

/// A catalog entry after classification and bundle expansion, ready for
/// pricing and reconciliation. Ephemeral, derived deterministically from a
/// RawPackageRecord (or a child thereof).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPackage {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Wholesale price from the upstream; always > 0 for leaf plans,
    /// always 0 for containers.
    pub source_price: f64,
    pub currency: String,
    pub country_codes: Vec<String>,
    pub region: String,
    pub geo_class: GeoClass,
    pub commercial_class: CommercialClass,
    pub parent_id: Option<String>,
    pub is_container: bool,
    /// Number of raw children under a container, resolved or not.
    pub child_count: Option<usize>,
    pub data_capacity: f64,
    pub validity_days: u32,
    pub operator: String,
}

/// The durable plan document. Created on first sync of a given id,
/// merged on every subsequent sync, never auto-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source_price: f64,
    pub retail_price: f64,
    pub currency: String,
    pub country_codes: Vec<String>,
    pub region: String,
    pub geo_class: GeoClass,
    pub commercial_class: CommercialClass,
    pub parent_id: Option<String>,
    pub is_container: bool,
    pub child_count: Option<usize>,
    pub data_capacity: f64,
    pub validity_days: u32,
    pub operator: String,
    pub provider: String,
    pub enabled: bool,
    pub available_for_purchase: bool,
    pub available_for_topup: bool,
    pub synced_at: DateTime<Utc>,
    pub updated_by: String,
}

impl PersistedPlan {
    /// Build the write draft for a classified package. Availability flags
    /// start from the classification defaults; the reconciliation writer
    /// merges them against any stored operator overrides before commit.
    pub fn from_classified(
        pkg: &ClassifiedPackage,
        retail_price: f64,
        synced_at: DateTime<Utc>,
        updated_by: &str,
    ) -> Self {
        let is_topup = pkg.commercial_class == CommercialClass::Topup;
        Self {
            id: pkg.id.clone(),
            name: pkg.name.clone(),
            description: pkg.description.clone(),
            source_price: pkg.source_price,
            retail_price: if pkg.is_container { 0.0 } else { retail_price },
            currency: pkg.currency.clone(),
            country_codes: pkg.country_codes.clone(),
            region: pkg.region.clone(),
            geo_class: pkg.geo_class,
            commercial_class: pkg.commercial_class,
            parent_id: pkg.parent_id.clone(),
            is_container: pkg.is_container,
            child_count: pkg.child_count,
            data_capacity: pkg.data_capacity,
            validity_days: pkg.validity_days,
            operator: pkg.operator.clone(),
            provider: crate::constants::PROVIDER.to_string(),
            enabled: true,
            available_for_purchase: !pkg.is_container && !is_topup,
            available_for_topup: is_topup,
            synced_at,
            updated_by: updated_by.to_string(),
        }
    }
}

/// Pricing configuration, externally mutable, read once per pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub markup_percentage: f64,
}

/// Audit record for one sync pass. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub target: SyncTarget,
    pub synced_count: usize,
    pub global_count: usize,
    pub regional_count: usize,
    pub other_count: usize,
    pub skipped_count: usize,
    pub status: SyncStatus,
}

impl SyncRun {
    pub fn new(target: SyncTarget, status: SyncStatus) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            target,
            synced_count: 0,
            global_count: 0,
            regional_count: 0,
            other_count: 0,
            skipped_count: 0,
            status,
        }
    }
}

/// Result of a complete sync pass, serialized as-is by the trigger
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    pub status: SyncStatus,
    pub target: SyncTarget,
    pub total_synced: usize,
    pub global_count: usize,
    pub regional_count: usize,
    pub other_count: usize,
    pub topup_count: usize,
    pub skipped_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncSummary {
    pub fn failed(target: SyncTarget, error: String) -> Self {
        Self {
            success: false,
            status: SyncStatus::Failed,
            target,
            total_synced: 0,
            global_count: 0,
            regional_count: 0,
            other_count: 0,
            topup_count: 0,
            skipped_count: 0,
            error: Some(error),
        }
    }
}

/// Seam between the orchestrator and the upstream catalog so tests can
/// substitute a stub source.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Identifier used in logs and metrics labels.
    fn source_name(&self) -> &'static str;

    /// Rebuild the underlying client if a prior pass left it in a failed
    /// state. Default is a no-op for sources with no connection state.
    fn reconnect_if_needed(&self) -> crate::error::Result<()> {
        Ok(())
    }

    /// Fetch the full raw catalog.
    async fn fetch_catalog(&self) -> std::result::Result<Vec<RawPackageRecord>, FetchError>;
}
