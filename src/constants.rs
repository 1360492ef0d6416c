/// Shared constants for the catalog sync pipeline: canonical identifier
/// lists, upstream field precedence tables, and store limits.

/// Markup applied to wholesale prices when the pricing config document is
/// missing or unreachable.
pub const DEFAULT_MARKUP_PERCENTAGE: f64 = 17.0;

/// Firestore-compatible transactional batch limit; the writer never puts
/// more than this many documents in one commit.
pub const MAX_BATCH_SIZE: usize = 500;

/// Upstream provider identifier stamped on every synced document.
pub const PROVIDER: &str = "airalo";

/// Name of the config-store document holding `{ markup_percentage }`.
pub const PRICING_CONFIG_DOC: &str = "pricing";

/// The vendor's canonical global product family ("Discover"/"Discover+")
/// is recognizable by this slug/name prefix.
pub const GLOBAL_SLUG_PREFIX: &str = "discover";

/// Placeholder the upstream emits when a package has no country list.
pub const COUNTRY_PLACEHOLDER: &str = "N/A";

/// Curated continent/union/operator identifiers that mark a package as
/// regional when they appear in its slug, name, or region field.
pub const REGIONAL_IDENTIFIERS: &[&str] = &[
    "asia",
    "europe",
    "africa",
    "americas",
    "middle-east",
    "middle east",
    "oceania",
    "caribbean",
    "latin-america",
    "latin america",
    "north-america",
    "south-america",
    "central-america",
    "eastern-europe",
    "western-europe",
    "scandinavia",
    "asean",
    "gcc",
    "european-union",
    "eu",
    "mena",
    "middle-east-and-north-africa",
    "middle-east-north-africa",
    "euconnect",
    "euroconnect",
];

/// Direct price fields, tried in order, on both top-level records and
/// bundle children.
pub const PRICE_FIELDS: &[&str] = &[
    "price",
    "retail_price",
    "amount",
    "cost",
    "base_price",
    "starting_price",
    "min_price",
];

/// Price fields probed inside a nested `data` sub-object.
pub const DATA_OBJECT_PRICE_FIELDS: &[&str] = &["price", "retail_price", "amount", "cost"];

/// `updated_by` stamps for the two sync targets.
pub const UPDATED_BY_PACKAGES: &str = "catalog_sync";
pub const UPDATED_BY_TOPUPS: &str = "catalog_sync_topups";
