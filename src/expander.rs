use crate::classifier::classify_commercial;
use crate::constants::{DATA_OBJECT_PRICE_FIELDS, PRICE_FIELDS};
use crate::types::{ClassifiedPackage, CommercialClass, GeoClass, RawPackageRecord};
use serde_json::Value;
use tracing::{debug, warn};

/// Flatten one raw record into plan candidates.
///
/// A global/regional record carrying a nested child collection yields one
/// candidate per resolvable child plus one zero-priced container for the
/// parent; anything else yields a single leaf candidate. An empty vec
/// means the record was skipped (no id, or no resolvable price).
pub fn expand(
    record: &RawPackageRecord,
    geo_class: GeoClass,
    country_codes: &[String],
) -> Vec<ClassifiedPackage> {
    let Some(parent_id) = package_id(record) else {
        warn!(component = "expander", outcome = "skipped", "record has no id field");
        return Vec::new();
    };

    let commercial_class = classify_commercial(record);
    let children = child_collection(record);

    let is_bundle = matches!(geo_class, GeoClass::Global | GeoClass::Regional)
        && children.as_ref().map(|c| !c.is_empty()).unwrap_or(false);
    if is_bundle {
        expand_bundle(
            record,
            &parent_id,
            children.unwrap(),
            geo_class,
            commercial_class,
            country_codes,
        )
    } else {
        expand_leaf(record, parent_id, geo_class, commercial_class, country_codes)
    }
}

fn expand_leaf(
    record: &RawPackageRecord,
    id: String,
    geo_class: GeoClass,
    commercial_class: CommercialClass,
    country_codes: &[String],
) -> Vec<ClassifiedPackage> {
    let Some(source_price) = resolve_record_price(record) else {
        debug!(component = "expander", record_id = %id, outcome = "skipped", "no resolvable price");
        return Vec::new();
    };

    vec![ClassifiedPackage {
        id,
        name: display_name(record),
        description: description(record),
        source_price,
        currency: str_field(record, &["currency"]).unwrap_or_else(|| "USD".to_string()),
        country_codes: country_codes.to_vec(),
        region: str_field(record, &["region", "region_slug"]).unwrap_or_default(),
        geo_class,
        commercial_class,
        parent_id: None,
        is_container: false,
        child_count: None,
        data_capacity: capacity_of(record),
        validity_days: validity_of(record).unwrap_or(0),
        operator: str_field(record, &["operator"]).unwrap_or_default(),
    }]
}

fn expand_bundle(
    record: &RawPackageRecord,
    parent_id: &str,
    children: Vec<Value>,
    geo_class: GeoClass,
    commercial_class: CommercialClass,
    country_codes: &[String],
) -> Vec<ClassifiedPackage> {
    let parent_name = display_name(record);
    let parent_description = description(record);
    let parent_currency = str_field(record, &["currency"]).unwrap_or_else(|| "USD".to_string());
    let parent_operator = str_field(record, &["operator"]).unwrap_or_default();
    let parent_validity = validity_of(record);
    let region = str_field(record, &["region", "region_slug"]).unwrap_or_default();

    let mut out = Vec::new();
    for (index, child) in children.iter().enumerate() {
        if !child.is_object() {
            debug!(
                component = "expander",
                record_id = %parent_id,
                child_index = index,
                outcome = "skipped",
                "child is not an object"
            );
            continue;
        }

        let child_id = child_id(parent_id, child, index);
        let Some(source_price) = resolve_child_price(child) else {
            debug!(
                component = "expander",
                record_id = %child_id,
                outcome = "skipped",
                "child has no resolvable price"
            );
            continue;
        };

        let capacity = capacity_of(child);
        let name = str_field(child, &["name", "title"])
            .unwrap_or_else(|| format!("{parent_name} - {capacity}GB"));

        // Topup markers on the child itself win; otherwise the parent's
        // commercial class carries through.
        let child_commercial = if classify_commercial(child) == CommercialClass::Topup {
            CommercialClass::Topup
        } else {
            commercial_class
        };

        out.push(ClassifiedPackage {
            id: child_id,
            name,
            description: str_field(child, &["description"])
                .unwrap_or_else(|| parent_description.clone()),
            source_price,
            currency: str_field(child, &["currency"]).unwrap_or_else(|| parent_currency.clone()),
            country_codes: country_codes.to_vec(),
            region: region.clone(),
            geo_class,
            commercial_class: child_commercial,
            parent_id: Some(parent_id.to_string()),
            is_container: false,
            child_count: None,
            data_capacity: capacity,
            validity_days: validity_of(child).or(parent_validity).unwrap_or(0),
            operator: str_field(child, &["operator"]).unwrap_or_else(|| parent_operator.clone()),
        });
    }

    // The container is written even when every child was dropped, so the
    // catalog browse tree keeps its parent node. child_count reflects the
    // raw child list, not the survivors.
    out.push(ClassifiedPackage {
        id: parent_id.to_string(),
        name: parent_name,
        description: parent_description,
        source_price: 0.0,
        currency: parent_currency,
        country_codes: country_codes.to_vec(),
        region,
        geo_class,
        commercial_class,
        parent_id: None,
        is_container: true,
        child_count: Some(children.len()),
        data_capacity: 0.0,
        validity_days: 0,
        operator: parent_operator,
    });

    out
}

/// Stable composite id for an expanded child: the child's own id when it
/// has one, its position otherwise.
fn child_id(parent_id: &str, child: &Value, index: usize) -> String {
    match child.get("id") {
        Some(Value::String(s)) if !s.is_empty() => format!("{parent_id}_{s}"),
        Some(Value::Number(n)) => format!("{parent_id}_{n}"),
        _ => format!("{parent_id}_{index}"),
    }
}

/// The upstream scatters the record id across several fields.
pub fn package_id(record: &RawPackageRecord) -> Option<String> {
    for key in ["id", "slug", "package_id"] {
        match record.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    record
        .get("data")
        .and_then(|d| d.get("id"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Normalize the nested child collection from its alternately-named
/// homes: a direct list, a list under `operators[].packages`, or a list
/// buried in `data`.
fn child_collection(record: &RawPackageRecord) -> Option<Vec<Value>> {
    for key in ["packages", "sub_packages", "children"] {
        if let Some(list) = record.get(key).and_then(|v| v.as_array()) {
            return Some(list.clone());
        }
    }
    if let Some(operators) = record.get("operators").and_then(|v| v.as_array()) {
        let mut collected = Vec::new();
        for operator in operators {
            if let Some(list) = operator.get("packages").and_then(|v| v.as_array()) {
                collected.extend(list.iter().cloned());
            }
        }
        return Some(collected);
    }
    match record.get("data") {
        Some(Value::Array(list)) => Some(list.clone()),
        Some(Value::Object(inner)) => {
            for key in ["packages", "data"] {
                if let Some(Value::Array(list)) = inner.get(key) {
                    return Some(list.clone());
                }
            }
            None
        }
        _ => None,
    }
}

/// Resolve a top-level record's wholesale price: direct fields first, then
/// the `pricing` and `data` sub-objects, then the `price_range` and
/// `price_info` shapes some products use.
fn resolve_record_price(record: &RawPackageRecord) -> Option<f64> {
    first_price(record, PRICE_FIELDS)
        .or_else(|| record.get("pricing").and_then(|p| first_price(p, PRICE_FIELDS)))
        .or_else(|| {
            record
                .get("data")
                .filter(|d| d.is_object())
                .and_then(|d| first_price(d, DATA_OBJECT_PRICE_FIELDS))
        })
        .or_else(|| {
            record
                .get("price_range")
                .and_then(|p| first_price(p, &["min", "max", "starting", "base"]))
        })
        .or_else(|| {
            record.get("price_info").and_then(|p| {
                first_price(
                    p,
                    &["price", "retail_price", "amount", "min_price", "starting_price"],
                )
            })
        })
}

/// Child price precedence is fixed: direct fields, then the `pricing`
/// sub-object, then the `data` sub-object.
fn resolve_child_price(child: &Value) -> Option<f64> {
    first_price(child, PRICE_FIELDS)
        .or_else(|| child.get("pricing").and_then(|p| first_price(p, PRICE_FIELDS)))
        .or_else(|| {
            child
                .get("data")
                .filter(|d| d.is_object())
                .and_then(|d| first_price(d, DATA_OBJECT_PRICE_FIELDS))
        })
}

fn first_price(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| value.get(*key).and_then(as_price))
}

/// Accept a price as a JSON number or a numeric string; anything not
/// strictly positive is treated as unresolved.
fn as_price(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|p| *p > 0.0)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn capacity_of(value: &Value) -> f64 {
    ["capacity", "amount", "data"]
        .iter()
        .find_map(|key| value.get(*key).and_then(as_number))
        .unwrap_or(0.0)
}

fn validity_of(value: &Value) -> Option<u32> {
    ["period", "day", "validity", "days"]
        .iter()
        .find_map(|key| value.get(*key).and_then(as_number))
        .map(|d| d.max(0.0) as u32)
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    })
}

fn display_name(record: &RawPackageRecord) -> String {
    str_field(record, &["name", "title"]).unwrap_or_else(|| "Unnamed Plan".to_string())
}

fn description(record: &RawPackageRecord) -> String {
    str_field(record, &["description", "short_info"]).unwrap_or_default()
}
