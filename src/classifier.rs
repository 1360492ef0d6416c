use crate::constants::{COUNTRY_PLACEHOLDER, GLOBAL_SLUG_PREFIX, REGIONAL_IDENTIFIERS};
use crate::types::{CommercialClass, GeoClass, RawPackageRecord};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Exact-match lookups against the curated regional list.
static REGIONAL_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| REGIONAL_IDENTIFIERS.iter().copied().collect());

/// First non-empty string under any of the given keys, lowercased.
fn text_field(record: &RawPackageRecord, keys: &[&str]) -> String {
    for key in keys {
        if let Some(s) = record.get(*key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return s.to_lowercase();
            }
        }
    }
    String::new()
}

fn bool_flag(record: &RawPackageRecord, key: &str) -> bool {
    record.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Normalize the record's country information into a flat code list. The
/// upstream uses several shapes: a `countries` array of objects or
/// strings, a scalar `country_code`, a pre-flattened `country_codes`
/// array, or a single `country` object.
pub fn extract_country_codes(record: &RawPackageRecord) -> Vec<String> {
    if let Some(countries) = record.get("countries").and_then(|v| v.as_array()) {
        return countries
            .iter()
            .filter_map(|c| match c {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(obj) => obj
                    .get("country_code")
                    .or_else(|| obj.get("code"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                _ => None,
            })
            .collect();
    }
    if let Some(code) = record.get("country_code").and_then(|v| v.as_str()) {
        return vec![code.to_string()];
    }
    if let Some(codes) = record.get("country_codes").and_then(|v| v.as_array()) {
        return codes
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
    }
    match record.get("country") {
        Some(serde_json::Value::Object(obj)) => obj
            .get("code")
            .or_else(|| obj.get("country_code"))
            .and_then(|v| v.as_str())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn is_placeholder(codes: &[String]) -> bool {
    codes.iter().all(|c| c == COUNTRY_PLACEHOLDER)
}

/// Classify a raw record's coverage breadth. Pure and total: every record
/// resolves to some class, worst case `Other`.
pub fn classify_geo(record: &RawPackageRecord) -> GeoClass {
    let plan_type = text_field(record, &["type"]);
    let region = text_field(record, &["region", "region_slug"]);
    let name = text_field(record, &["name", "title"]);
    let slug = text_field(record, &["slug"]);
    let countries = extract_country_codes(record);

    let is_global = bool_flag(record, "is_global")
        || plan_type == "global"
        || region == "global"
        || slug == "global"
        || name == "global"
        || slug.starts_with(GLOBAL_SLUG_PREFIX)
        || name.starts_with(GLOBAL_SLUG_PREFIX);
    if is_global {
        return GeoClass::Global;
    }

    let region_in_list = !region.is_empty()
        && region != "global"
        && REGIONAL_SET.contains(region.as_str());
    let identifier_in_text = REGIONAL_IDENTIFIERS
        .iter()
        .any(|id| slug.contains(id) || name.contains(id));

    let is_regional = bool_flag(record, "is_regional")
        || plan_type == "regional"
        || REGIONAL_SET.contains(slug.as_str())
        || REGIONAL_SET.contains(name.as_str())
        || region_in_list
        || identifier_in_text
        || countries.is_empty()
        || is_placeholder(&countries)
        || countries.len() >= 2;
    if is_regional {
        return GeoClass::Regional;
    }

    GeoClass::Other
}

/// Classify a raw record's commercial intent. Topup status is
/// catalog-authoritative: an explicit flag or a topup marker anywhere in
/// slug, name, or type wins; everything else is a purchase plan.
pub fn classify_commercial(record: &RawPackageRecord) -> CommercialClass {
    if bool_flag(record, "is_topup") || bool_flag(record, "topup") {
        return CommercialClass::Topup;
    }
    let haystacks = [
        text_field(record, &["slug"]),
        text_field(record, &["name", "title"]),
        text_field(record, &["type"]),
    ];
    if haystacks
        .iter()
        .any(|h| h.contains("topup") || h.contains("top-up"))
    {
        return CommercialClass::Topup;
    }
    CommercialClass::Purchase
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discover_slug_is_global() {
        let record = json!({"slug": "discover-plus", "country_codes": ["US", "DE", "JP"]});
        assert_eq!(classify_geo(&record), GeoClass::Global);
    }

    #[test]
    fn explicit_global_markers() {
        assert_eq!(classify_geo(&json!({"is_global": true})), GeoClass::Global);
        assert_eq!(classify_geo(&json!({"type": "Global", "country_codes": ["US"]})), GeoClass::Global);
        assert_eq!(classify_geo(&json!({"region": "global", "country_codes": ["US"]})), GeoClass::Global);
    }

    #[test]
    fn regional_identifier_in_slug() {
        let record = json!({"slug": "asia-7days-3gb", "country_codes": ["JP"]});
        assert_eq!(classify_geo(&record), GeoClass::Regional);
    }

    #[test]
    fn region_field_in_curated_list() {
        let record = json!({"slug": "bundle-x", "region": "europe", "country_codes": ["FR"]});
        assert_eq!(classify_geo(&record), GeoClass::Regional);
    }

    #[test]
    fn multi_country_record_is_regional() {
        let record = json!({"slug": "two-lands", "country_codes": ["US", "CA"]});
        assert_eq!(classify_geo(&record), GeoClass::Regional);
    }

    #[test]
    fn placeholder_country_list_is_regional() {
        let record = json!({"slug": "mystery", "country_codes": ["N/A"]});
        assert_eq!(classify_geo(&record), GeoClass::Regional);
    }

    #[test]
    fn single_country_plan_is_other() {
        let record = json!({"slug": "usa-7days-3gb", "country_codes": ["US"]});
        assert_eq!(classify_geo(&record), GeoClass::Other);
    }

    #[test]
    fn classification_is_deterministic() {
        let record = json!({"slug": "usa-7days-3gb", "country_codes": ["US"]});
        let first = classify_geo(&record);
        for _ in 0..10 {
            assert_eq!(classify_geo(&record), first);
        }
    }

    #[test]
    fn topup_markers() {
        assert_eq!(
            classify_commercial(&json!({"is_topup": true})),
            CommercialClass::Topup
        );
        assert_eq!(
            classify_commercial(&json!({"slug": "usa-7days-1gb-topup"})),
            CommercialClass::Topup
        );
        assert_eq!(
            classify_commercial(&json!({"name": "Asia Top-Up 3GB"})),
            CommercialClass::Topup
        );
        assert_eq!(
            classify_commercial(&json!({"type": "topup"})),
            CommercialClass::Topup
        );
    }

    #[test]
    fn purchase_is_the_default() {
        assert_eq!(
            classify_commercial(&json!({"slug": "usa-7days-3gb"})),
            CommercialClass::Purchase
        );
        assert_eq!(classify_commercial(&json!({})), CommercialClass::Purchase);
    }

    #[test]
    fn country_code_shapes() {
        assert_eq!(
            extract_country_codes(&json!({"countries": [{"country_code": "US"}, {"code": "CA"}]})),
            vec!["US", "CA"]
        );
        assert_eq!(
            extract_country_codes(&json!({"countries": ["US", "CA"]})),
            vec!["US", "CA"]
        );
        assert_eq!(extract_country_codes(&json!({"country_code": "JP"})), vec!["JP"]);
        assert_eq!(
            extract_country_codes(&json!({"country": {"code": "BR"}})),
            vec!["BR"]
        );
        assert!(extract_country_codes(&json!({})).is_empty());
    }
}
