use serde_json::Value;

/// The upstream returns the same logical catalog under several envelope
/// shapes. Detection happens here, once, before any business rule runs;
/// the rest of the pipeline only ever sees the normalized record list.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEnvelope {
    /// Bare top-level array.
    Bare(Vec<Value>),
    /// `{"data": [...]}`
    Data(Vec<Value>),
    /// `{"packages": [...]}`
    Packages(Vec<Value>),
    /// Some other key holding the array, including the nested
    /// `data.packages` / `data.data` forms.
    Keyed { key: String, records: Vec<Value> },
}

impl CatalogEnvelope {
    /// Detect which envelope shape a response body uses. Returns `None`
    /// when no array can be located anywhere we know to look.
    pub fn detect(body: &Value) -> Option<Self> {
        match body {
            Value::Array(items) => Some(CatalogEnvelope::Bare(items.clone())),
            Value::Object(map) => {
                match map.get("data") {
                    Some(Value::Array(items)) => {
                        return Some(CatalogEnvelope::Data(items.clone()));
                    }
                    Some(Value::Object(inner)) => {
                        for key in ["packages", "data"] {
                            if let Some(Value::Array(items)) = inner.get(key) {
                                return Some(CatalogEnvelope::Keyed {
                                    key: format!("data.{key}"),
                                    records: items.clone(),
                                });
                            }
                        }
                    }
                    _ => {}
                }
                if let Some(Value::Array(items)) = map.get("packages") {
                    return Some(CatalogEnvelope::Packages(items.clone()));
                }
                // Last resort: first key holding a non-empty array.
                for (key, value) in map {
                    if let Value::Array(items) = value {
                        if !items.is_empty() {
                            return Some(CatalogEnvelope::Keyed {
                                key: key.clone(),
                                records: items.clone(),
                            });
                        }
                    }
                }
                None
            }
            _ => None,
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            CatalogEnvelope::Bare(_) => "bare",
            CatalogEnvelope::Data(_) => "data",
            CatalogEnvelope::Packages(_) => "packages",
            CatalogEnvelope::Keyed { .. } => "keyed",
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            CatalogEnvelope::Bare(records)
            | CatalogEnvelope::Data(records)
            | CatalogEnvelope::Packages(records)
            | CatalogEnvelope::Keyed { records, .. } => records,
        }
    }
}

/// What one call convention yielded after envelope detection.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// A non-empty array of record objects.
    Records(Vec<Value>),
    /// A syntactically valid envelope holding zero records.
    Empty,
    /// An array of bare identifiers (strings). Identifiers alone cannot be
    /// classified or priced, so the caller moves on to the next convention.
    IdentifiersOnly,
    /// No array found anywhere in the body.
    NoShape,
}

pub fn probe_body(body: &Value) -> ProbeOutcome {
    let Some(envelope) = CatalogEnvelope::detect(body) else {
        return ProbeOutcome::NoShape;
    };
    let records = envelope.into_records();
    if records.is_empty() {
        return ProbeOutcome::Empty;
    }
    if records.iter().all(|r| r.is_string()) {
        return ProbeOutcome::IdentifiersOnly;
    }
    ProbeOutcome::Records(records)
}
