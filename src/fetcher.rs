use crate::config::UpstreamConfig;
use crate::envelope::{probe_body, ProbeOutcome};
use crate::error::{FetchError, Result, SyncError};
use crate::types::{CatalogSource, RawPackageRecord};
use metrics::{counter, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One way of calling the upstream catalog operation. The endpoint is the
/// same; the shape-selecting parameter changes which envelope comes back.
struct CallConvention {
    label: &'static str,
    query: Option<(&'static str, &'static str)>,
}

/// Tried in order; the nested-bundle shape comes first because it is the
/// only one that carries sub-package prices for global/regional products.
const CALL_CONVENTIONS: &[CallConvention] = &[
    CallConvention {
        label: "flat=false",
        query: Some(("flat", "false")),
    },
    CallConvention {
        label: "default",
        query: None,
    },
    CallConvention {
        label: "flat=true",
        query: Some(("flat", "true")),
    },
];

/// HTTP client for the upstream catalog, owned by the orchestrator.
/// Connection state is explicit: `connect` builds the underlying client
/// and `reconnect_if_needed` rebuilds it after a transport failure.
pub struct CatalogClient {
    base_url: String,
    timeout_seconds: u64,
    http: Mutex<Option<reqwest::Client>>,
    needs_reconnect: AtomicBool,
}

impl CatalogClient {
    /// Create an unconnected client; call `connect` before fetching.
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
            http: Mutex::new(None),
            needs_reconnect: AtomicBool::new(false),
        }
    }

    pub fn connect(&self) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .build()?;
        *self.http.lock().unwrap() = Some(client);
        self.needs_reconnect.store(false, Ordering::SeqCst);
        info!(component = "fetcher", url = %self.base_url, "catalog client connected");
        Ok(())
    }

    fn client(&self) -> Result<reqwest::Client> {
        self.http.lock().unwrap().clone().ok_or_else(|| {
            SyncError::Config("catalog client used before connect()".to_string())
        })
    }
}

#[async_trait::async_trait]
impl CatalogSource for CatalogClient {
    fn source_name(&self) -> &'static str {
        "airalo_catalog"
    }

    fn reconnect_if_needed(&self) -> Result<()> {
        let connected = self.http.lock().unwrap().is_some();
        if !connected || self.needs_reconnect.load(Ordering::SeqCst) {
            info!(component = "fetcher", "rebuilding catalog client");
            self.connect()?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_catalog(&self) -> std::result::Result<Vec<RawPackageRecord>, FetchError> {
        let client = self
            .client()
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        let started = std::time::Instant::now();
        let mut saw_empty = false;
        let mut transport_failures = 0usize;
        let mut timeouts = 0usize;
        let mut last_transport_error = String::new();

        for convention in CALL_CONVENTIONS {
            let mut request = client.get(&self.base_url);
            if let Some((key, value)) = convention.query {
                request = request.query(&[(key, value)]);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    transport_failures += 1;
                    if e.is_timeout() {
                        timeouts += 1;
                    }
                    last_transport_error = e.to_string();
                    warn!(
                        component = "fetcher",
                        convention = convention.label,
                        error = %e,
                        "catalog request failed"
                    );
                    continue;
                }
            };

            if !response.status().is_success() {
                transport_failures += 1;
                last_transport_error = format!("HTTP {}", response.status());
                warn!(
                    component = "fetcher",
                    convention = convention.label,
                    status = %response.status(),
                    "catalog request rejected"
                );
                continue;
            }

            let body: serde_json::Value = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    if e.is_timeout() {
                        transport_failures += 1;
                        timeouts += 1;
                        last_transport_error = e.to_string();
                    }
                    warn!(
                        component = "fetcher",
                        convention = convention.label,
                        error = %e,
                        "catalog response body unreadable"
                    );
                    continue;
                }
            };

            match probe_body(&body) {
                ProbeOutcome::Records(records) => {
                    histogram!("esim_sync_fetch_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    counter!("esim_sync_fetch_success_total").increment(1);
                    info!(
                        component = "fetcher",
                        convention = convention.label,
                        records = records.len(),
                        outcome = "fetched",
                        "catalog fetched"
                    );
                    return Ok(records);
                }
                ProbeOutcome::Empty => {
                    saw_empty = true;
                    warn!(
                        component = "fetcher",
                        convention = convention.label,
                        "convention yielded an empty catalog"
                    );
                }
                ProbeOutcome::IdentifiersOnly => {
                    // Identifiers cannot be classified or priced; move on.
                    warn!(
                        component = "fetcher",
                        convention = convention.label,
                        "convention yielded bare identifiers, insufficient"
                    );
                }
                ProbeOutcome::NoShape => {
                    warn!(
                        component = "fetcher",
                        convention = convention.label,
                        "convention yielded no recognizable envelope"
                    );
                }
            }
        }

        if transport_failures > 0 {
            self.needs_reconnect.store(true, Ordering::SeqCst);
        }
        counter!("esim_sync_fetch_failures_total").increment(1);
        Err(resolve_failure(
            saw_empty,
            transport_failures,
            timeouts,
            CALL_CONVENTIONS.len(),
            self.timeout_seconds,
            last_transport_error,
        ))
    }
}

/// Collapse the per-convention outcomes into the fetch error taxonomy.
/// An empty-but-valid catalog wins over transport noise because it likely
/// signals an upstream data incident rather than a connectivity fault.
fn resolve_failure(
    saw_empty: bool,
    transport_failures: usize,
    timeouts: usize,
    attempts: usize,
    timeout_seconds: u64,
    last_transport_error: String,
) -> FetchError {
    if saw_empty {
        return FetchError::EmptyCatalog;
    }
    if transport_failures == attempts {
        if timeouts == attempts {
            return FetchError::Timeout(timeout_seconds);
        }
        return FetchError::Unavailable(last_transport_error);
    }
    FetchError::MalformedShape(
        "no call convention produced an array of package records".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_wins_over_transport_noise() {
        let err = resolve_failure(true, 2, 1, 3, 30, "connection refused".into());
        assert!(matches!(err, FetchError::EmptyCatalog));
    }

    #[test]
    fn all_timeouts_resolve_to_timeout() {
        let err = resolve_failure(false, 3, 3, 3, 30, "timed out".into());
        assert!(matches!(err, FetchError::Timeout(30)));
    }

    #[test]
    fn mixed_transport_failures_resolve_to_unavailable() {
        let err = resolve_failure(false, 3, 1, 3, 30, "HTTP 502 Bad Gateway".into());
        match err {
            FetchError::Unavailable(msg) => assert!(msg.contains("502")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn unusable_shapes_resolve_to_malformed() {
        let err = resolve_failure(false, 1, 0, 3, 30, "HTTP 500".into());
        assert!(matches!(err, FetchError::MalformedShape(_)));
    }
}
