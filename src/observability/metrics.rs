// observability/metrics.rs - Prometheus Metrics

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for metrics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Address to expose the metrics endpoint on; `None` keeps metrics in-process
    pub listen_addr: Option<SocketAddr>,

    /// Histogram buckets for storage call latency (in seconds)
    pub storage_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: None,
            storage_buckets: vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
        }
    }
}

/// Handle to the Prometheus metrics exporter
#[derive(Clone)]
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Trust store metrics
pub struct TrustMetrics;

impl TrustMetrics {
    pub const PEERS_ADDED_TOTAL: &'static str = "peer_trust_peers_added_total";
    pub const PEERS_REMOVED_TOTAL: &'static str = "peer_trust_peers_removed_total";
    pub const TRUST_CHANGES_TOTAL: &'static str = "peer_trust_trust_changes_total";
    pub const KNOWN_PEERS: &'static str = "peer_trust_known_peers";
}

/// Signature verification metrics
pub struct SignatureMetrics;

impl SignatureMetrics {
    pub const VERIFIED_TOTAL: &'static str = "peer_trust_signatures_verified_total";
}

/// Storage metrics
pub struct StorageMetrics;

impl StorageMetrics {
    pub const PERSIST_FAILURES_TOTAL: &'static str = "peer_trust_persist_failures_total";
    pub const CALL_SECONDS: &'static str = "peer_trust_storage_call_seconds";
}

/// Initialize the metrics system
///
/// Installs the Prometheus recorder and, when a listen address is configured,
/// starts an HTTP server exposing `/metrics` and `/health`. Returns a handle
/// that can be used to render metrics programmatically.
pub fn init_metrics(config: MetricsConfig) -> Result<MetricsHandle, Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(StorageMetrics::CALL_SECONDS.into()),
            &config.storage_buckets,
        )?
        .install_recorder()?;
    let metrics_handle = MetricsHandle { handle: handle.clone() };

    if let Some(listen_addr) = config.listen_addr {
        let shared_handle = std::sync::Arc::new(handle);

        tokio::spawn(async move {
            use axum::{routing::get, Json, Router};

            #[derive(Serialize)]
            struct HealthResponse {
                status: &'static str,
                version: &'static str,
                uptime_secs: u64,
            }

            let start_time = std::time::Instant::now();

            let handle_for_route = shared_handle.clone();
            let app = Router::new()
                .route("/metrics", get(move || {
                    let h = handle_for_route.clone();
                    async move { h.render() }
                }))
                .route("/health", get(move || {
                    let uptime = start_time.elapsed().as_secs();
                    async move {
                        Json(HealthResponse {
                            status: "healthy",
                            version: env!("CARGO_PKG_VERSION"),
                            uptime_secs: uptime,
                        })
                    }
                }));

            match tokio::net::TcpListener::bind(listen_addr).await {
                Ok(listener) => {
                    tracing::info!(addr = %listen_addr, "Metrics HTTP server started");
                    if let Err(e) = axum::serve(listener, app).await {
                        tracing::error!(error = %e, "Metrics server error");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, addr = %listen_addr, "Failed to bind metrics server");
                }
            }
        });
    }

    describe_counter!(
        TrustMetrics::PEERS_ADDED_TOTAL,
        "Total number of peers added to the trust store"
    );
    describe_counter!(
        TrustMetrics::PEERS_REMOVED_TOTAL,
        "Total number of peers removed from the trust store"
    );
    describe_counter!(
        TrustMetrics::TRUST_CHANGES_TOTAL,
        "Total number of trust level changes"
    );
    describe_gauge!(
        TrustMetrics::KNOWN_PEERS,
        "Current number of known peers"
    );

    describe_counter!(
        SignatureMetrics::VERIFIED_TOTAL,
        "Total number of signature and chain verifications"
    );

    describe_counter!(
        StorageMetrics::PERSIST_FAILURES_TOTAL,
        "Total number of failed best-effort saves"
    );
    describe_histogram!(
        StorageMetrics::CALL_SECONDS,
        "Storage call latency in seconds"
    );

    tracing::info!(addr = ?config.listen_addr, "Metrics initialized");

    Ok(metrics_handle)
}

// Recording functions

/// Record a peer being added
pub fn record_peer_added(introduced: bool) {
    let source = if introduced { "introduction" } else { "direct" };
    counter!(TrustMetrics::PEERS_ADDED_TOTAL, "source" => source).increment(1);
}

/// Record a peer being removed
pub fn record_peer_removed() {
    counter!(TrustMetrics::PEERS_REMOVED_TOTAL).increment(1);
}

/// Record a trust level change
pub fn record_trust_change(from: &str, to: &str) {
    counter!(
        TrustMetrics::TRUST_CHANGES_TOTAL,
        "from" => from.to_string(),
        "to" => to.to_string()
    ).increment(1);
}

pub fn set_known_peers(count: usize) {
    gauge!(TrustMetrics::KNOWN_PEERS).set(count as f64);
}

/// Record a signature verification (`kind`: payload, introduction or chain)
pub fn record_signature_verified(kind: &'static str, valid: bool) {
    counter!(
        SignatureMetrics::VERIFIED_TOTAL,
        "kind" => kind,
        "valid" => valid.to_string()
    ).increment(1);
}

/// Record a failed save
pub fn record_persist_failure(key: &str) {
    counter!(StorageMetrics::PERSIST_FAILURES_TOTAL, "key" => key.to_string()).increment(1);
}

/// Record the latency of one storage call
pub fn record_storage_call(op: &'static str, duration: Duration, ok: bool) {
    histogram!(
        StorageMetrics::CALL_SECONDS,
        "op" => op,
        "ok" => ok.to_string()
    ).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(config.listen_addr.is_none());
        assert!(!config.storage_buckets.is_empty());
    }

    #[test]
    fn test_metric_names() {
        assert!(TrustMetrics::PEERS_ADDED_TOTAL.starts_with("peer_trust_"));
        assert!(SignatureMetrics::VERIFIED_TOTAL.starts_with("peer_trust_"));
        assert!(StorageMetrics::PERSIST_FAILURES_TOTAL.starts_with("peer_trust_"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_peer_added(true);
        record_trust_change("unknown", "full");
        record_storage_call("get", Duration::from_millis(1), true);
        set_known_peers(3);
    }
}
