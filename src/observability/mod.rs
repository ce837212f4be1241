// observability/mod.rs - Tracing and Metrics

//! Observability module providing structured logging and Prometheus metrics.
//!
//! # Features
//!
//! - **Tracing**: Structured logging via `tracing-subscriber`
//! - **Metrics**: Trust store counters, exported in Prometheus format
//!
//! # Example
//!
//! ```ignore
//! use peer_trust::observability::{init_tracing, init_metrics, MetricsConfig, TracingConfig};
//!
//! // Initialize tracing
//! init_tracing(&TracingConfig::default())?;
//!
//! // Initialize metrics
//! let handle = init_metrics(MetricsConfig::default()).unwrap();
//! ```

mod metrics;
mod tracing_setup;

pub use metrics::{
    init_metrics, record_peer_added, record_peer_removed, record_persist_failure,
    record_signature_verified, record_storage_call, record_trust_change, set_known_peers,
    MetricsConfig, MetricsHandle, SignatureMetrics, StorageMetrics, TrustMetrics,
};

pub use tracing_setup::{init_tracing, TracingConfig, TracingError, TracingFormat};
