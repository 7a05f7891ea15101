//! # Prometheus Metrics
//!
//! Exposes operational metrics for the consensus node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Height of the latest committed block.
    pub block_height: IntGauge,
    /// Total blocks committed by this node (quorum certificate path or sync path).
    pub blocks_committed_total: IntCounter,
    /// Total votes this node has cast.
    pub votes_cast_total: IntCounter,
    /// Total quorum certificates this node assembled and broadcast.
    pub certificates_broadcast_total: IntCounter,
    /// Total blocks this node proposed.
    pub blocks_proposed_total: IntCounter,
    /// Total sync-loop pull attempts that failed to produce a commit.
    pub sync_pull_failures_total: IntCounter,
    /// Histogram of wall-clock latency between a block's timestamp and this
    /// node's commit of it, in seconds.
    pub commit_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("nova_dbft".into()), None)
            .expect("failed to create prometheus registry");

        macro_rules! register_counter {
            ($name:literal, $help:literal) => {{
                let c = IntCounter::new($name, $help).expect("metric creation");
                registry.register(Box::new(c.clone())).expect("metric registration");
                c
            }};
        }
        macro_rules! register_gauge {
            ($name:literal, $help:literal) => {{
                let g = IntGauge::new($name, $help).expect("metric creation");
                registry.register(Box::new(g.clone())).expect("metric registration");
                g
            }};
        }

        let block_height = register_gauge!("block_height", "Height of the latest committed block");
        let blocks_committed_total = register_counter!("blocks_committed_total", "Total blocks committed");
        let votes_cast_total = register_counter!("votes_cast_total", "Total votes cast by this node");
        let certificates_broadcast_total =
            register_counter!("certificates_broadcast_total", "Total quorum certificates broadcast");
        let blocks_proposed_total = register_counter!("blocks_proposed_total", "Total blocks proposed by this node");
        let sync_pull_failures_total =
            register_counter!("sync_pull_failures_total", "Total sync-loop pull attempts that did not commit");

        let commit_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("commit_latency_seconds", "Block timestamp-to-commit latency in seconds")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0]),
        )
        .expect("metric creation");
        registry.register(Box::new(commit_latency_seconds.clone())).expect("metric registration");

        Self {
            registry,
            block_height,
            blocks_committed_total,
            votes_cast_total,
            certificates_broadcast_total,
            blocks_proposed_total,
            sync_pull_failures_total,
            commit_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(axum::extract::State(metrics): axum::extract::State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
