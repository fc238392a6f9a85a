//! Prometheus metrics for the node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]. The housekeeping loop
//! refreshes the gauges; [`serve_metrics`] exposes the registry in the
//! Prometheus text format on `/metrics`.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use lattice_consensus::ElectionBehavior;
use lattice_types::Amount;
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_vec_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use tracing::info;

use crate::shutdown::StopSignal;
use crate::NodeError;

/// Point-in-time values the housekeeping loop publishes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GaugeSnapshot {
    pub active_by_behavior: Vec<(ElectionBehavior, usize)>,
    pub online_weight: Amount,
    pub trended_weight: Amount,
    pub vote_cache_size: usize,
    pub bucket_backlog: usize,
}

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub elections_confirmed: IntCounter,
    pub elections_expired: IntCounter,
    pub votes_received: IntCounter,
    pub votes_invalid: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Running elections, labelled by behavior.
    pub active_elections: IntGaugeVec,
    /// In whole nano.
    pub online_weight: IntGauge,
    /// In whole nano.
    pub trended_weight: IntGauge,
    pub vote_cache_size: IntGauge,
    pub bucket_backlog: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let elections_confirmed = register_int_counter_with_registry!(
            Opts::new(
                "lattice_elections_confirmed_total",
                "Elections that reached quorum or were force confirmed"
            ),
            registry
        )?;
        let elections_expired = register_int_counter_with_registry!(
            Opts::new(
                "lattice_elections_expired_total",
                "Elections that timed out without quorum"
            ),
            registry
        )?;
        let votes_received = register_int_counter_with_registry!(
            Opts::new("lattice_votes_received_total", "Votes delivered to the node"),
            registry
        )?;
        let votes_invalid = register_int_counter_with_registry!(
            Opts::new(
                "lattice_votes_invalid_total",
                "Votes rejected for a bad signature"
            ),
            registry
        )?;

        let active_elections = register_int_gauge_vec_with_registry!(
            Opts::new("lattice_active_elections", "Running elections"),
            &["behavior"],
            registry
        )?;
        let online_weight = register_int_gauge_with_registry!(
            Opts::new(
                "lattice_online_weight_nano",
                "Weight of representatives seen voting recently"
            ),
            registry
        )?;
        let trended_weight = register_int_gauge_with_registry!(
            Opts::new(
                "lattice_trended_weight_nano",
                "Trended online weight the quorum is computed from"
            ),
            registry
        )?;
        let vote_cache_size = register_int_gauge_with_registry!(
            Opts::new("lattice_vote_cache_size", "Hashes with cached votes"),
            registry
        )?;
        let bucket_backlog = register_int_gauge_with_registry!(
            Opts::new(
                "lattice_bucket_backlog",
                "Blocks waiting in the priority buckets"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            elections_confirmed,
            elections_expired,
            votes_received,
            votes_invalid,
            active_elections,
            online_weight,
            trended_weight,
            vote_cache_size,
            bucket_backlog,
        })
    }

    pub fn update(&self, snapshot: &GaugeSnapshot) {
        for (behavior, count) in &snapshot.active_by_behavior {
            self.active_elections
                .with_label_values(&[behavior.as_str()])
                .set(saturating_i64(*count as u128));
        }
        self.online_weight
            .set(saturating_i64(snapshot.online_weight.to_nano()));
        self.trended_weight
            .set(saturating_i64(snapshot.trended_weight.to_nano()));
        self.vote_cache_size
            .set(saturating_i64(snapshot.vote_cache_size as u128));
        self.bucket_backlog
            .set(saturating_i64(snapshot.bucket_backlog as u128));
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| NodeError::Other(e.to_string()))
    }
}

fn saturating_i64(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Serve `/metrics` on `port` until a shutdown signal arrives.
pub async fn serve_metrics(
    metrics: Arc<NodeMetrics>,
    port: u16,
    mut stop: StopSignal,
) -> Result<(), NodeError> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "metrics endpoint listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            stop.wait().await;
        })
        .await?;
    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<NodeMetrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
