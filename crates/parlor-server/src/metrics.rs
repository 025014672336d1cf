//! Metrics collection and export for Parlor.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parlor_core::{RoomHandle, RoomStats};
use parlor_transport::SessionSummary;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "parlor_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "parlor_connections_active";
    pub const MESSAGES_TOTAL: &str = "parlor_messages_total";
    pub const SESSIONS_ENDED_TOTAL: &str = "parlor_sessions_ended_total";
    pub const ROOM_MEMBERS: &str = "parlor_room_members";
    pub const ROOM_DELIVERIES_TOTAL: &str = "parlor_room_deliveries_total";
    pub const ROOM_DROPPED_TOTAL: &str = "parlor_room_dropped_total";
    pub const ROOM_EVICTED_TOTAL: &str = "parlor_room_evicted_total";
    pub const ERRORS_TOTAL: &str = "parlor_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Chat frames by direction");
    metrics::describe_counter!(names::SESSIONS_ENDED_TOTAL, "Client sessions by end reason");
    metrics::describe_gauge!(names::ROOM_MEMBERS, "Current number of room members");
    metrics::describe_counter!(
        names::ROOM_DELIVERIES_TOTAL,
        "Messages placed on member queues"
    );
    metrics::describe_counter!(
        names::ROOM_DROPPED_TOTAL,
        "Deliveries skipped because a member queue was full"
    );
    metrics::describe_counter!(names::ROOM_EVICTED_TOTAL, "Members evicted for being too slow");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Install the Prometheus recorder, start its HTTP listener and register
/// metric descriptions. Must run inside a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be built or a recorder is
/// already installed.
pub fn start_metrics_server(port: u16) -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).map_err(|_| "a metrics recorder is already installed")?;

    tokio::spawn(async move {
        if let Err(_e) = exporter.await {
            // ExporterError implements neither Debug nor Display in this version.
            error!("Metrics exporter stopped with an error");
        }
    });

    // Descriptions only reach a recorder that is already installed.
    init_metrics();

    info!("Metrics server listening on {}", addr);
    Ok(handle)
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a finished client session.
pub fn record_session(summary: &SessionSummary) {
    counter!(names::MESSAGES_TOTAL, "direction" => "inbound").increment(summary.received);
    counter!(names::MESSAGES_TOTAL, "direction" => "outbound").increment(summary.sent);
    counter!(names::SESSIONS_ENDED_TOTAL, "reason" => summary.reason.as_str()).increment(1);
}

/// Publish a room stats snapshot.
pub fn record_room(stats: &RoomStats) {
    gauge!(names::ROOM_MEMBERS).set(stats.members as f64);
    counter!(names::ROOM_DELIVERIES_TOTAL).absolute(stats.deliveries);
    counter!(names::ROOM_DROPPED_TOTAL).absolute(stats.dropped);
    counter!(names::ROOM_EVICTED_TOTAL).absolute(stats.evicted);
}

/// Poll room stats every `period` until the room closes.
pub async fn watch_room(room: RoomHandle, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        match room.stats().await {
            Ok(stats) => record_room(&stats),
            Err(_) => break,
        }
    }
    debug!(room = %room.name(), "Room closed, stopped polling stats");
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
