//! Prometheus metrics for the records pipeline.
//!
//! Counters:
//! - `records.requests.interpreted` (label `method`)
//! - `records.actions.dropped`
//! - `records.responses.success`
//! - `records.responses.failure`
//! - `records.transport.errors`
//!
//! # Example
//!
//! ```rust,no_run
//! use record_relay_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! println!("{}", server.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for the records pipeline.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the recorder cannot be installed.
    /// A recorder that is already installed is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// The recorder handle, once started.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Describe every pipeline metric.
pub fn register_metrics() {
    describe_counter!(
        "records.requests.interpreted",
        "Request actions turned into wire requests"
    );
    describe_counter!(
        "records.actions.dropped",
        "Actions that matched no request route"
    );
    describe_counter!(
        "records.responses.success",
        "Responses correlated to SUCCESS actions"
    );
    describe_counter!(
        "records.responses.failure",
        "Responses correlated to FAILURE actions"
    );
    describe_counter!(
        "records.transport.errors",
        "Requests that failed in the transport"
    );
}

/// Orchestrator metrics recorder.
pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Record an interpreted request.
    pub fn record_interpreted(method: &'static str) {
        counter!("records.requests.interpreted", "method" => method).increment(1);
    }

    /// Record an action that matched no route.
    pub fn record_dropped() {
        counter!("records.actions.dropped").increment(1);
    }
}

/// Correlator metrics recorder.
pub struct ResponseMetrics;

impl ResponseMetrics {
    /// Record a 2xx response.
    pub fn record_success() {
        counter!("records.responses.success").increment(1);
    }

    /// Record any other response.
    pub fn record_failure() {
        counter!("records.responses.failure").increment(1);
    }
}

/// Transport metrics recorder.
pub struct TransportMetrics;

impl TransportMetrics {
    /// Record a failed send or network error.
    pub fn record_error() {
        counter!("records.transport.errors").increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;

    #[test]
    fn server_starts_without_handle() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn recorded_counters_render() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        PipelineMetrics::record_interpreted("GET");
        ResponseMetrics::record_success();
        TransportMetrics::record_error();

        // Another test may have installed the recorder first
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("records_requests_interpreted"));
            assert!(rendered.contains("records_responses_success"));
        }
    }
}
