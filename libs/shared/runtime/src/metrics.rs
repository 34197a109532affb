//! Non-blocking statsd client (SPEC_FULL.md §3 "Metrics", §4.5): counter
//! names follow `dirbs.import.<type>[.operator.<op>].validation_failures.<reason>`
//! and `dirbs.exceptions.<component>.unknown`.

use crate::config::StatsdConfig;
use cadence::{BufferedUdpMetricSink, QueuingMetricSink, StatsdClient};
use std::net::UdpSocket;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("failed to bind statsd socket: {0}")]
    Socket(#[from] std::io::Error),
    #[error("failed to construct statsd sink: {0}")]
    Sink(#[from] cadence::MetricError),
}

/// Thin wrapper keeping the emitter's naming conventions in one place.
/// All emission methods swallow send errors (fire-and-forget, per
/// SPEC_FULL.md §5 "statsd writes are non-blocking").
pub struct Metrics {
    client: Option<StatsdClient>,
}

impl Metrics {
    /// Builds a client from `config`. Returns a no-op `Metrics` (all
    /// emissions silently discarded) if `config.host` is unset, matching
    /// the pattern of statsd being an optional ambient sink.
    pub fn new(config: &StatsdConfig, prefix: &str) -> Result<Self, MetricsError> {
        let Some(host) = &config.host else {
            return Ok(Self { client: None });
        };

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        let sink = BufferedUdpMetricSink::from((host.as_str(), config.port), socket)
            .map_err(MetricsError::Socket)?;
        let queuing_sink = QueuingMetricSink::from(sink);
        let client = StatsdClient::from_sink(prefix, queuing_sink);
        Ok(Self { client: Some(client) })
    }

    /// A no-op client, for tests and `--no-statsd`-style dry runs.
    #[must_use]
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Increments `dirbs.import.<list_type>.validation_failures.<reason>`,
    /// optionally qualified with `.operator.<operator_id>`.
    pub fn validation_failure(&self, list_type: &str, operator_id: Option<&str>, reason: &str) {
        let metric = match operator_id {
            Some(op) => format!("import.{list_type}.operator.{op}.validation_failures.{reason}"),
            None => format!("import.{list_type}.validation_failures.{reason}"),
        };
        self.incr(&metric);
    }

    /// Increments `dirbs.exceptions.<component>.unknown`.
    pub fn unknown_exception(&self, component: &str) {
        self.incr(&format!("exceptions.{component}.unknown"));
    }

    pub fn incr(&self, metric: &str) {
        if let Some(client) = &self.client {
            let _ = client.incr(metric);
        }
    }

    pub fn gauge(&self, metric: &str, value: u64) {
        if let Some(client) = &self.client {
            let _ = client.gauge(metric, value);
        }
    }
}
