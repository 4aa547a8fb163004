use opentelemetry_proto::tonic::collector::{
    logs::v1::ExportLogsServiceRequest, metrics::v1::ExportMetricsServiceRequest,
    trace::v1::ExportTraceServiceRequest,
};
use prost::Message;
use tracing::{debug, error, info};

use crate::client::HttpClient;
use crate::decode::PROTOBUF_CONTENT_TYPE;
use crate::signal::Signal;

/// A decoded export request for one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Export {
    Logs(ExportLogsServiceRequest),
    Traces(ExportTraceServiceRequest),
    Metrics(ExportMetricsServiceRequest),
}

impl Export {
    pub fn signal(&self) -> Signal {
        match self {
            Export::Logs(_) => Signal::Logs,
            Export::Traces(_) => Signal::Traces,
            Export::Metrics(_) => Signal::Metrics,
        }
    }

    /// Log records, spans, or metrics carried by the request.
    pub fn item_count(&self) -> usize {
        match self {
            Export::Logs(req) => req
                .resource_logs
                .iter()
                .flat_map(|rl| &rl.scope_logs)
                .map(|sl| sl.log_records.len())
                .sum(),
            Export::Traces(req) => req
                .resource_spans
                .iter()
                .flat_map(|rs| &rs.scope_spans)
                .map(|ss| ss.spans.len())
                .sum(),
            Export::Metrics(req) => req
                .resource_metrics
                .iter()
                .flat_map(|rm| &rm.scope_metrics)
                .map(|sm| sm.metrics.len())
                .sum(),
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        match self {
            Export::Logs(req) => req.encode_to_vec(),
            Export::Traces(req) => req.encode_to_vec(),
            Export::Metrics(req) => req.encode_to_vec(),
        }
    }
}

#[derive(Debug)]
pub enum SinkError {
    Network(String),
    Http { status: u16, endpoint: String },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Network(msg) => write!(f, "network error: {}", msg),
            SinkError::Http { status, endpoint } => {
                write!(f, "HTTP {} from {}", status, endpoint)
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Destination for decoded telemetry (abstracts where it goes)
#[async_trait::async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn export(&self, export: Export) -> Result<(), SinkError>;
}

/// Logs a summary of each export and drops it.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait::async_trait]
impl TelemetrySink for LoggingSink {
    async fn export(&self, export: Export) -> Result<(), SinkError> {
        info!(
            signal = export.signal().name(),
            items = export.item_count(),
            "received export"
        );
        Ok(())
    }
}

/// Re-encodes each export as protobuf and posts it to an upstream OTLP/HTTP
/// endpoint. Failures are returned to the caller, not retried.
#[derive(Debug, Clone)]
pub struct ForwardingSink {
    client: HttpClient,
    endpoint: String,
}

impl ForwardingSink {
    pub fn new(client: HttpClient, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { client, endpoint }
    }

    pub fn url_for(&self, signal: Signal) -> String {
        format!("{}{}", self.endpoint, signal.path())
    }
}

#[async_trait::async_trait]
impl TelemetrySink for ForwardingSink {
    #[tracing::instrument(name = "forward", skip_all)]
    async fn export(&self, export: Export) -> Result<(), SinkError> {
        let url = self.url_for(export.signal());
        let body = export.encode_to_vec();
        debug!(
            url = %url,
            items = export.item_count(),
            body_size = body.len(),
            "forwarding export"
        );

        let response = self
            .client
            .post(&url, PROTOBUF_CONTENT_TYPE, body)
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let resp_body = response
                .text()
                .await
                .unwrap_or_else(|_| "(failed to read body)".to_string());
            error!(url = %url, status, response_body = %resp_body, "upstream returned error status");
            return Err(SinkError::Http {
                status,
                endpoint: url,
            });
        }

        Ok(())
    }
}
