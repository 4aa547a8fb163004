//! OTLP/HTTP routes.
//!
//! Each route picks a decoder from the request `Content-Type`, decodes the
//! export request, hands it to the sink, and answers with an empty export
//! response in the same format.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use opentelemetry_proto::tonic::collector::{
    logs::v1::{ExportLogsServiceRequest, ExportLogsServiceResponse},
    metrics::v1::{ExportMetricsServiceRequest, ExportMetricsServiceResponse},
    trace::v1::{ExportTraceServiceRequest, ExportTraceServiceResponse},
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn, Span};

use crate::decode::Format;
use crate::signal::Signal;

mod sink;

pub use sink::{Export, ForwardingSink, LoggingSink, SinkError, TelemetrySink};

/// Binds an OTLP export request type to its response type and signal.
pub trait SignalRequest: prost::Message + Default + DeserializeOwned + Send + 'static {
    type Response: prost::Message + Serialize + Default;

    /// Which signal type this request carries
    const SIGNAL: Signal;

    fn into_export(self) -> Export;
}

impl SignalRequest for ExportLogsServiceRequest {
    type Response = ExportLogsServiceResponse;
    const SIGNAL: Signal = Signal::Logs;

    fn into_export(self) -> Export {
        Export::Logs(self)
    }
}

impl SignalRequest for ExportTraceServiceRequest {
    type Response = ExportTraceServiceResponse;
    const SIGNAL: Signal = Signal::Traces;

    fn into_export(self) -> Export {
        Export::Traces(self)
    }
}

impl SignalRequest for ExportMetricsServiceRequest {
    type Response = ExportMetricsServiceResponse;
    const SIGNAL: Signal = Signal::Metrics;

    fn into_export(self) -> Export {
        Export::Metrics(self)
    }
}

/// OTLP/HTTP routes plus `/health`, without any middleware.
pub fn routes(sink: Arc<dyn TelemetrySink>) -> Router {
    Router::new()
        .route(
            Signal::Logs.path(),
            post(handle_signal::<ExportLogsServiceRequest>),
        )
        .route(
            Signal::Traces.path(),
            post(handle_signal::<ExportTraceServiceRequest>),
        )
        .route(
            Signal::Metrics.path(),
            post(handle_signal::<ExportMetricsServiceRequest>),
        )
        .route("/health", get(|| async { "ok" }))
        .with_state(sink)
}

#[tracing::instrument(
    name = "ingest",
    skip_all,
    fields(
        signal = ?R::SIGNAL,
        format = tracing::field::Empty,
        items = tracing::field::Empty,
    )
)]
async fn handle_signal<R: SignalRequest>(
    State(sink): State<Arc<dyn TelemetrySink>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let Some(format) = Format::from_content_type(content_type) else {
        warn!(content_type = ?content_type, "unsupported content type");
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("unsupported content type: {}", content_type.unwrap_or("(none)")),
        )
            .into_response();
    };
    Span::current().record("format", tracing::field::debug(format));
    debug!(body_size = body.len(), "handling export request");

    let mut request = R::default();
    if let Err(e) = format.new_decoder(body.as_ref()).decode(&mut request) {
        error!(error = %e, "failed to decode payload");
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    let export = request.into_export();
    Span::current().record("items", export.item_count());

    if let Err(e) = sink.export(export).await {
        error!(error = %e, "sink export failed");
        return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
    }

    match format.marshal(&R::Response::default()) {
        Ok(body) => ([(CONTENT_TYPE, format.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode response");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
