#![allow(dead_code)] // Test helpers appear unused when compiled independently

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    routing::{get, post},
    Router,
};
use flate2::{
    write::{GzEncoder, ZlibEncoder},
    Compression,
};
use opentelemetry_proto::tonic::{
    collector::logs::v1::ExportLogsServiceRequest,
    common::v1::{any_value, AnyValue, InstrumentationScope, KeyValue},
    logs::v1::{LogRecord, ResourceLogs, ScopeLogs},
    resource::v1::Resource,
};
use otlphttp::{Export, SinkError, TelemetrySink};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// Sink that keeps every export it receives.
#[derive(Default)]
pub struct RecordingSink {
    exports: Mutex<Vec<Export>>,
}

impl RecordingSink {
    pub fn exports(&self) -> Vec<Export> {
        self.exports.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TelemetrySink for RecordingSink {
    async fn export(&self, export: Export) -> Result<(), SinkError> {
        self.exports.lock().unwrap().push(export);
        Ok(())
    }
}

/// Sink that always fails.
pub struct FailingSink;

#[async_trait::async_trait]
impl TelemetrySink for FailingSink {
    async fn export(&self, _export: Export) -> Result<(), SinkError> {
        Err(SinkError::Network("upstream unavailable".to_string()))
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn sample_logs() -> ExportLogsServiceRequest {
    let log = LogRecord {
        time_unix_nano: 123,
        observed_time_unix_nano: 124,
        severity_number: 9,
        severity_text: "INFO".to_string(),
        body: Some(AnyValue {
            value: Some(any_value::Value::StringValue("hello".to_string())),
        }),
        attributes: vec![KeyValue {
            key: "k".to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::StringValue("v".to_string())),
            }),
        }],
        ..Default::default()
    };

    ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            resource: Some(Resource {
                attributes: vec![KeyValue {
                    key: "service.name".to_string(),
                    value: Some(AnyValue {
                        value: Some(any_value::Value::StringValue("svc".to_string())),
                    }),
                }],
                ..Default::default()
            }),
            scope_logs: vec![ScopeLogs {
                scope: Some(InstrumentationScope {
                    name: "lib".to_string(),
                    version: "1".to_string(),
                    ..Default::default()
                }),
                log_records: vec![log],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Drive one request through `app` and collect the response.
pub async fn send(
    app: Router,
    path: &str,
    headers: &[(&str, &str)],
    body: Vec<u8>,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().method("POST").uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

/// A request as seen by the mock upstream.
#[derive(Clone, Debug)]
pub struct Captured {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
struct UpstreamState {
    requests: Arc<Mutex<Vec<Captured>>>,
}

pub struct MockUpstream {
    pub url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Spawn an upstream OTLP/HTTP endpoint that records every request.
pub async fn spawn_mock_upstream() -> MockUpstream {
    let state = UpstreamState::default();
    let requests = state.requests.clone();

    let app = Router::new()
        .route("/v1/:signal", post(capture))
        .route("/health", get(|| async { "ok" }))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock upstream listener");
    let port = listener.local_addr().unwrap().port();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("mock upstream server error: {}", err);
        }
    });

    MockUpstream {
        url: format!("http://127.0.0.1:{}", port),
        requests,
        shutdown_tx,
        handle,
    }
}

async fn capture(
    State(state): State<UpstreamState>,
    request: Request<Body>,
) -> StatusCode {
    let path = request.uri().path().to_string();
    let headers = request.headers().clone();
    let body = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    state.requests.lock().unwrap().push(Captured {
        path,
        headers,
        body,
    });
    StatusCode::OK
}
