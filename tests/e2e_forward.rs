//! Loopback test: a real listener receives compressed OTLP, forwards it
//! through the configured client, and the upstream sees protobuf with the
//! static headers applied.

mod helpers;

use helpers::{can_bind_loopback, gzip, sample_logs, spawn_mock_upstream};
use otlphttp::{build_router, serve, ClientSettings, ForwardingSink, ServerSettings};
use prost::Message;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_forwarding_applies_static_headers() {
    if !can_bind_loopback().await {
        eprintln!("skipping: loopback bind not permitted");
        return;
    }

    let upstream = spawn_mock_upstream().await;

    let exporter = ClientSettings {
        endpoint: upstream.url.clone(),
        timeout_ms: 5_000,
        headers: HashMap::from([
            ("x-scope-orgid".to_string(), "tenant-a".to_string()),
            ("content-type".to_string(), "application/x-protobuf".to_string()),
        ]),
        ..Default::default()
    };
    let client = exporter.to_client().unwrap();
    let sink = Arc::new(ForwardingSink::new(client, exporter.endpoint.clone()));

    let settings = ServerSettings {
        endpoint: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let router = build_router(&settings, sink);
    let listener = settings.to_listener().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener, router));

    let request = sample_logs();
    let response = reqwest::Client::new()
        .post(format!("http://{}/v1/logs", addr))
        .header("content-type", "application/json")
        .header("content-encoding", "gzip")
        .body(gzip(&serde_json::to_vec(&request).unwrap()))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let captured = upstream.requests();
    assert_eq!(captured.len(), 1);
    let forwarded = &captured[0];
    assert_eq!(forwarded.path, "/v1/logs");
    assert_eq!(forwarded.headers["x-scope-orgid"], "tenant-a");
    assert_eq!(forwarded.headers["content-type"], "application/x-protobuf");
    assert_eq!(
        forwarded.body.as_ref(),
        request.encode_to_vec().as_slice()
    );

    server.abort();
    upstream.stop().await;
}

#[tokio::test]
async fn test_upstream_failure_is_reported_to_caller() {
    if !can_bind_loopback().await {
        eprintln!("skipping: loopback bind not permitted");
        return;
    }

    // nothing listens on the reserved port once the probe listener is dropped
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = probe.local_addr().unwrap();
    drop(probe);

    let exporter = ClientSettings {
        endpoint: format!("http://{}", dead),
        timeout_ms: 2_000,
        ..Default::default()
    };
    let sink = Arc::new(ForwardingSink::new(
        exporter.to_client().unwrap(),
        exporter.endpoint.clone(),
    ));

    let settings = ServerSettings {
        endpoint: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let router = build_router(&settings, sink);
    let listener = settings.to_listener().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener, router));

    let response = reqwest::Client::new()
        .post(format!("http://{}/v1/logs", addr))
        .header("content-type", "application/x-protobuf")
        .body(sample_logs().encode_to_vec())
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 503);

    server.abort();
}
