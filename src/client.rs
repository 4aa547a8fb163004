use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method, Request, RequestBuilder, Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::{ClientSettings, ConfigError};
use crate::tls;

const MIN_HTTP2_FRAME_SIZE: usize = 16 * 1024;
const MAX_HTTP2_FRAME_SIZE: usize = (1 << 24) - 1;

/// HTTP client built from [`ClientSettings`].
///
/// When the settings carry static headers, every request sent through
/// [`HttpClient::execute`] gets them set right before it goes out, replacing
/// whatever the caller put there.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    headers: Option<Arc<HeaderMap>>,
}

impl HttpClient {
    /// Start a request. Send it with [`HttpClient::execute`] so the static
    /// headers are applied.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.inner.request(method, url)
    }

    pub async fn execute(&self, mut request: Request) -> reqwest::Result<Response> {
        self.intercept(&mut request);
        self.inner.execute(request).await
    }

    /// POST `body` to `url` with the given content type.
    pub async fn post(
        &self,
        url: &str,
        content_type: &'static str,
        body: impl Into<Bytes>,
    ) -> reqwest::Result<Response> {
        let request = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, content_type)
            .body(body.into())
            .build()?;
        self.execute(request).await
    }

    fn intercept(&self, request: &mut Request) {
        if let Some(headers) = &self.headers {
            for (name, value) in headers.iter() {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::Header(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ConfigError::Header(format!("{}: {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

impl ClientSettings {
    /// Build a client. The settings are not modified, so one value can build
    /// any number of clients.
    ///
    /// reqwest does not expose socket buffer sizes. A non-zero
    /// `read_buffer_size` sets the HTTP/2 receive windows and a non-zero
    /// `write_buffer_size` sets the HTTP/2 max frame size (clamped to the
    /// protocol's legal range).
    pub fn to_client(&self) -> Result<HttpClient, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if !self.tls.is_empty() {
            builder = tls::apply_client_settings(builder, &self.tls)?;
        }
        if self.read_buffer_size > 0 {
            let window = u32::try_from(self.read_buffer_size).unwrap_or(u32::MAX);
            builder = builder
                .http2_initial_stream_window_size(window)
                .http2_initial_connection_window_size(window);
        }
        if self.write_buffer_size > 0 {
            let frame = self
                .write_buffer_size
                .clamp(MIN_HTTP2_FRAME_SIZE, MAX_HTTP2_FRAME_SIZE);
            builder = builder.http2_max_frame_size(frame as u32);
        }
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }

        let inner = builder
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        let headers = if self.headers.is_empty() {
            None
        } else {
            Some(Arc::new(header_map(&self.headers)?))
        };

        debug!(
            endpoint = %self.endpoint,
            static_headers = self.headers.len(),
            timeout_ms = self.timeout_ms,
            "http client built"
        );

        Ok(HttpClient { inner, headers })
    }
}
