use axum::{
    http::{
        header::{ACCEPT, CONTENT_ENCODING, CONTENT_TYPE, ORIGIN},
        HeaderName, HeaderValue, Method,
    },
    middleware, Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ServerSettings};
use crate::middleware::decompress_request;
use crate::tls;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A bound listener, optionally terminating TLS.
pub enum Listener {
    Plain(TcpListener),
    Tls {
        listener: TcpListener,
        acceptor: TlsAcceptor,
    },
}

impl Listener {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Listener::Plain(listener) => listener.local_addr(),
            Listener::Tls { listener, .. } => listener.local_addr(),
        }
    }
}

impl ServerSettings {
    /// Bind the configured endpoint, wrapping it in TLS when TLS settings are
    /// present.
    pub async fn to_listener(&self) -> Result<Listener, ConfigError> {
        let acceptor = match &self.tls {
            Some(tls_settings) => Some(TlsAcceptor::from(tls::server_config(tls_settings)?)),
            None => None,
        };

        let listener = TcpListener::bind(self.endpoint.as_str())
            .await
            .map_err(|source| ConfigError::Bind {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        Ok(match acceptor {
            Some(acceptor) => Listener::Tls { listener, acceptor },
            None => Listener::Plain(listener),
        })
    }

    /// Wrap `app` in the configured handler chain: CORS outermost (when any
    /// origins are configured), then request decompression (when enabled).
    pub fn to_router(&self, app: Router) -> Router {
        let mut router = app;
        if self.enable_decompression {
            router = router.layer(middleware::from_fn(decompress_request));
        }
        if !self.cors_allowed_origins.is_empty() {
            router = router.layer(cors_layer(&self.cors_allowed_origins));
        }
        router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns: Vec<String> = origins.to_vec();
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin
            .to_str()
            .map(|origin| patterns.iter().any(|p| origin_matches(p, origin)))
            .unwrap_or(false)
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::HEAD])
        .allow_headers([
            ORIGIN,
            ACCEPT,
            CONTENT_TYPE,
            CONTENT_ENCODING,
            HeaderName::from_static("x-requested-with"),
        ])
}

/// Match an origin against a pattern where `*` stands for any run of
/// characters (including none). Comparison is ASCII case-insensitive.
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let origin = origin.to_ascii_lowercase();

    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = origin.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // no wildcard in the pattern
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Serve `router` on `listener` until the listener fails.
pub async fn serve(listener: Listener, router: Router) -> io::Result<()> {
    let addr = listener.local_addr()?;
    match listener {
        Listener::Plain(listener) => {
            info!(%addr, "listening");
            axum::serve(listener, router).await
        }
        Listener::Tls { listener, acceptor } => {
            info!(%addr, "listening with tls");
            serve_tls(listener, acceptor, router).await
        }
    }
}

async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
) -> io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(router.clone());
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(%peer, error = %e, "tls handshake failed");
                    return;
                }
            };
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}
