// src/lib.rs
use std::sync::Arc;

pub mod client;
pub mod compression;
pub mod config;
pub mod decode;
pub mod middleware;
pub mod receiver;
pub mod server;
mod signal;
pub mod sniff;
mod tls;

pub use client::HttpClient;
pub use config::{ClientSettings, Config, ConfigError, ServerSettings};
pub use decode::{
    DecodeError, Decoder, Format, JsonDecoder, JsonMarshaler, ProtobufDecoder, ProtobufMarshaler,
};
pub use receiver::{Export, ForwardingSink, LoggingSink, SinkError, TelemetrySink};
pub use server::{serve, Listener};
pub use signal::Signal;
pub use sniff::sniff;

// Re-export tracing for use in other modules
pub use tracing;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
/// Uses RUST_LOG env var for filtering (defaults to info).
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_ansi(true)).init();
    }
}

/// OTLP/HTTP router wrapped in the handler chain `settings` asks for.
pub fn build_router(settings: &ServerSettings, sink: Arc<dyn TelemetrySink>) -> axum::Router {
    settings.to_router(receiver::routes(sink))
}
