use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use otlphttp::{build_router, init_tracing, serve, Config, ForwardingSink, LoggingSink, TelemetrySink};

#[derive(Parser)]
#[command(name = "otlphttp")]
#[command(about = "OTLP/HTTP receiver with transparent request decompression")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (defaults apply when omitted)
    #[arg(long, short, env = "OTLPHTTP_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen endpoint from the config file
    #[arg(long)]
    endpoint: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(endpoint) = cli.endpoint {
        config.server.endpoint = endpoint;
    }

    let sink: Arc<dyn TelemetrySink> = match &config.exporter {
        Some(exporter) => {
            let client = exporter
                .to_client()
                .context("failed to build exporter client")?;
            info!(endpoint = %exporter.endpoint, "forwarding telemetry upstream");
            Arc::new(ForwardingSink::new(client, exporter.endpoint.clone()))
        }
        None => {
            info!("no exporter configured, logging received telemetry");
            Arc::new(LoggingSink)
        }
    };

    let router = build_router(&config.server, sink);
    let listener = config
        .server
        .to_listener()
        .await
        .context("failed to start listener")?;

    tokio::select! {
        result = serve(listener, router) => result.context("server error")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}
