use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "0.0.0.0:4318";

/// Errors from loading settings or building clients and servers from them.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(String),
    Tls(String),
    Bind { endpoint: String, source: std::io::Error },
    Client(String),
    Header(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "invalid config: {}", e),
            ConfigError::Tls(e) => write!(f, "tls config error: {}", e),
            ConfigError::Bind { endpoint, source } => {
                write!(f, "failed to listen on {}: {}", endpoint, source)
            }
            ConfigError::Client(e) => write!(f, "failed to build HTTP client: {}", e),
            ConfigError::Header(e) => write!(f, "invalid header: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// TLS settings for outgoing connections. All fields are optional; an empty
/// value means the system/webpki defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsClientSettings {
    /// PEM bundle of additional trusted roots.
    pub ca_file: Option<PathBuf>,
    /// Client certificate chain for mutual TLS.
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

impl TlsClientSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Server-side TLS: certificate chain, key, and an optional CA for verifying
/// client certificates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsServerSettings {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    #[serde(default)]
    pub client_ca_file: Option<PathBuf>,
}

/// How to build the outgoing HTTP client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL requests are sent to, e.g. `http://collector:4318`.
    pub endpoint: String,
    pub tls: TlsClientSettings,
    /// Zero keeps the transport default.
    pub read_buffer_size: usize,
    /// Zero keeps the transport default.
    pub write_buffer_size: usize,
    /// Whole-request timeout in milliseconds. Zero means no timeout.
    pub timeout_ms: u64,
    /// Set on every outgoing request, replacing any value already present.
    pub headers: HashMap<String, String>,
}

impl ClientSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// How to build the listening server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// `host:port` to listen on.
    pub endpoint: String,
    pub tls: Option<TlsServerSettings>,
    /// Allowed CORS origins. Empty disables CORS. `*` matches any run of
    /// characters, so `*` alone allows every origin and
    /// `https://*.example.com` allows its subdomains.
    pub cors_allowed_origins: Vec<String>,
    /// Inflate request bodies based on `Content-Encoding`.
    pub enable_decompression: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tls: None,
            cors_allowed_origins: Vec::new(),
            enable_decompression: true,
        }
    }
}

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,
    /// Where decoded telemetry is forwarded. Without it, telemetry is logged.
    #[serde(default)]
    pub exporter: Option<ClientSettings>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
