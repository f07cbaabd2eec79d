//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use markproof_core::{Frame, DEFAULT_FRAME_EDGE, DEFAULT_STRENGTH};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 50)
    pub body_limit_mb: usize,
    /// Maximum image size per upload in MB (default: 25)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Decoder model artifact (default: models/decoder.json)
    pub model_path: PathBuf,
    /// Feature scaler artifact (default: models/scaler.json)
    pub scaler_path: PathBuf,
    /// QIM lattice step shared by embedding and extraction (default: 6.0)
    pub embed_strength: f64,
    /// Square frame edge shared by embedding and extraction (default: 512)
    pub frame_edge: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 50,
            max_file_size_mb: 25,
            timeout_secs: 60,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            model_path: PathBuf::from("models/decoder.json"),
            scaler_path: PathBuf::from("models/scaler.json"),
            embed_strength: DEFAULT_STRENGTH,
            frame_edge: DEFAULT_FRAME_EDGE,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let model_path = std::env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let scaler_path = std::env::var("SCALER_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.scaler_path);

        let embed_strength = env_parse::<f64>("EMBED_STRENGTH")
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(defaults.embed_strength);

        let frame_edge = env_parse::<u32>("FRAME_EDGE")
            .filter(|e| Frame::new(*e).is_ok())
            .unwrap_or(defaults.frame_edge);

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            model_path,
            scaler_path,
            embed_strength,
            frame_edge,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Upload size limit in bytes
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
