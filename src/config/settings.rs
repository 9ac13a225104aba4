use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub shutdown: ShutdownSettings,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to open a WebSocket and call the HTTP API.
    /// An empty list allows every origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Route the WebSocket endpoint is mounted on
    #[serde(default = "default_ws_path")]
    pub path: String,
    /// Capacity of each connection's outbound frame buffer
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Maximum size of an inbound frame in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Transport-level ping interval in seconds
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Sweeper interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSettings {
    /// How long to wait for open connections to close before clearing them
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_ws_path() -> String {
    "/ws-simple".to_string()
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_ping_interval() -> u64 {
    30 // 30 seconds
}

fn default_sweep_interval() -> u64 {
    60 // 1 minute
}

fn default_drain_timeout() -> u64 {
    5
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "notice-broadcast-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("websocket.path", default_ws_path())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER__PORT, API__KEY, WEBSOCKET__PING_INTERVAL, etc.
            // Double underscore keeps snake_case field names intact.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == origin)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
            outbound_buffer: default_outbound_buffer(),
            max_message_size: default_max_message_size(),
            ping_interval: default_ping_interval(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
