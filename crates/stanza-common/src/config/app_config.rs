//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub xmpp: XmppConfig,
    pub storage: StorageConfig,
    pub resource_manager: ResourceManagerBackend,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub http: ServerConfig,
    pub modules: ModulesConfig,
    pub dispatch: DispatchConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// XMPP host settings
#[derive(Debug, Clone, Deserialize)]
pub struct XmppConfig {
    /// Local domains; the first one is the default host
    pub domains: Vec<String>,
    /// Identifier of this cluster node, stored with every bound resource
    pub node_id: String,
}

/// Repository backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Pgsql,
    Redis,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "pgsql" | "postgres" | "postgresql" => Ok(Self::Pgsql),
            "redis" => Ok(Self::Redis),
            _ => Err(s.to_string()),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Wrap the repository with latency/outcome instrumentation
    #[serde(default = "default_true")]
    pub measured: bool,
}

/// Resource manager backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceManagerBackend {
    #[default]
    Memory,
    Redis,
}

impl FromStr for ResourceManagerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err(s.to_string()),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Module selection and per-module settings
#[derive(Debug, Clone, Deserialize)]
pub struct ModulesConfig {
    /// Names of the modules to register, in registration order
    pub enabled: Vec<String>,
    pub http_upload: HttpUploadConfig,
}

impl ModulesConfig {
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|m| m == name)
    }
}

/// HTTP upload module settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpUploadConfig {
    #[serde(default = "default_upload_folder")]
    pub storage_folder: String,
    /// Public base URL of the HTTP listener, used to build slot URLs
    #[serde(default = "default_upload_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for HttpUploadConfig {
    fn default() -> Self {
        Self {
            storage_folder: default_upload_folder(),
            base_url: default_upload_base_url(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// Stanza dispatch settings
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for a module to process one stanza
    #[serde(default = "default_dispatch_timeout_ms")]
    pub timeout_ms: u64,
    /// Bounded queue size of each session's inbound and outbound channels
    #[serde(default = "default_session_queue_size")]
    pub session_queue_size: usize,
}

impl DispatchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_dispatch_timeout_ms(),
            session_queue_size: default_session_queue_size(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "stanza-server".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_true() -> bool {
    true
}

fn default_domains() -> Vec<String> {
    vec!["localhost".to_string()]
}

fn default_node_id() -> String {
    "node-1".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    6060
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_modules() -> Vec<String> {
    ["last", "http_upload", "disco"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_upload_folder() -> String {
    "./uploads".to_string()
}

fn default_upload_base_url() -> String {
    "http://localhost:6060".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_dispatch_timeout_ms() -> u64 {
    5000
}

fn default_session_queue_size() -> usize {
    256
}

/// Split a comma separated list, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse an optional variable, reporting unparsable values
fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend: StorageBackend =
            parse_var(&lookup, "STORAGE_BACKEND")?.unwrap_or_default();
        let resource_manager: ResourceManagerBackend =
            parse_var(&lookup, "RESOURCE_MANAGER")?.unwrap_or_default();

        let database = match lookup("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_max_connections),
                min_connections: parse_var(&lookup, "DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or_else(default_min_connections),
            }),
            None if storage_backend == StorageBackend::Pgsql => {
                return Err(ConfigError::MissingVar("DATABASE_URL"));
            }
            None => None,
        };

        let needs_redis = storage_backend == StorageBackend::Redis
            || resource_manager == ResourceManagerBackend::Redis;
        let redis = match lookup("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: parse_var(&lookup, "REDIS_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_redis_max_connections),
            }),
            None if needs_redis => return Err(ConfigError::MissingVar("REDIS_URL")),
            None => None,
        };

        let domains = lookup("XMPP_DOMAINS")
            .map(|s| split_list(&s))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(default_domains);

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            xmpp: XmppConfig {
                domains,
                node_id: lookup("NODE_ID").unwrap_or_else(default_node_id),
            },
            storage: StorageConfig {
                backend: storage_backend,
                measured: parse_var(&lookup, "STORAGE_MEASURED")?.unwrap_or_else(default_true),
            },
            resource_manager,
            database,
            redis,
            http: ServerConfig {
                host: lookup("HTTP_HOST").unwrap_or_else(default_host),
                port: parse_var(&lookup, "HTTP_PORT")?.unwrap_or_else(default_http_port),
            },
            modules: ModulesConfig {
                enabled: lookup("MODULES")
                    .map(|s| split_list(&s))
                    .unwrap_or_else(default_modules),
                http_upload: HttpUploadConfig {
                    storage_folder: lookup("HTTP_UPLOAD_STORAGE_FOLDER")
                        .unwrap_or_else(default_upload_folder),
                    base_url: lookup("HTTP_UPLOAD_BASE_URL")
                        .map(|s| s.trim_end_matches('/').to_string())
                        .unwrap_or_else(default_upload_base_url),
                    max_file_size: parse_var(&lookup, "HTTP_UPLOAD_MAX_FILE_SIZE")?
                        .unwrap_or_else(default_max_file_size),
                },
            },
            dispatch: DispatchConfig {
                timeout_ms: parse_var(&lookup, "DISPATCH_TIMEOUT_MS")?
                    .unwrap_or_else(default_dispatch_timeout_ms),
                session_queue_size: parse_var(&lookup, "SESSION_QUEUE_SIZE")?
                    .unwrap_or_else(default_session_queue_size),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
