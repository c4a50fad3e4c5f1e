//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, DatabaseConfig, DispatchConfig, Environment,
    HttpUploadConfig, ModulesConfig, RedisConfig, ResourceManagerBackend, ServerConfig,
    StorageBackend, StorageConfig, XmppConfig,
};
