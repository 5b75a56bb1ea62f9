//! Configuration management for Farnsworth Server

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

/// Default request body cap for a single upload request: 64MB
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Static client bundle served at `/`
    pub client_dir: PathBuf,
    /// Helper assets served at `/ffmpeg/`
    pub ffmpeg_dir: PathBuf,
    /// Adds permissive CORS headers for `dev_origin`
    pub dev_cors: bool,
    pub dev_origin: String,
    pub max_chunk_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub key: String,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub media_root: PathBuf,
    pub staging_root: PathBuf,
    /// Staged chunks idle this long are purged
    pub staging_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// When unset the catalog falls back to directory listing
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub file: PathBuf,
    pub max_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                client_dir: PathBuf::from("./client"),
                ffmpeg_dir: PathBuf::from("./Server/ffmpeg"),
                dev_cors: false,
                dev_origin: "http://localhost:3000".to_string(),
                max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            },
            auth: AuthConfig {
                username: String::new(),
                key: String::new(),
                token_ttl_hours: 24,
            },
            storage: StorageConfig {
                media_root: PathBuf::from("./media"),
                staging_root: PathBuf::from("./chunks"),
                staging_ttl_hours: 24,
            },
            database: DatabaseConfig { url: None },
            log: LogConfig {
                file: PathBuf::from("./logs/app.log"),
                max_entries: 500,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port),
                client_dir: path_var("CLIENT_DIR", defaults.server.client_dir),
                ffmpeg_dir: path_var("FFMPEG_DIR", defaults.server.ffmpeg_dir),
                dev_cors: env::var("DevCORS").map(|v| v == "true").unwrap_or(false),
                dev_origin: env::var("DEV_ORIGIN").unwrap_or(defaults.server.dev_origin),
                max_chunk_bytes: parse_var("MAX_CHUNK_BYTES", defaults.server.max_chunk_bytes),
            },
            auth: AuthConfig {
                username: required_var("EXPECTED_USER")?,
                key: required_var("EXPECTED_KEY")?,
                token_ttl_hours: parse_var("TOKEN_TTL_HOURS", defaults.auth.token_ttl_hours),
            },
            storage: StorageConfig {
                media_root: path_var("MEDIA_ROOT", defaults.storage.media_root),
                staging_root: path_var("CHUNK_ROOT", defaults.storage.staging_root),
                staging_ttl_hours: parse_var("CHUNK_TTL_HOURS", defaults.storage.staging_ttl_hours),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            },
            log: LogConfig {
                file: path_var("LOG_FILE", defaults.log.file),
                max_entries: parse_var("LOG_MAX_ENTRIES", defaults.log.max_entries),
            },
        })
    }
}

fn required_var(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(key))
}

fn path_var(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
