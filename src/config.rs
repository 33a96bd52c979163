//! Application configuration management.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The browsable media root may additionally be supplied as the single
//! positional command-line argument, which takes precedence.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global configuration instance.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Root of the media library browsable by clients.
    /// Always ends with a path separator.
    pub media_root: String,
    /// Root of the static assets served over plain HTTP.
    pub public_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json or pretty).
    pub log_format: LogFormat,
    /// Allowed CORS origins (comma-separated, or * for all).
    pub cors_origins: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable colored output.
    Pretty,
    /// JSON structured logging for production.
    Json,
}

/// Ensure a directory path ends with a separator so that child names can be
/// appended directly.
fn normalize_root(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `media_root_override` is the optional positional CLI argument; when
    /// present it wins over the `MEDIA_ROOT` environment variable.
    ///
    /// # Panics
    /// Panics if required configuration is missing or invalid.
    pub fn from_env(media_root_override: Option<String>) -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid u16");

        let media_root = media_root_override
            .or_else(|| std::env::var("MEDIA_ROOT").ok())
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .expect("cannot determine current directory")
                    .display()
                    .to_string()
            });
        let media_root = normalize_root(&media_root);

        let public_dir = PathBuf::from(
            std::env::var("PUBLIC_DIR").unwrap_or_else(|_| "./public".to_string()),
        );

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "pretty".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            media_root,
            public_dir,
            log_level,
            log_format,
            cors_origins,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns an error if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let media_root = Path::new(&self.media_root);

        if !media_root.exists() {
            return Err(ConfigError::MediaRootNotFound(self.media_root.clone()));
        }

        if !media_root.is_dir() {
            return Err(ConfigError::MediaRootNotDirectory(self.media_root.clone()));
        }

        if !self.public_dir.is_dir() {
            tracing::warn!(
                public_dir = %self.public_dir.display(),
                "Public assets directory not found; static requests will 404"
            );
        }

        Ok(())
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Media root not found: {0}")]
    MediaRootNotFound(String),

    #[error("Media root is not a directory: {0}")]
    MediaRootNotDirectory(String),
}

/// Initialize the global configuration.
///
/// Should be called once at application startup.
pub fn init(media_root_override: Option<String>) -> &'static Config {
    CONFIG.get_or_init(|| {
        dotenvy::dotenv().ok();
        Config::from_env(media_root_override)
    })
}
