//! Configuration module
//!
//! Relay configuration read from the environment (and `.env` via dotenvy).

use std::env;
use std::str::FromStr;

use crate::sink_types::{ForwardMode, SinkBackend};

const SERVER_PORT: u16 = 8080;
const MAX_BODY_SIZE_MB: usize = 50;
const DRIVE_ROOT: &str = "reports";
const FORWARD_PACE_MS: u64 = 1000;
const FORWARD_QUEUE_SIZE: usize = 1000;
const FORWARD_MAX_CONCURRENT: usize = 1;
const FORWARD_MAX_RETRIES: u32 = 3;
const SINK_TIMEOUT_SECS: u64 = 60;
const STATUS_CACHE_SIZE: usize = 1024;

/// Settings shared by every HTTP-facing binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub max_body_size_mb: usize,
    /// `json` switches the log formatter to JSON lines.
    pub log_format: Option<String>,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            max_body_size_mb: MAX_BODY_SIZE_MB,
            log_format: None,
        }
    }
}

/// Relay configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub base: BaseConfig,
    // Sink
    pub sink_backend: SinkBackend,
    pub script_url: Option<String>,
    pub local_storage_path: Option<String>,
    /// Folder under which per-submission folders are created.
    pub drive_root: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    // Forwarding
    pub forward_mode: ForwardMode,
    pub forward_pace_ms: u64,
    pub forward_queue_size: usize,
    pub forward_max_concurrent: usize,
    pub forward_max_retries: u32,
    pub sink_timeout_secs: u64,
    /// Spool directory for the outbox. `None` keeps jobs in memory only.
    pub outbox_dir: Option<String>,
    pub status_cache_size: usize,
    /// Directory served at `/` (the upload form).
    pub static_dir: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig::default(),
            sink_backend: SinkBackend::Script,
            script_url: None,
            local_storage_path: None,
            drive_root: DRIVE_ROOT.to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            forward_mode: ForwardMode::PerImage,
            forward_pace_ms: FORWARD_PACE_MS,
            forward_queue_size: FORWARD_QUEUE_SIZE,
            forward_max_concurrent: FORWARD_MAX_CONCURRENT,
            forward_max_retries: FORWARD_MAX_RETRIES,
            sink_timeout_secs: SINK_TIMEOUT_SECS,
            outbox_dir: None,
            status_cache_size: STATUS_CACHE_SIZE,
            static_dir: None,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr + ToString + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse::<T>()
        .unwrap_or(default)
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env_parse("PORT", SERVER_PORT),
            cors_origins,
            environment,
            max_body_size_mb: env_parse("MAX_BODY_SIZE_MB", MAX_BODY_SIZE_MB),
            log_format: env_opt("LOG_FORMAT"),
        };

        let sink_backend = match env_opt("SINK_BACKEND") {
            Some(value) => value.parse::<SinkBackend>()?,
            None => SinkBackend::Script,
        };

        let forward_mode = match env_opt("FORWARD_MODE") {
            Some(value) => value.parse::<ForwardMode>()?,
            None => ForwardMode::default(),
        };

        let config = RelayConfig {
            base,
            sink_backend,
            script_url: env_opt("SCRIPT_URL").or_else(|| env_opt("GAS_URL")),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            drive_root: env_opt("DRIVE_ROOT").unwrap_or_else(|| DRIVE_ROOT.to_string()),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            forward_mode,
            forward_pace_ms: env_parse("FORWARD_PACE_MS", FORWARD_PACE_MS),
            forward_queue_size: env_parse("FORWARD_QUEUE_SIZE", FORWARD_QUEUE_SIZE),
            forward_max_concurrent: env_parse("FORWARD_MAX_CONCURRENT", FORWARD_MAX_CONCURRENT),
            forward_max_retries: env_parse("FORWARD_MAX_RETRIES", FORWARD_MAX_RETRIES),
            sink_timeout_secs: env_parse("SINK_TIMEOUT_SECS", SINK_TIMEOUT_SECS),
            outbox_dir: env_opt("OUTBOX_DIR"),
            status_cache_size: env_parse("STATUS_CACHE_SIZE", STATUS_CACHE_SIZE),
            static_dir: env_opt("STATIC_DIR"),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.sink_backend {
            SinkBackend::Script => {
                let url = self.script_url.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("SCRIPT_URL is required when SINK_BACKEND=script")
                })?;
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(anyhow::anyhow!("SCRIPT_URL must be an http(s) URL"));
                }
            }
            SinkBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH is required when SINK_BACKEND=local"
                    ));
                }
            }
            SinkBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!("S3_BUCKET is required when SINK_BACKEND=s3"));
                }
            }
        }

        if self.forward_queue_size == 0 {
            return Err(anyhow::anyhow!("FORWARD_QUEUE_SIZE must be at least 1"));
        }
        if self.forward_max_concurrent == 0 {
            return Err(anyhow::anyhow!("FORWARD_MAX_CONCURRENT must be at least 1"));
        }
        if self.sink_timeout_secs == 0 {
            return Err(anyhow::anyhow!("SINK_TIMEOUT_SECS must be at least 1"));
        }
        if self.status_cache_size == 0 {
            return Err(anyhow::anyhow!("STATUS_CACHE_SIZE must be at least 1"));
        }

        Ok(())
    }
}

/// Application configuration (relay).
#[derive(Clone, Debug)]
pub struct Config(pub Box<RelayConfig>);

impl Config {
    pub fn new(relay: RelayConfig) -> Self {
        Config(Box::new(relay))
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = RelayConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    pub fn relay(&self) -> &RelayConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.0.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.0.base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.0.base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.0.base.environment
    }

    pub fn max_body_size_bytes(&self) -> usize {
        self.0.base.max_body_size_mb * 1024 * 1024
    }

    pub fn log_json(&self) -> bool {
        self.0
            .base
            .log_format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }

    pub fn sink_backend(&self) -> SinkBackend {
        self.0.sink_backend
    }

    pub fn script_url(&self) -> Option<&str> {
        self.0.script_url.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.0.local_storage_path.as_deref()
    }

    pub fn drive_root(&self) -> &str {
        &self.0.drive_root
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.0.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.0.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.0.s3_endpoint.as_deref()
    }

    pub fn forward_mode(&self) -> ForwardMode {
        self.0.forward_mode
    }

    pub fn forward_pace_ms(&self) -> u64 {
        self.0.forward_pace_ms
    }

    pub fn forward_queue_size(&self) -> usize {
        self.0.forward_queue_size
    }

    pub fn forward_max_concurrent(&self) -> usize {
        self.0.forward_max_concurrent
    }

    pub fn forward_max_retries(&self) -> u32 {
        self.0.forward_max_retries
    }

    pub fn sink_timeout_secs(&self) -> u64 {
        self.0.sink_timeout_secs
    }

    pub fn outbox_dir(&self) -> Option<&str> {
        self.0.outbox_dir.as_deref()
    }

    pub fn status_cache_size(&self) -> usize {
        self.0.status_cache_size
    }

    pub fn static_dir(&self) -> Option<&str> {
        self.0.static_dir.as_deref()
    }
}
