//! Client configuration

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use cleanreport_processing::CompressionOptions;
use serde::{Deserialize, Serialize};

const RELAY_URL: &str = "http://localhost:8080";
const SEND_PACE_MS: u64 = 500;
const COMPLETION_DELAY_MS: u64 = 3000;
const CLIENT_TIMEOUT_SECS: u64 = 60;

/// Hard cap on parallel compressions, whatever the configuration says.
pub const MAX_COMPRESSION_CONCURRENCY: usize = 4;

/// How a compressed submission travels to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// One request carrying every image.
    Batched,
    /// One request per image, paced.
    PerImageSequential,
    /// Per image, with send progress reported to the UI.
    #[default]
    PerImageWithProgress,
}

impl FromStr for TransferMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "batched" | "batch" => Ok(TransferMode::Batched),
            "per_image_sequential" | "sequential" => Ok(TransferMode::PerImageSequential),
            "per_image_with_progress" | "progress" => Ok(TransferMode::PerImageWithProgress),
            _ => Err(anyhow::anyhow!("Unknown transfer mode: {}", s)),
        }
    }
}

impl Display for TransferMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TransferMode::Batched => write!(f, "batched"),
            TransferMode::PerImageSequential => write!(f, "per_image_sequential"),
            TransferMode::PerImageWithProgress => write!(f, "per_image_with_progress"),
        }
    }
}

/// What the form keeps after a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Start over from an empty form.
    Blank,
    /// Keep staff and report date for the next report of the day.
    #[default]
    KeepStaffAndDate,
}

impl FromStr for ResetPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blank" => Ok(ResetPolicy::Blank),
            "keep_staff_and_date" | "keep" => Ok(ResetPolicy::KeepStaffAndDate),
            _ => Err(anyhow::anyhow!("Unknown reset policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay base URL, without the `/upload` path.
    pub relay_url: String,
    pub transfer_mode: TransferMode,
    /// Delay after each per-image request.
    pub pace: Duration,
    pub compression: CompressionOptions,
    /// Parallel compressions; clamped to `1..=MAX_COMPRESSION_CONCURRENCY`.
    pub compression_concurrency: usize,
    /// How long the completion indicator stays before the form resets.
    pub completion_delay: Duration,
    pub reset_policy: ResetPolicy,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: RELAY_URL.to_string(),
            transfer_mode: TransferMode::default(),
            pace: Duration::from_millis(SEND_PACE_MS),
            compression: CompressionOptions::default(),
            compression_concurrency: 1,
            completion_delay: Duration::from_millis(COMPLETION_DELAY_MS),
            reset_policy: ResetPolicy::default(),
            timeout: Duration::from_secs(CLIENT_TIMEOUT_SECS),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl ClientConfig {
    /// Load from the environment (and `.env`). Unset keys keep their defaults.
    ///
    /// Keys: `RELAY_URL`, `TRANSFER_MODE`, `SEND_PACE_MS`, `MAX_WIDTH`, `JPEG_QUALITY`,
    /// `COMPRESSION_CONCURRENCY`, `COMPLETION_DELAY_MS`, `RESET_POLICY`, `CLIENT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let transfer_mode = match env::var("TRANSFER_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => defaults.transfer_mode,
        };
        let reset_policy = match env::var("RESET_POLICY") {
            Ok(policy) => policy.parse()?,
            Err(_) => defaults.reset_policy,
        };

        Ok(Self {
            relay_url: env::var("RELAY_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.relay_url),
            transfer_mode,
            pace: env_parse("SEND_PACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.pace),
            compression: CompressionOptions {
                max_width: env_parse("MAX_WIDTH").unwrap_or(defaults.compression.max_width),
                quality: env_parse("JPEG_QUALITY").unwrap_or(defaults.compression.quality),
            },
            compression_concurrency: env_parse("COMPRESSION_CONCURRENCY")
                .unwrap_or(defaults.compression_concurrency),
            completion_delay: env_parse("COMPLETION_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.completion_delay),
            reset_policy,
            timeout: env_parse("CLIENT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
    }

    pub fn effective_concurrency(&self) -> usize {
        self.compression_concurrency
            .clamp(1, MAX_COMPRESSION_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_form_behaviour() {
        let config = ClientConfig::default();
        assert_eq!(config.pace, Duration::from_millis(500));
        assert_eq!(config.completion_delay, Duration::from_secs(3));
        assert_eq!(config.compression.max_width, 800);
        assert_eq!(config.transfer_mode, TransferMode::PerImageWithProgress);
        assert_eq!(config.reset_policy, ResetPolicy::KeepStaffAndDate);
    }

    #[test]
    fn test_concurrency_is_capped() {
        let mut config = ClientConfig::default();
        config.compression_concurrency = 0;
        assert_eq!(config.effective_concurrency(), 1);
        config.compression_concurrency = 16;
        assert_eq!(config.effective_concurrency(), MAX_COMPRESSION_CONCURRENCY);
    }

    #[test]
    fn test_transfer_mode_parsing() {
        assert_eq!("batched".parse::<TransferMode>().unwrap(), TransferMode::Batched);
        assert_eq!(
            "PER_IMAGE_SEQUENTIAL".parse::<TransferMode>().unwrap(),
            TransferMode::PerImageSequential
        );
        assert!("carrier-pigeon".parse::<TransferMode>().is_err());
        assert_eq!(TransferMode::Batched.to_string(), "batched");
    }
}
