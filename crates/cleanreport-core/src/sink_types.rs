use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Sink backend types
///
/// Defined in core because it is read by configuration and by the sink factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    /// Remote script endpoint, one JSON record per call.
    Script,
    /// Cloud file store rooted in a local directory.
    Local,
    /// Cloud file store on S3 or an S3-compatible provider.
    S3,
}

impl FromStr for SinkBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "script" | "gas" => Ok(SinkBackend::Script),
            "local" => Ok(SinkBackend::Local),
            "s3" => Ok(SinkBackend::S3),
            _ => Err(anyhow::anyhow!("Invalid sink backend: {}", s)),
        }
    }
}

impl Display for SinkBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SinkBackend::Script => write!(f, "script"),
            SinkBackend::Local => write!(f, "local"),
            SinkBackend::S3 => write!(f, "s3"),
        }
    }
}

/// How the relay splits a submission into sink calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMode {
    /// One sink call per image, paced.
    #[default]
    PerImage,
    /// One sink call carrying every image.
    Single,
}

impl FromStr for ForwardMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per_image" | "per-image" | "fanout" | "fan_out" => Ok(ForwardMode::PerImage),
            "single" | "batch" => Ok(ForwardMode::Single),
            _ => Err(anyhow::anyhow!("Invalid forward mode: {}", s)),
        }
    }
}

impl Display for ForwardMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ForwardMode::PerImage => write!(f, "per_image"),
            ForwardMode::Single => write!(f, "single"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_backend_parse() {
        assert_eq!("script".parse::<SinkBackend>().unwrap(), SinkBackend::Script);
        assert_eq!("GAS".parse::<SinkBackend>().unwrap(), SinkBackend::Script);
        assert_eq!("Local".parse::<SinkBackend>().unwrap(), SinkBackend::Local);
        assert_eq!("s3".parse::<SinkBackend>().unwrap(), SinkBackend::S3);
        assert!("nfs".parse::<SinkBackend>().is_err());
    }

    #[test]
    fn test_forward_mode_roundtrip_display() {
        for mode in [ForwardMode::PerImage, ForwardMode::Single] {
            assert_eq!(mode.to_string().parse::<ForwardMode>().unwrap(), mode);
        }
        assert_eq!(ForwardMode::default(), ForwardMode::PerImage);
    }
}
