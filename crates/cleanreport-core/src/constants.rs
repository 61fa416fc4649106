//! Shared constants.

/// Versioned API prefix. `/upload` is also mounted at the root for older form builds.
pub const API_PREFIX: &str = "/api/v0";

/// Relay ingress path.
pub const UPLOAD_PATH: &str = "/upload";

/// Default downsampling width applied on the client before upload.
pub const DEFAULT_MAX_WIDTH: u32 = 800;

/// Default JPEG quality factor (0.0..=1.0) applied on the client.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.3;

/// MIME type of every image written to a sink.
pub const JPEG_MIME: &str = "image/jpeg";
