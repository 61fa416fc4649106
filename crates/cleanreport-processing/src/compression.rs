use std::io::Cursor;
use std::time::Instant;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use cleanreport_core::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_WIDTH, JPEG_MIME};
use image::metadata::Orientation;
use image::{
    imageops::FilterType, DynamicImage, GenericImageView, ImageDecoder, ImageReader, Rgb, RgbImage,
};

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("Not a decodable image: {0}")]
    Decode(String),

    #[error("Could not read {name}: {message}")]
    Read { name: String, message: String },

    #[error("JPEG encoding failed: {0}")]
    Encode(String),
}

impl From<std::io::Error> for CompressionError {
    fn from(err: std::io::Error) -> Self {
        CompressionError::Encode(err.to_string())
    }
}

/// Downsampling and quality settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionOptions {
    pub max_width: u32,
    /// Quality factor in 0.0..=1.0.
    pub quality: f32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl CompressionOptions {
    /// mozjpeg quality (1..=100) for the configured factor.
    pub fn jpeg_quality(&self) -> u8 {
        let quality = if self.quality.is_finite() {
            self.quality
        } else {
            DEFAULT_JPEG_QUALITY
        };
        (quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Output dimensions for an image of `width × height` capped at `max_width`.
///
/// Images narrower than or equal to `max_width` keep their size; wider ones are scaled
/// proportionally, with the height rounded and never below 1.
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if max_width == 0 || width <= max_width {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// A JPEG produced by [`ImageCompressor`].
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub width: u32,
    pub height: u32,
    pub jpeg: Bytes,
}

impl CompressedImage {
    /// `data:image/jpeg;base64,...`
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", JPEG_MIME, STANDARD.encode(&self.jpeg))
    }
}

/// Stateless photo compressor
pub struct ImageCompressor;

impl ImageCompressor {
    /// Decode, downsample and re-encode `bytes` as JPEG.
    pub fn compress(
        bytes: &[u8],
        options: &CompressionOptions,
    ) -> Result<CompressedImage, CompressionError> {
        let start = Instant::now();

        let img = Self::decode(bytes)?;
        let (src_width, src_height) = img.dimensions();
        let (width, height) = target_dimensions(src_width, src_height, options.max_width);

        let img = if (width, height) == (src_width, src_height) {
            img
        } else {
            img.resize_exact(width, height, FilterType::Triangle)
        };

        let jpeg = Self::encode_jpeg(&img, options.jpeg_quality())?;

        tracing::debug!(
            src_width = src_width,
            src_height = src_height,
            width = width,
            height = height,
            input_bytes = bytes.len(),
            output_bytes = jpeg.len(),
            duration_ms = start.elapsed().as_millis(),
            "Image compressed"
        );

        Ok(CompressedImage {
            width,
            height,
            jpeg,
        })
    }

    /// [`ImageCompressor::compress`] straight to a data URL.
    pub fn compress_to_data_url(
        bytes: &[u8],
        options: &CompressionOptions,
    ) -> Result<String, CompressionError> {
        Self::compress(bytes, options).map(|img| img.to_data_url())
    }

    /// Decode and turn the image upright according to its EXIF orientation.
    fn decode(bytes: &[u8]) -> Result<DynamicImage, CompressionError> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CompressionError::Decode(e.to_string()))?
            .into_decoder()
            .map_err(|e| CompressionError::Decode(e.to_string()))?;

        let orientation = decoder.orientation().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Unreadable orientation metadata, keeping pixels as stored");
            Orientation::NoTransforms
        });

        let mut img = DynamicImage::from_decoder(decoder)
            .map_err(|e| CompressionError::Decode(e.to_string()))?;
        img.apply_orientation(orientation);
        Ok(img)
    }

    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, CompressionError> {
        let rgb_img = flatten_to_rgb(img);
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(&rgb_img)?;
        let jpeg_data = comp.finish()?;

        Ok(Bytes::from(jpeg_data))
    }
}

/// Composite transparent pixels onto white.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Split a base64 data URL into its MIME type and decoded bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), CompressionError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| CompressionError::Decode("missing data: prefix".to_string()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| CompressionError::Decode("data URL is not base64".to_string()))?;
    if mime.is_empty() {
        return Err(CompressionError::Decode("data URL has no MIME type".to_string()));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| CompressionError::Decode(format!("invalid base64: {}", e)))?;
    Ok((mime.to_string(), bytes))
}
