//! Client-side image compression for report photos.

pub mod compression;

pub use compression::{
    decode_data_url, target_dimensions, CompressedImage, CompressionError, CompressionOptions,
    ImageCompressor,
};
