//! Error types for terrapath-tiles.

use thiserror::Error;

/// Errors that can occur in tile math, selection, and retrieval.
#[derive(Debug, Error)]
pub enum TileError {
    /// Zoom level outside the supported range.
    #[error("Invalid zoom level: {0}")]
    InvalidZoomLevel(u8),

    /// Quadkey string contained a non base-4 digit or was too long.
    #[error("Invalid quadkey: {0:?}")]
    InvalidQuadkey(String),

    /// URL template missing one of the required placeholders.
    #[error("Invalid URL template {template:?}: missing {missing} placeholder")]
    InvalidUrlTemplate {
        /// The template as configured.
        template: String,
        /// The placeholder that was not found.
        missing: &'static str,
    },

    /// HTTP transport error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP response with a non-success status.
    #[error("HTTP status {status} for {url}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Retrieval failure from a non-HTTP fetcher.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// I/O error (gzip unwrapping).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary heightfield payload failed to decode.
    #[error("HF2 decode failed: {0}")]
    Hf2(#[from] hf2_raster::Hf2Error),

    /// Image payload failed to decode.
    #[error("Image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Decoded raster was not one map tile in size.
    #[error("Decoded raster is {width}x{height}, expected 256x256")]
    BadTileDimensions {
        /// Decoded width in samples.
        width: u32,
        /// Decoded height in samples.
        height: u32,
    },

    /// Sample buffer length did not match one map tile.
    #[error("Raster has {got} samples, expected {expected}")]
    InvalidRasterSize {
        /// Required sample count.
        expected: usize,
        /// Provided sample count.
        got: usize,
    },
}
