//! # hf2-raster
//!
//! Decoder and encoder for the HF2 heightfield format: a tiled,
//! delta-compressed container for quantized elevation grids.
//!
//! ## Overview
//!
//! An HF2 file is a fixed little-endian header, an optional extended header
//! of typed/named blocks, and a row-major sequence of internal tiles. Each
//! tile carries its own (scale, offset) pair and one delta stream per row;
//! each row picks the narrowest of 1-, 2- or 4-byte signed deltas. Rows are
//! stored bottom-up; [`decode`] returns the stitched grid in top-to-bottom
//! row order.
//!
//! Files are often shipped gzip-compressed ("HFZ"); decompression is the
//! caller's job, this crate only sees raw HF2 bytes.
//!
//! ## Examples
//!
//! ```
//! use hf2_raster::{decode, encode};
//!
//! // Four-sample gradient, one row.
//! let grid = vec![10.0f32, 10.5, 11.0, 11.5];
//! let bytes = encode(&grid, 4, 1, 4, 0.25)?;
//!
//! let raster = decode(&bytes)?;
//! assert_eq!(raster.header.width, 4);
//! assert_eq!(raster.sample(2, 0), Some(11.0));
//! # Ok::<(), hf2_raster::Hf2Error>(())
//! ```

mod codec;
mod error;

pub use codec::{decode, encode, ExtHeaderBlock, Hf2Header, Hf2Raster, HEADER_LEN, MAGIC, SUPPORTED_VERSION};
pub use error::Hf2Error;

/// Result type for HF2 operations.
pub type Result<T> = std::result::Result<T, Hf2Error>;
