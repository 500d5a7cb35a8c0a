//! # terrapath-tiles
//!
//! Web Mercator tile math, candidate tile selection, and the raster tile
//! source feeding the route engine.
//!
//! ## Overview
//!
//! Terrain arrives as a quad-tree pyramid of 256x256 raster tiles served
//! over HTTP. This crate turns a pair of route endpoints into the set of
//! working-zoom tiles worth loading ([`TileSelector`]), fetches and decodes
//! those tiles on a bounded worker pool ([`TileSource`]), and hands the
//! decoded samples to the routing crate as an [`Atlas`] keyed by packed
//! tile key. Tiles that fail to arrive simply stay absent; the router
//! treats holes as impassable rather than erroring out.
//!
//! ## Examples
//!
//! ```
//! use terrapath_tiles::{GeoPoint, Tile, TileError};
//!
//! let seattle = GeoPoint::new(-122.3321, 47.6062);
//! let tile = Tile::at(seattle, 15)?;
//! assert!(tile.bbox().contains(seattle));
//! assert_eq!(Tile::from_quadkey(&tile.quadkey())?, tile);
//! # Ok::<(), TileError>(())
//! ```

mod error;
mod select;
mod source;
mod tile;

pub use error::TileError;
pub use select::{CorridorParams, TileSelector, DEFAULT_WORKING_ZOOM};
pub use source::{
    Atlas, HttpFetcher, LoadStats, MemoryFetcher, RgbCalibration, TileCodec, TileFetcher,
    TileRaster, TileSource, DEFAULT_POOL_SIZE,
};
pub use tile::{
    frac_to_lonlat, tile_fraction, GeoBounds, GeoPoint, Tile, MAX_LATITUDE, MAX_ZOOM,
    TILE_SAMPLES, TILE_SIZE, WGS84_A, WGS84_E,
};

/// Result type for tile operations.
pub type Result<T> = std::result::Result<T, TileError>;
