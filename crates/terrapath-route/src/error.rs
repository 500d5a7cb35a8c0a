//! Error types for terrapath-route.

use thiserror::Error;

/// Errors that can occur while planning a route.
///
/// "No path found" is not an error; it is the
/// [`RouteOutcome::NoPath`](crate::RouteOutcome::NoPath) value. Everything
/// here is a configuration or request problem detected before or outside
/// the search itself.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Endpoints farther apart than the configured cap.
    #[error("Endpoints are {distance_m:.0} m apart, limit is {max_m:.0} m")]
    TooFar {
        /// Direct endpoint distance in meters.
        distance_m: f64,
        /// Configured maximum in meters.
        max_m: f64,
    },

    /// Working zoom outside the supported range.
    #[error("Invalid working zoom: {0}")]
    InvalidZoom(u8),

    /// Tile math or tile source configuration error.
    #[error("Tile layer error: {0}")]
    Tile(#[from] terrapath_tiles::TileError),
}
