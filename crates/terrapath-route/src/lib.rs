//! Least-cost terrain routing over tiled elevation rasters.
//!
//! The crate turns a pair of geographic endpoints into a walking route:
//! [`RoutePlanner`] selects a corridor of candidate tiles, loads them
//! through [`terrapath_tiles`], runs a uniform-cost [`Search`] over the
//! 8-connected pixel lattice, and post-processes the raw node path into a
//! simplified, smoothed polyline.
//!
//! Edge costs are pluggable through [`CostModel`]; the default
//! [`ToblerCost`] prices slope with Tobler's hiking function and adds a
//! weighted penalty from an optional hazard layer. Missing terrain is
//! impassable rather than an error, so an unreachable destination comes
//! back as [`RouteOutcome::NoPath`].

mod cost;
mod engine;
mod error;
mod grid;
mod path;
mod planner;

pub use cost::{CostModel, ElevationDeltaCost, ToblerCost};
pub use engine::{Search, SearchOutcome, SearchStats, SearchStatus};
pub use error::RouteError;
pub use grid::{GridPos, OFFSETS};
pub use path::{path_to_geo, simplify, smooth};
pub use planner::{
    RouteOutcome, RouteParams, RoutePath, RoutePlanner, DEFAULT_MAX_DIRECT_DISTANCE_M,
    DEFAULT_SIMPLIFY_EPSILON_PX,
};

pub type Result<T> = std::result::Result<T, RouteError>;
