//! Candidate tile selection for a routing request.
//!
//! Routing runs at one working zoom. Given the endpoint bounding box, the
//! selector walks the quad-tree from the smallest enclosing tile to the
//! working zoom, then the corridor filter keeps only tiles whose center is
//! inside an ellipse around the endpoints and orders them so the tiles
//! nearest either endpoint load first.

use std::f64::consts::SQRT_2;

use crate::tile::{at_unchecked, METERS_PER_DEGREE};
use crate::{GeoBounds, GeoPoint, Result, Tile, TileError, MAX_ZOOM};

/// Zoom level routing runs at by default.
pub const DEFAULT_WORKING_ZOOM: u8 = 15;

/// Equatorial circumference in meters, for tile-size estimates.
const EARTH_CIRCUMFERENCE: f64 = 40_075_016.7;

/// Elliptical corridor calibration: a tile is kept when the sum of its
/// center distances to the two endpoints stays within
/// `direct * direct_factor + margin_m`.
///
/// Two calibrations have been fielded; neither is hardcoded anywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorridorParams {
    /// Multiplier on the direct endpoint distance.
    pub direct_factor: f64,
    /// Constant slack in meters.
    pub margin_m: f64,
}

impl CorridorParams {
    /// Corridor hugging the direct line.
    pub const TIGHT: CorridorParams = CorridorParams {
        direct_factor: 1.0,
        margin_m: 1500.0,
    };

    /// Corridor leaving room for wide detours.
    pub const RELAXED: CorridorParams = CorridorParams {
        direct_factor: 1.5,
        margin_m: 1500.0,
    };

    /// Maximum allowed dA + dB for a direct distance.
    fn threshold_m(&self, direct_m: f64) -> f64 {
        direct_m * self.direct_factor + self.margin_m
    }

    /// Semi-minor axis of the corridor ellipse: half the widest extent
    /// perpendicular to the endpoint line.
    fn half_width_m(&self, direct_m: f64) -> f64 {
        let major = self.threshold_m(direct_m);
        0.5 * (major * major - direct_m * direct_m).max(0.0).sqrt()
    }
}

impl Default for CorridorParams {
    fn default() -> Self {
        Self::TIGHT
    }
}

/// Computes and orders the candidate tile set for an endpoint pair.
#[derive(Debug, Clone, Copy)]
pub struct TileSelector {
    /// Zoom level the output tiles are at.
    pub working_zoom: u8,
    /// Corridor calibration used for filtering and padding.
    pub corridor: CorridorParams,
}

impl Default for TileSelector {
    fn default() -> Self {
        Self {
            working_zoom: DEFAULT_WORKING_ZOOM,
            corridor: CorridorParams::default(),
        }
    }
}

impl TileSelector {
    /// Create a selector for a specific working zoom.
    pub fn new(working_zoom: u8, corridor: CorridorParams) -> Result<Self> {
        if working_zoom > MAX_ZOOM {
            return Err(TileError::InvalidZoomLevel(working_zoom));
        }
        Ok(Self {
            working_zoom,
            corridor,
        })
    }

    /// Request box padded out to everything the corridor filter could
    /// keep: the ellipse half-width plus one tile diagonal of slack.
    fn padded_bounds(&self, bounds: &GeoBounds) -> GeoBounds {
        let corner_a = GeoPoint::new(bounds.min_lon, bounds.min_lat);
        let corner_b = GeoPoint::new(bounds.max_lon, bounds.max_lat);
        let direct_m = corner_a.distance_m(corner_b);

        let center = bounds.center();
        let cos_lat = center.lat.to_radians().cos().max(0.01);
        let tile_m = EARTH_CIRCUMFERENCE / (1u64 << self.working_zoom) as f64 * cos_lat;
        let pad_m = self.corridor.half_width_m(direct_m) + tile_m * SQRT_2;

        bounds.expanded(
            pad_m / (METERS_PER_DEGREE * cos_lat),
            pad_m / METERS_PER_DEGREE,
        )
    }

    /// Working-zoom tiles covering the request box and its corridor
    /// padding.
    ///
    /// Walks up from the smallest enclosing tile to the working zoom, then
    /// descends children-first. Subtrees that cannot intersect the padded
    /// box are dropped during descent, so a request straddling a low-zoom
    /// tile boundary stays proportional to its corridor, not 4^z.
    pub fn select_tiles(&self, bounds: &GeoBounds) -> Vec<Tile> {
        let mut tile = bounds.enclosing_tile();
        while tile.z > self.working_zoom {
            match tile.parent() {
                Some(parent) => tile = parent,
                None => break,
            }
        }

        let padded = self.padded_bounds(bounds);
        let mut stack = vec![tile];
        let mut selected = Vec::new();
        while let Some(t) = stack.pop() {
            if !t.bbox().intersects(&padded) {
                continue;
            }
            if t.z == self.working_zoom {
                selected.push(t);
            } else {
                stack.extend(t.children());
            }
        }
        selected
    }

    /// Corridor filter and load ordering.
    ///
    /// Keeps working-zoom tiles whose center distances to the endpoints
    /// sum within the corridor threshold, sorted ascending by the smaller
    /// of the two distances so tiles near either endpoint load first.
    pub fn order_and_filter(&self, tiles: &[Tile], a: GeoPoint, b: GeoPoint) -> Vec<Tile> {
        let direct_m = a.distance_m(b);
        let threshold = self.corridor.threshold_m(direct_m);

        let mut scored: Vec<(f64, Tile)> = tiles
            .iter()
            .filter(|t| t.z == self.working_zoom)
            .filter_map(|t| {
                let center = t.center();
                let da = center.distance_m(a);
                let db = center.distance_m(b);
                if da + db > threshold {
                    return None;
                }
                Some((da.min(db), *t))
            })
            .collect();

        scored.sort_by(|lhs, rhs| lhs.0.total_cmp(&rhs.0));
        scored.into_iter().map(|(_, t)| t).collect()
    }

    /// Convenience: select, filter, and order for an endpoint pair.
    pub fn tiles_for_route(&self, a: GeoPoint, b: GeoPoint) -> Vec<Tile> {
        let bounds = GeoBounds::from_points(a, b);
        let selected = self.select_tiles(&bounds);
        self.order_and_filter(&selected, a, b)
    }
}

/// Tile at the selector's working zoom containing a point.
pub(crate) fn working_tile(point: GeoPoint, working_zoom: u8) -> Tile {
    at_unchecked(point, working_zoom)
}
