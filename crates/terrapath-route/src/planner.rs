//! End-to-end route planning: tile selection, loading, search, and
//! path post-processing behind one call.

use std::fmt;

use log::{debug, warn};
use terrapath_tiles::{
    CorridorParams, GeoPoint, LoadStats, Tile, TileSelector, TileSource, DEFAULT_POOL_SIZE,
    DEFAULT_WORKING_ZOOM, MAX_ZOOM,
};

use crate::cost::{CostModel, ToblerCost};
use crate::engine::{Search, SearchOutcome, SearchStats};
use crate::error::RouteError;
use crate::grid::GridPos;
use crate::path::{path_to_geo, simplify, smooth};
use crate::Result;

/// Default simplification tolerance in working-zoom pixels.
pub const DEFAULT_SIMPLIFY_EPSILON_PX: f64 = 6.5;

/// Default cap on the direct distance between route endpoints.
pub const DEFAULT_MAX_DIRECT_DISTANCE_M: f64 = 6000.0;

/// Tunables for a [`RoutePlanner`].
pub struct RouteParams {
    /// Zoom level the search runs at.
    pub working_zoom: u8,
    /// Requests whose endpoints are further apart than this are refused.
    pub max_direct_distance_m: f64,
    /// Corridor used to pre-filter candidate tiles.
    pub corridor: CorridorParams,
    /// Concurrent fetch workers per tile source.
    pub pool_size: usize,
    /// Ramer-Douglas-Peucker tolerance applied to the raw path.
    pub simplify_epsilon_px: f64,
    /// Edge cost model.
    pub cost: Box<dyn CostModel>,
}

impl Default for RouteParams {
    fn default() -> Self {
        Self {
            working_zoom: DEFAULT_WORKING_ZOOM,
            max_direct_distance_m: DEFAULT_MAX_DIRECT_DISTANCE_M,
            corridor: CorridorParams::TIGHT,
            pool_size: DEFAULT_POOL_SIZE,
            simplify_epsilon_px: DEFAULT_SIMPLIFY_EPSILON_PX,
            cost: Box::new(ToblerCost::default()),
        }
    }
}

impl fmt::Debug for RouteParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteParams")
            .field("working_zoom", &self.working_zoom)
            .field("max_direct_distance_m", &self.max_direct_distance_m)
            .field("corridor", &self.corridor)
            .field("pool_size", &self.pool_size)
            .field("simplify_epsilon_px", &self.simplify_epsilon_px)
            .field("cost", &"<cost model>")
            .finish()
    }
}

/// A successfully planned route.
#[derive(Debug, Clone)]
pub struct RoutePath {
    /// Simplified, smoothed route in geographic coordinates.
    pub points: Vec<GeoPoint>,
    /// Candidate tiles the elevation layer actually holds data for.
    pub tiles_loaded: Vec<Tile>,
    /// Search work counters.
    pub stats: SearchStats,
}

/// Result of one planning request.
///
/// An unreachable destination is an answer, not an error:
/// [`RouteOutcome::NoPath`] reports it alongside the tiles that were
/// available, so callers can distinguish "walled off" from "nothing
/// loaded at all".
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// A route was found.
    Path(RoutePath),
    /// The search exhausted its frontier without reaching the destination.
    NoPath {
        /// Candidate tiles the elevation layer actually holds data for.
        tiles_loaded: Vec<Tile>,
    },
}

/// Plans least-cost routes over network-delivered terrain tiles.
///
/// The planner owns its tile sources and accumulates their atlases across
/// requests, so repeated plans over the same area skip the network.
pub struct RoutePlanner {
    dem: TileSource,
    hazard: Option<TileSource>,
    selector: TileSelector,
    params: RouteParams,
}

impl fmt::Debug for RoutePlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePlanner")
            .field("dem", &self.dem)
            .field("hazard", &self.hazard)
            .field("selector", &self.selector)
            .field("params", &self.params)
            .finish()
    }
}

impl RoutePlanner {
    /// Create a planner over an elevation source and an optional hazard
    /// source, both reconfigured to `params.pool_size` fetch workers.
    pub fn new(
        dem: TileSource,
        hazard: Option<TileSource>,
        params: RouteParams,
    ) -> Result<Self> {
        if params.working_zoom > MAX_ZOOM {
            return Err(RouteError::InvalidZoom(params.working_zoom));
        }
        let selector = TileSelector::new(params.working_zoom, params.corridor)?;
        Ok(Self {
            dem: dem.with_pool_size(params.pool_size),
            hazard: hazard.map(|h| h.with_pool_size(params.pool_size)),
            selector,
            params,
        })
    }

    /// Plan a route from `a` to `b`.
    ///
    /// Loads the candidate corridor into the atlases, runs the search, and
    /// post-processes the raw path. Returns [`RouteOutcome::NoPath`] when
    /// the destination is unreachable over the data that arrived.
    pub fn plan(&mut self, a: GeoPoint, b: GeoPoint) -> Result<RouteOutcome> {
        let distance_m = a.distance_m(b);
        if distance_m > self.params.max_direct_distance_m {
            return Err(RouteError::TooFar {
                distance_m,
                max_m: self.params.max_direct_distance_m,
            });
        }

        let candidates = self.selector.tiles_for_route(a, b);
        debug!(
            "Planning {} -> {}: {} candidate tiles at zoom {}",
            a, b, candidates.len(), self.params.working_zoom
        );
        let stats = self.dem.load_tiles(&candidates);
        log_load("elevation", stats);
        if let Some(hazard) = self.hazard.as_mut() {
            let stats = hazard.load_tiles(&candidates);
            log_load("hazard", stats);
        }
        let tiles_loaded: Vec<Tile> = candidates
            .iter()
            .copied()
            .filter(|&tile| self.dem.atlas().contains(tile))
            .collect();

        let start = GridPos::from_point(a, self.params.working_zoom)?;
        let goal = GridPos::from_point(b, self.params.working_zoom)?;
        let mut search = Search::new(
            self.dem.atlas(),
            self.hazard.as_ref().map(|h| h.atlas()),
            self.params.cost.as_ref(),
        );
        match search.run(start, goal) {
            SearchOutcome::Found(raw) => {
                let simplified = simplify(&raw, self.params.simplify_epsilon_px);
                let points = smooth(&path_to_geo(&simplified));
                debug!(
                    "Route found: {} raw nodes, {} after simplification, {} points emitted",
                    raw.len(),
                    simplified.len(),
                    points.len()
                );
                Ok(RouteOutcome::Path(RoutePath {
                    points,
                    tiles_loaded,
                    stats: search.stats(),
                }))
            }
            SearchOutcome::Exhausted => Ok(RouteOutcome::NoPath { tiles_loaded }),
        }
    }
}

fn log_load(layer: &str, stats: LoadStats) {
    if stats.failed > 0 {
        warn!(
            "{} layer: {}/{} candidate tiles failed to load",
            layer, stats.failed, stats.requested
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrapath_tiles::{MemoryFetcher, TileCodec};

    fn offline_source() -> TileSource {
        TileSource::with_fetcher(
            "mem://{z}/{x}/{y}",
            TileCodec::Hf2 { gzipped: false },
            Box::new(MemoryFetcher::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_default_params() {
        let params = RouteParams::default();
        assert_eq!(params.working_zoom, DEFAULT_WORKING_ZOOM);
        assert_eq!(params.max_direct_distance_m, 6000.0);
        assert_eq!(params.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(params.simplify_epsilon_px, 6.5);
        assert_eq!(params.corridor, CorridorParams::TIGHT);
    }

    #[test]
    fn test_endpoints_too_far_apart() {
        let mut planner =
            RoutePlanner::new(offline_source(), None, RouteParams::default()).unwrap();
        let a = GeoPoint::new(7.50, 46.50);
        let b = GeoPoint::new(8.50, 46.50); // ~76 km
        match planner.plan(a, b) {
            Err(RouteError::TooFar { distance_m, max_m }) => {
                assert!(distance_m > 70_000.0);
                assert_eq!(max_m, 6000.0);
            }
            other => panic!("expected TooFar, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_working_zoom_rejected() {
        let params = RouteParams {
            working_zoom: 29,
            ..RouteParams::default()
        };
        match RoutePlanner::new(offline_source(), None, params) {
            Err(RouteError::InvalidZoom(29)) => {}
            other => panic!("expected InvalidZoom, got {:?}", other),
        }
    }

    #[test]
    fn test_params_debug_is_total() {
        let rendered = format!("{:?}", RouteParams::default());
        assert!(rendered.contains("working_zoom"));
        assert!(rendered.contains("<cost model>"));
    }
}
