//! End-to-end routing scenarios over an in-memory tile service.
//!
//! A flat 500 m plateau in the Bernese Alps is served as HF2 tiles from a
//! [`MemoryFetcher`], so every scenario runs offline and deterministic.

use terrapath_route::{
    path_to_geo, simplify, ElevationDeltaCost, GridPos, RouteOutcome, RouteParams, RoutePlanner,
    Search, SearchOutcome,
};
use terrapath_tiles::{
    CorridorParams, GeoPoint, MemoryFetcher, Tile, TileCodec, TileSelector, TileSource,
    DEFAULT_WORKING_ZOOM, TILE_SIZE,
};

/// Endpoints ~480 m apart, chosen to straddle a tile boundary at the
/// working zoom.
fn endpoints() -> (GeoPoint, GeoPoint) {
    (GeoPoint::new(7.5005, 46.5), GeoPoint::new(7.5067, 46.5))
}

fn flat_hf2_payload(elevation: f32) -> Vec<u8> {
    let samples = vec![elevation; (TILE_SIZE * TILE_SIZE) as usize];
    hf2_raster::encode(&samples, TILE_SIZE, TILE_SIZE, TILE_SIZE as u16, 0.1).unwrap()
}

/// Source serving `elevation` for every tile in a block around the
/// endpoints, wide enough to cover any corridor the selector produces.
fn plateau_source(elevation: f32) -> TileSource {
    let payload = flat_hf2_payload(elevation);
    let mut fetcher = MemoryFetcher::new();
    for x in 17060..=17074u32 {
        for y in 11585..=11598u32 {
            fetcher.insert(format!("mem://15/{}/{}", x, y), payload.clone());
        }
    }
    TileSource::with_fetcher(
        "mem://{z}/{x}/{y}",
        TileCodec::Hf2 { gzipped: false },
        Box::new(fetcher),
    )
    .unwrap()
}

fn global_px(pos: GridPos) -> (i64, i64) {
    (
        pos.tile.x as i64 * TILE_SIZE as i64 + pos.px as i64,
        pos.tile.y as i64 * TILE_SIZE as i64 + pos.py as i64,
    )
}

#[test]
fn test_search_over_loaded_corridor() {
    let (a, b) = endpoints();
    let selector = TileSelector::new(DEFAULT_WORKING_ZOOM, CorridorParams::TIGHT).unwrap();
    let candidates = selector.tiles_for_route(a, b);
    println!("{} candidate tiles", candidates.len());
    assert!(!candidates.is_empty());

    let mut source = plateau_source(500.0);
    let stats = source.load_tiles(&candidates);
    println!("load stats: {:?}", stats);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.loaded, candidates.len());

    let start = GridPos::from_point(a, DEFAULT_WORKING_ZOOM).unwrap();
    let goal = GridPos::from_point(b, DEFAULT_WORKING_ZOOM).unwrap();
    let cost = ElevationDeltaCost;
    let mut search = Search::new(source.atlas(), None, &cost);
    let raw = match search.run(start, goal) {
        SearchOutcome::Found(path) => path,
        SearchOutcome::Exhausted => panic!("no path over a flat plateau"),
    };

    // Flat terrain makes every step cost the same, so the cheapest path
    // takes exactly the Chebyshev number of steps.
    let (sx, sy) = global_px(start);
    let (gx, gy) = global_px(goal);
    let chebyshev = (gx - sx).abs().max((gy - sy).abs()) as usize;
    println!("raw path {} nodes, chebyshev distance {}", raw.len(), chebyshev);
    assert_eq!(raw.len(), chebyshev + 1);
    assert_eq!(raw.first(), Some(&start));
    assert_eq!(raw.last(), Some(&goal));
    for pair in raw.windows(2) {
        let (px, py) = global_px(pair[0]);
        let (qx, qy) = global_px(pair[1]);
        let (dx, dy) = ((qx - px).abs(), (qy - py).abs());
        assert!(dx <= 1 && dy <= 1 && (dx, dy) != (0, 0), "non-lattice step");
    }

    let simplified = simplify(&raw, 5.0);
    println!("{} nodes after simplification", simplified.len());
    assert!(simplified.len() >= 2);
    assert!(simplified.len() < raw.len());
    assert_eq!(path_to_geo(&simplified).len(), simplified.len());
}

#[test]
fn test_planner_end_to_end() {
    let (a, b) = endpoints();
    let mut planner =
        RoutePlanner::new(plateau_source(500.0), None, RouteParams::default()).unwrap();

    let route = match planner.plan(a, b).unwrap() {
        RouteOutcome::Path(route) => route,
        RouteOutcome::NoPath { tiles_loaded } => {
            panic!("no path with {} tiles loaded", tiles_loaded.len())
        }
    };
    println!(
        "route: {} points over {} tiles, {:?}",
        route.points.len(),
        route.tiles_loaded.len(),
        route.stats
    );

    assert!(!route.points.is_empty());
    let first = route.points[0];
    let last = route.points[route.points.len() - 1];
    assert!(first.distance_m(a) < 25.0, "route starts {:.1} m away", first.distance_m(a));
    assert!(last.distance_m(b) < 25.0, "route ends {:.1} m away", last.distance_m(b));

    let ta = Tile::at(a, DEFAULT_WORKING_ZOOM).unwrap();
    let tb = Tile::at(b, DEFAULT_WORKING_ZOOM).unwrap();
    assert!(route.tiles_loaded.contains(&ta));
    assert!(route.tiles_loaded.contains(&tb));
    assert!(route.stats.nodes_expanded > 0);
    assert!(route.stats.tiles_touched >= 2);
}

#[test]
fn test_planner_with_hazard_layer() {
    let (a, b) = endpoints();
    // Hazard layer present and risk-free everywhere the corridor reaches.
    let mut planner = RoutePlanner::new(
        plateau_source(500.0),
        Some(plateau_source(0.0)),
        RouteParams::default(),
    )
    .unwrap();

    match planner.plan(a, b).unwrap() {
        RouteOutcome::Path(route) => {
            assert!(!route.points.is_empty());
        }
        RouteOutcome::NoPath { tiles_loaded } => {
            panic!("no path with {} tiles loaded", tiles_loaded.len())
        }
    }
}

#[test]
fn test_unserved_area_yields_no_path() {
    let (a, b) = endpoints();
    let source = TileSource::with_fetcher(
        "mem://{z}/{x}/{y}",
        TileCodec::Hf2 { gzipped: false },
        Box::new(MemoryFetcher::new()),
    )
    .unwrap();
    let mut planner = RoutePlanner::new(source, None, RouteParams::default()).unwrap();

    match planner.plan(a, b).unwrap() {
        RouteOutcome::NoPath { tiles_loaded } => assert!(tiles_loaded.is_empty()),
        RouteOutcome::Path(route) => {
            panic!("found a {}-point route with no data", route.points.len())
        }
    }
}
