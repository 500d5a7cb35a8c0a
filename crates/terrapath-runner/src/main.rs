//! Command-line route planner.
//!
//! Plans a walking route between two points over network-delivered
//! elevation tiles and prints the result as a GeoJSON FeatureCollection
//! on stdout. An unreachable destination is reported as an empty
//! collection with exit code 0; configuration and network-setup failures
//! exit nonzero.

use std::process;

use clap::Parser;
use log::{info, warn};
use serde::Serialize;
use terrapath_route::{
    CostModel, ElevationDeltaCost, RouteOutcome, RouteParams, RoutePlanner, ToblerCost,
    DEFAULT_MAX_DIRECT_DISTANCE_M, DEFAULT_SIMPLIFY_EPSILON_PX,
};
use terrapath_tiles::{
    CorridorParams, GeoPoint, RgbCalibration, Tile, TileCodec, TileSource, DEFAULT_POOL_SIZE,
    DEFAULT_WORKING_ZOOM,
};

#[derive(Debug, Parser)]
#[command(name = "terrapath", version, about = "Least-cost terrain routing over raster tile pyramids")]
struct Cli {
    /// Start point as LON,LAT in degrees
    #[arg(long, value_parser = parse_point)]
    from: GeoPoint,

    /// Destination point as LON,LAT in degrees
    #[arg(long, value_parser = parse_point)]
    to: GeoPoint,

    /// Elevation tile URL template with {z}, {x} and {y} placeholders
    #[arg(long)]
    dem_url: String,

    /// Elevation tile encoding: terrain-rgb, fixed-16-8, hf2 or hfz
    #[arg(long, default_value = "terrain-rgb", value_parser = parse_codec)]
    dem_codec: TileCodec,

    /// Optional hazard tile URL template; hazard tiles gate passability
    #[arg(long)]
    hazard_url: Option<String>,

    /// Hazard tile encoding: terrain-rgb, fixed-16-8, hf2 or hfz
    #[arg(long, default_value = "fixed-16-8", value_parser = parse_codec)]
    hazard_codec: TileCodec,

    /// Zoom level the search runs at
    #[arg(long, default_value_t = DEFAULT_WORKING_ZOOM)]
    zoom: u8,

    /// Corridor width preset: tight or relaxed
    #[arg(long, default_value = "tight", value_parser = parse_corridor)]
    corridor: CorridorParams,

    /// Refuse requests whose endpoints are further apart than this, in meters
    #[arg(long, default_value_t = DEFAULT_MAX_DIRECT_DISTANCE_M)]
    max_distance: f64,

    /// Concurrent tile fetch workers per layer
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Path simplification tolerance in working-zoom pixels
    #[arg(long, default_value_t = DEFAULT_SIMPLIFY_EPSILON_PX)]
    simplify_epsilon: f64,

    /// Edge cost model: tobler or elevation-delta
    #[arg(long, default_value = "tobler")]
    cost: String,

    /// Also emit the loaded tile footprints as Polygon features
    #[arg(long)]
    emit_tiles: bool,
}

fn parse_point(s: &str) -> Result<GeoPoint, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LON,LAT, got '{}'", s))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat))?;
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("({}, {}) is out of range", lon, lat));
    }
    Ok(GeoPoint::new(lon, lat))
}

fn parse_codec(s: &str) -> Result<TileCodec, String> {
    match s {
        "terrain-rgb" => Ok(TileCodec::Rgb(RgbCalibration::TERRAIN_RGB)),
        "fixed-16-8" => Ok(TileCodec::Rgb(RgbCalibration::FIXED_16_8)),
        "hf2" => Ok(TileCodec::Hf2 { gzipped: false }),
        "hfz" => Ok(TileCodec::Hf2 { gzipped: true }),
        other => Err(format!(
            "unknown codec '{}', expected terrain-rgb, fixed-16-8, hf2 or hfz",
            other
        )),
    }
}

fn parse_corridor(s: &str) -> Result<CorridorParams, String> {
    match s {
        "tight" => Ok(CorridorParams::TIGHT),
        "relaxed" => Ok(CorridorParams::RELAXED),
        other => Err(format!("unknown corridor '{}', expected tight or relaxed", other)),
    }
}

fn parse_cost(s: &str) -> Result<Box<dyn CostModel>, String> {
    match s {
        "tobler" => Ok(Box::new(ToblerCost::default())),
        "elevation-delta" => Ok(Box::new(ElevationDeltaCost)),
        other => Err(format!(
            "unknown cost model '{}', expected tobler or elevation-delta",
            other
        )),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let cost = parse_cost(&cli.cost)?;
    let params = RouteParams {
        working_zoom: cli.zoom,
        max_direct_distance_m: cli.max_distance,
        corridor: cli.corridor,
        pool_size: cli.pool_size,
        simplify_epsilon_px: cli.simplify_epsilon,
        cost,
    };

    let dem = TileSource::new(&cli.dem_url, cli.dem_codec).map_err(|e| e.to_string())?;
    let hazard = match &cli.hazard_url {
        Some(url) => Some(TileSource::new(url, cli.hazard_codec).map_err(|e| e.to_string())?),
        None => None,
    };

    let mut planner = RoutePlanner::new(dem, hazard, params).map_err(|e| e.to_string())?;
    let outcome = planner.plan(cli.from, cli.to).map_err(|e| e.to_string())?;
    match &outcome {
        RouteOutcome::Path(route) => info!(
            "Route with {} points over {} tiles",
            route.points.len(),
            route.tiles_loaded.len()
        ),
        RouteOutcome::NoPath { tiles_loaded } => warn!(
            "No route found; {} candidate tiles held data",
            tiles_loaded.len()
        ),
    }

    let document = geojson_document(&outcome, cli.emit_tiles);
    let rendered = serde_json::to_string_pretty(&document).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

/// GeoJSON FeatureCollection document.
#[derive(Debug, Serialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: Geometry,
    properties: Properties,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Geometry {
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Properties {
    Route {
        kind: &'static str,
    },
    Tile {
        kind: &'static str,
        z: u8,
        x: u32,
        y: u32,
        quadkey: String,
    },
}

/// Render an outcome as a GeoJSON FeatureCollection.
///
/// A found route becomes one LineString feature, followed by one Polygon
/// per loaded tile when `emit_tiles` is set. No route means no features.
fn geojson_document(outcome: &RouteOutcome, emit_tiles: bool) -> FeatureCollection {
    let mut features = Vec::new();
    if let RouteOutcome::Path(route) = outcome {
        features.push(Feature {
            kind: "Feature",
            geometry: Geometry::LineString {
                coordinates: route.points.iter().map(|p| [p.lon, p.lat]).collect(),
            },
            properties: Properties::Route { kind: "route" },
        });
        if emit_tiles {
            features.extend(route.tiles_loaded.iter().map(tile_feature));
        }
    }
    FeatureCollection {
        kind: "FeatureCollection",
        features,
    }
}

fn tile_feature(tile: &Tile) -> Feature {
    let bbox = tile.bbox();
    let ring = vec![
        [bbox.min_lon, bbox.min_lat],
        [bbox.max_lon, bbox.min_lat],
        [bbox.max_lon, bbox.max_lat],
        [bbox.min_lon, bbox.max_lat],
        [bbox.min_lon, bbox.min_lat],
    ];
    Feature {
        kind: "Feature",
        geometry: Geometry::Polygon {
            coordinates: vec![ring],
        },
        properties: Properties::Tile {
            kind: "tile",
            z: tile.z,
            x: tile.x,
            y: tile.y,
            quadkey: tile.quadkey(),
        },
    }
}
