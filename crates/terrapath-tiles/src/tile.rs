//! Web Mercator tile coordinate math.
//!
//! All conversions use the OpenStreetMap Slippy Map tiling convention with
//! 256-pixel tiles:
//! - `z` is the zoom level (0 to 28)
//! - `x` is the column (0 to 2^z - 1, from west to east)
//! - `y` is the row (0 to 2^z - 1, from north to south)
//!
//! A tile is addressed interchangeably as (x, y, z), as a base-4 quadkey
//! string, or as a packed 64-bit key. The quadkey digit for bit position i
//! is `2*bit_i(y) + bit_i(x)`, most significant bit first, so each digit
//! picks one quadrant on the way down the pyramid. The packed key keeps the
//! zoom in the top 6 bits and x/y in 29 bits each, and is what maps are
//! keyed on.
//!
//! There is no antimeridian wraparound: routing requests are capped to a
//! few kilometers, far away from any tile seam a user could cross.

use std::f64::consts::PI;
use std::fmt;

use crate::{Result, TileError};

/// Pixels per tile edge.
pub const TILE_SIZE: u32 = 256;

/// Samples in one decoded raster tile.
pub const TILE_SAMPLES: usize = (TILE_SIZE * TILE_SIZE) as usize;

/// Maximum supported zoom level (fits the packed key layout).
pub const MAX_ZOOM: u8 = 28;

/// Web Mercator latitude limit; poles are not tiled.
pub const MAX_LATITUDE: f64 = 85.0511;

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 first eccentricity.
pub const WGS84_E: f64 = 0.081_819_191;

/// Meters per degree of latitude, used for rough padding conversions.
pub(crate) const METERS_PER_DEGREE: f64 = 111_320.0;

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Longitude in degrees, east positive.
    pub lon: f64,
    /// Latitude in degrees, north positive.
    pub lat: f64,
}

impl GeoPoint {
    /// Create a new point from (longitude, latitude) degrees.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Planar distance to another point in meters.
    ///
    /// Scales the coordinate deltas by the WGS84 meridional and
    /// prime-vertical radii at the mean latitude, then takes the Euclidean
    /// norm. Accurate to well under a meter at the sub-10 km scale routing
    /// operates on; not meaningful at continental distances.
    pub fn distance_m(&self, other: GeoPoint) -> f64 {
        let lat = ((self.lat + other.lat) * 0.5).to_radians();
        let e2 = WGS84_E * WGS84_E;
        let sin2 = lat.sin() * lat.sin();
        let denom = (1.0 - e2 * sin2).sqrt();

        // Prime-vertical and meridional radii of curvature.
        let n = WGS84_A / denom;
        let m = WGS84_A * (1.0 - e2) / (denom * denom * denom);

        let dx = (other.lon - self.lon).to_radians() * n * lat.cos();
        let dy = (other.lat - self.lat).to_radians() * m;
        dx.hypot(dy)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lon, self.lat)
    }
}

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl GeoBounds {
    /// Axis-aligned box spanning two points.
    pub fn from_points(a: GeoPoint, b: GeoPoint) -> Self {
        Self {
            min_lon: a.lon.min(b.lon),
            min_lat: a.lat.min(b.lat),
            max_lon: a.lon.max(b.lon),
            max_lat: a.lat.max(b.lat),
        }
    }

    /// Whether the point lies inside the box (edges inclusive).
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    /// Whether two boxes overlap (edges inclusive).
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// Midpoint of the box.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lon + self.max_lon) * 0.5,
            (self.min_lat + self.max_lat) * 0.5,
        )
    }

    /// Box grown by the given margins on every side.
    pub fn expanded(&self, dlon: f64, dlat: f64) -> GeoBounds {
        GeoBounds {
            min_lon: self.min_lon - dlon,
            min_lat: self.min_lat - dlat,
            max_lon: self.max_lon + dlon,
            max_lat: self.max_lat + dlat,
        }
    }

    /// Smallest tile containing the whole box, at its natural resolution.
    pub fn enclosing_tile(&self) -> Tile {
        let nw = at_unchecked(GeoPoint::new(self.min_lon, self.max_lat), MAX_ZOOM);
        let se = at_unchecked(GeoPoint::new(self.max_lon, self.min_lat), MAX_ZOOM);

        let (mut ax, mut ay) = (nw.x, nw.y);
        let (mut bx, mut by) = (se.x, se.y);
        let mut z = MAX_ZOOM;
        while (ax != bx || ay != by) && z > 0 {
            ax /= 2;
            ay /= 2;
            bx /= 2;
            by /= 2;
            z -= 1;
        }
        Tile { x: ax, y: ay, z }
    }
}

/// One cell of the Web Mercator quad-tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Column (0 at 180°W, increases eastward).
    pub x: u32,
    /// Row (0 at ~85.05°N, increases southward).
    pub y: u32,
    /// Zoom level.
    pub z: u8,
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Point to tile without zoom validation; clamps to the tile grid.
pub(crate) fn at_unchecked(point: GeoPoint, z: u8) -> Tile {
    let n = (1u64 << z) as f64;
    let max_coord = (1u64 << z) - 1;

    let x = ((point.lon + 180.0) / 360.0 * n).floor() as u64;

    let lat_rad = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor() as u64;

    Tile {
        x: x.min(max_coord) as u32,
        y: y.min(max_coord) as u32,
        z,
    }
}

impl Tile {
    /// Create a new tile.
    ///
    /// # Panics
    /// Panics if coordinates are out of range for the zoom level.
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        assert!(z <= MAX_ZOOM, "zoom {} above maximum {}", z, MAX_ZOOM);
        let max_coord = 1u64 << z;
        assert!((x as u64) < max_coord, "x={} out of range for zoom {}", x, z);
        assert!((y as u64) < max_coord, "y={} out of range for zoom {}", y, z);
        Self { x, y, z }
    }

    /// Tile containing a geographic point at the given zoom.
    ///
    /// Latitude is clamped to the Web Mercator range; longitude outside
    /// ±180° clamps to the first/last column.
    pub fn at(point: GeoPoint, z: u8) -> Result<Self> {
        if z > MAX_ZOOM {
            return Err(TileError::InvalidZoomLevel(z));
        }
        Ok(at_unchecked(point, z))
    }

    /// Geographic bounding box of this tile.
    pub fn bbox(&self) -> GeoBounds {
        let n = (1u64 << self.z) as f64;

        let min_lon = self.x as f64 / n * 360.0 - 180.0;
        let max_lon = (self.x + 1) as f64 / n * 360.0 - 180.0;

        // Inverse of the Slippy Map row formula.
        let max_lat = (PI * (1.0 - 2.0 * self.y as f64 / n)).sinh().atan().to_degrees();
        let min_lat = (PI * (1.0 - 2.0 * (self.y + 1) as f64 / n)).sinh().atan().to_degrees();

        GeoBounds {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Geographic center of this tile.
    pub fn center(&self) -> GeoPoint {
        frac_to_lonlat(self.x as f64 + 0.5, self.y as f64 + 0.5, self.z)
    }

    /// Base-4 quadkey of this tile; one digit per zoom level.
    pub fn quadkey(&self) -> String {
        let mut key = String::with_capacity(self.z as usize);
        for i in (0..self.z).rev() {
            let mut digit = 0u8;
            if (self.x >> i) & 1 == 1 {
                digit += 1;
            }
            if (self.y >> i) & 1 == 1 {
                digit += 2;
            }
            key.push((b'0' + digit) as char);
        }
        key
    }

    /// Decode a quadkey back into a tile.
    pub fn from_quadkey(quadkey: &str) -> Result<Self> {
        if quadkey.len() > MAX_ZOOM as usize {
            return Err(TileError::InvalidQuadkey(quadkey.to_string()));
        }
        let (mut x, mut y) = (0u32, 0u32);
        for c in quadkey.chars() {
            x <<= 1;
            y <<= 1;
            match c {
                '0' => {}
                '1' => x |= 1,
                '2' => y |= 1,
                '3' => {
                    x |= 1;
                    y |= 1;
                }
                _ => return Err(TileError::InvalidQuadkey(quadkey.to_string())),
            }
        }
        Ok(Tile {
            x,
            y,
            z: quadkey.len() as u8,
        })
    }

    /// Packed 64-bit key: zoom in the top 6 bits, x and y in 29 bits each.
    pub fn key(&self) -> u64 {
        ((self.z as u64) << 58) | ((self.x as u64) << 29) | self.y as u64
    }

    /// Unpack a key produced by [`Tile::key`].
    pub fn from_key(key: u64) -> Self {
        Tile {
            x: ((key >> 29) & 0x1FFF_FFFF) as u32,
            y: (key & 0x1FFF_FFFF) as u32,
            z: (key >> 58) as u8,
        }
    }

    /// The four child tiles one zoom level down, doubling order
    /// (2x,2y), (2x+1,2y), (2x,2y+1), (2x+1,2y+1).
    pub fn children(&self) -> [Tile; 4] {
        debug_assert!(self.z < MAX_ZOOM);
        let (x, y, z) = (self.x * 2, self.y * 2, self.z + 1);
        [
            Tile { x, y, z },
            Tile { x: x + 1, y, z },
            Tile { x, y: y + 1, z },
            Tile {
                x: x + 1,
                y: y + 1,
                z,
            },
        ]
    }

    /// The tile one zoom level up, or None at the root.
    pub fn parent(&self) -> Option<Tile> {
        if self.z == 0 {
            return None;
        }
        Some(Tile {
            x: self.x / 2,
            y: self.y / 2,
            z: self.z - 1,
        })
    }
}

/// Tile plus fractional pixel offset for a geographic point.
///
/// The offsets are in [0, 256) per axis: 0 at the tile's west/north edge.
pub fn tile_fraction(point: GeoPoint, z: u8) -> Result<(Tile, f64, f64)> {
    if z > MAX_ZOOM {
        return Err(TileError::InvalidZoomLevel(z));
    }
    let n = (1u64 << z) as f64;
    let size = TILE_SIZE as f64;
    let max_coord = (1u64 << z) - 1;

    let gx = (point.lon + 180.0) / 360.0 * n * size;
    let lat_rad = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let gy = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n * size;

    let tx = ((gx / size).floor() as u64).min(max_coord) as u32;
    let ty = ((gy / size).floor() as u64).min(max_coord) as u32;

    // Clamping above can leave an offset of exactly 256 on the last tile.
    let fx = (gx - tx as f64 * size).clamp(0.0, size - 1e-7);
    let fy = (gy - ty as f64 * size).clamp(0.0, size - 1e-7);

    Ok((Tile { x: tx, y: ty, z }, fx, fy))
}

/// Fractional tile coordinates back to a geographic point.
///
/// `x` and `y` are in tile units (`tile.x + pixel/256`); the inverse of
/// [`tile_fraction`].
pub fn frac_to_lonlat(x: f64, y: f64, z: u8) -> GeoPoint {
    let n = (1u64 << z) as f64;
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    GeoPoint::new(lon, lat)
}
