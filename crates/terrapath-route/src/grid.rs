//! The routing lattice: pixel-resolution nodes spanning tile boundaries.
//!
//! A node is a (tile, pixel) pair at one working zoom. A ±1 pixel step
//! that leaves the 256-pixel tile face wraps the pixel coordinate and
//! moves to the adjacent tile, so the lattice is seamless across tile
//! edges; only the edge of the world (tile coordinate under/overflow)
//! stops a step.

use terrapath_tiles::{frac_to_lonlat, tile_fraction, GeoPoint, Tile, TILE_SIZE};

use crate::Result;

/// The eight chessboard neighbor offsets, enumerated row-major.
///
/// The table is antisymmetric: `OFFSETS[i] == -OFFSETS[7 - i]`. Path
/// reconstruction steps backwards through a stored incoming direction by
/// taking the mirrored entry.
pub const OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// One node of the routing lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPos {
    /// Working-zoom tile the node lies in.
    pub tile: Tile,
    /// Pixel column within the tile, 0 at the west edge.
    pub px: u8,
    /// Pixel row within the tile, 0 at the north edge.
    pub py: u8,
}

impl GridPos {
    /// Create a node from its parts.
    pub fn new(tile: Tile, px: u8, py: u8) -> Self {
        Self { tile, px, py }
    }

    /// Discretize a geographic point at `zoom`: the containing tile plus
    /// the floor of the fractional pixel.
    pub fn from_point(point: GeoPoint, zoom: u8) -> Result<Self> {
        let (tile, fx, fy) = tile_fraction(point, zoom)?;
        Ok(Self {
            tile,
            px: fx as u8,
            py: fy as u8,
        })
    }

    /// Geographic position of the node's northwest pixel corner.
    pub fn to_point(&self) -> GeoPoint {
        frac_to_lonlat(
            self.tile.x as f64 + self.px as f64 / TILE_SIZE as f64,
            self.tile.y as f64 + self.py as f64 / TILE_SIZE as f64,
            self.tile.z,
        )
    }

    /// Step by one pixel offset, wrapping across tile edges.
    ///
    /// Returns `None` only at the edge of the world, where no adjacent
    /// tile exists.
    pub fn step(&self, dx: i8, dy: i8) -> Option<GridPos> {
        let max_coord = 1u32 << self.tile.z;
        let (px, x) = step_axis(self.px, dx, self.tile.x, max_coord)?;
        let (py, y) = step_axis(self.py, dy, self.tile.y, max_coord)?;
        Some(GridPos {
            tile: Tile::new(x, y, self.tile.z),
            px,
            py,
        })
    }

    /// The neighbor in direction `dir`, an index into [`OFFSETS`].
    pub fn neighbor(&self, dir: usize) -> Option<GridPos> {
        let (dx, dy) = OFFSETS[dir];
        self.step(dx, dy)
    }
}

/// Advance one axis, carrying into the tile coordinate on pixel wrap.
fn step_axis(pixel: u8, delta: i8, tile_coord: u32, max_coord: u32) -> Option<(u8, u32)> {
    let moved = pixel as i16 + delta as i16;
    if moved < 0 {
        if tile_coord == 0 {
            None
        } else {
            Some(((TILE_SIZE - 1) as u8, tile_coord - 1))
        }
    } else if moved as u32 >= TILE_SIZE {
        if tile_coord + 1 >= max_coord {
            None
        } else {
            Some((0, tile_coord + 1))
        }
    } else {
        Some((moved as u8, tile_coord))
    }
}
