//! Post-processing of raw search paths.
//!
//! A raw path visits every lattice node it crossed. Before emission it is
//! simplified with Ramer-Douglas-Peucker in global pixel space, projected
//! to geographic coordinates, then rounded off with a few corner-cutting
//! passes so the output follows terrain rather than the pixel grid.

use terrapath_tiles::{GeoPoint, TILE_SIZE};

use crate::grid::GridPos;

/// Corner-cutting passes applied by [`smooth`].
const SMOOTH_PASSES: usize = 3;

/// Global pixel coordinates of a node at its zoom level.
fn global_px(pos: GridPos) -> (f64, f64) {
    (
        pos.tile.x as f64 * TILE_SIZE as f64 + pos.px as f64,
        pos.tile.y as f64 * TILE_SIZE as f64 + pos.py as f64,
    )
}

/// Perpendicular distance from `p` to the segment `a`-`b`, in pixels.
fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        // Degenerate segment, fall back to point distance.
        let (ex, ey) = (p.0 - a.0, p.1 - a.1);
        return (ex * ex + ey * ey).sqrt();
    }
    ((b.0 - a.0) * (a.1 - p.1) - (a.0 - p.0) * (b.1 - a.1)).abs() / len
}

fn mark_kept(points: &[(f64, f64)], keep: &mut [bool], first: usize, last: usize, epsilon: f64) {
    if last <= first + 1 {
        return;
    }
    let mut max_distance = 0.0;
    let mut max_index = first;
    for i in first + 1..last {
        let distance = segment_distance(points[i], points[first], points[last]);
        if distance > max_distance {
            max_distance = distance;
            max_index = i;
        }
    }
    if max_distance > epsilon {
        keep[max_index] = true;
        mark_kept(points, keep, first, max_index, epsilon);
        mark_kept(points, keep, max_index, last, epsilon);
    }
}

/// Ramer-Douglas-Peucker simplification in global pixel coordinates.
///
/// Endpoints are always kept; interior nodes survive only if they deviate
/// from the chord by more than `epsilon_px` pixels. Paths shorter than
/// three nodes come back unchanged.
pub fn simplify(path: &[GridPos], epsilon_px: f64) -> Vec<GridPos> {
    if path.len() < 3 {
        return path.to_vec();
    }
    let points: Vec<(f64, f64)> = path.iter().map(|&p| global_px(p)).collect();
    let mut keep = vec![false; path.len()];
    keep[0] = true;
    keep[path.len() - 1] = true;
    mark_kept(&points, &mut keep, 0, path.len() - 1, epsilon_px);
    path.iter()
        .zip(keep)
        .filter_map(|(&pos, kept)| if kept { Some(pos) } else { None })
        .collect()
}

/// Project lattice nodes to geographic coordinates.
pub fn path_to_geo(path: &[GridPos]) -> Vec<GeoPoint> {
    path.iter().map(|p| p.to_point()).collect()
}

/// Chaikin corner cutting, endpoints pinned.
///
/// Each pass replaces every interior segment with its 1/4 and 3/4
/// interpolants, roughly doubling the point count while converging on a
/// quadratic B-spline. Inputs shorter than three points come back
/// unchanged.
pub fn smooth(points: &[GeoPoint]) -> Vec<GeoPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut current = points.to_vec();
    for _ in 0..SMOOTH_PASSES {
        let mut next = Vec::with_capacity(current.len() * 2);
        next.push(current[0]);
        for pair in current.windows(2) {
            let (p, q) = (pair[0], pair[1]);
            next.push(GeoPoint::new(
                0.75 * p.lon + 0.25 * q.lon,
                0.75 * p.lat + 0.25 * q.lat,
            ));
            next.push(GeoPoint::new(
                0.25 * p.lon + 0.75 * q.lon,
                0.25 * p.lat + 0.75 * q.lat,
            ));
        }
        next.push(current[current.len() - 1]);
        current = next;
    }
    current
}
