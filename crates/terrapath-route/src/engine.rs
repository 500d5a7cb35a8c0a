//! Uniform-cost search over the tile-pixel lattice.
//!
//! The frontier is a binary heap ordered on accumulated cost plus a
//! heuristic term that is always zero; duplicates are resolved by lazy
//! deletion at pop time. Per-tile bookkeeping grids are allocated dense on
//! first touch and dropped with the search, so memory follows the explored
//! region rather than the loaded atlas.
//!
//! Terrain that never arrived is simply not there: an edge is only
//! passable when every configured layer has data for both of its tiles.
//! Exhausting the frontier without reaching the destination therefore
//! covers both "walled off" and "tiles missing", indistinguishably.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::f64::consts::SQRT_2;
use std::time::Instant;

use log::{debug, info};
use terrapath_tiles::{Atlas, Tile, TILE_SAMPLES, TILE_SIZE};

use crate::cost::CostModel;
use crate::grid::{GridPos, OFFSETS};

/// Lifecycle of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Not yet run.
    Unstarted,
    /// Expanding nodes.
    Running,
    /// Terminated with a path.
    Found,
    /// Terminated with the frontier exhausted.
    Exhausted,
}

/// Terminal result of one search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Origin-to-destination node path, both endpoints included.
    Found(Vec<GridPos>),
    /// The reachable component did not contain the destination.
    Exhausted,
}

/// Work counters accumulated during a search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Nodes popped and expanded, stale duplicates excluded.
    pub nodes_expanded: usize,
    /// Neighbor relaxations that improved a node's cost.
    pub nodes_relaxed: usize,
    /// Distinct tiles whose bookkeeping grids were touched.
    pub tiles_touched: usize,
}

/// Frontier entry: accumulated cost plus a heuristic term.
///
/// The heuristic is always zero today (plain uniform-cost ordering); it
/// stays an explicit field so the ordering seam is visible if an
/// admissible estimate is ever added.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    cost: f64,
    heuristic: f64,
    pos: GridPos,
}

impl QueueEntry {
    fn new(cost: f64, pos: GridPos) -> Self {
        Self {
            cost,
            heuristic: 0.0,
            pos,
        }
    }

    fn priority(&self) -> f64 {
        self.cost + self.heuristic
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority().total_cmp(&other.priority()) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, the cheapest entry pops first.
        other.priority().total_cmp(&self.priority())
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dense per-tile search bookkeeping, allocated on first touch.
struct TileGrids {
    visited: Vec<bool>,
    cost: Vec<f64>,
    came_from: Vec<i8>,
}

impl TileGrids {
    fn new() -> Self {
        Self {
            visited: vec![false; TILE_SAMPLES],
            cost: vec![f64::INFINITY; TILE_SAMPLES],
            came_from: vec![-1; TILE_SAMPLES],
        }
    }
}

/// Per-invocation search state keyed by packed tile key.
#[derive(Default)]
struct SearchState {
    grids: HashMap<u64, TileGrids>,
}

impl SearchState {
    fn index(pos: GridPos) -> usize {
        pos.py as usize * TILE_SIZE as usize + pos.px as usize
    }

    fn grids_mut(&mut self, tile: Tile) -> &mut TileGrids {
        self.grids.entry(tile.key()).or_insert_with(TileGrids::new)
    }

    fn visited(&self, pos: GridPos) -> bool {
        self.grids
            .get(&pos.tile.key())
            .map_or(false, |g| g.visited[Self::index(pos)])
    }

    fn mark_visited(&mut self, pos: GridPos) {
        let index = Self::index(pos);
        self.grids_mut(pos.tile).visited[index] = true;
    }

    fn cost(&self, pos: GridPos) -> f64 {
        self.grids
            .get(&pos.tile.key())
            .map_or(f64::INFINITY, |g| g.cost[Self::index(pos)])
    }

    fn set_cost(&mut self, pos: GridPos, cost: f64) {
        let index = Self::index(pos);
        self.grids_mut(pos.tile).cost[index] = cost;
    }

    fn came_from(&self, pos: GridPos) -> i8 {
        self.grids
            .get(&pos.tile.key())
            .map_or(-1, |g| g.came_from[Self::index(pos)])
    }

    fn set_came_from(&mut self, pos: GridPos, dir: i8) {
        let index = Self::index(pos);
        self.grids_mut(pos.tile).came_from[index] = dir;
    }

    fn tiles_touched(&self) -> usize {
        self.grids.len()
    }
}

/// One least-cost search over the loaded atlases.
///
/// A `Search` runs once; construct a fresh one per request.
pub struct Search<'a> {
    dem: &'a Atlas,
    hazard: Option<&'a Atlas>,
    cost_model: &'a dyn CostModel,
    state: SearchState,
    stats: SearchStats,
    status: SearchStatus,
}

impl<'a> Search<'a> {
    /// Create a search over `dem`, optionally constrained by a hazard
    /// layer loaded into its own atlas.
    pub fn new(dem: &'a Atlas, hazard: Option<&'a Atlas>, cost_model: &'a dyn CostModel) -> Self {
        Self {
            dem,
            hazard,
            cost_model,
            state: SearchState::default(),
            stats: SearchStats::default(),
            status: SearchStatus::Unstarted,
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SearchStatus {
        self.status
    }

    /// Work counters; final once [`run`](Search::run) has returned.
    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    fn elevation(&self, pos: GridPos) -> Option<f32> {
        self.dem
            .raster(pos.tile)
            .map(|r| r.sample(pos.px as u32, pos.py as u32))
    }

    fn hazard_covered(&self, tile: Tile) -> bool {
        self.hazard.map_or(true, |h| h.contains(tile))
    }

    /// Run the search from `start` to `goal`.
    pub fn run(&mut self, start: GridPos, goal: GridPos) -> SearchOutcome {
        debug_assert_eq!(self.status, SearchStatus::Unstarted);
        self.status = SearchStatus::Running;
        let started = Instant::now();
        debug!("Searching {:?} -> {:?}", start, goal);

        let mut frontier = BinaryHeap::new();
        self.state.set_cost(start, 0.0);
        frontier.push(QueueEntry::new(0.0, start));

        while let Some(entry) = frontier.pop() {
            let pos = entry.pos;
            if self.state.visited(pos) {
                continue; // stale duplicate, lazily deleted
            }
            self.state.mark_visited(pos);
            self.stats.nodes_expanded += 1;

            if pos == goal {
                let path = self.reconstruct(start, goal);
                self.finish(SearchStatus::Found, started);
                return SearchOutcome::Found(path);
            }

            let h1 = match self.elevation(pos) {
                Some(h) => h,
                None => continue,
            };
            if !self.hazard_covered(pos.tile) {
                continue;
            }
            let current_cost = self.state.cost(pos);

            for (dir, &(dx, dy)) in OFFSETS.iter().enumerate() {
                let next = match pos.step(dx, dy) {
                    Some(next) => next,
                    None => continue,
                };
                if self.state.visited(next) {
                    continue;
                }
                let h2 = match self.elevation(next) {
                    Some(h) => h,
                    None => continue,
                };
                let risk = match self.hazard {
                    Some(hazard) => match hazard.raster(next.tile) {
                        Some(raster) => Some(raster.sample(next.px as u32, next.py as u32)),
                        None => continue,
                    },
                    None => None,
                };

                let distance_px = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
                let tentative =
                    current_cost + self.cost_model.edge_cost(h1, h2, distance_px, risk);
                if tentative < self.state.cost(next) {
                    self.state.set_cost(next, tentative);
                    self.state.set_came_from(next, dir as i8);
                    self.stats.nodes_relaxed += 1;
                    frontier.push(QueueEntry::new(tentative, next));
                }
            }
        }

        self.finish(SearchStatus::Exhausted, started);
        SearchOutcome::Exhausted
    }

    fn finish(&mut self, status: SearchStatus, started: Instant) {
        self.stats.tiles_touched = self.state.tiles_touched();
        self.status = status;
        info!(
            "Search {:?}: {} nodes expanded, {} relaxed, {} tiles in {:.2}s",
            status,
            self.stats.nodes_expanded,
            self.stats.nodes_relaxed,
            self.stats.tiles_touched,
            started.elapsed().as_secs_f64()
        );
    }

    /// Walk stored incoming directions from the destination back to the
    /// origin, stepping through the mirrored offset each time.
    fn reconstruct(&self, start: GridPos, goal: GridPos) -> Vec<GridPos> {
        let mut path = vec![goal];
        let mut current = goal;
        while current != start {
            let dir = self.state.came_from(current);
            if dir < 0 {
                break; // only the origin carries no incoming direction
            }
            let (dx, dy) = OFFSETS[7 - dir as usize];
            match current.step(dx, dy) {
                Some(prev) => current = prev,
                None => break,
            }
            path.push(current);
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{ElevationDeltaCost, ToblerCost};
    use terrapath_tiles::TileRaster;

    fn flat_raster(tile: Tile, elevation: f32) -> TileRaster {
        TileRaster::new(tile, vec![elevation; TILE_SAMPLES]).unwrap()
    }

    fn atlas_of(rasters: Vec<TileRaster>) -> Atlas {
        let mut atlas = Atlas::new();
        for raster in rasters {
            atlas.insert(raster);
        }
        atlas
    }

    fn assert_connected(path: &[GridPos]) {
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                (0..8).any(|dir| a.neighbor(dir) == Some(b)),
                "{:?} -> {:?} is not one lattice step",
                a,
                b
            );
        }
    }

    #[test]
    fn test_flat_grid_path_is_chebyshev() {
        let tile = Tile::new(5241, 11370, 15);
        let dem = atlas_of(vec![flat_raster(tile, 100.0)]);
        let cost = ElevationDeltaCost;
        let mut search = Search::new(&dem, None, &cost);

        let start = GridPos::new(tile, 10, 10);
        let goal = GridPos::new(tile, 30, 20);
        match search.run(start, goal) {
            SearchOutcome::Found(path) => {
                // Chebyshev distance 20: a cheapest unit-cost path has 21
                // nodes.
                assert_eq!(path.len(), 21);
                assert_eq!(path.first(), Some(&start));
                assert_eq!(path.last(), Some(&goal));
                assert_connected(&path);
            }
            SearchOutcome::Exhausted => panic!("expected a path"),
        }
        assert_eq!(search.status(), SearchStatus::Found);
        assert!(search.stats().nodes_expanded > 0);
        assert_eq!(search.stats().tiles_touched, 1);
    }

    #[test]
    fn test_start_equals_goal() {
        let tile = Tile::new(5241, 11370, 15);
        let dem = atlas_of(vec![flat_raster(tile, 100.0)]);
        let cost = ElevationDeltaCost;
        let mut search = Search::new(&dem, None, &cost);

        let pos = GridPos::new(tile, 42, 42);
        assert_eq!(search.run(pos, pos), SearchOutcome::Found(vec![pos]));
    }

    #[test]
    fn test_path_crosses_tile_edge() {
        let west = Tile::new(100, 200, 15);
        let east = Tile::new(101, 200, 15);
        let dem = atlas_of(vec![flat_raster(west, 50.0), flat_raster(east, 50.0)]);
        let cost = ElevationDeltaCost;
        let mut search = Search::new(&dem, None, &cost);

        let start = GridPos::new(west, 250, 100);
        let goal = GridPos::new(east, 5, 100);
        match search.run(start, goal) {
            SearchOutcome::Found(path) => {
                // Global pixel distance is (256 + 5) - 250 = 11.
                assert_eq!(path.len(), 12);
                assert_connected(&path);
                assert!(path.iter().any(|p| p.tile == west));
                assert!(path.iter().any(|p| p.tile == east));
            }
            SearchOutcome::Exhausted => panic!("expected a path across the tile edge"),
        }
        assert_eq!(search.stats().tiles_touched, 2);
    }

    #[test]
    fn test_missing_tile_is_impassable() {
        let west = Tile::new(100, 200, 15);
        let east = Tile::new(101, 200, 15);
        // Only the western tile has data.
        let dem = atlas_of(vec![flat_raster(west, 50.0)]);
        let cost = ElevationDeltaCost;
        let mut search = Search::new(&dem, None, &cost);

        let start = GridPos::new(west, 250, 100);
        let goal = GridPos::new(east, 5, 100);
        assert_eq!(search.run(start, goal), SearchOutcome::Exhausted);
        assert_eq!(search.status(), SearchStatus::Exhausted);
    }

    #[test]
    fn test_hazard_layer_gates_coverage() {
        let west = Tile::new(100, 200, 15);
        let east = Tile::new(101, 200, 15);
        let dem = atlas_of(vec![flat_raster(west, 50.0), flat_raster(east, 50.0)]);
        // Hazard layer configured but only delivered for the western tile.
        let hazard = atlas_of(vec![flat_raster(west, 0.0)]);
        let cost = ToblerCost::default();
        let mut search = Search::new(&dem, Some(&hazard), &cost);

        let start = GridPos::new(west, 250, 100);
        let goal = GridPos::new(east, 5, 100);
        assert_eq!(search.run(start, goal), SearchOutcome::Exhausted);
    }

    #[test]
    fn test_hazard_steers_through_gap() {
        let tile = Tile::new(100, 200, 15);
        let dem = atlas_of(vec![flat_raster(tile, 500.0)]);

        // A high-risk wall on pixel column 128, except a gap at row 200.
        let mut risk = vec![0.0f32; TILE_SAMPLES];
        for py in 0..TILE_SIZE as usize {
            if py != 200 {
                risk[py * TILE_SIZE as usize + 128] = 10.0;
            }
        }
        let hazard = atlas_of(vec![TileRaster::new(tile, risk).unwrap()]);

        let cost = ToblerCost::default();
        let mut search = Search::new(&dem, Some(&hazard), &cost);
        let start = GridPos::new(tile, 100, 100);
        let goal = GridPos::new(tile, 156, 100);
        match search.run(start, goal) {
            SearchOutcome::Found(path) => {
                assert_connected(&path);
                // Every crossing of the wall column goes through the gap.
                for pos in &path {
                    if pos.px == 128 {
                        assert_eq!(pos.py, 200, "path crossed the wall outside the gap");
                    }
                }
                assert!(path.iter().any(|p| p.px == 128));
            }
            SearchOutcome::Exhausted => panic!("expected a path through the gap"),
        }
    }
}
