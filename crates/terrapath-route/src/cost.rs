//! Edge cost strategies.
//!
//! Cost applies per edge between two adjacent lattice nodes; the engine
//! sums edges into path cost. The default model turns Tobler's hiking
//! function from a speed into a marginal effort, with an additive hazard
//! term when a hazard layer is configured.

/// Pluggable edge cost strategy.
pub trait CostModel: Send + Sync {
    /// Cost of stepping from a node at elevation `h1` (meters) to an
    /// 8-neighbor at elevation `h2`, `distance_px` pixels away (1 or
    /// sqrt(2)), with the hazard sample at the neighbor when a hazard
    /// layer is configured.
    fn edge_cost(&self, h1: f32, h2: f32, distance_px: f64, risk: Option<f32>) -> f64;
}

/// Tobler hiking effort plus a weighted hazard sample.
///
/// The step effort is `0.6 * e^(3.5 * |slope + 0.05|)` where slope is the
/// elevation change over the horizontal step distance. The 0.05 shift puts
/// the minimum on a slight downhill, as in Tobler's hiking function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToblerCost {
    /// Ground meters per pixel at the working zoom.
    pub pixel_spacing_m: f64,
    /// Multiplier on the neighbor's hazard sample.
    pub hazard_weight: f64,
}

impl Default for ToblerCost {
    fn default() -> Self {
        Self {
            pixel_spacing_m: 6.515,
            hazard_weight: 25.0,
        }
    }
}

impl CostModel for ToblerCost {
    fn edge_cost(&self, h1: f32, h2: f32, distance_px: f64, risk: Option<f32>) -> f64 {
        let horizontal_m = distance_px * self.pixel_spacing_m;
        let slope = (h2 - h1) as f64 / horizontal_m;
        let effort = 0.6 * (3.5 * (slope + 0.05).abs()).exp();
        effort + risk.map_or(0.0, |r| r as f64 * self.hazard_weight)
    }
}

/// Fallback cost for layers without trustworthy absolute elevation:
/// `1 + |h2 - h1|`. Flat ground costs one unit per step and climbs are
/// penalized linearly; there is no hazard term.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElevationDeltaCost;

impl CostModel for ElevationDeltaCost {
    fn edge_cost(&self, h1: f32, h2: f32, _distance_px: f64, _risk: Option<f32>) -> f64 {
        1.0 + (h2 - h1).abs() as f64
    }
}
