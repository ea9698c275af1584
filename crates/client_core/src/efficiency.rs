//! Cosmetic fuel-saving estimate shown next to a computed route.

use std::ops::Range;

use rand::Rng;

use crate::route::RouteResult;

const SAMPLED_PERCENT_RANGE: Range<u32> = 30..60;

pub trait EfficiencyEstimator: Send + Sync {
    /// Estimated saving in percent for `route`.
    fn estimate_percent(&self, route: &RouteResult) -> u32;
}

/// Presentation-only estimate drawn uniformly from 30..60 percent.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampledEfficiencyEstimator;

impl EfficiencyEstimator for SampledEfficiencyEstimator {
    fn estimate_percent(&self, _route: &RouteResult) -> u32 {
        rand::thread_rng().gen_range(SAMPLED_PERCENT_RANGE)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedEfficiencyEstimator(pub u32);

impl EfficiencyEstimator for FixedEfficiencyEstimator {
    fn estimate_percent(&self, _route: &RouteResult) -> u32 {
        self.0
    }
}

pub fn efficiency_label(percent: u32) -> String {
    format!("{percent}% Fuel Saved")
}
