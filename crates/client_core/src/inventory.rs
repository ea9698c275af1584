use shared::{
    domain::{Bin, BinId, BinStatus, LatLng, MAX_FILL_PERCENTAGE},
    protocol::ApiBin,
};
use tracing::{info, warn};

use crate::{api::DashboardApi, classifier::classify, error::DashboardError};

pub const DEFAULT_MAP_CENTER: LatLng = LatLng::new(40.7128, -74.006);

/// Fetches the full bin inventory and classifies every entry. One request,
/// no retry.
pub async fn load_inventory(api: &dyn DashboardApi) -> Result<Vec<Bin>, DashboardError> {
    let raw = api.fetch_bins().await?;
    let bins: Vec<Bin> = raw.into_iter().map(ingest_bin).collect();
    info!(bins = bins.len(), "bin inventory loaded");
    Ok(bins)
}

fn ingest_bin(raw: ApiBin) -> Bin {
    let fill_level = clamp_fill_level(raw.id, raw.fill_level);
    Bin {
        id: BinId::from_backend_id(raw.id),
        location: raw.location,
        fill_level,
        status: classify(fill_level),
    }
}

fn clamp_fill_level(id: i64, fill_level: i64) -> u8 {
    let clamped = fill_level.clamp(0, i64::from(MAX_FILL_PERCENTAGE));
    if clamped != fill_level {
        warn!(
            bin_id = id,
            fill_level, "fill level outside 0..=100 from backend; clamping"
        );
    }
    u8::try_from(clamped).unwrap_or(MAX_FILL_PERCENTAGE)
}

/// Authoritative bin snapshot for the session. Replaced wholesale, never
/// patched per bin.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    bins: Vec<Bin>,
    map_center: LatLng,
    default_center: LatLng,
}

impl InventoryStore {
    pub fn new(default_center: LatLng) -> Self {
        Self {
            bins: Vec::new(),
            map_center: default_center,
            default_center,
        }
    }

    pub fn replace(&mut self, bins: Vec<Bin>) {
        self.map_center = mean_position(&bins).unwrap_or(self.default_center);
        self.bins = bins;
    }

    pub fn clear(&mut self) {
        self.bins.clear();
        self.map_center = self.default_center;
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn map_center(&self) -> LatLng {
        self.map_center
    }

    pub fn total_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn count_with_status(&self, status: BinStatus) -> usize {
        self.bins.iter().filter(|bin| bin.status == status).count()
    }
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAP_CENTER)
    }
}

fn mean_position(bins: &[Bin]) -> Option<LatLng> {
    if bins.is_empty() {
        return None;
    }
    let count = bins.len() as f64;
    let (lat_sum, lng_sum) = bins.iter().fold((0.0, 0.0), |(lat, lng), bin| {
        (lat + bin.location.lat, lng + bin.location.lng)
    });
    Some(LatLng::new(lat_sum / count, lng_sum / count))
}
