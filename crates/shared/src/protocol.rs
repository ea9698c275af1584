use serde::{Deserialize, Serialize};

use crate::domain::LatLng;

pub const BINS_PATH: &str = "/api/bins";
pub const ROUTE_PATH: &str = "/api/agent/get-route";

/// One entry of `GET /api/bins`. `fill_level` is kept wide so out-of-range
/// values reach the ingestion boundary instead of failing the whole decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiBin {
    pub id: i64,
    pub location: LatLng,
    pub fill_level: i64,
}

/// Response of `POST /api/agent/get-route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub total_distance_km: f64,
    pub optimized_route_coords: Vec<LatLng>,
    #[serde(default)]
    pub bins_serviced: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
