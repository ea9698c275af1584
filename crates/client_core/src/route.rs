//! Optimize-route request/response cycle.

use std::time::Duration;

use shared::{
    domain::{AgentParameters, LatLng},
    protocol::RouteResponse,
};
use tracing::{info, warn};

use crate::{api::DashboardApi, error::DashboardError};

pub const DEGENERATE_FALLBACK_MESSAGE: &str = "No bins require service.";
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// A computed collection tour. Waypoint 0 is the depot.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    waypoints: Vec<LatLng>,
    total_distance_km: f64,
    bins_serviced: usize,
}

impl RouteResult {
    pub fn new(waypoints: Vec<LatLng>, total_distance_km: f64, bins_serviced: usize) -> Self {
        Self {
            waypoints,
            total_distance_km,
            bins_serviced,
        }
    }

    pub fn waypoints(&self) -> &[LatLng] {
        &self.waypoints
    }

    pub fn depot(&self) -> Option<LatLng> {
        self.waypoints.first().copied()
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    pub fn bins_serviced(&self) -> usize {
        self.bins_serviced
    }

    pub fn distance_label(&self) -> String {
        format!("{} km", self.total_distance_km)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Computed(RouteResult),
    /// Well-formed answer with nothing to collect. Not a fault.
    Degenerate(String),
    Failed(DashboardError),
}

/// Classifies an optimizer response. Zero distance with at most one waypoint
/// means the optimizer selected no bins.
pub fn interpret_route_response(response: RouteResponse) -> RouteOutcome {
    let RouteResponse {
        total_distance_km,
        optimized_route_coords,
        bins_serviced,
        message,
    } = response;

    if !total_distance_km.is_finite() || total_distance_km < 0.0 {
        return RouteOutcome::Failed(DashboardError::Decode(format!(
            "invalid total_distance_km {total_distance_km}"
        )));
    }

    if total_distance_km == 0.0 && optimized_route_coords.len() <= 1 {
        let message = message
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| DEGENERATE_FALLBACK_MESSAGE.to_string());
        return RouteOutcome::Degenerate(message);
    }

    RouteOutcome::Computed(RouteResult::new(
        optimized_route_coords,
        total_distance_km,
        bins_serviced.len(),
    ))
}

pub struct RouteRequestController {
    timeout: Duration,
}

impl RouteRequestController {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Issues exactly one optimize request carrying `params` as the whole
    /// payload. Bin selection is the server's job.
    pub async fn request_route(
        &self,
        api: &dyn DashboardApi,
        params: AgentParameters,
    ) -> RouteOutcome {
        let outcome = match tokio::time::timeout(self.timeout, api.request_route(&params)).await {
            Ok(Ok(response)) => interpret_route_response(response),
            Ok(Err(err)) => RouteOutcome::Failed(err),
            Err(_) => RouteOutcome::Failed(DashboardError::Timeout(self.timeout)),
        };

        match &outcome {
            RouteOutcome::Computed(route) => info!(
                distance_km = route.total_distance_km(),
                stops = route.bins_serviced(),
                waypoints = route.waypoints().len(),
                "route computed"
            ),
            RouteOutcome::Degenerate(message) => info!(%message, "route optimizer selected no bins"),
            RouteOutcome::Failed(err) => warn!("route request failed: {err}"),
        }
        outcome
    }
}

impl Default for RouteRequestController {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_TIMEOUT)
    }
}
