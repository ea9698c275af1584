//! Bridge between the dashboard route segment and the map view.

use shared::domain::{BinId, BinStatus, LatLng};
use tracing::debug;

use crate::state::{DashboardState, RouteSnapshot};

pub const DEFAULT_FIT_PADDING: Padding = Padding { x: 50, y: 50 };

/// Viewport margin in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub x: u32,
    pub y: u32,
}

impl Padding {
    pub const fn uniform(px: u32) -> Self {
        Self { x: px, y: px }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl RouteBounds {
    pub fn enclosing(points: &[LatLng]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = RouteBounds {
            south_west: *first,
            north_east: *first,
        };
        for point in rest {
            bounds.south_west.lat = bounds.south_west.lat.min(point.lat);
            bounds.south_west.lng = bounds.south_west.lng.min(point.lng);
            bounds.north_east.lat = bounds.north_east.lat.max(point.lat);
            bounds.north_east.lng = bounds.north_east.lng.max(point.lng);
        }
        Some(bounds)
    }
}

/// Implemented by the rendering layer.
pub trait MapViewport {
    fn fly_to_bounds(&mut self, bounds: RouteBounds, padding: Padding);
}

/// Reframes the viewport once per computed route. Repeated renders of the
/// same route, and the absence of a route, leave the viewport alone.
#[derive(Debug)]
pub struct MapSyncAdapter {
    padding: Padding,
    last_synced_generation: Option<u64>,
}

impl MapSyncAdapter {
    pub fn new(padding: Padding) -> Self {
        Self {
            padding,
            last_synced_generation: None,
        }
    }

    /// Returns whether the viewport was asked to move.
    pub fn sync(&mut self, route: Option<&RouteSnapshot>, viewport: &mut dyn MapViewport) -> bool {
        let Some(route) = route else {
            return false;
        };
        if self.last_synced_generation == Some(route.generation) {
            return false;
        }
        self.last_synced_generation = Some(route.generation);

        let Some(bounds) = RouteBounds::enclosing(&route.waypoints) else {
            return false;
        };
        debug!(generation = route.generation, ?bounds, "reframing map to route");
        viewport.fly_to_bounds(bounds, self.padding);
        true
    }
}

impl Default for MapSyncAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_FIT_PADDING)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinMarker {
    pub id: BinId,
    pub position: LatLng,
    pub fill_level: u8,
    pub status: BinStatus,
    pub color: &'static str,
}

impl BinMarker {
    pub fn popup_text(&self) -> String {
        format!(
            "Bin ID: {}\nFill Level: {}%\nStatus: {}",
            self.id,
            self.fill_level,
            self.status.label()
        )
    }
}

/// Everything the map-drawing layer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MapScene {
    pub center: LatLng,
    pub bins: Vec<BinMarker>,
    pub route: Option<Vec<LatLng>>,
    /// Start and end point of the tour.
    pub depot: Option<LatLng>,
}

impl MapScene {
    pub fn from_state(state: &DashboardState) -> Self {
        let bins = state
            .inventory()
            .bins()
            .iter()
            .map(|bin| BinMarker {
                id: bin.id.clone(),
                position: bin.location,
                fill_level: bin.fill_level,
                status: bin.status,
                color: bin.status.color_hex(),
            })
            .collect();
        let route = state.route_snapshot();
        let depot = route.as_ref().and_then(RouteSnapshot::depot);

        Self {
            center: state.inventory().map_center(),
            bins,
            route: route.map(|snapshot| snapshot.waypoints),
            depot,
        }
    }
}
