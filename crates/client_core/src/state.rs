//! Aggregate dashboard state machine.
//!
//! Every mutation goes through this type. Network completions carry the
//! ticket or sequence number handed out when their request was issued; a
//! completion whose number is no longer awaited is stale and dropped.

use std::sync::Arc;

use serde::Serialize;
use shared::domain::{AgentParameters, Bin, BinStatus, LatLng};
use tracing::{debug, info, warn};

use crate::{
    efficiency::{efficiency_label, EfficiencyEstimator},
    error::DashboardError,
    inventory::InventoryStore,
    route::{RouteOutcome, RouteResult},
};

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestSeq(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedRoute {
    pub route: RouteResult,
    pub efficiency_percent: u32,
    /// Bumped on every transition into `Optimized`.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    /// `previous` keeps the last computed route on screen until the request
    /// resolves.
    Requesting {
        seq: RequestSeq,
        previous: Option<OptimizedRoute>,
    },
    Optimized(OptimizedRoute),
}

/// Route segment observed by the map layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSnapshot {
    pub generation: u64,
    pub waypoints: Vec<LatLng>,
}

impl RouteSnapshot {
    pub fn depot(&self) -> Option<LatLng> {
        self.waypoints.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardViewModel {
    pub total_bins: usize,
    pub bins_requiring_service: usize,
    pub optimized_distance: String,
    pub stops_on_route: usize,
    pub efficiency_gain: String,
    pub is_optimized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied(Option<Notice>),
    Stale,
}

pub struct DashboardState {
    inventory: InventoryStore,
    parameters: AgentParameters,
    phase: Phase,
    estimator: Arc<dyn EfficiencyEstimator>,
    next_seq: u64,
    pending_load: Option<LoadTicket>,
    route_generation: u64,
}

impl DashboardState {
    pub fn new(
        parameters: AgentParameters,
        default_center: LatLng,
        estimator: Arc<dyn EfficiencyEstimator>,
    ) -> Self {
        Self {
            inventory: InventoryStore::new(default_center),
            parameters,
            phase: Phase::Idle,
            estimator,
            next_seq: 0,
            pending_load: None,
            route_generation: 0,
        }
    }

    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    pub fn begin_inventory_load(&mut self) -> LoadTicket {
        let ticket = LoadTicket(self.issue_seq());
        self.pending_load = Some(ticket);
        debug!(ticket = ticket.0, "inventory load issued");
        ticket
    }

    /// Installs a fetched inventory. A failed load leaves the store empty so
    /// every derived count reads zero.
    pub fn apply_inventory(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Bin>, DashboardError>,
    ) -> Resolution {
        if self.pending_load != Some(ticket) {
            debug!(ticket = ticket.0, "discarding stale inventory load");
            return Resolution::Stale;
        }
        self.pending_load = None;

        match result {
            Ok(bins) => self.inventory.replace(bins),
            Err(err) => {
                warn!("inventory load failed, continuing with empty inventory: {err}");
                self.inventory.clear();
            }
        }
        Resolution::Applied(None)
    }

    /// Enters `Requesting` and returns the parameters to send. Any request
    /// issued earlier becomes stale.
    pub fn begin_route_request(&mut self) -> (RequestSeq, AgentParameters) {
        let seq = RequestSeq(self.issue_seq());
        let previous = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => None,
            Phase::Requesting { previous, .. } => previous,
            Phase::Optimized(current) => Some(current),
        };
        self.phase = Phase::Requesting { seq, previous };
        info!(
            seq = seq.0,
            fill_threshold = self.parameters.fill_threshold(),
            max_bins = self.parameters.max_bins(),
            "route request issued"
        );
        (seq, self.parameters)
    }

    pub fn apply_route_outcome(&mut self, seq: RequestSeq, outcome: RouteOutcome) -> Resolution {
        let awaiting = matches!(self.phase, Phase::Requesting { seq: current, .. } if current == seq);
        if !awaiting {
            debug!(seq = seq.0, "discarding stale route response");
            return Resolution::Stale;
        }

        match outcome {
            RouteOutcome::Computed(route) => {
                self.route_generation += 1;
                let efficiency_percent = self.estimator.estimate_percent(&route);
                info!(
                    seq = seq.0,
                    generation = self.route_generation,
                    "dashboard optimized"
                );
                self.phase = Phase::Optimized(OptimizedRoute {
                    route,
                    efficiency_percent,
                    generation: self.route_generation,
                });
                Resolution::Applied(None)
            }
            RouteOutcome::Degenerate(message) => {
                self.phase = Phase::Idle;
                Resolution::Applied(Some(Notice::info(message)))
            }
            RouteOutcome::Failed(err) => {
                self.phase = Phase::Idle;
                Resolution::Applied(Some(Notice::error(err.notice_text())))
            }
        }
    }

    /// Resets the session: route cleared, inventory dropped, outstanding
    /// requests invalidated. The caller must run the returned load.
    pub fn refresh(&mut self) -> LoadTicket {
        self.phase = Phase::Idle;
        self.inventory.clear();
        info!("dashboard reset");
        self.begin_inventory_load()
    }

    pub fn set_parameters(&mut self, parameters: AgentParameters) {
        self.parameters = parameters;
    }

    pub fn parameters(&self) -> AgentParameters {
        self.parameters
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_requesting(&self) -> bool {
        matches!(self.phase, Phase::Requesting { .. })
    }

    pub fn is_loading_inventory(&self) -> bool {
        self.pending_load.is_some()
    }

    pub fn inventory(&self) -> &InventoryStore {
        &self.inventory
    }

    /// Route currently on screen, including the one kept during a
    /// re-optimization.
    pub fn displayed_route(&self) -> Option<&OptimizedRoute> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Requesting { previous, .. } => previous.as_ref(),
            Phase::Optimized(current) => Some(current),
        }
    }

    pub fn route_snapshot(&self) -> Option<RouteSnapshot> {
        self.displayed_route().map(|optimized| RouteSnapshot {
            generation: optimized.generation,
            waypoints: optimized.route.waypoints().to_vec(),
        })
    }

    pub fn view_model(&self) -> DashboardViewModel {
        let total_bins = self.inventory.total_bins();
        match self.displayed_route() {
            Some(optimized) => DashboardViewModel {
                total_bins,
                bins_requiring_service: optimized.route.bins_serviced(),
                optimized_distance: optimized.route.distance_label(),
                stops_on_route: optimized.route.bins_serviced(),
                efficiency_gain: efficiency_label(optimized.efficiency_percent),
                is_optimized: true,
            },
            None => DashboardViewModel {
                total_bins,
                bins_requiring_service: self.inventory.count_with_status(BinStatus::Full),
                optimized_distance: NOT_AVAILABLE.to_string(),
                stops_on_route: 0,
                efficiency_gain: NOT_AVAILABLE.to_string(),
                is_optimized: false,
            },
        }
    }
}
