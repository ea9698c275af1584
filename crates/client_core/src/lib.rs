use std::sync::Arc;

use shared::domain::{AgentParameters, Bin};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

pub mod api;
pub mod classifier;
pub mod config;
pub mod efficiency;
pub mod error;
pub mod inventory;
pub mod map_sync;
pub mod route;
pub mod state;

pub use api::{DashboardApi, HttpDashboardApi};
pub use config::Settings;
pub use efficiency::{EfficiencyEstimator, FixedEfficiencyEstimator, SampledEfficiencyEstimator};
pub use error::DashboardError;
pub use map_sync::{MapScene, MapSyncAdapter, MapViewport, Padding, RouteBounds};
pub use route::{RouteOutcome, RouteRequestController, RouteResult};
pub use state::{
    DashboardState, DashboardViewModel, Notice, NoticeSeverity, Phase, Resolution, RouteSnapshot,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    ViewModelChanged(DashboardViewModel),
    /// The displayed route was replaced or cleared.
    RouteChanged(Option<RouteSnapshot>),
    Notice(Notice),
}

/// Application root for one operator session. Owns the state machine and
/// publishes a fresh view model after every applied transition.
pub struct Dashboard {
    api: Arc<dyn DashboardApi>,
    controller: RouteRequestController,
    state: Mutex<DashboardState>,
    events: broadcast::Sender<DashboardEvent>,
}

impl Dashboard {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        settings: &Settings,
    ) -> Result<Arc<Self>, DashboardError> {
        Self::new_with_estimator(api, settings, Arc::new(SampledEfficiencyEstimator))
    }

    pub fn new_with_estimator(
        api: Arc<dyn DashboardApi>,
        settings: &Settings,
        estimator: Arc<dyn EfficiencyEstimator>,
    ) -> Result<Arc<Self>, DashboardError> {
        let parameters = settings.agent_parameters()?;
        let timeout = settings.request_timeout()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Arc::new(Self {
            api,
            controller: RouteRequestController::new(timeout),
            state: Mutex::new(DashboardState::new(
                parameters,
                settings.default_center,
                estimator,
            )),
            events,
        }))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    /// Session start: fetch and install the bin inventory.
    pub async fn load_inventory(&self) {
        let ticket = self.state.lock().await.begin_inventory_load();
        let result = inventory::load_inventory(self.api.as_ref()).await;
        self.apply(|state| state.apply_inventory(ticket, result))
            .await;
    }

    /// Requests a route for the current parameters. Resolves once this
    /// request's outcome was applied or discarded as stale.
    pub async fn optimize_route(&self) {
        let (seq, params) = self
            .apply(|state| {
                let issued = state.begin_route_request();
                (issued, Resolution::Applied(None))
            })
            .await;
        let outcome = self
            .controller
            .request_route(self.api.as_ref(), params)
            .await;
        self.apply(|state| state.apply_route_outcome(seq, outcome))
            .await;
    }

    /// Clears the route and reloads the inventory from scratch.
    pub async fn refresh_data(&self) {
        info!("refreshing dashboard data");
        let ticket = self
            .apply(|state| (state.refresh(), Resolution::Applied(None)))
            .await;
        let result = inventory::load_inventory(self.api.as_ref()).await;
        self.apply(|state| state.apply_inventory(ticket, result))
            .await;
    }

    pub async fn set_parameters(&self, parameters: AgentParameters) {
        self.state.lock().await.set_parameters(parameters);
    }

    pub async fn parameters(&self) -> AgentParameters {
        self.state.lock().await.parameters()
    }

    pub async fn view_model(&self) -> DashboardViewModel {
        self.state.lock().await.view_model()
    }

    pub async fn bins(&self) -> Vec<Bin> {
        self.state.lock().await.inventory().bins().to_vec()
    }

    pub async fn route_snapshot(&self) -> Option<RouteSnapshot> {
        self.state.lock().await.route_snapshot()
    }

    pub async fn map_scene(&self) -> MapScene {
        MapScene::from_state(&*self.state.lock().await)
    }

    pub async fn is_requesting(&self) -> bool {
        self.state.lock().await.is_requesting()
    }

    /// Runs one transition under the lock and publishes what changed while
    /// still holding it, so events arrive in applied order. The lock is never
    /// held across network I/O.
    async fn apply<R>(&self, transition: impl FnOnce(&mut DashboardState) -> R) -> R::Output
    where
        R: Transition,
    {
        let mut state = self.state.lock().await;
        let view_before = state.view_model();
        let route_before = state.route_snapshot();

        let (output, resolution) = transition(&mut *state).split();
        let Resolution::Applied(notice) = resolution else {
            return output;
        };

        let view_after = state.view_model();
        let route_after = state.route_snapshot();

        if route_after.as_ref().map(|r| r.generation) != route_before.as_ref().map(|r| r.generation)
        {
            let _ = self.events.send(DashboardEvent::RouteChanged(route_after));
        }
        if view_after != view_before {
            let _ = self.events.send(DashboardEvent::ViewModelChanged(view_after));
        }
        if let Some(notice) = notice {
            let _ = self.events.send(DashboardEvent::Notice(notice));
        }
        drop(state);
        output
    }
}

/// Result of a state transition: a value for the caller plus whether the
/// transition took effect.
trait Transition {
    type Output;
    fn split(self) -> (Self::Output, Resolution);
}

impl Transition for Resolution {
    type Output = ();
    fn split(self) -> ((), Resolution) {
        ((), self)
    }
}

impl<T> Transition for (T, Resolution) {
    type Output = T;
    fn split(self) -> (T, Resolution) {
        self
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
