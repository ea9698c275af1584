use super::*;
use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::LatLng,
    protocol::{ApiBin, RouteResponse},
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
};

struct PendingRoute {
    params: AgentParameters,
    respond: oneshot::Sender<Result<RouteResponse, DashboardError>>,
}

/// Backend double whose route calls stay open until the test answers them.
struct ScriptedApi {
    inventories: std::sync::Mutex<VecDeque<Result<Vec<ApiBin>, DashboardError>>>,
    route_calls: mpsc::UnboundedSender<PendingRoute>,
}

impl ScriptedApi {
    fn new(
        inventories: Vec<Result<Vec<ApiBin>, DashboardError>>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PendingRoute>) {
        let (route_calls, calls_rx) = mpsc::unbounded_channel();
        let api = Arc::new(Self {
            inventories: std::sync::Mutex::new(inventories.into()),
            route_calls,
        });
        (api, calls_rx)
    }
}

#[async_trait]
impl DashboardApi for ScriptedApi {
    async fn fetch_bins(&self) -> Result<Vec<ApiBin>, DashboardError> {
        self.inventories
            .lock()
            .expect("inventory script")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn request_route(
        &self,
        params: &AgentParameters,
    ) -> Result<RouteResponse, DashboardError> {
        let (respond, rx) = oneshot::channel();
        self.route_calls
            .send(PendingRoute {
                params: *params,
                respond,
            })
            .map_err(|_| DashboardError::Network("test harness gone".into()))?;
        rx.await
            .map_err(|_| DashboardError::Network("responder dropped".into()))?
    }
}

struct NeverRespondingApi;

#[async_trait]
impl DashboardApi for NeverRespondingApi {
    async fn fetch_bins(&self) -> Result<Vec<ApiBin>, DashboardError> {
        std::future::pending().await
    }

    async fn request_route(
        &self,
        _params: &AgentParameters,
    ) -> Result<RouteResponse, DashboardError> {
        std::future::pending().await
    }
}

/// Backend double that answers every call immediately with the same data.
struct InstantApi;

#[async_trait]
impl DashboardApi for InstantApi {
    async fn fetch_bins(&self) -> Result<Vec<ApiBin>, DashboardError> {
        tokio::task::yield_now().await;
        Ok(inventory(&[90, 40, 85]))
    }

    async fn request_route(
        &self,
        _params: &AgentParameters,
    ) -> Result<RouteResponse, DashboardError> {
        tokio::task::yield_now().await;
        Ok(route_response(12.4, &[(1.0, 1.0), (2.0, 2.0), (1.0, 1.0)], 2))
    }
}

fn api_bin(id: i64, fill_level: i64) -> ApiBin {
    ApiBin {
        id,
        location: LatLng::new(40.0 + id as f64 * 0.01, -74.0),
        fill_level,
    }
}

fn inventory(fills: &[i64]) -> Vec<ApiBin> {
    fills
        .iter()
        .enumerate()
        .map(|(i, &fill)| api_bin(i as i64 + 1, fill))
        .collect()
}

fn route_response(distance: f64, coords: &[(f64, f64)], serviced: usize) -> RouteResponse {
    RouteResponse {
        total_distance_km: distance,
        optimized_route_coords: coords
            .iter()
            .map(|&(lat, lng)| LatLng::new(lat, lng))
            .collect(),
        bins_serviced: (0..serviced).map(|i| json!(format!("BIN{i}"))).collect(),
        message: None,
    }
}

fn dashboard(api: Arc<dyn DashboardApi>) -> Arc<Dashboard> {
    Dashboard::new_with_estimator(
        api,
        &Settings::default(),
        Arc::new(FixedEfficiencyEstimator(37)),
    )
    .expect("dashboard")
}

fn drain(rx: &mut broadcast::Receiver<DashboardEvent>) -> Vec<DashboardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Default)]
struct RecordingViewport {
    framed: Vec<RouteBounds>,
}

impl MapViewport for RecordingViewport {
    fn fly_to_bounds(&mut self, bounds: RouteBounds, _padding: Padding) {
        self.framed.push(bounds);
    }
}

#[tokio::test]
async fn idle_dashboard_counts_full_bins() {
    let (api, _calls) = ScriptedApi::new(vec![Ok(inventory(&[90, 40, 85]))]);
    let dashboard = dashboard(api);
    let mut events = dashboard.subscribe_events();

    dashboard.load_inventory().await;

    let vm = dashboard.view_model().await;
    assert_eq!(vm.total_bins, 3);
    assert_eq!(vm.bins_requiring_service, 2);
    assert_eq!(vm.optimized_distance, "N/A");
    assert!(!vm.is_optimized);
    assert_eq!(
        drain(&mut events),
        vec![DashboardEvent::ViewModelChanged(vm)]
    );
    assert_eq!(
        dashboard.bins().await[0].id.as_str(),
        "BIN1",
        "bins keep backend order"
    );
}

#[tokio::test]
async fn empty_inventory_keeps_default_center_without_notice() {
    let (api, _calls) = ScriptedApi::new(vec![Ok(Vec::new())]);
    let dashboard = dashboard(api);
    let mut events = dashboard.subscribe_events();

    dashboard.load_inventory().await;

    let scene = dashboard.map_scene().await;
    assert_eq!(scene.center, Settings::default().default_center);
    assert!(scene.bins.is_empty());
    let vm = dashboard.view_model().await;
    assert_eq!((vm.total_bins, vm.bins_requiring_service, vm.stops_on_route), (0, 0, 0));
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn failed_inventory_load_degrades_to_empty_dashboard() {
    let (api, _calls) = ScriptedApi::new(vec![Err(DashboardError::Decode("bad json".into()))]);
    let dashboard = dashboard(api);
    let mut events = dashboard.subscribe_events();

    dashboard.load_inventory().await;

    let vm = dashboard.view_model().await;
    assert_eq!(vm.total_bins, 0);
    assert_eq!(vm.bins_requiring_service, 0);
    assert!(drain(&mut events)
        .iter()
        .all(|event| !matches!(event, DashboardEvent::Notice(_))));
}

#[tokio::test]
async fn computed_route_publishes_route_then_view_model() {
    let (api, mut calls) = ScriptedApi::new(vec![Ok(inventory(&[90, 40, 85]))]);
    let dashboard = dashboard(api);
    dashboard.load_inventory().await;
    let mut events = dashboard.subscribe_events();

    let task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    let call = calls.recv().await.expect("route call");
    assert_eq!(call.params, Settings::default().agent_parameters().expect("params"));
    assert!(dashboard.is_requesting().await);
    call.respond
        .send(Ok(route_response(
            12.4,
            &[(1.0, 1.0), (2.0, 2.0), (1.0, 1.0)],
            2,
        )))
        .expect("respond");
    task.await.expect("optimize task");

    let vm = dashboard.view_model().await;
    assert!(vm.is_optimized);
    assert_eq!(vm.optimized_distance, "12.4 km");
    assert_eq!(vm.stops_on_route, 2);
    assert_eq!(vm.bins_requiring_service, 2);
    assert_eq!(vm.efficiency_gain, "37% Fuel Saved");

    let events = drain(&mut events);
    assert_eq!(events.len(), 2, "unexpected events: {events:?}");
    let DashboardEvent::RouteChanged(Some(route)) = &events[0] else {
        panic!("expected route change first, got {:?}", events[0]);
    };
    assert_eq!(route.depot(), Some(LatLng::new(1.0, 1.0)));
    assert_eq!(events[1], DashboardEvent::ViewModelChanged(vm));

    let scene = dashboard.map_scene().await;
    assert_eq!(scene.depot, Some(LatLng::new(1.0, 1.0)));
    assert_eq!(scene.route.as_ref().map(Vec::len), Some(3));
}

#[tokio::test]
async fn degenerate_route_returns_to_idle_with_info_notice() {
    let (api, mut calls) = ScriptedApi::new(vec![Ok(inventory(&[20, 30]))]);
    let dashboard = dashboard(api);
    dashboard.load_inventory().await;
    let mut events = dashboard.subscribe_events();

    let task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    let call = calls.recv().await.expect("route call");
    call.respond
        .send(Ok(route_response(0.0, &[(1.0, 1.0)], 0)))
        .expect("respond");
    task.await.expect("optimize task");

    let vm = dashboard.view_model().await;
    assert!(!vm.is_optimized);
    assert_eq!(vm.stops_on_route, 0);
    assert!(!dashboard.is_requesting().await);
    assert_eq!(
        drain(&mut events),
        vec![DashboardEvent::Notice(Notice::info(
            route::DEGENERATE_FALLBACK_MESSAGE
        ))]
    );
}

#[tokio::test]
async fn slower_earlier_response_never_overwrites_latest() {
    let (api, mut calls) = ScriptedApi::new(vec![Ok(inventory(&[90, 95, 99]))]);
    let dashboard = dashboard(api);
    dashboard.load_inventory().await;

    let first_task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    let first = calls.recv().await.expect("first call");

    let second_task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    let second = calls.recv().await.expect("second call");

    second
        .respond
        .send(Ok(route_response(7.5, &[(1.0, 1.0), (3.0, 3.0), (1.0, 1.0)], 2)))
        .expect("respond second");
    second_task.await.expect("second task");
    let settled = dashboard.route_snapshot().await.expect("route after second");

    let mut events = dashboard.subscribe_events();
    first
        .respond
        .send(Ok(route_response(99.0, &[(5.0, 5.0), (6.0, 6.0)], 3)))
        .expect("respond first");
    first_task.await.expect("first task");

    let vm = dashboard.view_model().await;
    assert_eq!(vm.optimized_distance, "7.5 km");
    assert_eq!(vm.stops_on_route, 2);
    assert_eq!(dashboard.route_snapshot().await, Some(settled));
    assert!(drain(&mut events).is_empty(), "stale response must stay silent");
}

#[tokio::test]
async fn refresh_from_optimized_resets_and_reloads() {
    let (api, mut calls) = ScriptedApi::new(vec![
        Ok(inventory(&[90, 40, 85])),
        Ok(inventory(&[90, 10])),
    ]);
    let dashboard = dashboard(api);
    dashboard.load_inventory().await;

    let task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    calls
        .recv()
        .await
        .expect("route call")
        .respond
        .send(Ok(route_response(12.4, &[(1.0, 1.0), (2.0, 2.0)], 2)))
        .expect("respond");
    task.await.expect("optimize task");
    assert!(dashboard.view_model().await.is_optimized);

    let mut events = dashboard.subscribe_events();
    dashboard.refresh_data().await;

    let vm = dashboard.view_model().await;
    assert!(!vm.is_optimized);
    assert_eq!(vm.total_bins, 2);
    assert_eq!(vm.bins_requiring_service, 1);
    assert_eq!(vm.optimized_distance, "N/A");
    assert_eq!(vm.stops_on_route, 0);
    assert!(dashboard.route_snapshot().await.is_none());
    assert!(drain(&mut events).contains(&DashboardEvent::RouteChanged(None)));
}

#[tokio::test]
async fn response_arriving_after_refresh_is_discarded() {
    let (api, mut calls) = ScriptedApi::new(vec![Ok(inventory(&[90])), Ok(inventory(&[90]))]);
    let dashboard = dashboard(api);
    dashboard.load_inventory().await;

    let task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    let call = calls.recv().await.expect("route call");
    dashboard.refresh_data().await;

    call.respond
        .send(Ok(route_response(3.0, &[(1.0, 1.0), (2.0, 2.0)], 1)))
        .expect("respond");
    task.await.expect("optimize task");

    assert!(!dashboard.view_model().await.is_optimized);
}

#[tokio::test]
async fn map_sync_reframes_once_per_computed_route() {
    let (api, mut calls) = ScriptedApi::new(vec![Ok(inventory(&[90, 95]))]);
    let dashboard = dashboard(api);
    dashboard.load_inventory().await;
    let mut events = dashboard.subscribe_events();

    let task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    calls
        .recv()
        .await
        .expect("route call")
        .respond
        .send(Ok(route_response(
            4.2,
            &[(1.0, 1.0), (2.0, 3.0), (1.0, 1.0)],
            2,
        )))
        .expect("respond");
    task.await.expect("optimize task");

    let mut adapter = MapSyncAdapter::default();
    let mut viewport = RecordingViewport::default();
    for event in drain(&mut events) {
        if let DashboardEvent::RouteChanged(route) = event {
            adapter.sync(route.as_ref(), &mut viewport);
        }
    }
    // A later redraw of the same route must not move the map again.
    let current = dashboard.route_snapshot().await;
    adapter.sync(current.as_ref(), &mut viewport);

    assert_eq!(viewport.framed.len(), 1);
    assert_eq!(viewport.framed[0].south_west, LatLng::new(1.0, 1.0));
    assert_eq!(viewport.framed[0].north_east, LatLng::new(2.0, 3.0));
}

#[tokio::test]
async fn parameters_are_sent_verbatim() {
    let (api, mut calls) = ScriptedApi::new(Vec::new());
    let dashboard = dashboard(api);
    let params = AgentParameters::new(65, 4).expect("params");
    dashboard.set_parameters(params).await;

    let task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    let call = calls.recv().await.expect("route call");
    assert_eq!(call.params, params);
    drop(call);
    task.await.expect("optimize task");

    assert_eq!(dashboard.parameters().await, params);
    assert!(!dashboard.is_requesting().await);
}

#[tokio::test]
async fn failed_route_request_raises_error_notice_and_returns_to_idle() {
    let (api, mut calls) = ScriptedApi::new(vec![Ok(inventory(&[90, 95]))]);
    let dashboard = dashboard(api);
    dashboard.load_inventory().await;
    let mut events = dashboard.subscribe_events();

    let task = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.optimize_route().await }
    });
    calls
        .recv()
        .await
        .expect("route call")
        .respond
        .send(Err(DashboardError::Decode("expected value".into())))
        .expect("respond");
    task.await.expect("optimize task");

    let vm = dashboard.view_model().await;
    assert!(!vm.is_optimized);
    assert_eq!(vm.optimized_distance, "N/A");
    assert!(!dashboard.is_requesting().await);
    assert_eq!(
        drain(&mut events),
        vec![DashboardEvent::Notice(Notice::error(
            DashboardError::Decode(String::new()).notice_text()
        ))]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_actions_publish_in_applied_order() {
    for _ in 0..200 {
        let dashboard = dashboard(Arc::new(InstantApi));
        dashboard.load_inventory().await;
        let mut events = dashboard.subscribe_events();

        let optimize = tokio::spawn({
            let dashboard = dashboard.clone();
            async move { dashboard.optimize_route().await }
        });
        let refresh = tokio::spawn({
            let dashboard = dashboard.clone();
            async move { dashboard.refresh_data().await }
        });
        optimize.await.expect("optimize task");
        refresh.await.expect("refresh task");

        let events = drain(&mut events);
        let last_view = events.iter().rev().find_map(|event| match event {
            DashboardEvent::ViewModelChanged(vm) => Some(vm.clone()),
            _ => None,
        });
        let last_route = events.iter().rev().find_map(|event| match event {
            DashboardEvent::RouteChanged(route) => Some(route.clone()),
            _ => None,
        });

        assert_eq!(last_view, Some(dashboard.view_model().await));
        if let Some(route) = last_route {
            assert_eq!(route, dashboard.route_snapshot().await);
        }
    }
}

#[tokio::test]
async fn controller_times_out_hung_requests() {
    let controller = RouteRequestController::new(Duration::from_millis(50));
    let outcome = controller
        .request_route(
            &NeverRespondingApi,
            AgentParameters::new(80, 5).expect("params"),
        )
        .await;
    assert_eq!(
        outcome,
        RouteOutcome::Failed(DashboardError::Timeout(Duration::from_millis(50)))
    );
}

#[test]
fn invalid_settings_are_rejected_at_construction() {
    let settings = Settings {
        fill_threshold: 120,
        ..Settings::default()
    };
    let result = Dashboard::new(Arc::new(NeverRespondingApi), &settings);
    assert!(matches!(
        result,
        Err(DashboardError::InvalidParameters(_))
    ));
}

#[test]
fn zero_request_timeout_is_rejected_at_construction() {
    let settings = Settings {
        request_timeout_secs: 0,
        ..Settings::default()
    };
    let result = Dashboard::new(Arc::new(NeverRespondingApi), &settings);
    assert!(matches!(result, Err(DashboardError::InvalidSettings(_))));
}

#[derive(Clone, Default)]
struct BackendState {
    route_bodies: Arc<Mutex<Vec<Value>>>,
    fail_route: bool,
    malformed_route: bool,
}

async fn handle_bins() -> Json<Value> {
    Json(json!([
        {"id": 1, "location": {"lat": 40.70, "lng": -74.00}, "fill_level": 90},
        {"id": 2, "location": {"lat": 40.72, "lng": -74.02}, "fill_level": 40},
        {"id": 3, "location": {"lat": 40.74, "lng": -74.04}, "fill_level": 85}
    ]))
}

async fn handle_route(State(state): State<BackendState>, Json(body): Json<Value>) -> Response {
    state.route_bodies.lock().await.push(body);
    if state.fail_route {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "optimizer offline"})),
        )
            .into_response();
    }
    if state.malformed_route {
        return (StatusCode::OK, "{not json").into_response();
    }
    (
        StatusCode::OK,
        Json(json!({
            "total_distance_km": 12.4,
            "optimized_route_coords": [
                {"lat": 40.70, "lng": -74.00},
                {"lat": 40.74, "lng": -74.04},
                {"lat": 40.70, "lng": -74.00}
            ],
            "bins_serviced": [{"id": 1}, {"id": 3}]
        })),
    )
        .into_response()
}

async fn spawn_backend(state: BackendState) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/api/bins", get(handle_bins))
        .route("/api/agent/get-route", post(handle_route))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn http_backend_round_trip_drives_dashboard() {
    let backend = BackendState::default();
    let server_url = spawn_backend(backend.clone()).await.expect("spawn backend");
    let settings = Settings {
        backend_url: format!("{server_url}/"),
        fill_threshold: 70,
        max_bins: 6,
        ..Settings::default()
    };
    let dashboard = Dashboard::new_with_estimator(
        Arc::new(HttpDashboardApi::new(settings.backend_url.clone())),
        &settings,
        Arc::new(FixedEfficiencyEstimator(50)),
    )
    .expect("dashboard");

    dashboard.load_inventory().await;
    assert_eq!(dashboard.view_model().await.bins_requiring_service, 2);

    dashboard.optimize_route().await;
    let vm = dashboard.view_model().await;
    assert!(vm.is_optimized);
    assert_eq!(vm.optimized_distance, "12.4 km");
    assert_eq!(vm.stops_on_route, 2);

    let bodies = backend.route_bodies.lock().await;
    assert_eq!(bodies.as_slice(), &[json!({"fill_threshold": 70, "max_bins": 6})]);
}

#[tokio::test]
async fn http_error_status_surfaces_server_message() {
    let backend = BackendState {
        fail_route: true,
        ..BackendState::default()
    };
    let server_url = spawn_backend(backend).await.expect("spawn backend");
    let api = HttpDashboardApi::new(server_url);

    let err = api
        .request_route(&AgentParameters::new(80, 3).expect("params"))
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        DashboardError::Status {
            status: 503,
            message: "optimizer offline".to_string(),
        }
    );
}

#[tokio::test]
async fn malformed_route_body_fails_as_decode_error() {
    let backend = BackendState {
        malformed_route: true,
        ..BackendState::default()
    };
    let server_url = spawn_backend(backend).await.expect("spawn backend");
    let api: Arc<dyn DashboardApi> = Arc::new(HttpDashboardApi::new(server_url));

    let outcome = RouteRequestController::default()
        .request_route(api.as_ref(), AgentParameters::new(80, 3).expect("params"))
        .await;
    assert!(
        matches!(outcome, RouteOutcome::Failed(DashboardError::Decode(_))),
        "{outcome:?}"
    );

    let dashboard = dashboard(api);
    dashboard.load_inventory().await;
    let mut events = dashboard.subscribe_events();
    dashboard.optimize_route().await;

    assert!(!dashboard.view_model().await.is_optimized);
    assert!(!dashboard.is_requesting().await);
    let notices: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            DashboardEvent::Notice(notice) => Some(notice),
            _ => None,
        })
        .collect();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].severity, NoticeSeverity::Error);
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let api = HttpDashboardApi::new(format!("http://{addr}"));
    let err = api.fetch_bins().await.expect_err("must fail");
    assert!(matches!(err, DashboardError::Network(_)), "{err:?}");
}
