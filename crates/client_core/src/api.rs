//! HTTP access to the bin inventory and route optimizer endpoints.

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::AgentParameters,
    error::ErrorBody,
    protocol::{ApiBin, RouteResponse, BINS_PATH, ROUTE_PATH},
};
use tracing::debug;

use crate::error::DashboardError;

const MAX_ERROR_TEXT_LEN: usize = 200;

#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn fetch_bins(&self) -> Result<Vec<ApiBin>, DashboardError>;
    async fn request_route(
        &self,
        params: &AgentParameters,
    ) -> Result<RouteResponse, DashboardError>;
}

pub struct HttpDashboardApi {
    http: Client,
    base_url: String,
}

impl HttpDashboardApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn fetch_bins(&self) -> Result<Vec<ApiBin>, DashboardError> {
        let url = format!("{}{BINS_PATH}", self.base_url);
        debug!(%url, "fetching bin inventory");
        let res = ensure_success(self.http.get(url).send().await?).await?;
        Ok(res.json().await?)
    }

    async fn request_route(
        &self,
        params: &AgentParameters,
    ) -> Result<RouteResponse, DashboardError> {
        let url = format!("{}{ROUTE_PATH}", self.base_url);
        debug!(
            %url,
            fill_threshold = params.fill_threshold(),
            max_bins = params.max_bins(),
            "requesting optimized route"
        );
        let res = ensure_success(self.http.post(url).json(params).send().await?).await?;
        Ok(res.json().await?)
    }
}

async fn ensure_success(res: Response) -> Result<Response, DashboardError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| fallback_error_text(&text, status.canonical_reason()));
    Err(DashboardError::Status {
        status: status.as_u16(),
        message,
    })
}

fn fallback_error_text(body: &str, reason: Option<&str>) -> String {
    let body = body.trim();
    if body.is_empty() {
        return reason.unwrap_or("request failed").to_string();
    }
    body.chars().take(MAX_ERROR_TEXT_LEN).collect()
}
