use std::time::Duration;

use shared::error::ParameterError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error(transparent)]
    InvalidParameters(#[from] ParameterError),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl DashboardError {
    /// Operator-facing text for the notice banner.
    pub fn notice_text(&self) -> String {
        match self {
            DashboardError::Network(_) => {
                "Route service unreachable; check the backend URL and network, then retry."
                    .to_string()
            }
            DashboardError::Decode(_) => {
                "Route service returned an unreadable response; retry or contact support."
                    .to_string()
            }
            DashboardError::Status { status, message } => {
                format!("Route request rejected ({status}): {message}")
            }
            DashboardError::Timeout(limit) => format!(
                "Route request timed out after {}s; the optimizer may be busy, retry shortly.",
                limit.as_secs()
            ),
            DashboardError::InvalidParameters(err) => format!("Invalid route parameters: {err}"),
            DashboardError::InvalidSettings(reason) => format!("Invalid dashboard settings: {reason}"),
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DashboardError::Decode(err.to_string())
        } else {
            DashboardError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Decode(err.to_string())
    }
}
