use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

pub const MAX_FILL_PERCENTAGE: u8 = 100;

/// Opaque bin key in the `BIN<id>` form shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinId(String);

impl BinId {
    pub fn from_backend_id(id: i64) -> Self {
        Self(format!("BIN{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinStatus {
    Empty,
    Partial,
    Full,
}

impl BinStatus {
    /// Marker colour used by the map layer.
    pub fn color_hex(self) -> &'static str {
        match self {
            BinStatus::Full => "#EF4444",
            BinStatus::Partial => "#F59E0B",
            BinStatus::Empty => "#22C55E",
        }
    }

    /// Traffic-light label shown in marker popups.
    pub fn label(self) -> &'static str {
        match self {
            BinStatus::Full => "RED",
            BinStatus::Partial => "YELLOW",
            BinStatus::Empty => "GREEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: BinId,
    pub location: LatLng,
    pub fill_level: u8,
    pub status: BinStatus,
}

/// Operator-tunable input for the remote route optimizer. Serialized verbatim
/// as the optimize request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentParameters {
    fill_threshold: u8,
    max_bins: u32,
}

impl AgentParameters {
    pub fn new(fill_threshold: u8, max_bins: u32) -> Result<Self, ParameterError> {
        if fill_threshold > MAX_FILL_PERCENTAGE {
            return Err(ParameterError::FillThresholdOutOfRange(fill_threshold));
        }
        if max_bins == 0 {
            return Err(ParameterError::ZeroMaxBins);
        }
        Ok(Self {
            fill_threshold,
            max_bins,
        })
    }

    pub fn fill_threshold(&self) -> u8 {
        self.fill_threshold
    }

    pub fn max_bins(&self) -> u32 {
        self.max_bins
    }
}
