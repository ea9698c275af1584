use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use shared::{
    domain::{AgentParameters, LatLng},
    error::ParameterError,
};
use url::Url;

use crate::{error::DashboardError, inventory::DEFAULT_MAP_CENTER, map_sync::Padding};

pub const SETTINGS_FILE: &str = "optibin.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub fill_threshold: u8,
    pub max_bins: u32,
    pub request_timeout_secs: u64,
    pub default_center: LatLng,
    pub fit_padding_px: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".into(),
            fill_threshold: 80,
            max_bins: 25,
            request_timeout_secs: 30,
            default_center: DEFAULT_MAP_CENTER,
            fit_padding_px: 50,
        }
    }
}

impl Settings {
    pub fn agent_parameters(&self) -> Result<AgentParameters, ParameterError> {
        AgentParameters::new(self.fill_threshold, self.max_bins)
    }

    pub fn request_timeout(&self) -> Result<Duration, DashboardError> {
        if self.request_timeout_secs == 0 {
            return Err(DashboardError::InvalidSettings(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.request_timeout_secs))
    }

    pub fn fit_padding(&self) -> Padding {
        Padding::uniform(self.fit_padding_px)
    }

    pub fn backend_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(self.backend_url.trim())
            .with_context(|| format!("invalid backend url '{}'", self.backend_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "backend url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        Ok(url)
    }
}

/// Loads `optibin.toml` from the working directory when present, then applies
/// the backend URL environment override.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("OPTIBIN_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("APP__BACKEND_URL") {
        settings.backend_url = v;
    }
}
