//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. User config: `~/.config/globe-atlas/config.toml`
//! 3. Project config: `globe-atlas.toml` (or the file given with `--config`)
//! 4. Environment variables: `GLOBE_ATLAS_*`
//!
//! Command-line flags are applied on top by `main`.
//!
//! ```toml
//! source = "data/countries_topo.json"
//! object = "ne_110m_admin_0_countries"
//! color_property = "POP_EST"
//! chart_property = "GDP_MD_EST"
//! connector = [[139.69, 35.69], [-122.42, 37.77]]
//! ```

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, scene::LayerOptions};

pub const PROJECT_CONFIG: &str = "globe-atlas.toml";
/// Upper bound for `chart_ticks`.
pub const MAX_CHART_TICKS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// URL or file path of the topology document.
    pub source: String,
    /// Object key inside the topology.
    pub object: String,
    /// Property driving the region fill.
    pub color_property: String,
    /// Property ranked by the bar chart.
    pub chart_property: String,
    /// Property used for labels.
    pub name_property: String,
    /// Projection scale, constant for the session.
    pub scale: f64,
    /// `[lon, lat]` endpoints of the connector line.
    pub connector: [[f64; 2]; 2],
    pub marker_radius: f64,
    /// Degrees of rotation per screen unit of pointer travel (x, y).
    pub drag_sensitivity: [f64; 2],
    /// Zoom exponent per wheel notch (`k *= 2^step`).
    pub wheel_step: f64,
    pub chart_ticks: usize,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "output_topo_0.json".to_string(),
            object: "ne_110m_admin_0_countries".to_string(),
            color_property: "POP_EST".to_string(),
            chart_property: "GDP_MD_EST".to_string(),
            name_property: "NAME".to_string(),
            scale: 80.0,
            connector: [[139.69, 35.69], [-122.42, 37.77]],
            marker_radius: 3.0,
            drag_sensitivity: [1.0, 1.0],
            wheel_step: 0.15,
            chart_ticks: 10,
            log_file: PathBuf::from("globe-atlas.log"),
        }
    }
}

impl Config {
    /// Load config with layered resolution (defaults → user → project → env).
    pub fn load(project: Option<&Path>) -> Result<Self, ConfigError> {
        let project = project.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG));
        let config: Self = Self::figment(Self::user_config_path(), project).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(user: Option<PathBuf>, project: PathBuf) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(user) = user {
            figment = figment.merge(Toml::file(user));
        }
        figment
            .merge(Toml::file(project))
            .merge(Env::prefixed("GLOBE_ATLAS_"))
    }

    /// `~/.config/globe-atlas/config.toml`, or the platform config dir.
    fn user_config_path() -> Option<PathBuf> {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("globe-atlas").join("config.toml");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }
        dirs::config_dir().map(|p| p.join("globe-atlas").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::invalid(format!("scale must be positive, got {}", self.scale)));
        }
        if !(self.marker_radius.is_finite() && self.marker_radius >= 0.0) {
            return Err(ConfigError::invalid("marker_radius must be a non-negative number"));
        }
        if self.connector.iter().flatten().any(|c| !c.is_finite()) {
            return Err(ConfigError::invalid("connector coordinates must be finite"));
        }
        if self.drag_sensitivity.iter().any(|s| !s.is_finite()) {
            return Err(ConfigError::invalid("drag_sensitivity must be finite"));
        }
        if !(self.wheel_step.is_finite() && self.wheel_step > 0.0) {
            return Err(ConfigError::invalid(format!("wheel_step must be positive, got {}", self.wheel_step)));
        }
        if self.chart_ticks > MAX_CHART_TICKS {
            return Err(ConfigError::invalid(format!(
                "chart_ticks must be at most {MAX_CHART_TICKS}, got {}",
                self.chart_ticks
            )));
        }
        if self.object.is_empty() {
            return Err(ConfigError::invalid("object key must not be empty"));
        }
        Ok(())
    }

    pub fn layer_options(&self) -> LayerOptions {
        LayerOptions {
            color_property: self.color_property.clone(),
            chart_property: self.chart_property.clone(),
            name_property: self.name_property.clone(),
            connector: self.connector,
            marker_radius: self.marker_radius,
            chart_ticks: self.chart_ticks,
        }
    }
}
