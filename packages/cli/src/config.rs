//! TOML configuration for the `safe_route` binary.
//!
//! Every table and key is optional; anything left out falls back to the
//! defaults below.
//!
//! ```toml
//! [schema]
//! id_properties = ["station_name", "POL_STN_NM"]
//! risk_property = "risk_level"
//!
//! [schema.thresholds]
//! safe = 0.7
//! caution = 0.4
//!
//! [routing]
//! avoid_risk_levels = ["forbidden"]
//! avoid_polygon_limit = 30
//! ```

use std::path::Path;

use safe_route_geofence::GeofenceSchema;
use safe_route_geofence_models::RiskLevel;
use safe_route_route::DEFAULT_AVOID_POLYGON_LIMIT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "SAFE_ROUTE_CONFIG";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`SafeRouteConfig`].
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeRouteConfig {
    /// How geofence features are read.
    pub schema: GeofenceSchema,
    /// Avoid-zone settings for routing requests.
    pub routing: RoutingConfig,
}

/// Avoid-zone settings for routing requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Risk levels whose zones the route should avoid.
    pub avoid_risk_levels: Vec<RiskLevel>,
    /// Maximum number of avoid polygons per request.
    pub avoid_polygon_limit: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            avoid_risk_levels: vec![RiskLevel::Forbidden],
            avoid_polygon_limit: DEFAULT_AVOID_POLYGON_LIMIT,
        }
    }
}

impl SafeRouteConfig {
    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has wrongly typed keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Loads configuration from `path`, or from the file named by
    /// [`CONFIG_ENV_VAR`], or falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(Into::into));

        let Some(path) = path else {
            log::debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        log::info!("Loading config from {}", path.display());
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}
