//! Application configuration, loaded by figment from a TOML file merged with
//! `MICIUDAD_`-prefixed environment variables.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::tracking::geo;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// Address to listen on. Defaults to 127.0.0.1:8000 when unset.
    pub listen_address: Option<SocketAddr>,
    /// Main database connection string.
    #[serde(default = "default_db")]
    pub db: String,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub toxicity: ToxicityConfig,
    #[serde(default)]
    pub directions: DirectionsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Optional metrics exporter.
    pub metrics: Option<MetricConfig>,
}

fn default_db() -> String {
    "sqlite://data/miciudad.db".to_owned()
}

fn default_timeout_secs() -> u64 {
    5
}

/// Image safety/label classifier.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_owned(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Remote toxicity scorer.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ToxicityConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ToxicityConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze"
                .to_owned(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Directions service for route construction.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DirectionsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://maps.googleapis.com/maps/api/directions/json".to_owned(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Image storage resolver. `public_url_templates` are tried first, in order;
/// `{ref}` is replaced with the opaque photo reference. The authenticated API
/// is the last resort.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub public_url_templates: Vec<String>,
    pub api_base: Option<String>,
    pub token: Option<String>,
}

/// Geofencing tolerances, meters.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct TrackingConfig {
    pub route_tolerance_m: f64,
    pub arrival_radius_m: f64,
    pub far_threshold_m: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            route_tolerance_m: geo::DEFAULT_ROUTE_TOLERANCE_M,
            arrival_radius_m: geo::DEFAULT_ARRIVAL_RADIUS_M,
            far_threshold_m: geo::DEFAULT_FAR_THRESHOLD_M,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum MetricConfig {
    PrometheusPush(PrometheusPushConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PrometheusPushConfig {
    pub url: String,
}
