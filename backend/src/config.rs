use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::info;

use crate::{
    exposure::{ExposureConfig, UnknownFacing, DEFAULT_FACING_TOLERANCE_DEG, DEFAULT_MAX_DISTANCE_M},
    graphhopper::GraphHopperSettings,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment environment, taken from `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub camera_data_path: PathBuf,
    pub cors_origins: CorsOrigins,
    pub graphhopper: GraphHopperSettings,
    pub exposure: ExposureConfig,
    /// Margin around the request points used to pick cameras to avoid.
    pub avoidance_margin_m: f64,
    pub max_avoid_areas: usize,
    pub max_waypoints: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            environment: Environment::Development,
            camera_data_path: PathBuf::from("data/cameras.json"),
            cors_origins: CorsOrigins::Any,
            graphhopper: GraphHopperSettings::default(),
            exposure: ExposureConfig::default(),
            avoidance_margin_m: 2_000.0,
            max_avoid_areas: 250,
            max_waypoints: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let gh = GraphHopperSettings::default();

        let timeout_secs: u64 = try_load(&lookup, "GRAPHHOPPER_TIMEOUT_SECS", gh.timeout.as_secs())?;
        let unknown_facing = match lookup("UNKNOWN_FACING") {
            None => UnknownFacing::default(),
            Some(raw) => parse_unknown_facing(&raw)?,
        };
        let avoidance_penalty: f64 = try_load(&lookup, "AVOIDANCE_PENALTY", gh.avoidance_penalty)?;
        if !(0.0..=1.0).contains(&avoidance_penalty) {
            return Err(ConfigError::Invalid {
                key: "AVOIDANCE_PENALTY",
                value: avoidance_penalty.to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: try_load(&lookup, "PORT", defaults.port)?,
            environment: lookup("NODE_ENV")
                .map(|raw| Environment::parse(&raw))
                .unwrap_or_default(),
            camera_data_path: lookup("CAMERA_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.camera_data_path),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|raw| parse_cors_origins(&raw))
                .unwrap_or(CorsOrigins::Any),
            graphhopper: GraphHopperSettings {
                endpoint: lookup("GRAPHHOPPER_ENDPOINT").unwrap_or(gh.endpoint),
                api_key: lookup("GRAPHHOPPER_API_KEY").filter(|key| !key.trim().is_empty()),
                timeout: Duration::from_secs(timeout_secs.max(1)),
                locale: lookup("GRAPHHOPPER_LOCALE").unwrap_or(gh.locale),
                avoidance_penalty,
                avoidance_radius_m: try_load_distance(
                    &lookup,
                    "AVOIDANCE_RADIUS_M",
                    gh.avoidance_radius_m,
                )?,
            },
            exposure: ExposureConfig {
                max_distance_m: try_load_distance(
                    &lookup,
                    "MAX_CAMERA_DISTANCE_M",
                    DEFAULT_MAX_DISTANCE_M,
                )?,
                facing_tolerance_deg: try_load_distance(
                    &lookup,
                    "FACING_TOLERANCE_DEG",
                    DEFAULT_FACING_TOLERANCE_DEG,
                )?,
                unknown_facing,
            },
            avoidance_margin_m: try_load_distance(
                &lookup,
                "AVOIDANCE_MARGIN_M",
                defaults.avoidance_margin_m,
            )?,
            max_avoid_areas: try_load(&lookup, "MAX_AVOID_AREAS", defaults.max_avoid_areas)?,
            max_waypoints: try_load(&lookup, "MAX_WAYPOINTS", defaults.max_waypoints)?,
        })
    }
}

fn try_load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Like [`try_load`], for thresholds that must be finite and non-negative.
/// NaN would silently disable every comparison against it.
fn try_load_distance(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value: f64 = try_load(lookup, key, default)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be a finite, non-negative number".to_string(),
        })
    }
}

fn parse_unknown_facing(raw: &str) -> Result<UnknownFacing, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "not_facing" | "not-facing" | "false" => Ok(UnknownFacing::NotFacing),
        "facing" | "true" => Ok(UnknownFacing::Facing),
        _ => Err(ConfigError::Invalid {
            key: "UNKNOWN_FACING",
            value: raw.to_string(),
            reason: "expected `not_facing` or `facing`".to_string(),
        }),
    }
}

/// Split a comma-separated origin list, keeping order and dropping blanks.
/// An empty list or a `*` entry allows any origin.
pub fn parse_cors_origins(raw: &str) -> CorsOrigins {
    let origins: Vec<String> = raw
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        CorsOrigins::Any
    } else {
        CorsOrigins::List(origins)
    }
}
