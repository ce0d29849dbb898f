use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    models::{Coordinate, Instruction, Route, TravelMode, METERS_PER_DEGREE},
    polyline::{self, PolylineError},
};

/// Abstraction over the external routing engine.
///
/// Handlers only see this trait so tests can swap GraphHopper for a canned
/// implementation.
#[async_trait]
pub trait RoutingEngine: Send + Sync {
    /// One routing attempt. No retries.
    async fn route(&self, query: &RouteQuery) -> Result<Route, RoutingError>;

    /// Base URL reported by `/health`.
    fn endpoint(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    /// Origin, waypoints, destination in order.
    pub points: Vec<Coordinate>,
    pub mode: TravelMode,
    /// Camera positions the route should steer around.
    pub avoid: Vec<Coordinate>,
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("routing engine unreachable: {0}")]
    Unreachable(String),
    #[error("routing engine timed out after {0:?}")]
    Timeout(Duration),
    #[error("routing engine returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("no route found: {0}")]
    NoRoute(String),
    #[error("could not decode routing response: {0}")]
    Decode(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<PolylineError> for RoutingError {
    fn from(err: PolylineError) -> Self {
        RoutingError::Decode(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct GraphHopperSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub locale: String,
    /// Priority factor applied inside camera areas (0 forbids, 1 ignores).
    pub avoidance_penalty: f64,
    /// Half-width of the square drawn around each avoided camera.
    pub avoidance_radius_m: f64,
}

impl Default for GraphHopperSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8989".to_string(),
            api_key: None,
            timeout: Duration::from_secs(15),
            locale: "en".to_string(),
            avoidance_penalty: 0.05,
            avoidance_radius_m: 40.0,
        }
    }
}

pub struct GraphHopperClient {
    http: reqwest::Client,
    settings: GraphHopperSettings,
}

impl GraphHopperClient {
    pub fn new(mut settings: GraphHopperSettings) -> Result<Self, RoutingError> {
        settings.endpoint = settings.endpoint.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("flockhopper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RoutingError::Client(err.to_string()))?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &GraphHopperSettings {
        &self.settings
    }

    fn request_body(&self, query: &RouteQuery) -> GhRouteRequest {
        let custom_model = (!query.avoid.is_empty()).then(|| {
            avoidance_model(
                &query.avoid,
                self.settings.avoidance_radius_m,
                self.settings.avoidance_penalty,
            )
        });

        GhRouteRequest {
            points: query.points.iter().map(|c| [c.lon, c.lat]).collect(),
            profile: query.mode.profile().to_string(),
            locale: self.settings.locale.clone(),
            instructions: true,
            calc_points: true,
            points_encoded: true,
            ch_disable: custom_model.is_some().then_some(true),
            custom_model,
        }
    }
}

#[async_trait]
impl RoutingEngine for GraphHopperClient {
    async fn route(&self, query: &RouteQuery) -> Result<Route, RoutingError> {
        let url = format!("{}/route", self.settings.endpoint);
        let body = self.request_body(query);

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.query(&[("key", key)]);
        }

        tracing::debug!(
            points = query.points.len(),
            avoid = query.avoid.len(),
            profile = %body.profile,
            "requesting route from {url}"
        );

        let response = request.send().await.map_err(|err| self.transport_error(err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;

        if !status.is_success() {
            return Err(upstream_error(status, &bytes));
        }

        let parsed: GhRouteResponse =
            serde_json::from_slice(&bytes).map_err(|err| RoutingError::Decode(err.to_string()))?;
        into_route(parsed, query.mode)
    }

    fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }
}

impl GraphHopperClient {
    fn transport_error(&self, err: reqwest::Error) -> RoutingError {
        if err.is_timeout() {
            RoutingError::Timeout(self.settings.timeout)
        } else {
            RoutingError::Unreachable(err.to_string())
        }
    }
}

fn upstream_error(status: StatusCode, body: &[u8]) -> RoutingError {
    let message = serde_json::from_slice::<GhErrorResponse>(body)
        .map(|err| err.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).chars().take(200).collect());

    let unroutable = message.contains("Cannot find point")
        || message.contains("Connection between locations not found")
        || message.contains("Point not found");
    if status.is_client_error() && unroutable {
        RoutingError::NoRoute(message)
    } else {
        RoutingError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

fn into_route(response: GhRouteResponse, mode: TravelMode) -> Result<Route, RoutingError> {
    let path = response
        .paths
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::NoRoute("routing engine returned no paths".to_string()))?;

    let (points, encoded_polyline) = match path.points {
        GhPoints::Encoded(encoded) => {
            let multiplier = path
                .points_encoded_multiplier
                .unwrap_or(polyline::DEFAULT_MULTIPLIER);
            let points = polyline::decode(&encoded, multiplier, path.elevation)?;
            (points, encoded)
        }
        GhPoints::LineString { coordinates } => {
            let points: Vec<Coordinate> = coordinates
                .iter()
                .filter(|pos| pos.len() >= 2)
                .map(|pos| Coordinate {
                    lat: pos[1],
                    lon: pos[0],
                })
                .collect();
            let encoded = polyline::encode(&points, polyline::DEFAULT_MULTIPLIER);
            (points, encoded)
        }
    };

    if points.is_empty() {
        return Err(RoutingError::NoRoute("route has no geometry".to_string()));
    }

    let instructions = path
        .instructions
        .into_iter()
        .map(|ins| Instruction {
            text: ins.text,
            distance_m: ins.distance,
            duration_s: ins.time as f64 / 1000.0,
            sign: ins.sign,
            street_name: ins.street_name.filter(|name| !name.is_empty()),
            interval: ins.interval,
        })
        .collect();

    Ok(Route {
        path: points,
        encoded_polyline,
        distance_m: path.distance,
        duration_s: path.time as f64 / 1000.0,
        mode,
        instructions,
        ascend_m: path.ascend,
        descend_m: path.descend,
    })
}

/// Custom model lowering priority on every road crossing a square around one
/// of the `cameras`.
fn avoidance_model(cameras: &[Coordinate], radius_m: f64, penalty: f64) -> GhCustomModel {
    let polygons = cameras
        .iter()
        .map(|cam| {
            let dlat = radius_m / METERS_PER_DEGREE;
            let dlon = radius_m / (METERS_PER_DEGREE * cam.lat.to_radians().cos().max(0.01));
            vec![vec![
                [cam.lon - dlon, cam.lat - dlat],
                [cam.lon + dlon, cam.lat - dlat],
                [cam.lon + dlon, cam.lat + dlat],
                [cam.lon - dlon, cam.lat + dlat],
                [cam.lon - dlon, cam.lat - dlat],
            ]]
        })
        .collect();

    GhCustomModel {
        priority: vec![GhRule {
            condition: format!("in_{AVOID_AREA_ID}"),
            multiply_by: format!("{}", penalty.clamp(0.0, 1.0)),
        }],
        areas: GhFeatureCollection {
            kind: "FeatureCollection",
            features: vec![GhFeature {
                kind: "Feature",
                id: AVOID_AREA_ID.to_string(),
                properties: serde_json::Map::new(),
                geometry: GhGeometry {
                    kind: "MultiPolygon",
                    coordinates: polygons,
                },
            }],
        },
    }
}

const AVOID_AREA_ID: &str = "alpr_cameras";

#[derive(Debug, Serialize)]
struct GhRouteRequest {
    points: Vec<[f64; 2]>,
    profile: String,
    locale: String,
    instructions: bool,
    calc_points: bool,
    points_encoded: bool,
    #[serde(rename = "ch.disable", skip_serializing_if = "Option::is_none")]
    ch_disable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_model: Option<GhCustomModel>,
}

#[derive(Debug, Serialize)]
struct GhCustomModel {
    priority: Vec<GhRule>,
    areas: GhFeatureCollection,
}

#[derive(Debug, Serialize)]
struct GhRule {
    #[serde(rename = "if")]
    condition: String,
    multiply_by: String,
}

#[derive(Debug, Serialize)]
struct GhFeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<GhFeature>,
}

#[derive(Debug, Serialize)]
struct GhFeature {
    #[serde(rename = "type")]
    kind: &'static str,
    id: String,
    properties: serde_json::Map<String, serde_json::Value>,
    geometry: GhGeometry,
}

#[derive(Debug, Serialize)]
struct GhGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: Vec<Vec<Vec<[f64; 2]>>>,
}

#[derive(Debug, Deserialize)]
struct GhRouteResponse {
    #[serde(default)]
    paths: Vec<GhPath>,
}

#[derive(Debug, Deserialize)]
struct GhPath {
    distance: f64,
    time: u64,
    points: GhPoints,
    #[serde(default)]
    points_encoded_multiplier: Option<f64>,
    #[serde(default)]
    elevation: bool,
    #[serde(default)]
    instructions: Vec<GhInstruction>,
    #[serde(default)]
    ascend: Option<f64>,
    #[serde(default)]
    descend: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GhPoints {
    Encoded(String),
    LineString { coordinates: Vec<Vec<f64>> },
}

#[derive(Debug, Deserialize)]
struct GhInstruction {
    distance: f64,
    time: u64,
    text: String,
    sign: i32,
    interval: [usize; 2],
    #[serde(default)]
    street_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhErrorResponse {
    message: String,
}
