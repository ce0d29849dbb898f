use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mean earth radius shared by every distance computation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude on the same sphere as [`EARTH_RADIUS_M`].
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Axis-aligned box in WGS84 degrees.
///
/// A box whose `min_lon` is greater than its `max_lon` would wrap the
/// antimeridian; such boxes are representable but not supported by the
/// camera index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
        };
        for coord in iter {
            bounds.min_lat = bounds.min_lat.min(coord.lat);
            bounds.max_lat = bounds.max_lat.max(coord.lat);
            bounds.min_lon = bounds.min_lon.min(coord.lon);
            bounds.max_lon = bounds.max_lon.max(coord.lon);
        }
        Some(bounds)
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
            && coord.lon >= self.min_lon
            && coord.lon <= self.max_lon
    }

    /// Grow the box by `margin_m` meters on every side, clamped to the valid
    /// coordinate range.
    pub fn expanded_by_m(&self, margin_m: f64) -> Self {
        let lat_margin = margin_m / METERS_PER_DEGREE;
        // Widest longitude span happens at the latitude closest to a pole.
        let extreme_lat = self.min_lat.abs().max(self.max_lat.abs()).min(89.0);
        let cos_lat = extreme_lat.to_radians().cos().max(0.01);
        let lon_margin = margin_m / (METERS_PER_DEGREE * cos_lat);

        Self {
            min_lat: (self.min_lat - lat_margin).max(-90.0),
            max_lat: (self.max_lat + lat_margin).min(90.0),
            min_lon: (self.min_lon - lon_margin).max(-180.0),
            max_lon: (self.max_lon + lon_margin).min(180.0),
        }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    pub fn is_finite(&self) -> bool {
        self.min_lat.is_finite()
            && self.max_lat.is_finite()
            && self.min_lon.is_finite()
            && self.max_lon.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

/// One ALPR camera from the static dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    #[serde(alias = "osm_id")]
    pub osm_id: i64,
    #[serde(alias = "osm_type", default = "default_osm_type")]
    pub osm_type: OsmType,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
    #[serde(
        alias = "surveillance_zone",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub surveillance_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(
        rename = "startDate",
        alias = "install_date",
        alias = "start_date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub install_date: Option<String>,
}

fn default_osm_type() -> OsmType {
    OsmType::Node
}

impl Camera {
    pub fn position(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    #[serde(alias = "driving")]
    Car,
    #[serde(alias = "cycling")]
    Bike,
    #[serde(alias = "walking")]
    Foot,
}

impl TravelMode {
    /// Profile name understood by GraphHopper.
    pub fn profile(self) -> &'static str {
        match self {
            TravelMode::Car => "car",
            TravelMode::Bike => "bike",
            TravelMode::Foot => "foot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    #[serde(default)]
    pub waypoints: Vec<Coordinate>,
    #[serde(default)]
    pub mode: TravelMode,
    #[serde(default = "default_true")]
    pub avoid_cameras: bool,
    #[serde(default)]
    pub compare: bool,
    #[serde(default)]
    pub include_gpx: bool,
}

impl DirectionsRequest {
    /// Origin, waypoints, destination in travel order.
    pub fn points(&self) -> Vec<Coordinate> {
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(self.origin);
        points.extend(self.waypoints.iter().copied());
        points.push(self.destination);
        points
    }
}

pub fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub text: String,
    pub distance_m: f64,
    pub duration_s: f64,
    pub sign: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    /// Indices into the route path covered by this maneuver.
    pub interval: [usize; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<Coordinate>,
    pub encoded_polyline: String,
    pub distance_m: f64,
    pub duration_s: f64,
    pub mode: TravelMode,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascend_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descend_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraOnRoute {
    pub camera: Camera,
    pub distance_m: f64,
    pub nearest: Coordinate,
    pub distance_along_m: f64,
    pub facing: bool,
    pub facing_known: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureSummary {
    pub total: usize,
    pub facing: usize,
    pub facing_unknown: usize,
    pub by_operator: BTreeMap<String, usize>,
    pub by_brand: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAnalysis {
    pub route: Route,
    pub exposure: ExposureSummary,
    pub cameras: Vec<CameraOnRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsResponse {
    pub ok: bool,
    pub route: RouteAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<RouteAnalysis>,
    pub avoided_cameras: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpx_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamerasResponse {
    pub ok: bool,
    pub count: usize,
    pub truncated: bool,
    pub cameras: Vec<Camera>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: String,
    /// Seconds since process start.
    pub uptime: f64,
    pub cameras: usize,
    pub graphhopper: String,
    pub version: String,
}

/// Envelope returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_accepts_camel_and_snake_case() {
        let camel: Camera = serde_json::from_str(
            r#"{"osmId": 1, "osmType": "node", "lat": 1.0, "lon": 2.0,
                "surveillanceZone": "traffic", "ref": "A1", "startDate": "2023-04"}"#,
        )
        .unwrap();
        let snake: Camera = serde_json::from_str(
            r#"{"osm_id": 1, "osm_type": "node", "lat": 1.0, "lon": 2.0,
                "surveillance_zone": "traffic", "ref": "A1", "install_date": "2023-04"}"#,
        )
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.reference.as_deref(), Some("A1"));
        assert!(camel.operator.is_none());
    }

    #[test]
    fn camera_defaults_to_node() {
        let camera: Camera = serde_json::from_str(r#"{"osmId": 7, "lat": 0.0, "lon": 0.0}"#).unwrap();
        assert_eq!(camera.osm_type, OsmType::Node);
        let json = serde_json::to_string(&camera).unwrap();
        assert!(!json.contains("operator"));
    }

    #[test]
    fn travel_mode_aliases() {
        let mode: TravelMode = serde_json::from_str(r#""cycling""#).unwrap();
        assert_eq!(mode, TravelMode::Bike);
        let mode: TravelMode = serde_json::from_str(r#""foot""#).unwrap();
        assert_eq!(mode.profile(), "foot");
    }

    #[test]
    fn directions_request_defaults() {
        let req: DirectionsRequest = serde_json::from_str(
            r#"{"origin": {"lat": 1.0, "lon": 1.0}, "destination": {"lat": 2.0, "lon": 2.0}}"#,
        )
        .unwrap();
        assert!(req.avoid_cameras);
        assert!(!req.compare);
        assert_eq!(req.mode, TravelMode::Car);
        assert_eq!(req.points().len(), 2);
    }

    #[test]
    fn bounds_from_points() {
        let points = [Coordinate::new(1.0, 5.0), Coordinate::new(-2.0, 3.0)];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min_lat, -2.0);
        assert_eq!(bounds.max_lon, 5.0);
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn expanded_bounds_contain_margin() {
        let bounds = Bounds::from_points(&[Coordinate::new(45.0, 5.0)]).unwrap();
        let grown = bounds.expanded_by_m(1_000.0);
        assert!(grown.contains(Coordinate::new(45.008, 5.0)));
        assert!(grown.contains(Coordinate::new(45.0, 5.012)));
        assert!(!grown.contains(Coordinate::new(45.02, 5.0)));
    }

    #[test]
    fn degree_length_matches_earth_radius() {
        // One degree of latitude along a meridian, as haversine measures it.
        let expected = 2.0 * EARTH_RADIUS_M * (0.5f64.to_radians()).sin().asin();
        assert!((METERS_PER_DEGREE - expected).abs() < 1e-6);
        assert!((METERS_PER_DEGREE - 111_194.93).abs() < 0.01);
    }

    #[test]
    fn expanded_bounds_stay_in_range() {
        let bounds = Bounds::from_points(&[Coordinate::new(89.99, 179.99)]).unwrap();
        let grown = bounds.expanded_by_m(50_000.0);
        assert!(grown.max_lat <= 90.0);
        assert!(grown.max_lon <= 180.0);
        assert!(!grown.crosses_antimeridian());
    }
}
