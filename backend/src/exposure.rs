//! Camera exposure analysis for a single route.
//!
//! Pipeline per request:
//!
//! ```text
//! route bounds + max distance ─► grid query ─► nearest segment per camera
//!        ─► distance filter ─► facing classification ─► summary counts
//! ```
//!
//! The grid query is only a coarse discard; the distance filter is what
//! decides membership.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    cameras::{CameraStore, Facing},
    geometry::{
        angular_difference_deg, haversine_m, initial_bearing_deg, nearest_on_polyline,
        normalize_deg,
    },
    models::{Bounds, Camera, CameraOnRoute, Coordinate, ExposureSummary},
};

pub const DEFAULT_MAX_DISTANCE_M: f64 = 50.0;
pub const DEFAULT_FACING_TOLERANCE_DEG: f64 = 60.0;
/// Bucket for cameras without an operator or brand tag.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Grid search slack over the distance threshold. The box margin is measured
/// along meridians and parallels while matching uses haversine distance.
const SEARCH_SLACK_RATIO: f64 = 1.01;
const SEARCH_SLACK_M: f64 = 1.0;

/// How a camera without a recorded direction is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFacing {
    #[default]
    NotFacing,
    Facing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureConfig {
    pub max_distance_m: f64,
    pub facing_tolerance_deg: f64,
    pub unknown_facing: UnknownFacing,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            max_distance_m: DEFAULT_MAX_DISTANCE_M,
            facing_tolerance_deg: DEFAULT_FACING_TOLERANCE_DEG,
            unknown_facing: UnknownFacing::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Exposure {
    pub summary: ExposureSummary,
    /// Ordered by progress along the route.
    pub cameras: Vec<CameraOnRoute>,
}

/// Analyze `route` against every camera in `store` near it.
pub fn analyze(route: &[Coordinate], store: &CameraStore, config: &ExposureConfig) -> Exposure {
    let Some(bounds) = Bounds::from_points(route) else {
        return Exposure::default();
    };
    if store.is_empty() {
        return Exposure::default();
    }

    let margin = config.max_distance_m.max(0.0) * SEARCH_SLACK_RATIO + SEARCH_SLACK_M;
    let search = bounds.expanded_by_m(margin);
    match store.candidates(&search) {
        Ok(candidates) => analyze_candidates(route, candidates, config),
        Err(err) => {
            // Route bounds never cross the antimeridian after expansion
            // clamping, but a malformed route could still produce NaNs.
            tracing::warn!("skipping exposure analysis: {err}");
            Exposure::default()
        }
    }
}

/// Same computation as [`analyze`] over an explicit set of cameras.
pub fn analyze_candidates<'a>(
    route: &[Coordinate],
    cameras: impl IntoIterator<Item = &'a Camera>,
    config: &ExposureConfig,
) -> Exposure {
    let mut on_route: Vec<CameraOnRoute> = cameras
        .into_iter()
        .filter_map(|camera| match_camera(route, camera, config))
        .collect();

    on_route.sort_by(|a, b| {
        a.distance_along_m
            .total_cmp(&b.distance_along_m)
            .then(a.camera.osm_id.cmp(&b.camera.osm_id))
    });

    Exposure {
        summary: summarize(&on_route),
        cameras: on_route,
    }
}

fn match_camera(
    route: &[Coordinate],
    camera: &Camera,
    config: &ExposureConfig,
) -> Option<CameraOnRoute> {
    let position = camera.position();
    let projection = nearest_on_polyline(position, route)?;
    if projection.distance_m > config.max_distance_m {
        return None;
    }

    let facing = Facing::of(camera);
    let facing_known = facing.is_known();
    let is_facing = match &facing {
        Facing::Bearings(bearings) => {
            let travel = route
                .get(projection.segment..=projection.segment + 1)
                .map(|ends| initial_bearing_deg(ends[0], ends[1]));
            faces_point(
                position,
                projection.point,
                travel,
                bearings,
                config.facing_tolerance_deg,
            )
        }
        Facing::Unknown => config.unknown_facing == UnknownFacing::Facing,
    };

    Some(CameraOnRoute {
        camera: camera.clone(),
        distance_m: projection.distance_m,
        nearest: projection.point,
        distance_along_m: projection.distance_along_m,
        facing: is_facing,
        facing_known,
    })
}

/// True when any of `bearings` points from `camera` toward `target` within
/// `tolerance_deg`.
///
/// A camera sitting on the route has no meaningful bearing toward it. It
/// counts as facing when it looks back against `travel`, the direction of
/// the nearest route segment, so it reads the plates of approaching
/// vehicles. With no segment to orient by it counts as facing.
fn faces_point(
    camera: Coordinate,
    target: Coordinate,
    travel: Option<f64>,
    bearings: &[f64],
    tolerance_deg: f64,
) -> bool {
    const ON_ROUTE_M: f64 = 1.0;
    let toward = if haversine_m(camera, target) < ON_ROUTE_M {
        match travel {
            Some(travel) => normalize_deg(travel + 180.0),
            None => return true,
        }
    } else {
        initial_bearing_deg(camera, target)
    };
    bearings
        .iter()
        .any(|&bearing| angular_difference_deg(bearing, toward) <= tolerance_deg)
}

fn summarize(cameras: &[CameraOnRoute]) -> ExposureSummary {
    let mut by_operator = BTreeMap::new();
    let mut by_brand = BTreeMap::new();
    let mut facing = 0;
    let mut facing_unknown = 0;

    for entry in cameras {
        *by_operator
            .entry(attribute_label(entry.camera.operator.as_deref()))
            .or_insert(0) += 1;
        *by_brand
            .entry(attribute_label(entry.camera.brand.as_deref()))
            .or_insert(0) += 1;
        if entry.facing {
            facing += 1;
        }
        if !entry.facing_known {
            facing_unknown += 1;
        }
    }

    ExposureSummary {
        total: cameras.len(),
        facing,
        facing_unknown,
        by_operator,
        by_brand,
    }
}

/// Trimmed tag value, or [`UNKNOWN_LABEL`] when missing or blank.
pub fn attribute_label(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OsmType;

    fn camera(id: i64, lat: f64, lon: f64) -> Camera {
        Camera {
            osm_id: id,
            osm_type: OsmType::Node,
            lat,
            lon,
            operator: None,
            brand: None,
            model: None,
            mount: None,
            surveillance_zone: None,
            direction: None,
            reference: None,
            install_date: None,
        }
    }

    fn facing(id: i64, lat: f64, lon: f64, direction: &str) -> Camera {
        Camera {
            direction: Some(direction.to_string()),
            ..camera(id, lat, lon)
        }
    }

    /// East-west route, ~850 m long at 40°N.
    fn straight_route() -> Vec<Coordinate> {
        vec![Coordinate::new(40.0, -75.0), Coordinate::new(40.0, -74.99)]
    }

    #[test]
    fn camera_on_the_line_has_zero_distance() {
        let cams = [camera(1, 40.0, -74.995)];
        let exposure = analyze_candidates(&straight_route(), &cams, &ExposureConfig::default());
        assert_eq!(exposure.summary.total, 1);
        assert!(exposure.cameras[0].distance_m < 1e-6);
    }

    #[test]
    fn cameras_beyond_max_distance_are_excluded() {
        // ~33 m, ~55 m and ~111 m north of the line.
        let cams = [
            camera(1, 40.0003, -74.995),
            camera(2, 40.0005, -74.995),
            camera(3, 40.001, -74.995),
        ];
        let config = ExposureConfig {
            max_distance_m: 50.0,
            ..ExposureConfig::default()
        };
        let exposure = analyze_candidates(&straight_route(), &cams, &config);
        let ids: Vec<i64> = exposure.cameras.iter().map(|c| c.camera.osm_id).collect();
        assert_eq!(ids, vec![1]);
        for entry in &exposure.cameras {
            assert!(entry.distance_m <= config.max_distance_m);
        }
    }

    #[test]
    fn opposite_directions_only_one_faces_route() {
        // Camera 30 m south of the route: north faces it, south faces away.
        let cams = [
            facing(1, 39.99973, -74.995, "0"),
            facing(2, 39.99973, -74.995, "180"),
        ];
        let exposure = analyze_candidates(&straight_route(), &cams, &ExposureConfig::default());
        assert_eq!(exposure.summary.total, 2);
        let by_id = |id| exposure.cameras.iter().find(|c| c.camera.osm_id == id).unwrap();
        assert!(by_id(1).facing);
        assert!(!by_id(2).facing);
        assert_eq!(exposure.summary.facing, 1);
    }

    #[test]
    fn unknown_facing_defaults_to_not_facing() {
        let cams = [camera(1, 39.99973, -74.995)];
        let exposure = analyze_candidates(&straight_route(), &cams, &ExposureConfig::default());
        assert!(!exposure.cameras[0].facing);
        assert!(!exposure.cameras[0].facing_known);
        assert_eq!(exposure.summary.facing, 0);
        assert_eq!(exposure.summary.facing_unknown, 1);
    }

    #[test]
    fn unknown_facing_can_count_as_facing() {
        let cams = [camera(1, 39.99973, -74.995)];
        let config = ExposureConfig {
            unknown_facing: UnknownFacing::Facing,
            ..ExposureConfig::default()
        };
        let exposure = analyze_candidates(&straight_route(), &cams, &config);
        assert!(exposure.cameras[0].facing);
        assert_eq!(exposure.summary.facing, 1);
        assert_eq!(exposure.summary.facing_unknown, 1);
    }

    #[test]
    fn tolerance_bounds_facing() {
        // Toward the route is due north; 50° off is inside 60°, 70° is not.
        let cams = [
            facing(1, 39.99973, -74.995, "50"),
            facing(2, 39.99973, -74.995, "70"),
            facing(3, 39.99973, -74.995, "200;310"),
        ];
        let exposure = analyze_candidates(&straight_route(), &cams, &ExposureConfig::default());
        let facing: Vec<i64> = exposure
            .cameras
            .iter()
            .filter(|c| c.facing)
            .map(|c| c.camera.osm_id)
            .collect();
        assert_eq!(facing, vec![1, 3]);
    }

    #[test]
    fn summary_groups_operator_and_brand() {
        let cams = [
            Camera {
                operator: Some("Flock Safety".into()),
                brand: Some("Flock".into()),
                ..camera(1, 40.0, -74.999)
            },
            Camera {
                operator: Some("Flock Safety".into()),
                brand: Some("  ".into()),
                ..camera(2, 40.0, -74.998)
            },
            Camera {
                brand: Some("Motorola".into()),
                ..camera(3, 40.0, -74.997)
            },
        ];
        let exposure = analyze_candidates(&straight_route(), &cams, &ExposureConfig::default());
        let summary = &exposure.summary;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_operator.get("Flock Safety"), Some(&2));
        assert_eq!(summary.by_operator.get("Unknown"), Some(&1));
        assert_eq!(summary.by_brand.get("Flock"), Some(&1));
        assert_eq!(summary.by_brand.get("Motorola"), Some(&1));
        assert_eq!(summary.by_brand.get("Unknown"), Some(&1));
    }

    #[test]
    fn cameras_are_ordered_along_route() {
        let cams = [
            camera(1, 40.0, -74.991),
            camera(2, 40.0, -74.999),
            camera(3, 40.0, -74.995),
        ];
        let exposure = analyze_candidates(&straight_route(), &cams, &ExposureConfig::default());
        let ids: Vec<i64> = exposure.cameras.iter().map(|c| c.camera.osm_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(exposure.cameras[0].distance_along_m < exposure.cameras[2].distance_along_m);
    }

    #[test]
    fn store_analysis_uses_grid_and_matches_direct() {
        let store = CameraStore::from_cameras(vec![
            camera(1, 40.0, -74.995),
            camera(2, 40.0003, -74.992),
            camera(3, 41.0, -74.995),
            camera(4, -33.0, 151.0),
        ]);
        let config = ExposureConfig::default();
        let from_store = analyze(&straight_route(), &store, &config);
        let direct = analyze_candidates(&straight_route(), store.cameras(), &config);
        assert_eq!(from_store.summary, direct.summary);
        assert_eq!(from_store.summary.total, 2);
    }

    #[test]
    fn camera_across_a_grid_cell_edge_is_still_found() {
        // Route just south of 40°N; the camera sits on the 40°N cell edge,
        // ~49.9 m away, which is inside the 50 m threshold.
        let route = vec![
            Coordinate::new(39.99955084341251, -75.0),
            Coordinate::new(39.99955084341251, -74.99),
        ];
        let store = CameraStore::from_cameras(vec![camera(1, 40.0, -74.995)]);
        let config = ExposureConfig::default();
        let from_store = analyze(&route, &store, &config);
        let direct = analyze_candidates(&route, store.cameras(), &config);
        assert_eq!(direct.summary.total, 1);
        assert_eq!(from_store.summary, direct.summary);
    }

    #[test]
    fn camera_on_the_route_faces_oncoming_traffic_only() {
        // The route runs east, so traffic approaches from the west.
        let cams = [
            facing(1, 40.0, -74.995, "270"),
            facing(2, 40.0, -74.995, "90"),
            facing(3, 40.0, -74.995, "0"),
        ];
        let exposure = analyze_candidates(&straight_route(), &cams, &ExposureConfig::default());
        assert_eq!(exposure.summary.total, 3);
        let facing: Vec<i64> = exposure
            .cameras
            .iter()
            .filter(|c| c.facing)
            .map(|c| c.camera.osm_id)
            .collect();
        assert_eq!(facing, vec![1]);
        assert_eq!(exposure.summary.facing, 1);
    }

    #[test]
    fn camera_on_a_single_point_route_counts_as_facing() {
        let route = [Coordinate::new(40.0, -74.995)];
        let cams = [facing(1, 40.0, -74.995, "0")];
        let exposure = analyze_candidates(&route, &cams, &ExposureConfig::default());
        assert!(exposure.cameras[0].facing);
    }

    #[test]
    fn blank_tags_get_the_unknown_label() {
        assert_eq!(attribute_label(Some(" Flock Safety ")), "Flock Safety");
        assert_eq!(attribute_label(Some("   ")), UNKNOWN_LABEL);
        assert_eq!(attribute_label(None), UNKNOWN_LABEL);
    }

    #[test]
    fn empty_inputs_give_zero_exposure() {
        let store = CameraStore::unavailable("not loaded");
        let exposure = analyze(&straight_route(), &store, &ExposureConfig::default());
        assert_eq!(exposure.summary, ExposureSummary::default());

        let loaded = CameraStore::from_cameras(vec![camera(1, 40.0, -74.995)]);
        let exposure = analyze(&[], &loaded, &ExposureConfig::default());
        assert!(exposure.cameras.is_empty());
    }
}
