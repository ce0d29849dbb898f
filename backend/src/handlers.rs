use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{StatusCode, Uri},
    Json,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    exposure,
    geometry::{haversine_m, nearest_on_polyline},
    gpx_export::encode_route_as_gpx,
    graphhopper::RouteQuery,
    models::{
        Bounds, CamerasResponse, Coordinate, DirectionsRequest, DirectionsResponse, ErrorBody,
        HealthResponse, Route, RouteAnalysis,
    },
    AppState,
};

pub const MAX_CAMERAS_PER_QUERY: usize = 5_000;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

/// GET /health - uptime, dataset size and routing endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.cameras.is_loaded() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        ok: true,
        status: status.to_string(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        cameras: state.cameras.len(),
        graphhopper: state.engine.endpoint().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/directions - route through GraphHopper plus camera exposure
pub async fn directions(
    State(state): State<AppState>,
    payload: Result<Json<DirectionsRequest>, JsonRejection>,
) -> ApiResult<DirectionsResponse> {
    let environment = state.config.environment;
    let result = match payload {
        Ok(Json(req)) => build_directions(&state, req).await,
        Err(rejection) => Err(ApiError::from(rejection)),
    };
    result.map(Json).map_err(|err| err.into_envelope(environment))
}

async fn build_directions(
    state: &AppState,
    req: DirectionsRequest,
) -> Result<DirectionsResponse, ApiError> {
    validate_request(&req, state.config.max_waypoints)?;

    let points = req.points();
    let avoid = if req.avoid_cameras {
        cameras_to_avoid(state, &points)?
    } else {
        Vec::new()
    };
    let avoided_cameras = avoid.len();

    tracing::info!(
        waypoints = req.waypoints.len(),
        mode = req.mode.profile(),
        avoided_cameras,
        compare = req.compare,
        "directions request {:?} -> {:?}",
        req.origin,
        req.destination
    );

    let primary = RouteQuery {
        points,
        mode: req.mode,
        avoid,
    };

    let (route, baseline) = if req.compare && avoided_cameras > 0 {
        let plain = RouteQuery {
            avoid: Vec::new(),
            ..primary.clone()
        };
        let (route, baseline) =
            tokio::try_join!(state.engine.route(&primary), state.engine.route(&plain))?;
        (route, Some(baseline))
    } else {
        let route = state.engine.route(&primary).await?;
        let baseline = req.compare.then(|| route.clone());
        (route, baseline)
    };

    let route = analyze_route(state, route);
    let baseline = baseline.map(|b| analyze_route(state, b));

    tracing::info!(
        distance_m = route.route.distance_m,
        cameras = route.exposure.total,
        facing = route.exposure.facing,
        "route computed"
    );

    let gpx_base64 = if req.include_gpx {
        Some(
            encode_route_as_gpx(&route.route.path, &route.cameras)
                .map_err(|err| ApiError::Internal(format!("failed to build GPX: {err}")))?,
        )
    } else {
        None
    };

    Ok(DirectionsResponse {
        ok: true,
        route,
        baseline,
        avoided_cameras,
        gpx_base64,
    })
}

fn analyze_route(state: &AppState, route: Route) -> RouteAnalysis {
    let exposure = exposure::analyze(&route.path, &state.cameras, &state.config.exposure);
    RouteAnalysis {
        route,
        exposure: exposure.summary,
        cameras: exposure.cameras,
    }
}

fn validate_request(req: &DirectionsRequest, max_waypoints: usize) -> Result<(), ApiError> {
    let check = |coord: &Coordinate, label: &str| {
        if coord.is_valid() {
            Ok(())
        } else {
            Err(ApiError::Validation(format!(
                "{label} must have latitude in [-90, 90] and longitude in [-180, 180]"
            )))
        }
    };

    check(&req.origin, "origin")?;
    check(&req.destination, "destination")?;
    for (idx, waypoint) in req.waypoints.iter().enumerate() {
        check(waypoint, &format!("waypoint {}", idx + 1))?;
    }

    if req.waypoints.len() > max_waypoints {
        return Err(ApiError::Validation(format!(
            "at most {max_waypoints} waypoints are allowed"
        )));
    }
    if req.waypoints.is_empty() && haversine_m(req.origin, req.destination) < 1.0 {
        return Err(ApiError::Validation(
            "origin and destination must differ".to_string(),
        ));
    }

    Ok(())
}

/// Cameras near the requested points, closest to the straight-line path
/// first, capped at the configured number of avoid areas.
fn cameras_to_avoid(state: &AppState, points: &[Coordinate]) -> Result<Vec<Coordinate>, ApiError> {
    if state.cameras.is_empty() {
        return Ok(Vec::new());
    }
    let Some(bounds) = Bounds::from_points(points) else {
        return Ok(Vec::new());
    };
    let search = bounds.expanded_by_m(state.config.avoidance_margin_m);

    let mut ranked: Vec<(f64, Coordinate)> = state
        .cameras
        .in_bounds(&search)?
        .into_iter()
        .map(|camera| {
            let position = camera.position();
            let distance = nearest_on_polyline(position, points)
                .map(|p| p.distance_m)
                .unwrap_or(f64::MAX);
            (distance, position)
        })
        .collect();

    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.truncate(state.config.max_avoid_areas);
    Ok(ranked.into_iter().map(|(_, position)| position).collect())
}

#[derive(Debug, Deserialize)]
pub struct BoundsQuery {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// GET /api/cameras - cameras inside a bounding box for the map view
pub async fn cameras(
    State(state): State<AppState>,
    query: Result<Query<BoundsQuery>, QueryRejection>,
) -> ApiResult<CamerasResponse> {
    let environment = state.config.environment;
    list_cameras(&state, query)
        .map(Json)
        .map_err(|err| err.into_envelope(environment))
}

fn list_cameras(
    state: &AppState,
    query: Result<Query<BoundsQuery>, QueryRejection>,
) -> Result<CamerasResponse, ApiError> {
    let Query(q) = query?;
    if !state.cameras.is_loaded() {
        return Err(ApiError::CameraDataUnavailable);
    }

    let bounds = Bounds {
        min_lat: q.min_lat,
        max_lat: q.max_lat,
        min_lon: q.min_lon,
        max_lon: q.max_lon,
    };
    let corners = [
        Coordinate::new(bounds.min_lat, bounds.min_lon),
        Coordinate::new(bounds.max_lat, bounds.max_lon),
    ];
    if !corners.iter().all(Coordinate::is_valid) {
        return Err(ApiError::Validation(
            "bounding box must lie within [-90, 90] x [-180, 180]".to_string(),
        ));
    }

    let found = state.cameras.in_bounds(&bounds)?;
    let truncated = found.len() > MAX_CAMERAS_PER_QUERY;
    let cameras: Vec<_> = found
        .into_iter()
        .take(MAX_CAMERAS_PER_QUERY)
        .cloned()
        .collect();

    Ok(CamerasResponse {
        ok: true,
        count: cameras.len(),
        truncated,
        cameras,
    })
}

/// Fallback for unknown paths.
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> (StatusCode, Json<ErrorBody>) {
    ApiError::NotFound(format!("no endpoint at {}", uri.path())).into_envelope(state.config.environment)
}
