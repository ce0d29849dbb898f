use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use geo_types::Point;
use gpx::{errors::GpxError, Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::models::{CameraOnRoute, Coordinate};

const CREATOR: &str = "FlockHopper";

/// GPX 1.1 document with the route as a track and every camera on the route
/// as a waypoint, base64 encoded.
pub fn encode_route_as_gpx(path: &[Coordinate], cameras: &[CameraOnRoute]) -> Result<String, GpxError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some("FlockHopper route".into()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx.waypoints.extend(cameras.iter().map(camera_waypoint));

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}

fn camera_waypoint(entry: &CameraOnRoute) -> Waypoint {
    let camera = &entry.camera;
    let mut waypoint = Waypoint::new(Point::new(camera.lon, camera.lat));
    let owner = camera
        .operator
        .as_deref()
        .or(camera.brand.as_deref())
        .unwrap_or("Unknown operator");
    waypoint.name = Some(format!("ALPR camera ({owner})"));
    waypoint.description = Some(format!(
        "{:.0} m from route{}",
        entry.distance_m,
        if entry.facing { ", facing route" } else { "" }
    ));
    waypoint
}
