pub use crate::models::EARTH_RADIUS_M;
use crate::models::Coordinate;

pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn polyline_length_m(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

/// Initial great-circle bearing from `from` to `to`, degrees clockwise from
/// north in `[0, 360)`.
pub fn initial_bearing_deg(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

pub fn normalize_deg(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest angle between two bearings, in `[0, 180]`.
pub fn angular_difference_deg(a: f64, b: f64) -> f64 {
    let diff = (normalize_deg(a) - normalize_deg(b)).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    pub point: Coordinate,
    pub distance_m: f64,
    /// Position of `point` along the segment, 0 at `a` and 1 at `b`.
    pub t: f64,
}

/// Closest point to `p` on segment `a`–`b`.
///
/// Uses an equirectangular projection centered on `p`, which is accurate to
/// well under a meter for the sub-kilometer distances camera matching cares
/// about. The reported distance is the haversine distance to the projected
/// point.
pub fn project_to_segment(p: Coordinate, a: Coordinate, b: Coordinate) -> SegmentProjection {
    let cos_lat = p.lat.to_radians().cos();
    let to_xy = |c: Coordinate| ((c.lon - p.lon) * cos_lat, c.lat - p.lat);

    let (ax, ay) = to_xy(a);
    let (bx, by) = to_xy(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq <= f64::EPSILON * f64::EPSILON {
        0.0
    } else {
        // Vector from a to p is (-ax, -ay) since p sits at the origin.
        ((-ax * dx - ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let point = a.interpolate(b, t);
    SegmentProjection {
        point,
        distance_m: haversine_m(p, point),
        t,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineProjection {
    pub point: Coordinate,
    pub distance_m: f64,
    pub segment: usize,
    pub distance_along_m: f64,
}

/// Closest point to `p` over every segment of `path`.
pub fn nearest_on_polyline(p: Coordinate, path: &[Coordinate]) -> Option<PolylineProjection> {
    match path {
        [] => None,
        [only] => Some(PolylineProjection {
            point: *only,
            distance_m: haversine_m(p, *only),
            segment: 0,
            distance_along_m: 0.0,
        }),
        _ => {
            let mut best: Option<PolylineProjection> = None;
            let mut travelled = 0.0;

            for (idx, pair) in path.windows(2).enumerate() {
                let segment_len = haversine_m(pair[0], pair[1]);
                let proj = project_to_segment(p, pair[0], pair[1]);
                let closer = best.map_or(true, |b| proj.distance_m < b.distance_m);
                if closer {
                    best = Some(PolylineProjection {
                        point: proj.point,
                        distance_m: proj.distance_m,
                        segment: idx,
                        distance_along_m: travelled + segment_len * proj.t,
                    });
                }
                travelled += segment_len;
            }

            best
        }
    }
}
