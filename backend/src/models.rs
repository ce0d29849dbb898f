pub use shared::{
    Bounds, Camera, CameraOnRoute, CamerasResponse, Coordinate, DirectionsRequest,
    DirectionsResponse, ErrorBody, ExposureSummary, HealthResponse, Instruction, OsmType, Route,
    RouteAnalysis, TravelMode, EARTH_RADIUS_M, METERS_PER_DEGREE,
};
