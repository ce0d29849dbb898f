use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use flockhopper_backend::{
    graphhopper::{GraphHopperClient, GraphHopperSettings, RouteQuery, RoutingEngine, RoutingError},
    models::{Coordinate, TravelMode},
    polyline,
};
use serde_json::{json, Value};

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    reply: Value,
    delay: Duration,
    seen: Arc<Mutex<Vec<Value>>>,
}

async fn stub_route(State(stub): State<Stub>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    stub.seen.lock().unwrap().push(body);
    tokio::time::sleep(stub.delay).await;
    (stub.status, Json(stub.reply.clone()))
}

/// Serve `stub` on an ephemeral port and return its base URL.
async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new().route("/route", post(stub_route)).with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn stub(status: StatusCode, reply: Value) -> Stub {
    Stub {
        status,
        reply,
        delay: Duration::ZERO,
        seen: Arc::new(Mutex::new(Vec::new())),
    }
}

fn client(endpoint: String, timeout: Duration) -> GraphHopperClient {
    GraphHopperClient::new(GraphHopperSettings {
        endpoint,
        timeout,
        ..GraphHopperSettings::default()
    })
    .unwrap()
}

fn query(avoid: Vec<Coordinate>) -> RouteQuery {
    RouteQuery {
        points: vec![Coordinate::new(40.0, -75.0), Coordinate::new(40.0, -74.98)],
        mode: TravelMode::Car,
        avoid,
    }
}

fn path_reply() -> Value {
    let path = [
        Coordinate::new(40.0, -75.0),
        Coordinate::new(40.001, -74.99),
        Coordinate::new(40.0, -74.98),
    ];
    json!({
        "paths": [{
            "distance": 1742.5,
            "time": 131000,
            "points": polyline::encode(&path, polyline::DEFAULT_MULTIPLIER),
            "points_encoded_multiplier": 1e5,
            "ascend": 3.0,
            "descend": 1.5,
            "instructions": [
                {"distance": 900.0, "time": 60000, "text": "Continue onto Main Street", "sign": 0, "interval": [0, 1], "street_name": "Main Street"},
                {"distance": 842.5, "time": 71000, "text": "Arrive at destination", "sign": 4, "interval": [2, 2], "street_name": ""}
            ]
        }]
    })
}

#[tokio::test]
async fn decodes_route_and_sends_avoid_areas() {
    let stub = stub(StatusCode::OK, path_reply());
    let seen = stub.seen.clone();
    let gh = client(spawn_stub(stub).await, Duration::from_secs(5));

    let route = gh
        .route(&query(vec![Coordinate::new(40.0002, -74.995)]))
        .await
        .unwrap();

    assert_eq!(route.path.len(), 3);
    assert!((route.path[1].lat - 40.001).abs() < 1e-6);
    assert!((route.distance_m - 1742.5).abs() < 1e-9);
    assert!((route.duration_s - 131.0).abs() < 1e-9);
    assert_eq!(route.instructions.len(), 2);
    assert_eq!(route.instructions[0].street_name.as_deref(), Some("Main Street"));
    assert_eq!(route.instructions[1].street_name, None);
    assert_eq!(route.ascend_m, Some(3.0));

    let bodies = seen.lock().unwrap();
    let body = &bodies[0];
    assert_eq!(body["profile"], "car");
    assert_eq!(body["ch.disable"], true);
    let feature = &body["custom_model"]["areas"]["features"][0];
    assert_eq!(feature["id"], "alpr_cameras");
    assert_eq!(feature["geometry"]["type"], "MultiPolygon");
    assert_eq!(body["custom_model"]["priority"][0]["if"], "in_alpr_cameras");
}

#[tokio::test]
async fn accepts_unencoded_points() {
    let reply = json!({
        "paths": [{
            "distance": 10.0,
            "time": 1000,
            "points": {"type": "LineString", "coordinates": [[-75.0, 40.0], [-74.9999, 40.0]]}
        }]
    });
    let gh = client(spawn_stub(stub(StatusCode::OK, reply)).await, Duration::from_secs(5));

    let route = gh.route(&query(vec![])).await.unwrap();
    assert_eq!(route.path.len(), 2);
    assert!(!route.encoded_polyline.is_empty());
}

#[tokio::test]
async fn unroutable_points_are_no_route() {
    let reply = json!({"message": "Cannot find point 0: 40.0,-75.0"});
    let gh = client(
        spawn_stub(stub(StatusCode::BAD_REQUEST, reply)).await,
        Duration::from_secs(5),
    );

    let err = gh.route(&query(vec![])).await.unwrap_err();
    assert!(matches!(err, RoutingError::NoRoute(_)), "{err:?}");
}

#[tokio::test]
async fn server_errors_are_upstream() {
    let reply = json!({"message": "internal failure"});
    let gh = client(
        spawn_stub(stub(StatusCode::INTERNAL_SERVER_ERROR, reply)).await,
        Duration::from_secs(5),
    );

    match gh.route(&query(vec![])).await {
        Err(RoutingError::Upstream { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal failure");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_engine_times_out() {
    let mut slow = stub(StatusCode::OK, path_reply());
    slow.delay = Duration::from_secs(2);
    let gh = client(spawn_stub(slow).await, Duration::from_millis(200));

    let err = gh.route(&query(vec![])).await.unwrap_err();
    assert!(matches!(err, RoutingError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gh = client(format!("http://{addr}"), Duration::from_secs(2));
    let err = gh.route(&query(vec![])).await.unwrap_err();
    assert!(matches!(err, RoutingError::Unreachable(_)), "{err:?}");
}

#[tokio::test]
async fn empty_paths_are_no_route() {
    let gh = client(
        spawn_stub(stub(StatusCode::OK, json!({"paths": []}))).await,
        Duration::from_secs(5),
    );
    let err = gh.route(&query(vec![])).await.unwrap_err();
    assert!(matches!(err, RoutingError::NoRoute(_)));
}
