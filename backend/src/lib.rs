pub mod cameras;
pub mod config;
pub mod error;
pub mod exposure;
pub mod geometry;
pub mod gpx_export;
pub mod graphhopper;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod polyline;
pub mod spatial;

use std::{sync::Arc, time::Instant};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::cameras::CameraStore;
use crate::config::{Config, CorsOrigins};
use crate::graphhopper::RoutingEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cameras: Arc<CameraStore>,
    pub engine: Arc<dyn RoutingEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, cameras: CameraStore, engine: Arc<dyn RoutingEngine>) -> Self {
        Self {
            config: Arc::new(config),
            cameras: Arc::new(cameras),
            engine,
            started_at: Instant::now(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::health))
        .route("/api/directions", post(handlers::directions))
        .route("/api/cameras", get(handlers::cameras))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("ignoring invalid CORS origin {origin:?}");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
    }
}
