use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    Json,
};
use thiserror::Error;

use crate::{
    config::Environment, graphhopper::RoutingError, models::ErrorBody, spatial::GridError,
};

/// Every failure a request handler can surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("camera data is not available")]
    CameraDataUnavailable,
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::CameraDataUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Routing(err) => match err {
                RoutingError::NoRoute(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RoutingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                RoutingError::Unreachable(_)
                | RoutingError::Upstream { .. }
                | RoutingError::Decode(_) => StatusCode::BAD_GATEWAY,
                RoutingError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the error and turn it into the `{ ok: false, error }` envelope.
    ///
    /// Server-side failures lose their details in production.
    pub fn into_envelope(self, environment: Environment) -> (StatusCode, Json<ErrorBody>) {
        let status = self.status();
        let production = environment.is_production();

        if status.is_server_error() {
            if production {
                tracing::error!(status = status.as_u16(), "request failed: {self}");
            } else {
                tracing::error!(status = status.as_u16(), "request failed: {self:?}");
            }
        } else {
            tracing::warn!(status = status.as_u16(), "request rejected: {self}");
        }

        let message = if production && status.is_server_error() {
            public_message(status).to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody::new(message)))
    }
}

fn public_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_GATEWAY => "routing service unavailable",
        StatusCode::GATEWAY_TIMEOUT => "routing service timed out",
        StatusCode::SERVICE_UNAVAILABLE => "camera data is not available",
        _ => "internal server error",
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn kinds_map_to_distinct_statuses() {
        let cases = [
            (ApiError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::CameraDataUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                ApiError::Routing(RoutingError::NoRoute("none".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Routing(RoutingError::Unreachable("refused".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Routing(RoutingError::Timeout(Duration::from_secs(1))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[test]
    fn production_masks_server_errors() {
        let err = ApiError::Routing(RoutingError::Unreachable("10.0.0.3:8989 refused".into()));
        let (status, Json(body)) = err.into_envelope(Environment::Production);
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body.ok);
        assert_eq!(body.error, "routing service unavailable");
    }

    #[test]
    fn development_keeps_details() {
        let err = ApiError::Routing(RoutingError::Unreachable("10.0.0.3:8989 refused".into()));
        let (_, Json(body)) = err.into_envelope(Environment::Development);
        assert!(body.error.contains("10.0.0.3"));
    }

    #[test]
    fn client_errors_keep_message_in_production() {
        let err = ApiError::Validation("origin latitude out of range".into());
        let (status, Json(body)) = err.into_envelope(Environment::Production);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "origin latitude out of range");
    }
}
