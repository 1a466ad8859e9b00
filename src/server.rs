//! HTTP facade: JSON departures endpoint plus static assets.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::departures::DepartureBoard;
use crate::error::DepartureError;
use crate::service::DepartureService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DepartureService>,
}

impl AppState {
    pub fn new(service: DepartureService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Create the application router.
///
/// Paths other than the API routes are served from `static_dir`.
pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/departures", get(departures))
        .route("/health", get(health))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn departures(
    State(state): State<AppState>,
) -> Result<Json<Arc<DepartureBoard>>, AppError> {
    Ok(Json(state.service.departures().await?))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// Departure failure rendered as a JSON error response.
pub struct AppError(DepartureError);

impl From<DepartureError> for AppError {
    fn from(err: DepartureError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DepartureError::NoStopConfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DepartureError::FeedUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;

    #[test]
    fn test_error_status_codes() {
        let config = AppError::from(DepartureError::NoStopConfigured {
            label: "No stop configured".to_string(),
        })
        .into_response();
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let feed = AppError::from(DepartureError::from(FeedError::Status { status: 502 }))
            .into_response();
        assert_eq!(feed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
