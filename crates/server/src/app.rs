use axum::{extract::DefaultBodyLimit, http::Uri, Router};
use roster_core::InterfaceError;
use tower_http::trace::TraceLayer;

use crate::bootstrap::Application;
use crate::envelope::ApiError;
use crate::middleware::{self, CorrelationId};
use crate::{customers, health};

pub fn router(app: &Application) -> Router {
    build_router(app, app.config.server.request_body_limit_bytes)
}

fn build_router(app: &Application, body_limit: usize) -> Router {
    Router::new()
        .merge(customers::router(app.service.clone(), app.authenticator.clone()))
        .merge(health::router(app.store.clone()))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::correlation_id))
        .layer(TraceLayer::new_for_http())
}

async fn not_found(correlation_id: CorrelationId, uri: Uri) -> ApiError {
    ApiError(InterfaceError::NotFound {
        message: format!("no route for {uri}"),
        correlation_id: correlation_id.0,
    })
}
