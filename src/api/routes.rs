use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::services::ApiDeployer;

use super::{
    auth::{require_basic_auth, AdminCredentials},
    handlers::{
        delete_api_handler, health_handler, list_apis_handler, upload_apis_handler, AdminState,
    },
};

/// Build the admin router; every route except `/health` requires Basic credentials
pub fn build_router(
    deployer: Arc<ApiDeployer>,
    credentials: AdminCredentials,
    max_bundle_bytes: usize,
) -> Router {
    let state = AdminState { deployer };
    let auth_layer = middleware::from_fn_with_state(Arc::new(credentials), require_basic_auth);

    let secured = Router::new()
        .route(
            "/apis",
            get(list_apis_handler).post(upload_apis_handler).delete(delete_api_handler),
        )
        .route_layer(auth_layer)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_bundle_bytes)),
        )
        .with_state(state);

    Router::new()
        .route("/health", get(health_handler))
        .merge(secured)
        .layer(TraceLayer::new_for_http())
}
