pub mod auth;
pub mod middleware;
pub mod preview_task;
pub mod protocol;
pub mod rest;
pub mod save_task;
pub mod state;
#[cfg(test)]
mod test_support;
pub mod voice_task;
pub mod wizard_task;
pub mod ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::{demo_ws_handler, ws_handler};

/// Configuration documents are small; this also bounds `PUT /config`.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Builds the full application router.
pub fn router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .allow_credentials(true);

    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/demo/ws", get(demo_ws_handler));

    let protected_routes = Router::new()
        .route(
            "/config",
            get(rest::get_config_handler).put(rest::save_config_handler),
        )
        .route("/integration", get(rest::integration_handler))
        .route("/ws", get(ws_handler))
        .layer(from_fn_with_state(app_state.clone(), require_auth));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
