//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth::{AuthResponse, LoginRequest, SignupRequest},
    state::{load_or_create_config, AppState},
};
use agent_core::{domain::AgentConfig, integration::embed_snippet, ports::PortError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        get_config_handler,
        save_config_handler,
        integration_handler,
    ),
    components(
        schemas(SignupRequest, LoginRequest, AuthResponse, IntegrationResponse)
    ),
    tags(
        (name = "Agent Dashboard API", description = "Configuration, integration and account endpoints for the assistant dashboard.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// What the user needs to embed the assistant on their site.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResponse {
    client_id: String,
    active: bool,
    snippet: String,
}

fn storage_error(e: PortError) -> (StatusCode, String) {
    error!("Configuration storage failed: {:?}", e);
    match e {
        PortError::PermissionDenied(_) => (
            StatusCode::FORBIDDEN,
            "Permission denied by storage".to_string(),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to access configuration".to_string(),
        ),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Returns the user's assistant configuration, creating it on first access.
#[utoipa::path(
    get,
    path = "/config",
    responses(
        (status = 200, description = "The stored configuration (JSON, camelCase)"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_config_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<AgentConfig>, (StatusCode, String)> {
    load_or_create_config(app_state.db.as_ref(), user_id)
        .await
        .map(Json)
        .map_err(storage_error)
}

/// Replaces the user's configuration. The stored client id cannot be changed.
#[utoipa::path(
    put,
    path = "/config",
    request_body(content_type = "application/json", description = "The full configuration."),
    responses(
        (status = 200, description = "The configuration as saved"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Storage refused the write"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn save_config_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(mut config): Json<AgentConfig>,
) -> Result<Json<AgentConfig>, (StatusCode, String)> {
    let db = app_state.db.as_ref();
    let stored = load_or_create_config(db, user_id)
        .await
        .map_err(storage_error)?;
    config.id = stored.id;

    db.save_config(user_id, &config)
        .await
        .map_err(storage_error)?;
    info!("Saved configuration {} for user {}", config.id, user_id);
    Ok(Json(config))
}

/// Returns the embed snippet for the user's assistant.
#[utoipa::path(
    get,
    path = "/integration",
    responses(
        (status = 200, description = "Embed details", body = IntegrationResponse),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn integration_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let config = load_or_create_config(app_state.db.as_ref(), user_id)
        .await
        .map_err(storage_error)?;

    Ok(Json(IntegrationResponse {
        snippet: embed_snippet(&app_state.config.public_origin, &config.id),
        client_id: config.id,
        active: config.active,
    }))
}
