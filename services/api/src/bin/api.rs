//! services/api/src/bin/api.rs

use agent_api::{
    adapters::{DbAdapter, InMemoryDb, OpenAiGenerativeAdapter, OpenAiSstAdapter},
    config::Config,
    error::ApiError,
    web::{router, state::AppState},
};
use agent_core::ports::{DatabaseService, SpeechToTextService};
use async_openai::{config::OpenAIConfig, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; accounts and configurations are kept in memory.");
            Arc::new(InMemoryDb::new())
        }
    };

    // --- 3. Initialize Service Adapters ---
    let mut openai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());
    if let Some(api_base) = &config.openai_api_base {
        openai_config = openai_config.with_api_base(api_base.clone());
    }
    let openai_client = Client::with_config(openai_config);

    let wizard_llm = Arc::new(OpenAiGenerativeAdapter::new(
        openai_client.clone(),
        config.wizard_model.clone(),
    ));
    let preview_llm = Arc::new(OpenAiGenerativeAdapter::new(
        openai_client.clone(),
        config.preview_model.clone(),
    ));

    let sst_adapter: Option<Arc<dyn SpeechToTextService>> = if config.voice_input {
        Some(Arc::new(OpenAiSstAdapter::new(
            openai_client.clone(),
            config.stt_model.clone(),
            config.stt_language.clone(),
        )))
    } else {
        info!("Voice input disabled.");
        None
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db,
        config: config.clone(),
        wizard_llm,
        preview_llm,
        sst_adapter,
    });

    // --- 5. Start the Server ---
    let app = router(app_state);
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
