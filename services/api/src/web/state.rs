//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use agent_core::{
    domain::{generate_client_id, AgentConfig},
    ports::{DatabaseService, GenerativeService, PortResult, SpeechToTextService},
    preview::PreviewSession,
    wizard::WizardSession,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub wizard_llm: Arc<dyn GenerativeService>,
    pub preview_llm: Arc<dyn GenerativeService>,
    /// `None` when dictation is disabled.
    pub sst_adapter: Option<Arc<dyn SpeechToTextService>>,
}

/// Returns the user's stored configuration, creating and saving a starter one on first use.
pub async fn load_or_create_config(
    db: &dyn DatabaseService,
    user_id: Uuid,
) -> PortResult<AgentConfig> {
    if let Some(config) = db.load_config(user_id).await? {
        return Ok(config);
    }
    let config = AgentConfig::starter(generate_client_id());
    db.save_config(user_id, &config).await?;
    info!("Created configuration {} for user {}", config.id, user_id);
    Ok(config)
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// Whose configuration a dashboard session edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOwner {
    User(Uuid),
    /// The sample configuration; never persisted.
    Demo,
}

/// The state for a single, active WebSocket connection.
pub struct SessionState {
    pub owner: SessionOwner,
    pub config: AgentConfig,
    pub wizard: WizardSession,
    pub preview: PreviewSession,
    /// True between `voice_started` and `voice_ended`.
    pub listening: bool,
    pub audio_buffer: Vec<u8>,
    pub saving: bool,
    /// Set when the stored configuration could not be read. Such a session must
    /// never be written back, or it would replace the stored configuration.
    pub load_failed: bool,
}

impl SessionState {
    pub fn new(owner: SessionOwner, config: AgentConfig) -> Self {
        Self {
            owner,
            preview: PreviewSession::new(&config),
            wizard: WizardSession::new(),
            config,
            listening: false,
            audio_buffer: Vec::new(),
            saving: false,
            load_failed: false,
        }
    }

    /// Builds the session for `owner`.
    ///
    /// If the stored configuration cannot be read, the session starts from a fresh
    /// in-memory configuration that is never saved, and the returned warning should
    /// be shown to the user.
    pub async fn load(app_state: &AppState, owner: SessionOwner) -> (Self, Option<String>) {
        let user_id = match owner {
            SessionOwner::Demo => return (Self::new(owner, AgentConfig::demo()), None),
            SessionOwner::User(user_id) => user_id,
        };

        match load_or_create_config(app_state.db.as_ref(), user_id).await {
            Ok(config) => (Self::new(owner, config), None),
            Err(e) => {
                error!("Failed to load configuration for user {}: {:?}", user_id, e);
                let warning = format!(
                    "Не удалось загрузить настройки ({}). Изменения пока хранятся только в этой вкладке.",
                    e
                );
                let mut state = Self::new(owner, AgentConfig::starter(generate_client_id()));
                state.load_failed = true;
                (state, Some(warning))
            }
        }
    }

    pub fn is_demo(&self) -> bool {
        self.owner == SessionOwner::Demo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{test_app_state, FlakyDb};

    #[tokio::test]
    async fn unreadable_config_gives_an_unsaveable_session() {
        let db = Arc::new(FlakyDb::default());
        let user_id = db.seed_user_config(AgentConfig::starter("CLIENT_ORIGINAL")).await;
        db.fail_loads();
        let app_state = test_app_state(db.clone());

        let (state, warning) = SessionState::load(&app_state, SessionOwner::User(user_id)).await;

        assert!(warning.is_some());
        assert!(state.load_failed);
        assert_ne!(state.config.id, "CLIENT_ORIGINAL");
    }

    #[tokio::test]
    async fn first_load_creates_and_stores_a_starter_config() {
        let db = Arc::new(FlakyDb::default());
        let app_state = test_app_state(db.clone());
        let user_id = Uuid::new_v4();

        let (state, warning) = SessionState::load(&app_state, SessionOwner::User(user_id)).await;

        assert!(warning.is_none());
        assert!(!state.load_failed);
        assert_eq!(db.stored(user_id).await, Some(state.config));
    }

    #[tokio::test]
    async fn demo_sessions_use_the_sample_config() {
        let app_state = test_app_state(Arc::new(FlakyDb::default()));
        let (state, _) = SessionState::load(&app_state, SessionOwner::Demo).await;
        assert!(state.is_demo());
        assert!(state.config.is_demo());
    }
}
