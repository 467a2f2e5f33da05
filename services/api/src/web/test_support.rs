//! Fakes shared by the web layer's unit tests.

use crate::{adapters::InMemoryDb, config::Config, web::state::AppState};
use agent_core::{
    domain::{AgentConfig, User, UserCredentials},
    ports::{ChatTurn, DatabaseService, GenerativeService, PortError, PortResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Notify;
use uuid::Uuid;

/// An `InMemoryDb` whose configuration reads and writes can be made to fail.
#[derive(Default)]
pub struct FlakyDb {
    inner: InMemoryDb,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl FlakyDb {
    pub fn fail_loads(&self) {
        self.fail_loads.store(true, Ordering::SeqCst);
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    /// Number of `save_config` calls that reached the store.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn seed_user_config(&self, config: AgentConfig) -> Uuid {
        let user_id = Uuid::new_v4();
        self.inner.save_config(user_id, &config).await.unwrap();
        user_id
    }

    pub async fn stored(&self, user_id: Uuid) -> Option<AgentConfig> {
        self.inner.load_config(user_id).await.unwrap()
    }
}

#[async_trait]
impl DatabaseService for FlakyDb {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        self.inner.create_user_with_email(email, hashed_password).await
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.inner.get_user_by_email(email).await
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner
            .create_auth_session(session_id, user_id, expires_at)
            .await
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.inner.validate_auth_session(session_id).await
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.delete_auth_session(session_id).await
    }

    async fn load_config(&self, user_id: Uuid) -> PortResult<Option<AgentConfig>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PortError::PermissionDenied("agent_configs".to_string()));
        }
        self.inner.load_config(user_id).await
    }

    async fn save_config(&self, user_id: Uuid, config: &AgentConfig) -> PortResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PortError::PermissionDenied("agent_configs".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_config(user_id, config).await
    }
}

/// Replies with fixed text as soon as it is asked.
pub struct CannedReply(pub &'static str);

#[async_trait]
impl GenerativeService for CannedReply {
    async fn generate(&self, _system_instruction: &str, _turns: &[ChatTurn]) -> PortResult<String> {
        Ok(self.0.to_string())
    }
}

/// Replies with fixed text, but only after `open` has been called once per reply.
pub struct GatedReply {
    gate: Notify,
    reply: &'static str,
}

impl GatedReply {
    pub fn new(reply: &'static str) -> Self {
        Self {
            gate: Notify::new(),
            reply,
        }
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl GenerativeService for GatedReply {
    async fn generate(&self, _system_instruction: &str, _turns: &[ChatTurn]) -> PortResult<String> {
        self.gate.notified().await;
        Ok(self.reply.to_string())
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("test-key".to_string()),
        "VOICE_INPUT" => Some("false".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn test_app_state(db: Arc<dyn DatabaseService>) -> Arc<AppState> {
    test_app_state_with(db, Arc::new(CannedReply("Хорошо.")))
}

pub fn test_app_state_with(
    db: Arc<dyn DatabaseService>,
    wizard_llm: Arc<dyn GenerativeService>,
) -> Arc<AppState> {
    Arc::new(AppState {
        db,
        config: Arc::new(test_config()),
        wizard_llm,
        preview_llm: Arc::new(CannedReply("Букет будет готов через час.")),
        sst_adapter: None,
    })
}
