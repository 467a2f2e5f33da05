//! crates/agent_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the generative endpoint, the transcription service and
//! the database.

use crate::domain::{AgentConfig, Role, User, UserCredentials};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// One role-tagged turn of a conversation sent to the generative endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// A prepared call to the generative endpoint.
///
/// `seq` identifies the call within its session; replies are handed back together
/// with it so that answers to superseded calls can be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub seq: u64,
    pub system_instruction: String,
    pub turns: Vec<ChatTurn>,
}

#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Produces a single text reply for the conversation under the given instruction.
    async fn generate(&self, system_instruction: &str, turns: &[ChatTurn]) -> PortResult<String>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes a slice of audio data into text.
    async fn transcribe_audio(&self, audio_data: &[u8]) -> PortResult<String>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owner of a live session, or `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Configuration Storage ---
    /// Returns the latest stored configuration, or `None` if the user has never saved one.
    async fn load_config(&self, user_id: Uuid) -> PortResult<Option<AgentConfig>>;

    /// Upserts the user's configuration. Last write wins.
    async fn save_config(&self, user_id: Uuid, config: &AgentConfig) -> PortResult<()>;
}
