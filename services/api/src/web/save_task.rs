//! services/api/src/web/save_task.rs
//!
//! Persists a snapshot of the session's configuration.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, SessionState},
    ws_handler::{send_server_message, WsSender},
};
use agent_core::domain::AgentConfig;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Writes `snapshot` for `user_id`. Runs to completion even if the client disconnects.
///
/// On failure the session keeps its in-memory configuration and the user is told
/// the save did not go through.
pub async fn save_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    ws_sender: WsSender,
    user_id: Uuid,
    snapshot: AgentConfig,
) {
    let result = app_state.db.save_config(user_id, &snapshot).await;
    session_state_lock.lock().await.saving = false;

    let outgoing = match result {
        Ok(()) => {
            info!("Saved configuration {} for user {}", snapshot.id, user_id);
            vec![ServerMessage::Saved { persisted: true }]
        }
        Err(e) => {
            error!("Failed to save configuration for user {}: {:?}", user_id, e);
            vec![
                ServerMessage::Error {
                    message: format!("Не удалось сохранить настройки: {}", e),
                },
                ServerMessage::Saved { persisted: false },
            ]
        }
    };

    for msg in outgoing {
        if !send_server_message(&ws_sender, msg) {
            return;
        }
    }
}
