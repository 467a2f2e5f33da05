//! services/api/src/web/preview_task.rs
//!
//! Waits for the configured assistant's answer in the preview chat.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, SessionState},
    ws_handler::{send_server_message, WsSender},
};
use agent_core::{ports::GenerationRequest, preview::PreviewOutcome};
use std::{sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn preview_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    ws_sender: WsSender,
    request: GenerationRequest,
    shutdown: CancellationToken,
) {
    let start_time = Instant::now();
    let reply = tokio::select! {
        reply = app_state.preview_llm.generate(&request.system_instruction, &request.turns) => reply,
        _ = shutdown.cancelled() => {
            info!(seq = request.seq, "Connection closed; dropping preview request.");
            return;
        }
    };
    info!("⏱️ Preview generation took: {:?}", start_time.elapsed());

    let mut outgoing = Vec::new();
    {
        let mut session = session_state_lock.lock().await;
        match session.preview.complete(request.seq, reply) {
            PreviewOutcome::Stale => return,
            PreviewOutcome::Replied => {
                if let Some(message) = session.preview.transcript().last() {
                    outgoing.push(ServerMessage::PreviewMessage {
                        message: message.clone(),
                    });
                }
            }
            PreviewOutcome::Failed(e) => {
                outgoing.push(ServerMessage::Error {
                    message: format!("Не удалось получить ответ ассистента: {}", e),
                });
            }
        }
        outgoing.push(ServerMessage::PreviewBusy { busy: false });
    }

    for msg in outgoing {
        if !send_server_message(&ws_sender, msg) {
            warn!("Failed to send preview reply. Client may have disconnected.");
            return;
        }
    }
}
