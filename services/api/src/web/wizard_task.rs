//! services/api/src/web/wizard_task.rs
//!
//! This module contains the asynchronous "worker" function that waits for the
//! wizard's generative endpoint and merges its answer into the session.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, SessionState},
    ws_handler::{send_server_message, WsSender},
};
use agent_core::{ports::GenerationRequest, wizard::WizardOutcome};
use std::{sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Completes one wizard request started by `WizardSession::begin`.
///
/// The session lock is only taken once the reply is in, so the user can keep
/// editing the form (or reset the dialog) while the request is pending.
pub async fn wizard_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    ws_sender: WsSender,
    request: GenerationRequest,
    shutdown: CancellationToken,
) {
    let start_time = Instant::now();
    let reply = tokio::select! {
        reply = app_state.wizard_llm.generate(&request.system_instruction, &request.turns) => reply,
        _ = shutdown.cancelled() => {
            info!(seq = request.seq, "Connection closed; dropping wizard request.");
            return;
        }
    };
    info!("⏱️ Wizard generation took: {:?}", start_time.elapsed());

    let mut outgoing = Vec::new();
    {
        let mut guard = session_state_lock.lock().await;
        let session = &mut *guard;
        let outcome = session
            .wizard
            .complete(request.seq, reply, &mut session.config);
        if outcome == WizardOutcome::Stale {
            return;
        }

        if let Some(message) = session.wizard.transcript().last() {
            outgoing.push(ServerMessage::WizardMessage {
                message: message.clone(),
            });
        }
        if outcome.changed_config() {
            outgoing.push(ServerMessage::ConfigChanged {
                config: session.config.clone(),
            });
            if session.preview.sync_welcome(&session.config) {
                outgoing.push(ServerMessage::PreviewReset {
                    messages: session.preview.transcript().messages().to_vec(),
                });
                outgoing.push(ServerMessage::PreviewBusy { busy: false });
            }
        }
        outgoing.push(ServerMessage::WizardBusy { busy: false });
    }

    for msg in outgoing {
        if !send_server_message(&ws_sender, msg) {
            warn!("Failed to send wizard reply. Client may have disconnected.");
            return;
        }
    }
}
