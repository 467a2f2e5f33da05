//! services/api/src/web/voice_task.rs
//!
//! Turns a dictated message into text for the wizard's input box.

use crate::web::{
    protocol::ServerMessage,
    ws_handler::{send_server_message, WsSender},
};
use agent_core::ports::SpeechToTextService;
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn transcription_process(
    sst_adapter: Arc<dyn SpeechToTextService>,
    ws_sender: WsSender,
    audio: Vec<u8>,
    shutdown: CancellationToken,
) {
    if audio.is_empty() {
        info!("No audio captured; skipping transcription.");
        return;
    }

    let stt_start = Instant::now();
    let result = tokio::select! {
        result = sst_adapter.transcribe_audio(&audio) => result,
        _ = shutdown.cancelled() => return,
    };
    info!("⏱️ STT took: {:?}", stt_start.elapsed());

    let msg = match result {
        Ok(text) if text.is_empty() => return,
        Ok(text) => {
            info!("Transcribed dictation: '{}'", text);
            ServerMessage::Transcription { text }
        }
        Err(e) => {
            error!("Transcription failed: {:?}", e);
            ServerMessage::Error {
                message: format!("Не удалось распознать речь: {}", e),
            }
        }
    };
    send_server_message(&ws_sender, msg);
}
