//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a dashboard WebSocket
//! connection. It owns the session state and delegates slow work to spawned tasks.

use crate::web::{
    preview_task::preview_process,
    protocol::{ClientMessage, ServerMessage},
    save_task::save_process,
    state::{AppState, SessionOwner, SessionState},
    voice_task::transcription_process,
    wizard_task::wizard_process,
};
use agent_core::{attachments::describe, domain::PendingAttachment};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Two minutes of 48 kHz PCM16 mono; further dictated audio is dropped.
const MAX_AUDIO_BYTES: usize = 48_000 * 2 * 120;

const VOICE_UNAVAILABLE: &str = "Голосовой ввод недоступен.";

const LOAD_FAILED: &str =
    "Настройки не были загружены, поэтому сохранение отключено. Обновите страницу и попробуйте снова.";

/// Queue of messages for one connection, shared with spawned tasks.
pub type WsSender = mpsc::UnboundedSender<ServerMessage>;

/// Queues one message for the client. Returns `false` if the connection is gone.
pub fn send_server_message(ws_sender: &WsSender, msg: ServerMessage) -> bool {
    ws_sender.send(msg).is_ok()
}

fn send_all(ws_sender: &WsSender, messages: Vec<ServerMessage>) {
    for msg in messages {
        if !send_server_message(ws_sender, msg) {
            warn!("Failed to queue message. Client may have disconnected.");
            return;
        }
    }
}

/// Drains the connection's queue into the socket until either side goes away.
async fn forward_messages(
    mut sink: SplitSink<WebSocket, Message>,
    mut outgoing: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = outgoing.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            warn!("Failed to send message. Client may have disconnected.");
            break;
        }
    }
}

/// Upgrades an authenticated request; the session edits the user's own configuration.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, SessionOwner::User(user_id)))
}

/// Upgrades an anonymous request; the session edits the sample configuration.
pub async fn demo_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, SessionOwner::Demo))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, owner: SessionOwner) {
    info!(?owner, "New WebSocket connection established.");

    let (sink, mut receiver) = socket.split();
    let (ws_sender, outgoing) = mpsc::unbounded_channel();
    let writer = tokio::spawn(forward_messages(sink, outgoing));
    let shutdown = CancellationToken::new();

    // --- 1. Initialization Phase ---
    let (state, warning) = SessionState::load(&app_state, owner).await;
    let ready = ServerMessage::SessionReady {
        config: state.config.clone(),
        wizard: state.wizard.transcript().messages().to_vec(),
        preview: state.preview.transcript().messages().to_vec(),
        persisted: !state.is_demo(),
        voice_input: app_state.sst_adapter.is_some(),
    };
    let session_state_lock = Arc::new(Mutex::new(state));

    send_server_message(&ws_sender, ready);
    if let Some(message) = warning {
        send_server_message(&ws_sender, ServerMessage::Error { message });
    }

    // --- 2. Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(client_msg) => {
                        handle_client_message(
                            client_msg,
                            &app_state,
                            &session_state_lock,
                            &ws_sender,
                            &shutdown,
                        )
                        .await;
                    }
                    Err(e) => warn!("Failed to deserialize client message: {}", e),
                }
            }
            Some(Ok(Message::Binary(data))) => {
                let mut session = session_state_lock.lock().await;
                if session.listening && session.audio_buffer.len() + data.len() <= MAX_AUDIO_BYTES {
                    session.audio_buffer.extend_from_slice(&data);
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    shutdown.cancel();
    drop(ws_sender);
    if writer.await.is_err() {
        warn!("Writer task ended abnormally.");
    }
    info!(?owner, "WebSocket connection closed.");
}

/// Applies one client message to the session.
pub(crate) async fn handle_client_message(
    client_msg: ClientMessage,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
    shutdown: &CancellationToken,
) {
    match client_msg {
        ClientMessage::WizardAttach { name, size_bytes } => {
            let pending = {
                let mut session = session_state_lock.lock().await;
                session.wizard.attach(PendingAttachment { name, size_bytes });
                session.wizard.pending().to_vec()
            };
            send_server_message(ws_sender, ServerMessage::WizardAttachments { pending });
        }
        ClientMessage::WizardRemoveAttachment { index } => {
            let pending = {
                let mut session = session_state_lock.lock().await;
                if session.wizard.remove_attachment(index).is_none() {
                    debug!(index, "No pending attachment at index.");
                }
                session.wizard.pending().to_vec()
            };
            send_server_message(ws_sender, ServerMessage::WizardAttachments { pending });
        }
        ClientMessage::WizardSend { text } => {
            let mut outgoing = Vec::new();
            let request = {
                let mut guard = session_state_lock.lock().await;
                let session = &mut *guard;
                let files_before = session.config.files.len();
                let request = session.wizard.begin(&text, &mut session.config);
                if request.is_some() {
                    if let Some(message) = session.wizard.transcript().last() {
                        outgoing.push(ServerMessage::WizardMessage {
                            message: message.clone(),
                        });
                    }
                    if session.config.files.len() != files_before {
                        outgoing.push(ServerMessage::WizardAttachments { pending: Vec::new() });
                        outgoing.push(ServerMessage::ConfigChanged {
                            config: session.config.clone(),
                        });
                    }
                    outgoing.push(ServerMessage::WizardBusy { busy: true });
                }
                request
            };

            let Some(request) = request else {
                debug!("Wizard submission ignored.");
                return;
            };
            send_all(ws_sender, outgoing);

            let app_state = app_state.clone();
            let session_state_lock = session_state_lock.clone();
            let ws_sender = ws_sender.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                wizard_process(app_state, session_state_lock, ws_sender, request, shutdown).await;
            });
        }
        ClientMessage::WizardReset => {
            let messages = {
                let mut session = session_state_lock.lock().await;
                session.wizard.reset();
                session.wizard.transcript().messages().to_vec()
            };
            info!("Wizard dialog reset.");
            send_all(
                ws_sender,
                vec![
                    ServerMessage::WizardReset { messages },
                    ServerMessage::WizardAttachments { pending: Vec::new() },
                    ServerMessage::WizardBusy { busy: false },
                ],
            );
        }
        ClientMessage::VoiceStarted => {
            if app_state.sst_adapter.is_none() {
                send_server_message(
                    ws_sender,
                    ServerMessage::Error {
                        message: VOICE_UNAVAILABLE.to_string(),
                    },
                );
                return;
            }
            let mut session = session_state_lock.lock().await;
            session.listening = true;
            session.audio_buffer.clear();
        }
        ClientMessage::VoiceEnded => {
            let audio = {
                let mut session = session_state_lock.lock().await;
                if !session.listening {
                    debug!("VoiceEnded received while not listening.");
                    return;
                }
                session.listening = false;
                std::mem::take(&mut session.audio_buffer)
            };
            let Some(sst_adapter) = app_state.sst_adapter.clone() else {
                return;
            };

            let ws_sender = ws_sender.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                transcription_process(sst_adapter, ws_sender, audio, shutdown).await;
            });
        }
        ClientMessage::PreviewSend { text } => {
            let (request, message) = {
                let mut guard = session_state_lock.lock().await;
                let session = &mut *guard;
                let request = session.preview.begin(&text, &session.config);
                let message = session.preview.transcript().last().cloned();
                (request, message)
            };

            let Some(request) = request else {
                debug!("Preview message ignored.");
                return;
            };
            let mut outgoing = Vec::new();
            if let Some(message) = message {
                outgoing.push(ServerMessage::PreviewMessage { message });
            }
            outgoing.push(ServerMessage::PreviewBusy { busy: true });
            send_all(ws_sender, outgoing);

            let app_state = app_state.clone();
            let session_state_lock = session_state_lock.clone();
            let ws_sender = ws_sender.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                preview_process(app_state, session_state_lock, ws_sender, request, shutdown).await;
            });
        }
        ClientMessage::PreviewReset => {
            let messages = {
                let mut guard = session_state_lock.lock().await;
                let session = &mut *guard;
                session.preview.reset(&session.config);
                session.preview.transcript().messages().to_vec()
            };
            send_all(
                ws_sender,
                vec![
                    ServerMessage::PreviewReset { messages },
                    ServerMessage::PreviewBusy { busy: false },
                ],
            );
        }
        ClientMessage::UpdateConfig { mut config } => {
            let mut outgoing = Vec::new();
            {
                let mut guard = session_state_lock.lock().await;
                let session = &mut *guard;
                if config.id != session.config.id {
                    warn!("Client tried to change the client id; keeping {}.", session.config.id);
                    config.id = session.config.id.clone();
                    outgoing.push(ServerMessage::ConfigChanged {
                        config: config.clone(),
                    });
                }
                session.config = config;
                if session.preview.sync_welcome(&session.config) {
                    outgoing.push(ServerMessage::PreviewReset {
                        messages: session.preview.transcript().messages().to_vec(),
                    });
                    outgoing.push(ServerMessage::PreviewBusy { busy: false });
                }
            }
            send_all(ws_sender, outgoing);
        }
        ClientMessage::UploadFiles { files } => {
            if files.is_empty() {
                return;
            }
            let config = {
                let mut session = session_state_lock.lock().await;
                session.config.files.extend(files.iter().map(describe));
                info!(count = files.len(), "Files uploaded to the knowledge base.");
                session.config.clone()
            };
            send_server_message(ws_sender, ServerMessage::ConfigChanged { config });
        }
        ClientMessage::SaveConfig => {
            let (owner, snapshot) = {
                let mut session = session_state_lock.lock().await;
                if session.saving {
                    debug!("Save already in progress; ignoring request.");
                    return;
                }
                if session.load_failed {
                    warn!("Refusing to save a configuration that replaced a failed load.");
                    send_all(
                        ws_sender,
                        vec![
                            ServerMessage::Error {
                                message: LOAD_FAILED.to_string(),
                            },
                            ServerMessage::Saved { persisted: false },
                        ],
                    );
                    return;
                }
                if session.is_demo() {
                    (session.owner, None)
                } else {
                    session.saving = true;
                    (session.owner, Some(session.config.clone()))
                }
            };

            let (SessionOwner::User(user_id), Some(snapshot)) = (owner, snapshot) else {
                info!("Demo configuration kept in memory only.");
                send_server_message(ws_sender, ServerMessage::Saved { persisted: false });
                return;
            };

            let app_state = app_state.clone();
            let session_state_lock = session_state_lock.clone();
            let ws_sender = ws_sender.clone();
            tokio::spawn(async move {
                save_process(app_state, session_state_lock, ws_sender, user_id, snapshot).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{test_app_state, test_app_state_with, FlakyDb, GatedReply};
    use agent_core::domain::{AgentConfig, Role};
    use std::time::Duration;
    use tokio::time::timeout;

    /// One dashboard session whose outgoing messages land in a channel.
    struct Session {
        app_state: Arc<AppState>,
        state: Arc<Mutex<SessionState>>,
        ws_sender: WsSender,
        outgoing: mpsc::UnboundedReceiver<ServerMessage>,
        shutdown: CancellationToken,
    }

    impl Session {
        async fn open(app_state: Arc<AppState>, owner: SessionOwner) -> Self {
            let (state, _) = SessionState::load(&app_state, owner).await;
            let (ws_sender, outgoing) = mpsc::unbounded_channel();
            Self {
                app_state,
                state: Arc::new(Mutex::new(state)),
                ws_sender,
                outgoing,
                shutdown: CancellationToken::new(),
            }
        }

        async fn send(&self, msg: ClientMessage) {
            handle_client_message(
                msg,
                &self.app_state,
                &self.state,
                &self.ws_sender,
                &self.shutdown,
            )
            .await;
        }

        async fn recv(&mut self) -> ServerMessage {
            timeout(Duration::from_secs(5), self.outgoing.recv())
                .await
                .expect("no message within 5s")
                .expect("sender dropped")
        }

        fn assert_quiet(&mut self) {
            assert!(self.outgoing.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn demo_save_is_acknowledged_without_persisting() {
        let db = Arc::new(FlakyDb::default());
        let mut session = Session::open(test_app_state(db.clone()), SessionOwner::Demo).await;

        session.send(ClientMessage::SaveConfig).await;

        assert_eq!(session.recv().await, ServerMessage::Saved { persisted: false });
        assert_eq!(db.save_count(), 0);
    }

    #[tokio::test]
    async fn failed_save_reports_and_keeps_the_edited_config() {
        let db = Arc::new(FlakyDb::default());
        let user_id = db.seed_user_config(AgentConfig::starter("CLIENT_STORED")).await;
        db.fail_saves();
        let app_state = test_app_state(db.clone());
        let mut session = Session::open(app_state, SessionOwner::User(user_id)).await;

        let mut edited = session.state.lock().await.config.clone();
        edited.name = "Салон Роза".to_string();
        session.send(ClientMessage::UpdateConfig { config: edited }).await;
        session.send(ClientMessage::SaveConfig).await;

        assert!(matches!(session.recv().await, ServerMessage::Error { .. }));
        assert_eq!(session.recv().await, ServerMessage::Saved { persisted: false });

        let state = session.state.lock().await;
        assert!(!state.saving);
        assert_eq!(state.config.name, "Салон Роза");
        assert_ne!(db.stored(user_id).await.map(|c| c.name), Some("Салон Роза".to_string()));
    }

    #[tokio::test]
    async fn session_that_failed_to_load_never_overwrites_the_stored_config() {
        let db = Arc::new(FlakyDb::default());
        let user_id = db.seed_user_config(AgentConfig::starter("CLIENT_ORIGINAL")).await;
        db.fail_loads();
        let app_state = test_app_state(db.clone());
        let mut session = Session::open(app_state, SessionOwner::User(user_id)).await;

        session.send(ClientMessage::SaveConfig).await;

        assert!(matches!(session.recv().await, ServerMessage::Error { .. }));
        assert_eq!(session.recv().await, ServerMessage::Saved { persisted: false });
        assert_eq!(db.save_count(), 0);
        assert_eq!(db.stored(user_id).await.map(|c| c.id), Some("CLIENT_ORIGINAL".to_string()));
    }

    #[tokio::test]
    async fn update_config_cannot_change_the_client_id() {
        let mut session =
            Session::open(test_app_state(Arc::new(FlakyDb::default())), SessionOwner::Demo).await;
        let original_id = session.state.lock().await.config.id.clone();

        let mut forged = AgentConfig::demo();
        forged.id = "CLIENT_FORGED".to_string();
        session.send(ClientMessage::UpdateConfig { config: forged }).await;

        match session.recv().await {
            ServerMessage::ConfigChanged { config } => assert_eq!(config.id, original_id),
            other => panic!("expected config_changed, got {:?}", other),
        }
        session.assert_quiet();
        assert_eq!(session.state.lock().await.config.id, original_id);
    }

    #[tokio::test]
    async fn new_welcome_message_restarts_the_preview() {
        let mut session =
            Session::open(test_app_state(Arc::new(FlakyDb::default())), SessionOwner::Demo).await;

        let mut edited = session.state.lock().await.config.clone();
        edited.welcome_message = "Добрый вечер!".to_string();
        session.send(ClientMessage::UpdateConfig { config: edited }).await;

        match session.recv().await {
            ServerMessage::PreviewReset { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "Добрый вечер!");
            }
            other => panic!("expected preview_reset, got {:?}", other),
        }
        assert_eq!(session.recv().await, ServerMessage::PreviewBusy { busy: false });
        session.assert_quiet();
    }

    #[tokio::test]
    async fn wizard_ignores_messages_while_a_reply_is_pending() {
        let llm = Arc::new(GatedReply::new("Расскажите, что вы продаёте?"));
        let app_state = test_app_state_with(Arc::new(FlakyDb::default()), llm.clone());
        let mut session = Session::open(app_state, SessionOwner::Demo).await;

        session
            .send(ClientMessage::WizardSend {
                text: "Цветочный магазин".to_string(),
            })
            .await;
        assert!(matches!(
            session.recv().await,
            ServerMessage::WizardMessage { message } if message.role == Role::User
        ));
        assert_eq!(session.recv().await, ServerMessage::WizardBusy { busy: true });

        session
            .send(ClientMessage::WizardSend {
                text: "Ещё одно сообщение".to_string(),
            })
            .await;
        session.assert_quiet();

        llm.open();
        assert!(matches!(
            session.recv().await,
            ServerMessage::WizardMessage { message }
                if message.role == Role::Model && message.text == "Расскажите, что вы продаёте?"
        ));
        assert_eq!(session.recv().await, ServerMessage::WizardBusy { busy: false });

        let state = session.state.lock().await;
        let texts: Vec<_> = state
            .wizard
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert!(!texts.contains(&"Ещё одно сообщение"));
    }
}
