//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the dashboard in the browser and
//! the API server.

use agent_core::domain::{AgentConfig, Message, PendingAttachment};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Dictated audio is sent as raw Binary frames (PCM16 mono) between
// `VoiceStarted` and `VoiceEnded`, not as part of this enum.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Adds a file to the wizard's pending attachments.
    WizardAttach { name: String, size_bytes: u64 },

    /// Removes a pending attachment by position.
    WizardRemoveAttachment { index: usize },

    /// Sends the typed text (and any pending attachments) to the wizard.
    WizardSend { text: String },

    /// Starts a new wizard dialog.
    WizardReset,

    /// The user started dictating.
    VoiceStarted,

    /// The user stopped dictating; the buffered audio should be transcribed.
    VoiceEnded,

    /// Sends a message to the configured assistant in the preview chat.
    PreviewSend { text: String },

    /// Restarts the preview chat from the welcome message.
    PreviewReset,

    /// Replaces the configuration with the form's current state.
    UpdateConfig { config: AgentConfig },

    /// Adds files to the knowledge base directly from the form.
    UploadFiles { files: Vec<PendingAttachment> },

    /// Persists the current configuration.
    SaveConfig,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First message on every connection.
    SessionReady {
        config: AgentConfig,
        wizard: Vec<Message>,
        preview: Vec<Message>,
        /// False in demo mode, where saving keeps changes in memory only.
        persisted: bool,
        voice_input: bool,
    },

    /// The configuration changed on the server side (wizard merge, uploads).
    ConfigChanged { config: AgentConfig },

    /// A new entry in the wizard transcript.
    WizardMessage { message: Message },

    WizardAttachments { pending: Vec<PendingAttachment> },

    /// The wizard is waiting for (or finished waiting for) the generative endpoint.
    WizardBusy { busy: bool },

    /// The wizard dialog was restarted.
    WizardReset { messages: Vec<Message> },

    /// A new entry in the preview transcript.
    PreviewMessage { message: Message },

    PreviewBusy { busy: bool },

    /// The preview chat was restarted.
    PreviewReset { messages: Vec<Message> },

    /// Dictated text to append to the wizard input.
    Transcription { text: String },

    /// Result of a save request.
    Saved { persisted: bool },

    /// A failure the user should be told about.
    Error { message: String },
}
