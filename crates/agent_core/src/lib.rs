pub mod attachments;
pub mod domain;
pub mod extraction;
pub mod integration;
pub mod ports;
pub mod preview;
pub mod prompt;
pub mod wizard;

pub use domain::{
    AgentConfig, AuthSession, FileItem, FileKind, LinkItem, Message, PendingAttachment, QnaItem,
    Role, Transcript, User, UserCredentials,
};
pub use extraction::{ConfigUpdate, Extraction};
pub use ports::{
    ChatTurn, DatabaseService, GenerationRequest, GenerativeService, PortError, PortResult,
    SpeechToTextService,
};
pub use preview::{PreviewOutcome, PreviewSession};
pub use wizard::{WizardOutcome, WizardSession};
