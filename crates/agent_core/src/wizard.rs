//! crates/agent_core/src/wizard.rs
//!
//! The configuration wizard: a conversation with a business-analyst persona whose
//! replies may carry structured configuration updates.
//!
//! A submission is split in two phases so a caller can release its lock on the
//! session while the generative endpoint is working:
//!
//! 1. [`WizardSession::begin`] flushes pending attachments into the configuration,
//!    records the user's message and returns the request to send.
//! 2. [`WizardSession::complete`] takes the reply, merges any update it carries and
//!    records the assistant's message.
//!
//! Only one request may be in flight. Replies are matched to requests by sequence
//! number, so a reply that arrives after a reset, or for a superseded request, is
//! dropped without touching anything.

use crate::{
    attachments::describe,
    domain::{AgentConfig, PendingAttachment, Role, Transcript},
    extraction::{extract, strip_block, Extraction},
    ports::{ChatTurn, GenerationRequest, GenerativeService, PortResult},
    prompt::WIZARD_SYSTEM_INSTRUCTION,
};
use tracing::{debug, error, info, warn};

pub const WIZARD_GREETING: &str = "Привет! Я помогу настроить вашего ассистента.\n\nНазовите вашу нишу (например: \"Автосервис\") и я задам уточняющие вопросы, чтобы составить грамотный сценарий.\n\nЕсли у вас есть файлы (прайс-листы, инструкции) или ссылки на сайт/соцсети — прикрепите их или отправьте сюда, я добавлю их в Базу Знаний.";

/// Appended to a reply whose block was applied.
pub const SETTINGS_UPDATED: &str = "✨ Настройки обновлены.";

/// Shown instead of a reply when the endpoint failed.
pub const FALLBACK_ERROR: &str = "Ошибка. Попробуйте еще раз.";

/// Shown when the endpoint answered with no text.
pub const EMPTY_REPLY: &str = "Ошибка связи.";

/// Shown when nothing is left of a reply once its block is removed.
pub const DONE: &str = "Готово.";

// A reply containing this mark already announces the update itself.
const COMPLETION_MARK: char = '✨';

/// The note appended to a message that carried attachments.
pub fn attachment_note(count: usize) -> String {
    format!("\n[Прикреплено файлов: {count}]")
}

/// How a reply was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome {
    /// A block was decoded and merged; `fields` lists what it overwrote.
    Applied { fields: Vec<&'static str> },
    /// The reply carried no block.
    PlainText,
    /// The reply carried a block that could not be decoded; it is shown as-is.
    Malformed,
    /// The endpoint failed; a fallback message was recorded.
    Failed,
    /// The reply belongs to a superseded request and was ignored.
    Stale,
}

impl WizardOutcome {
    /// True when the merge changed at least one configuration field.
    pub fn changed_config(&self) -> bool {
        matches!(self, WizardOutcome::Applied { fields } if !fields.is_empty())
    }
}

/// Transcript, pending attachments and in-flight state of one wizard dialog.
#[derive(Debug, Clone)]
pub struct WizardSession {
    transcript: Transcript,
    pending: Vec<PendingAttachment>,
    in_flight: Option<u64>,
    last_seq: u64,
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardSession {
    pub fn new() -> Self {
        Self {
            transcript: Transcript::seeded(WIZARD_GREETING),
            pending: Vec::new(),
            in_flight: None,
            last_seq: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn pending(&self) -> &[PendingAttachment] {
        &self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn attach(&mut self, attachment: PendingAttachment) {
        self.pending.push(attachment);
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<PendingAttachment> {
        (index < self.pending.len()).then(|| self.pending.remove(index))
    }

    /// Starts a new dialog. A request still in flight becomes stale.
    pub fn reset(&mut self) {
        self.transcript = Transcript::seeded(WIZARD_GREETING);
        self.pending.clear();
        self.in_flight = None;
    }

    /// Records the user's message and prepares the request for the endpoint.
    ///
    /// Returns `None`, changing nothing, when there is neither text nor an
    /// attachment to send or when another request is still in flight.
    pub fn begin(&mut self, text: &str, config: &mut AgentConfig) -> Option<GenerationRequest> {
        if let Some(seq) = self.in_flight {
            debug!(seq, "Wizard request already in flight; ignoring submission.");
            return None;
        }
        if text.trim().is_empty() && self.pending.is_empty() {
            return None;
        }

        let mut outgoing = text.to_string();
        if !self.pending.is_empty() {
            let count = self.pending.len();
            config
                .files
                .extend(self.pending.drain(..).map(|attachment| describe(&attachment)));
            outgoing.push_str(&attachment_note(count));
            info!(count, "Attachments added to the knowledge base.");
        }
        self.transcript.push(Role::User, outgoing);

        self.last_seq += 1;
        self.in_flight = Some(self.last_seq);

        let turns = self
            .transcript
            .messages()
            .iter()
            .map(|message| ChatTurn::new(message.role, message.text.clone()))
            .collect();

        Some(GenerationRequest {
            seq: self.last_seq,
            system_instruction: WIZARD_SYSTEM_INSTRUCTION.to_string(),
            turns,
        })
    }

    /// Handles the endpoint's answer to request `seq`.
    pub fn complete(
        &mut self,
        seq: u64,
        reply: PortResult<String>,
        config: &mut AgentConfig,
    ) -> WizardOutcome {
        if self.in_flight != Some(seq) {
            debug!(seq, "Discarding stale wizard reply.");
            return WizardOutcome::Stale;
        }
        self.in_flight = None;

        let raw = match reply {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                error!("Wizard generation failed: {}", e);
                self.transcript.push(Role::Model, FALLBACK_ERROR);
                return WizardOutcome::Failed;
            }
        };

        let (display, outcome) = match extract(&raw) {
            Extraction::Absent => (raw, WizardOutcome::PlainText),
            Extraction::Malformed(e) => {
                warn!("Failed to parse config JSON from wizard reply: {}", e);
                (raw, WizardOutcome::Malformed)
            }
            Extraction::Found { update, block } => {
                let fields = update.apply(config);
                info!(?fields, "Wizard reply merged into configuration.");
                (confirm(strip_block(&raw, block)), WizardOutcome::Applied { fields })
            }
        };

        let display = if display.trim().is_empty() {
            DONE.to_string()
        } else {
            display
        };
        self.transcript.push(Role::Model, display);
        outcome
    }

    /// Runs both phases against `generator`, holding `self` for the whole call.
    ///
    /// Returns `None` when the submission was ignored.
    pub async fn submit(
        &mut self,
        text: &str,
        config: &mut AgentConfig,
        generator: &dyn GenerativeService,
    ) -> Option<WizardOutcome> {
        let request = self.begin(text, config)?;
        let reply = generator
            .generate(&request.system_instruction, &request.turns)
            .await;
        Some(self.complete(request.seq, reply, config))
    }
}

fn confirm(mut text: String) -> String {
    if text.contains(COMPLETION_MARK) {
        return text;
    }
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str(SETTINGS_UPDATED);
    text
}
