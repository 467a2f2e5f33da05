//! crates/agent_core/src/preview.rs
//!
//! Preview chat: talks to the assistant exactly as configured, so the user can
//! try a configuration before embedding it.

use crate::{
    domain::{AgentConfig, Role, Transcript},
    ports::{ChatTurn, GenerationRequest, GenerativeService, PortError, PortResult},
    prompt::compile_system_prompt,
};
use tracing::{debug, error};

/// Shown when the endpoint answered with no text.
pub const EMPTY_PREVIEW_REPLY: &str = "...";

#[derive(Debug)]
pub enum PreviewOutcome {
    Replied,
    /// The endpoint failed; nothing was recorded for the assistant.
    Failed(PortError),
    Stale,
}

/// One preview conversation, opened by the configuration's welcome message.
#[derive(Debug, Clone)]
pub struct PreviewSession {
    transcript: Transcript,
    welcome: String,
    in_flight: Option<u64>,
    last_seq: u64,
}

impl PreviewSession {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            transcript: Transcript::seeded(config.welcome_message.clone()),
            welcome: config.welcome_message.clone(),
            in_flight: None,
            last_seq: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts over from the current welcome message. A request in flight becomes stale.
    pub fn reset(&mut self, config: &AgentConfig) {
        self.transcript = Transcript::seeded(config.welcome_message.clone());
        self.welcome = config.welcome_message.clone();
        self.in_flight = None;
    }

    /// Resets the conversation if the welcome message changed since it started.
    pub fn sync_welcome(&mut self, config: &AgentConfig) -> bool {
        if self.welcome == config.welcome_message {
            return false;
        }
        self.reset(config);
        true
    }

    /// Records the user's message and prepares the request for the endpoint.
    ///
    /// The seeded welcome message is not sent; the compiled system prompt already
    /// defines how the assistant greets.
    pub fn begin(&mut self, text: &str, config: &AgentConfig) -> Option<GenerationRequest> {
        if text.trim().is_empty() {
            return None;
        }
        if let Some(seq) = self.in_flight {
            debug!(seq, "Preview request already in flight; ignoring message.");
            return None;
        }

        self.transcript.push(Role::User, text);
        self.last_seq += 1;
        self.in_flight = Some(self.last_seq);

        let turns = self
            .transcript
            .messages()
            .iter()
            .skip(1)
            .map(|message| ChatTurn::new(message.role, message.text.clone()))
            .collect();

        Some(GenerationRequest {
            seq: self.last_seq,
            system_instruction: compile_system_prompt(config),
            turns,
        })
    }

    pub fn complete(&mut self, seq: u64, reply: PortResult<String>) -> PreviewOutcome {
        if self.in_flight != Some(seq) {
            debug!(seq, "Discarding stale preview reply.");
            return PreviewOutcome::Stale;
        }
        self.in_flight = None;

        match reply {
            Ok(text) => {
                let text = if text.trim().is_empty() {
                    EMPTY_PREVIEW_REPLY.to_string()
                } else {
                    text
                };
                self.transcript.push(Role::Model, text);
                PreviewOutcome::Replied
            }
            Err(e) => {
                error!("Preview generation failed: {}", e);
                PreviewOutcome::Failed(e)
            }
        }
    }

    /// Runs both phases against `generator`. Returns `None` when the message was ignored.
    pub async fn send(
        &mut self,
        text: &str,
        config: &AgentConfig,
        generator: &dyn GenerativeService,
    ) -> Option<PreviewOutcome> {
        let request = self.begin(text, config)?;
        let reply = generator
            .generate(&request.system_instruction, &request.turns)
            .await;
        Some(self.complete(request.seq, reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_skips_welcome_and_uses_compiled_prompt() {
        let config = AgentConfig::demo();
        let mut session = PreviewSession::new(&config);

        let request = session.begin("Сколько стоит доставка?", &config).unwrap();

        assert_eq!(request.system_instruction, compile_system_prompt(&config));
        assert_eq!(
            request.turns,
            vec![ChatTurn::new(Role::User, "Сколько стоит доставка?")]
        );
    }

    #[test]
    fn welcome_change_resets_transcript() {
        let mut config = AgentConfig::demo();
        let mut session = PreviewSession::new(&config);
        let request = session.begin("hi", &config).unwrap();

        assert!(!session.sync_welcome(&config));
        config.welcome_message = "Добрый день!".into();
        assert!(session.sync_welcome(&config));

        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript().messages()[0].text, "Добрый день!");
        assert!(matches!(
            session.complete(request.seq, Ok("late".into())),
            PreviewOutcome::Stale
        ));
    }

    #[test]
    fn failure_adds_no_assistant_message() {
        let config = AgentConfig::demo();
        let mut session = PreviewSession::new(&config);
        let request = session.begin("hi", &config).unwrap();

        let outcome = session.complete(request.seq, Err(PortError::Unexpected("down".into())));

        assert!(matches!(outcome, PreviewOutcome::Failed(_)));
        assert_eq!(session.transcript().len(), 2);
        assert!(!session.is_busy());
    }

    #[test]
    fn blank_or_busy_messages_are_ignored() {
        let config = AgentConfig::demo();
        let mut session = PreviewSession::new(&config);
        assert!(session.begin(" ", &config).is_none());
        assert!(session.begin("one", &config).is_some());
        assert!(session.begin("two", &config).is_none());
        assert_eq!(session.transcript().len(), 2);
    }
}
