//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the generative endpoint used by both the
//! configuration wizard and preview chat. It implements the `GenerativeService`
//! port from the `core` crate over any OpenAI-compatible chat completions API.

use agent_core::{
    domain::Role,
    ports::{ChatTurn, GenerativeService, PortError, PortResult},
};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerativeService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerativeAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerativeAdapter {
    /// Creates a new `OpenAiGenerativeAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn to_message(turn: &ChatTurn) -> PortResult<ChatCompletionRequestMessage> {
        let message: ChatCompletionRequestMessage = match turn.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            Role::Model => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        };
        Ok(message)
    }
}

//=========================================================================================
// `GenerativeService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerativeService for OpenAiGenerativeAdapter {
    /// Sends the instruction as the system message followed by the conversation.
    async fn generate(&self, system_instruction: &str, turns: &[ChatTurn]) -> PortResult<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(turns.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_instruction.to_string())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        for turn in turns {
            messages.push(Self::to_message(turn)?);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Missing content counts as an empty reply.
        match response.choices.into_iter().next() {
            Some(choice) => Ok(choice.message.content.unwrap_or_default()),
            None => Err(PortError::Unexpected(
                "Generative endpoint returned no choices in its response.".to_string(),
            )),
        }
    }
}
