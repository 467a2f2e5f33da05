//! crates/agent_core/src/domain.rs
//!
//! Defines the core data structures for the dashboard: the assistant
//! configuration, its list items, conversation transcripts and accounts.
//!
//! The configuration is stored and exchanged as a single JSON document, so the
//! serde field names here are the wire format (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client identifier of the built-in demo configuration.
pub const DEMO_CLIENT_ID: &str = "DEMO";

//=========================================================================================
// Configuration
//=========================================================================================

/// The full persona and knowledge definition of one assistant instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Public client identifier used by the embed snippet.
    pub id: String,
    pub active: bool,
    pub name: String,
    pub welcome_message: String,
    pub role: String,
    pub knowledge_base_text: String,
    #[serde(default)]
    pub qna: Vec<QnaItem>,
    #[serde(default)]
    pub links: Vec<LinkItem>,
    #[serde(default)]
    pub files: Vec<FileItem>,
}

impl AgentConfig {
    /// A blank configuration for a user's first session.
    pub fn starter(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: true,
            name: "AI Ассистент".to_string(),
            welcome_message: "Здравствуйте! Чем могу помочь?".to_string(),
            role: "Консультант".to_string(),
            knowledge_base_text: String::new(),
            qna: Vec::new(),
            links: Vec::new(),
            files: Vec::new(),
        }
    }

    /// The sample configuration shown to visitors in demo mode.
    pub fn demo() -> Self {
        Self {
            id: DEMO_CLIENT_ID.to_string(),
            active: true,
            name: "Алина AI".to_string(),
            welcome_message: "Здравствуйте! Я помогу подобрать идеальный букет. Для какого повода ищем цветы?".to_string(),
            role: "Флорист-консультант".to_string(),
            knowledge_base_text: "Мы семейная цветочная мастерская, работаем с 2015 года. Используем только свежие цветы из Голландии и Эквадора. Наш адрес: ул. Цветочная 12. Мы ценим каждого клиента и стараемся сделать праздник незабываемым.".to_string(),
            qna: vec![
                QnaItem::new(
                    "Сколько стоит доставка?",
                    "Доставка по городу — 300р. При заказе от 5000р — бесплатно.",
                ),
                QnaItem::new(
                    "Как быстро соберете букет?",
                    "Обычно сборка занимает 30-60 минут в зависимости от сложности.",
                ),
            ],
            links: vec![LinkItem::new("https://flowers.example.com")],
            files: vec![FileItem {
                id: Uuid::new_v4(),
                name: "price_list_2024.pdf".to_string(),
                size: "2.40 MB".to_string(),
                kind: FileKind::Pdf,
            }],
        }
    }

    pub fn is_demo(&self) -> bool {
        self.id == DEMO_CLIENT_ID
    }
}

/// Generates a fresh public client identifier, e.g. `CLIENT_3F9A0C12`.
pub fn generate_client_id() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("CLIENT_{}", &raw[..8])
}

/// A single frequently-asked question and its canned answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QnaItem {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
}

impl QnaItem {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A source link the assistant may refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkItem {
    pub id: Uuid,
    pub url: String,
}

impl LinkItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
        }
    }
}

/// Describes a file in the knowledge base. Only the descriptor is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub id: Uuid,
    pub name: String,
    /// Human-readable size, e.g. `"2.40 MB"`.
    pub size: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Doc,
    Txt,
    Other,
}

/// A file selected in the wizard but not yet sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAttachment {
    pub name: String,
    pub size_bytes: u64,
}

//=========================================================================================
// Transcripts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// An append-only, ordered conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript that opens with a message from the assistant.
    pub fn seeded(greeting: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Role::Model, greeting);
        transcript
    }

    /// Appends a message and returns it.
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> &Message {
        self.messages.push(Message {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_prefixed_and_distinct() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert!(a.starts_with("CLIENT_"));
        assert_eq!(a.len(), "CLIENT_".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn transcript_keeps_insertion_order() {
        let mut transcript = Transcript::seeded("hello");
        transcript.push(Role::User, "first");
        transcript.push(Role::Model, "second");

        let texts: Vec<&str> = transcript.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hello", "first", "second"]);
        assert_eq!(transcript.messages()[0].role, Role::Model);
    }

    #[test]
    fn config_serializes_with_camel_case_and_type_tag() {
        let config = AgentConfig::demo();
        let value = serde_json::to_value(&config).unwrap();

        assert!(value.get("welcomeMessage").is_some());
        assert!(value.get("knowledgeBaseText").is_some());
        assert_eq!(value["files"][0]["type"], "pdf");

        let back: AgentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
        assert!(back.is_demo());
    }

    #[test]
    fn config_without_lists_deserializes_with_empty_lists() {
        let json = r#"{"id":"CLIENT_1","active":false,"name":"n","welcomeMessage":"w","role":"r","knowledgeBaseText":""}"#;
        let config: AgentConfig = serde_json::from_str(json).unwrap();
        assert!(config.qna.is_empty());
        assert!(config.links.is_empty());
        assert!(config.files.is_empty());
    }
}
