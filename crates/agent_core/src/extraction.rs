//! crates/agent_core/src/extraction.rs
//!
//! Locates the fenced ```` ```json ```` block a generator may append to its reply,
//! decodes it into a field-optional `ConfigUpdate` and merges that update into a
//! configuration.
//!
//! Both stages are tolerant: a missing block, invalid JSON or a field of the wrong
//! shape all degrade to "no update" for the affected part instead of an error
//! reaching the caller.

use crate::domain::{AgentConfig, LinkItem, QnaItem};
use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json[ \t]*\r?\n(.*?)\s*```").expect("fenced block pattern is valid")
});

/// A fenced block located inside a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Byte range of the whole block, fences included.
    pub range: Range<usize>,
    /// The text between the fences.
    pub body: &'a str,
}

/// Finds the first fenced `json` block in `reply`.
pub fn find_fenced_block(reply: &str) -> Option<FencedBlock<'_>> {
    let captures = FENCED_JSON.captures(reply)?;
    let whole = captures.get(0)?;
    let body = captures.get(1)?;
    Some(FencedBlock {
        range: whole.range(),
        body: body.as_str(),
    })
}

/// Removes `range` from `reply` and trims the remainder.
pub fn strip_block(reply: &str, range: Range<usize>) -> String {
    let mut text = String::with_capacity(reply.len());
    text.push_str(&reply[..range.start]);
    text.push_str(&reply[range.end..]);
    text.trim().to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateParseError {
    #[error("invalid JSON in fenced block: {0}")]
    Json(#[from] serde_json::Error),
    #[error("fenced block is not a JSON object")]
    NotAnObject,
}

/// A Q&A pair as announced by the generator, before it receives an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QnaDraft {
    pub question: String,
    pub answer: String,
}

/// The structured update decoded from one reply.
///
/// `None` means the field was not mentioned (or had the wrong shape). For the
/// lists, `Some(vec![])` records that the generator sent an empty list, which
/// still leaves the configuration untouched when applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub name: Option<String>,
    pub welcome_message: Option<String>,
    pub role: Option<String>,
    pub knowledge_base_text: Option<String>,
    pub qna: Option<Vec<QnaDraft>>,
    pub links: Option<Vec<String>>,
}

impl ConfigUpdate {
    /// Decodes the body of a fenced block.
    pub fn parse(body: &str) -> Result<Self, UpdateParseError> {
        let value: Value = serde_json::from_str(body)?;
        let object = value.as_object().ok_or(UpdateParseError::NotAnObject)?;
        Ok(Self::from_object(object))
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            name: text_field(object, "name"),
            welcome_message: text_field(object, "welcomeMessage"),
            role: text_field(object, "role"),
            knowledge_base_text: text_field(object, "knowledgeBaseText"),
            qna: qna_field(object),
            links: links_field(object),
        }
    }

    /// Merges the update into `config` and returns the names of the fields it overwrote.
    ///
    /// Lists are replaced wholesale, and only when the incoming list is non-empty.
    /// Every new list item gets a fresh identifier.
    pub fn apply(self, config: &mut AgentConfig) -> Vec<&'static str> {
        let mut touched = Vec::new();

        if let Some(name) = self.name {
            config.name = name;
            touched.push("name");
        }
        if let Some(welcome_message) = self.welcome_message {
            config.welcome_message = welcome_message;
            touched.push("welcomeMessage");
        }
        if let Some(role) = self.role {
            config.role = role;
            touched.push("role");
        }
        if let Some(text) = self.knowledge_base_text {
            config.knowledge_base_text = text;
            touched.push("knowledgeBaseText");
        }
        if let Some(qna) = self.qna.filter(|items| !items.is_empty()) {
            config.qna = qna
                .into_iter()
                .map(|draft| QnaItem::new(draft.question, draft.answer))
                .collect();
            touched.push("qna");
        }
        if let Some(links) = self.links.filter(|items| !items.is_empty()) {
            config.links = links.into_iter().map(LinkItem::new).collect();
            touched.push("links");
        }

        touched
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

fn qna_field(object: &Map<String, Value>) -> Option<Vec<QnaDraft>> {
    let items = object.get("qna")?.as_array()?;
    let drafts = items
        .iter()
        .filter_map(|item| {
            let item = item.as_object()?;
            let question = item.get("question").and_then(Value::as_str).unwrap_or_default();
            let answer = item.get("answer").and_then(Value::as_str).unwrap_or_default();
            if question.trim().is_empty() && answer.trim().is_empty() {
                return None;
            }
            Some(QnaDraft {
                question: question.to_string(),
                answer: answer.to_string(),
            })
        })
        .collect();
    Some(drafts)
}

fn links_field(object: &Map<String, Value>) -> Option<Vec<String>> {
    let items = object.get("links")?.as_array()?;
    let urls = items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) => Some(url.as_str()),
            Value::Object(link) => link.get("url").and_then(Value::as_str),
            _ => None,
        })
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string)
        .collect();
    Some(urls)
}

/// What was found in one reply.
#[derive(Debug)]
pub enum Extraction {
    /// The reply carries no fenced block.
    Absent,
    /// A block was found but could not be decoded.
    Malformed(UpdateParseError),
    /// A block was decoded; `block` is its byte range in the reply.
    Found {
        update: ConfigUpdate,
        block: Range<usize>,
    },
}

/// Runs both stages of the pipeline over a raw reply.
pub fn extract(reply: &str) -> Extraction {
    let Some(block) = find_fenced_block(reply) else {
        return Extraction::Absent;
    };
    match ConfigUpdate::parse(block.body) {
        Ok(update) => Extraction::Found {
            update,
            block: block.range,
        },
        Err(e) => Extraction::Malformed(e),
    }
}
