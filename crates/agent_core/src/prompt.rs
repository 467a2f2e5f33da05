//! crates/agent_core/src/prompt.rs
//!
//! System instructions sent to the generative endpoint: the fixed instruction of
//! the configuration wizard and the compiled persona prompt used by preview chat.

use crate::domain::AgentConfig;

/// Persona and response contract of the configuration wizard.
///
/// The contract asks the model to end a reply with a fenced `json` block whenever
/// it learned something new; see `crate::extraction` for how that block is read.
pub const WIZARD_SYSTEM_INSTRUCTION: &str = r#"Ты — опытный бизнес-аналитик и настройщик AI-агентов.
ТВОЯ ЦЕЛЬ: Собрать максимум информации о компании, чтобы заполнить конфигурацию бота.

СТРАТЕГИЯ ДИАЛОГА:
1. Если пользователь прикрепил файлы: поблагодари и скажи, что добавил их в базу знаний.
2. НАСТОЙЧИВО спрашивай ссылки: "Есть ли у вас сайт, VK, WhatsApp, Notion? Пришлите ссылки, я добавлю их в источники."
3. Если пользователь назвал нишу, требуй детали: "Сколько стоит услуга X?", "Какой адрес?", "Есть ли гарантия?".
4. Анализируй ответы и формируй "Общую информацию" (knowledgeBaseText).

КОГДА ГЕНЕРИРОВАТЬ JSON:
В каждом ответе, если ты получил новую полезную информацию, обновляй JSON-блок в конце.

Формат JSON (строго в конце ответа, в блоке ```json):
{
  "name": "Имя бота",
  "welcomeMessage": "Приветствие",
  "role": "Роль",
  "knowledgeBaseText": "Скомпилированный текст о компании на основе ответов.",
  "qna": [
    {"question": "Вопрос", "answer": "Ответ"}
  ],
  "links": ["https://site.com"]
}"#;

const CLOSING_DIRECTIVE: &str =
    "Твоя задача: Отвечать кратко, вежливо, по делу, используя предоставленную информацию.";

/// Serializes a configuration into the instruction for the assistant it describes.
///
/// Sections appear in a fixed order: identity, knowledge base, Q&A, sources,
/// files, closing directive.
pub fn compile_system_prompt(config: &AgentConfig) -> String {
    let qna = config
        .qna
        .iter()
        .map(|item| format!("В: {}\nО: {}", item.question, item.answer))
        .collect::<Vec<_>>()
        .join("\n\n");
    let links = config
        .links
        .iter()
        .map(|link| link.url.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let files = config
        .files
        .iter()
        .map(|file| file.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    [
        format!("Ты — {}, твое имя {}.", config.role, config.name),
        String::new(),
        "БАЗА ЗНАНИЙ (О компании):".to_string(),
        config.knowledge_base_text.clone(),
        String::new(),
        "ЧАСТЫЕ ВОПРОСЫ (Q&A):".to_string(),
        qna,
        String::new(),
        "ИСТОЧНИКИ ДАННЫХ:".to_string(),
        links,
        String::new(),
        "ФАЙЛЫ В БАЗЕ:".to_string(),
        files,
        String::new(),
        CLOSING_DIRECTIVE.to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LinkItem, QnaItem};

    #[test]
    fn compiles_sections_in_order() {
        let mut config = AgentConfig::starter("CLIENT_1");
        config.name = "Алина".into();
        config.role = "Флорист".into();
        config.knowledge_base_text = "Цветы из Голландии.".into();
        config.qna = vec![QnaItem::new("Доставка?", "300р"), QnaItem::new("Сборка?", "30 минут")];
        config.links = vec![LinkItem::new("https://a.example"), LinkItem::new("https://b.example")];

        let expected = "Ты — Флорист, твое имя Алина.\n\
            \n\
            БАЗА ЗНАНИЙ (О компании):\n\
            Цветы из Голландии.\n\
            \n\
            ЧАСТЫЕ ВОПРОСЫ (Q&A):\n\
            В: Доставка?\nО: 300р\n\nВ: Сборка?\nО: 30 минут\n\
            \n\
            ИСТОЧНИКИ ДАННЫХ:\n\
            https://a.example, https://b.example\n\
            \n\
            ФАЙЛЫ В БАЗЕ:\n\
            \n\
            \n\
            Твоя задача: Отвечать кратко, вежливо, по делу, используя предоставленную информацию.";
        assert_eq!(compile_system_prompt(&config), expected);
    }

    #[test]
    fn compilation_is_deterministic() {
        let config = AgentConfig::demo();
        assert_eq!(compile_system_prompt(&config), compile_system_prompt(&config));
        assert!(compile_system_prompt(&config).contains("price_list_2024.pdf"));
    }

    #[test]
    fn wizard_instruction_describes_every_block_key() {
        for key in ["name", "welcomeMessage", "role", "knowledgeBaseText", "qna", "links"] {
            assert!(WIZARD_SYSTEM_INSTRUCTION.contains(&format!("\"{key}\"")), "{key}");
        }
        assert!(WIZARD_SYSTEM_INSTRUCTION.contains("```json"));
    }
}
