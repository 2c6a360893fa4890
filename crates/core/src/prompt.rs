use crate::history::Exchange;
use crate::models::{Document, Language};
use std::path::Path;

const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Use the full conversation history to respond in the same language as the user's prompt.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Text,
    Vision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text(text) => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            Self::Text(_) => 0,
            Self::Parts(parts) => parts
                .iter()
                .filter(|part| matches!(part, ContentPart::Image { .. }))
                .count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTurn {
    pub role: Role,
    pub content: MessageContent,
}

impl PromptTurn {
    fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Everything the completion service needs: a system instruction and the
/// ordered conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPlan {
    pub mode: PromptMode,
    pub system_text: String,
    pub turns: Vec<PromptTurn>,
}

pub fn select_mode(documents: &[Document]) -> PromptMode {
    if documents.iter().any(Document::is_image) {
        PromptMode::Vision
    } else {
        PromptMode::Text
    }
}

pub fn consolidate_documents(documents: &[Document]) -> String {
    let mut block = String::new();
    for (index, document) in documents.iter().enumerate() {
        let kind = if document.is_image() { "image" } else { "document" };
        block.push_str(&format!(
            "=== Document {}: {} ({kind}) ===\n{}\n\n",
            index + 1,
            document.filename(),
            document.content().trim()
        ));
    }
    block
}

pub fn grounded_system_prompt(mode: PromptMode, documents: &[Document], language: Language) -> String {
    let language = language.display_name();
    let filenames = documents
        .iter()
        .map(|document| document.filename())
        .collect::<Vec<_>>()
        .join(", ");

    let source_line = match mode {
        PromptMode::Text => format!(
            "You are a document-grounded assistant. You can ONLY use the text of the documents provided below: {filenames}."
        ),
        PromptMode::Vision => format!(
            "You are a document-grounded assistant with image understanding. You can ONLY use the documents provided below and the attached images: {filenames}. For images, use both the extracted text below and what is visible in the attached image."
        ),
    };

    format!(
        r#"{source_line}

RULES - FOLLOW THEM EXACTLY:
1. Answer ONLY from the supplied documents. NEVER use outside knowledge or training data.
2. When you reference content, cite the source filename in square brackets, e.g. [{example}].
3. Respond ONLY in {language}, regardless of the language of the documents or of the question.
4. If the requested information is not in the documents, say so explicitly in {language}.
5. If the question is unclear or unrelated to the documents, ask for clarification in {language}.
6. Never reuse a previous generic answer for a new unclear question; address each question on its own.

DOCUMENTS:
{documents}"#,
        example = documents
            .first()
            .map(Document::filename)
            .unwrap_or("filename"),
        documents = consolidate_documents(documents).trim_end(),
    )
}

pub fn language_instruction(language: Language) -> String {
    format!(
        "Respond ONLY in {}. Do not switch languages.",
        language.display_name()
    )
}

/// Builds the document-grounded prompt for `query`.
pub fn assemble(
    query: &str,
    documents: &[Document],
    history: &[Exchange],
    language: Language,
) -> PromptPlan {
    let mode = select_mode(documents);
    let system_text = grounded_system_prompt(mode, documents, language);

    let mut turns = history_turns(history);
    let current_text = format!("{}\n{}", language_instruction(language), query);

    let current = match mode {
        PromptMode::Text => MessageContent::Text(current_text),
        PromptMode::Vision => {
            let mut parts = vec![ContentPart::Text(current_text)];
            parts.extend(documents.iter().filter_map(|document| {
                document.image_data().map(|data| ContentPart::Image {
                    mime_type: image_mime_type(document.filename()).to_string(),
                    data: data.to_vec(),
                })
            }));
            MessageContent::Parts(parts)
        }
    };

    turns.push(PromptTurn {
        role: Role::User,
        content: current,
    });

    PromptPlan {
        mode,
        system_text,
        turns,
    }
}

/// Builds the ungrounded chat prompt: no documents, same language rule.
pub fn assemble_plain(prompt: &str, history: &[Exchange], language: Language) -> PromptPlan {
    let mut turns = history_turns(history);
    turns.push(PromptTurn::text(
        Role::User,
        format!("{}\n{}", language_instruction(language), prompt),
    ));

    PromptPlan {
        mode: PromptMode::Text,
        system_text: PLAIN_SYSTEM_PROMPT.to_string(),
        turns,
    }
}

fn history_turns(history: &[Exchange]) -> Vec<PromptTurn> {
    history
        .iter()
        .flat_map(|exchange| {
            [
                PromptTurn::text(Role::User, exchange.user.clone()),
                PromptTurn::text(Role::Assistant, exchange.assistant.clone()),
            ]
        })
        .collect()
}

pub fn image_mime_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documents() -> Vec<Document> {
        vec![
            Document::text("contract.pdf", "Section 4: either party may terminate with 30 days notice."),
            Document::image("receipt.png", "TOTAL 42.00", vec![0x89, b'P', b'N', b'G']),
            Document::text("notes.docx", "Renewal is automatic."),
        ]
    }

    #[test]
    fn system_prompt_names_language_and_every_filename() {
        for language in Language::ALL {
            let plan = assemble("What is the notice period?", &documents(), &[], language);
            assert!(plan.system_text.contains(language.display_name()));
            for filename in ["contract.pdf", "receipt.png", "notes.docx"] {
                assert!(plan.system_text.contains(filename), "{filename} missing");
            }
        }
    }

    #[test]
    fn documents_are_consolidated_in_input_order() {
        let block = consolidate_documents(&documents());
        let contract = block.find("contract.pdf").expect("contract header");
        let receipt = block.find("receipt.png").expect("receipt header");
        let notes = block.find("notes.docx").expect("notes header");
        assert!(contract < receipt && receipt < notes);
        assert!(block.contains("TOTAL 42.00"));
    }

    #[test]
    fn any_image_selects_vision_mode_and_attaches_bytes() {
        let plan = assemble("What is the total?", &documents(), &[], Language::English);
        assert_eq!(plan.mode, PromptMode::Vision);

        let current = plan.turns.last().expect("current turn");
        assert_eq!(current.role, Role::User);
        assert_eq!(current.content.image_count(), 1);
        match &current.content {
            MessageContent::Parts(parts) => assert_eq!(
                parts[1],
                ContentPart::Image {
                    mime_type: "image/png".to_string(),
                    data: vec![0x89, b'P', b'N', b'G'],
                }
            ),
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn text_only_documents_never_attach_images() {
        let documents = vec![Document::text("a.txt", "alpha")];
        let plan = assemble("What is alpha?", &documents, &[], Language::Hindi);
        assert_eq!(plan.mode, PromptMode::Text);
        assert!(matches!(
            plan.turns.last().map(|turn| &turn.content),
            Some(MessageContent::Text(_))
        ));
    }

    #[test]
    fn history_precedes_the_language_prefixed_query() {
        let history = vec![Exchange {
            user: "Who signed it?".to_string(),
            assistant: "Acme [contract.pdf]".to_string(),
        }];
        let plan = assemble(
            "When does it end?",
            &[Document::text("contract.pdf", "Ends 2030.")],
            &history,
            Language::Arabic,
        );

        let roles = plan.turns.iter().map(|turn| turn.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);

        let current = plan.turns[2].content.text();
        assert!(current.starts_with("Respond ONLY in Arabic"));
        assert!(current.ends_with("When does it end?"));
    }

    #[test]
    fn plain_prompt_has_no_documents() {
        let plan = assemble_plain("hello", &[], Language::Hindi);
        assert_eq!(plan.mode, PromptMode::Text);
        assert_eq!(plan.system_text, PLAIN_SYSTEM_PROMPT);
        assert_eq!(
            plan.turns[0].content.text(),
            "Respond ONLY in Hindi. Do not switch languages.\nhello"
        );
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(image_mime_type("scan.JPG"), "image/jpeg");
        assert_eq!(image_mime_type("scan.tif"), "image/tiff");
        assert_eq!(image_mime_type("scan.webp"), "image/webp");
    }
}
