use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response languages the engine can enforce. Unknown names resolve to the
/// default instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Arabic,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Hindi, Language::Arabic];

    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_default()
    }

    /// Strict lookup over names and ISO codes, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "english" | "en" => Some(Self::English),
            "hindi" | "hi" => Some(Self::Hindi),
            "arabic" | "ar" => Some(Self::Arabic),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Arabic => "ar",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Hindi => "hindi",
            Self::Arabic => "arabic",
        }
    }

    /// Capitalized name used inside prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Arabic => "Arabic",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.name().to_string()
    }
}

/// Raw upload handed to the extractor.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Uniform output of every format-specific extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub is_image: bool,
    pub image_bytes: Option<Vec<u8>>,
}

impl Extraction {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_image: false,
            image_bytes: None,
        }
    }

    pub fn image(text: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            text: text.into(),
            is_image: true,
            image_bytes: Some(bytes),
        }
    }
}

/// An extracted document. Image bytes are present exactly when the document
/// came from an image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    filename: String,
    content: String,
    image_data: Option<Vec<u8>>,
}

impl Document {
    pub fn text(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            image_data: None,
        }
    }

    pub fn image(
        filename: impl Into<String>,
        content: impl Into<String>,
        image_data: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            image_data: Some(image_data),
        }
    }

    pub fn from_extraction(filename: impl Into<String>, extraction: Extraction) -> Self {
        match (extraction.is_image, extraction.image_bytes) {
            (_, Some(bytes)) => Self::image(filename, extraction.text, bytes),
            (true, None) => Self::image(filename, extraction.text, Vec::new()),
            (false, None) => Self::text(filename, extraction.text),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_image(&self) -> bool {
        self.image_data.is_some()
    }

    pub fn image_data(&self) -> Option<&[u8]> {
        self.image_data.as_deref()
    }

    pub fn text_length(&self) -> usize {
        self.content.chars().count()
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            filename: self.filename.clone(),
            text_length: self.text_length(),
            is_image: self.is_image(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub text_length: usize,
    pub is_image: bool,
}

/// One prior exchange. Plain chat and document-grounded answers are separate
/// threads that share a single transport-level log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChatTurn", into = "RawChatTurn")]
pub enum ChatTurn {
    Plain { user: String, ai: String },
    Document { user: String, document: String },
}

impl ChatTurn {
    pub fn plain(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self::Plain {
            user: user.into(),
            ai: ai.into(),
        }
    }

    pub fn document(user: impl Into<String>, document: impl Into<String>) -> Self {
        Self::Document {
            user: user.into(),
            document: document.into(),
        }
    }

    pub fn mode(&self) -> ConversationMode {
        match self {
            Self::Plain { .. } => ConversationMode::Plain,
            Self::Document { .. } => ConversationMode::Document,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChatTurn {
    user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document: Option<String>,
}

impl TryFrom<RawChatTurn> for ChatTurn {
    type Error = String;

    fn try_from(raw: RawChatTurn) -> Result<Self, Self::Error> {
        match (raw.ai, raw.document) {
            (Some(ai), None) => Ok(Self::Plain { user: raw.user, ai }),
            (None, Some(document)) => Ok(Self::Document {
                user: raw.user,
                document,
            }),
            (Some(_), Some(_)) => Err("chat turn carries both `ai` and `document`".to_string()),
            (None, None) => Err("chat turn needs an `ai` or `document` answer".to_string()),
        }
    }
}

impl From<ChatTurn> for RawChatTurn {
    fn from(turn: ChatTurn) -> Self {
        match turn {
            ChatTurn::Plain { user, ai } => Self {
                user,
                ai: Some(ai),
                document: None,
            },
            ChatTurn::Document { user, document } => Self {
                user,
                ai: None,
                document: Some(document),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    Plain,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryClass {
    Meaningful,
    GenericAck,
    Unclear,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub documents: Vec<Document>,
    pub history: Vec<ChatTurn>,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub language: Language,
    pub classification: QueryClass,
    pub documents: Vec<DocumentSummary>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainChatResponse {
    pub response: String,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub message: String,
    pub documents: Vec<DocumentSummary>,
    pub answer: Option<QueryResponse>,
    pub skipped: Vec<SkippedFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_lookup_is_case_insensitive_with_default_fallback() {
        assert_eq!(Language::from_name("HINDI"), Language::Hindi);
        assert_eq!(Language::from_name(" Arabic "), Language::Arabic);
        assert_eq!(Language::from_name("ar"), Language::Arabic);
        assert_eq!(Language::from_name("klingon"), Language::English);
        assert_eq!(Language::from_name(""), Language::default());
        assert_eq!(Language::Hindi.code(), "hi");
    }

    #[test]
    fn language_round_trips_through_json_names() -> Result<(), serde_json::Error> {
        let parsed: Language = serde_json::from_str("\"Hindi\"")?;
        assert_eq!(parsed, Language::Hindi);
        assert_eq!(serde_json::to_string(&Language::Arabic)?, "\"arabic\"");

        let unknown: Language = serde_json::from_str("\"french\"")?;
        assert_eq!(unknown, Language::English);
        Ok(())
    }

    #[test]
    fn image_documents_carry_bytes_and_text_documents_do_not() {
        let image = Document::from_extraction("scan.png", Extraction::image("hello", vec![1, 2]));
        assert!(image.is_image());
        assert_eq!(image.image_data(), Some(&[1u8, 2][..]));

        let text = Document::from_extraction("notes.txt", Extraction::text("hello"));
        assert!(!text.is_image());
        assert!(text.image_data().is_none());
    }

    #[test]
    fn text_length_counts_characters() {
        let document = Document::text("hi.txt", "नमस्ते");
        assert_eq!(document.text_length(), "नमस्ते".chars().count());
        assert_eq!(document.summary().text_length, document.text_length());
    }

    #[test]
    fn chat_turns_parse_from_tagged_wire_shape() -> Result<(), serde_json::Error> {
        let turns: Vec<ChatTurn> = serde_json::from_str(
            r#"[{"user":"hi","ai":"hello"},{"user":"due?","document":"May 1"}]"#,
        )?;
        assert_eq!(turns[0], ChatTurn::plain("hi", "hello"));
        assert_eq!(turns[1], ChatTurn::document("due?", "May 1"));
        assert_eq!(turns[1].mode(), ConversationMode::Document);

        let encoded = serde_json::to_string(&turns[1])?;
        assert_eq!(encoded, r#"{"user":"due?","document":"May 1"}"#);
        Ok(())
    }

    #[test]
    fn chat_turn_with_both_answers_is_rejected() {
        let result: Result<ChatTurn, _> =
            serde_json::from_str(r#"{"user":"q","ai":"a","document":"d"}"#);
        assert!(result.is_err());

        let result: Result<ChatTurn, _> = serde_json::from_str(r#"{"user":"q"}"#);
        assert!(result.is_err());
    }
}
