pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod extractor;
pub mod history;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod speech;

pub use classifier::{
    clarification_message, HeuristicClassifier, QueryClassifier, ACKNOWLEDGMENT_REPLY,
};
pub use completion::{CompletionService, OpenAiCompletionClient};
pub use config::{ClassifierConfig, EngineConfig};
pub use error::{CompletionError, ConfigError, ExtractError, QueryError, SpeechError};
pub use extractor::{
    decode_text, DocxExtractor, DocxRsExtractor, Extractor, FileKind, LopdfExtractor, OcrEngine,
    OcrMode, PageText, PdfExtractor, TesseractOcr, NO_IMAGE_TEXT,
};
pub use history::{partition, Exchange};
pub use ingest::{extract_file, ingest_batch, BatchLimits};
pub use models::{
    BatchResponse, ChatTurn, ConversationMode, Document, DocumentSummary, Extraction,
    IngestionReport, Language, PlainChatRequest, PlainChatResponse, QueryClass, QueryRequest,
    QueryResponse, SkippedFile, UploadedFile,
};
pub use orchestrator::QueryOrchestrator;
pub use prompt::{
    assemble, assemble_plain, ContentPart, MessageContent, PromptMode, PromptPlan, PromptTurn, Role,
};
pub use speech::{OpenAiSpeechClient, SpeechToText, TextToSpeech, Transcription};
