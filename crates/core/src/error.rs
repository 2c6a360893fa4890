use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx parse error: {0}")]
    DocxParse(String),

    #[error("ocr failed: {0}")]
    Ocr(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("extraction worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio transcoding failed: {0}")]
    Transcode(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("transcription is empty")]
    EmptyTranscription,

    #[error("text is empty")]
    EmptyText,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    MissingVariable(String),

    #[error("invalid configuration value for {key}: {details}")]
    InvalidValue { key: String, details: String },
}

/// Caller-facing failures. A request either succeeds with a payload or ends
/// with exactly one of these.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query cannot be empty")]
    EmptyQuery,

    #[error("no documents were supplied")]
    NoDocuments,

    #[error("none of the uploaded files could be processed")]
    NoDocumentsProcessed,

    #[error("failed to extract {filename}: {cause}")]
    ExtractionFailed { filename: String, cause: String },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("completion failed: {0}")]
    CompletionFailed(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "empty_query",
            Self::NoDocuments => "no_documents",
            Self::NoDocumentsProcessed => "no_documents_processed",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::CompletionFailed(_) => "completion_failed",
            Self::InternalError(_) => "internal_error",
        }
    }

    pub fn extraction(filename: &str, error: ExtractError) -> Self {
        match error {
            ExtractError::UnsupportedFormat(details) => {
                Self::UnsupportedFormat(format!("{filename}: {details}"))
            }
            other => Self::ExtractionFailed {
                filename: filename.to_string(),
                cause: other.to_string(),
            },
        }
    }
}

impl From<CompletionError> for QueryError {
    fn from(error: CompletionError) -> Self {
        match error {
            CompletionError::Provider(message) => Self::CompletionFailed(message),
            CompletionError::Timeout(_) => Self::CompletionFailed(error.to_string()),
            other => Self::InternalError(other.to_string()),
        }
    }
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
