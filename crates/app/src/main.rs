use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docquery_core::{
    ChatTurn, DocxRsExtractor, EngineConfig, Extractor, HeuristicClassifier, Language,
    LopdfExtractor, OpenAiCompletionClient, OpenAiSpeechClient, PlainChatRequest, QueryError,
    QueryOrchestrator, SpeechToText, TesseractOcr, TextToSpeech, UploadedFile,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docquery", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the completion and speech provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = docquery_core::config::DEFAULT_API_BASE_URL)]
    base_url: String,

    /// Model for text-only prompts
    #[arg(long, env = "DOCQUERY_CHAT_MODEL", default_value = "gpt-4o-mini")]
    chat_model: String,

    /// Model for prompts that carry images
    #[arg(long, env = "DOCQUERY_VISION_MODEL", default_value = "gpt-4o")]
    vision_model: String,

    /// Speech-to-text model
    #[arg(long, env = "DOCQUERY_TRANSCRIPTION_MODEL", default_value = "whisper-1")]
    transcription_model: String,

    /// Text-to-speech model
    #[arg(long, env = "DOCQUERY_SPEECH_MODEL", default_value = "tts-1")]
    speech_model: String,

    /// Seconds before a completion call is abandoned
    #[arg(long, env = "DOCQUERY_COMPLETION_TIMEOUT", default_value = "60")]
    completion_timeout: u64,

    /// Seconds before a single file extraction is abandoned
    #[arg(long, env = "DOCQUERY_EXTRACTION_TIMEOUT", default_value = "120")]
    extraction_timeout: u64,

    /// Files extracted in parallel
    #[arg(long, env = "DOCQUERY_MAX_CONCURRENT_EXTRACTIONS", default_value = "4")]
    max_concurrent_extractions: usize,

    /// Tesseract language packs, e.g. `eng+hin+ara`
    #[arg(long, env = "DOCQUERY_OCR_LANGUAGES", default_value = "eng")]
    ocr_languages: String,
}

#[derive(Subcommand)]
enum Command {
    /// Extract the given files and optionally answer a question about them.
    Ask {
        /// Document or image to upload; repeat for several files.
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
        /// Question grounded in the uploaded files.
        #[arg(long)]
        query: Option<String>,
        /// JSON file with prior turns: `[{"user": .., "document": ..}, ..]`.
        #[arg(long)]
        history: Option<PathBuf>,
        /// Response language (english, hindi, arabic).
        #[arg(long, default_value = "english")]
        language: String,
    },
    /// Plain chat without documents.
    Chat {
        #[arg(long)]
        prompt: String,
        /// JSON file with prior turns: `[{"user": .., "ai": ..}, ..]`.
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long, default_value = "english")]
        language: String,
    },
    /// Transcribe an audio file.
    Transcribe {
        #[arg(long)]
        audio: PathBuf,
        #[arg(long, default_value = "english")]
        language: String,
    },
    /// Synthesize speech into a WAV file.
    Speak {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "english")]
        language: String,
        #[arg(long, default_value = "response.wav")]
        out: PathBuf,
    },
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            api_key: self.api_key.clone(),
            api_base_url: self.base_url.clone(),
            chat_model: self.chat_model.clone(),
            vision_model: self.vision_model.clone(),
            transcription_model: self.transcription_model.clone(),
            speech_model: self.speech_model.clone(),
            completion_timeout: Duration::from_secs(self.completion_timeout),
            extraction_timeout: Duration::from_secs(self.extraction_timeout),
            max_concurrent_extractions: self.max_concurrent_extractions,
            ..EngineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config();
    config.validate().context("invalid configuration")?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        chat_model = %config.chat_model,
        vision_model = %config.vision_model,
        "docquery boot"
    );

    let extractor = Extractor::new(
        Arc::new(LopdfExtractor),
        Arc::new(DocxRsExtractor),
        Arc::new(TesseractOcr {
            languages: cli.ocr_languages.clone(),
            ..TesseractOcr::default()
        }),
    );
    let classifier = HeuristicClassifier::new(config.classifier.clone())?;
    let completion = OpenAiCompletionClient::new(&config.api_base_url, config.api_key.clone());
    let speech = OpenAiSpeechClient::new(
        &config.api_base_url,
        config.api_key.clone(),
        config.transcription_model.clone(),
        config.speech_model.clone(),
    );
    let orchestrator = QueryOrchestrator::new(completion, classifier, extractor, config);

    match cli.command {
        Command::Ask {
            files,
            query,
            history,
            language,
        } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(read_upload(path).await?);
            }
            let history = load_history(history.as_deref()).await?;

            let response = orchestrator
                .ingest(uploads, query.as_deref(), history, Language::from_name(&language))
                .await
                .map_err(report_error)?;

            for skipped in &response.skipped {
                warn!(filename = %skipped.filename, reason = %skipped.reason, "skipped file");
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Chat {
            prompt,
            history,
            language,
        } => {
            let request = PlainChatRequest {
                prompt,
                history: load_history(history.as_deref()).await?,
                language: Language::from_name(&language),
            };
            let response = orchestrator.chat(&request).await.map_err(report_error)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Transcribe { audio, language } => {
            let bytes = tokio::fs::read(&audio)
                .await
                .with_context(|| format!("failed to read {}", audio.display()))?;
            let transcription = speech
                .transcribe(&bytes, Language::from_name(&language))
                .await?;
            println!("{}", serde_json::to_string_pretty(&transcription)?);
        }
        Command::Speak {
            text,
            language,
            out,
        } => {
            let audio = speech.synthesize(&text, Language::from_name(&language)).await?;
            tokio::fs::write(&out, &audio)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), bytes = audio.len(), "speech written");
        }
    }

    Ok(())
}

async fn read_upload(path: &Path) -> anyhow::Result<UploadedFile> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("path has no file name: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(UploadedFile::new(filename, bytes))
}

async fn load_history(path: Option<&Path>) -> anyhow::Result<Vec<ChatTurn>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read history {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid history in {}", path.display()))
}

fn report_error(error: QueryError) -> anyhow::Error {
    anyhow::anyhow!("[{}] {}", error.kind(), error)
}
