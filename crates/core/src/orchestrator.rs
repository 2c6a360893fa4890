use crate::classifier::{
    clarification_message, HeuristicClassifier, QueryClassifier, ACKNOWLEDGMENT_REPLY,
};
use crate::completion::CompletionService;
use crate::config::EngineConfig;
use crate::error::{CompletionError, ConfigError, QueryError};
use crate::extractor::Extractor;
use crate::history::partition;
use crate::ingest::{ingest_batch, BatchLimits};
use crate::models::{
    BatchResponse, ChatTurn, ConversationMode, Document, Language, PlainChatRequest,
    PlainChatResponse, QueryClass, QueryRequest, QueryResponse, UploadedFile,
};
use crate::prompt::{assemble, assemble_plain, PromptMode, PromptPlan};
use chrono::Utc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Runs extraction, the query gate, prompt assembly, and the completion call
/// for one request at a time. Holds no per-request state.
pub struct QueryOrchestrator<C, Q = HeuristicClassifier>
where
    C: CompletionService,
    Q: QueryClassifier,
{
    completion: C,
    classifier: Q,
    extractor: Extractor,
    config: EngineConfig,
}

impl<C> QueryOrchestrator<C, HeuristicClassifier>
where
    C: CompletionService,
{
    pub fn with_defaults(completion: C, config: EngineConfig) -> Result<Self, ConfigError> {
        let classifier = HeuristicClassifier::new(config.classifier.clone())?;
        Ok(Self::new(completion, classifier, Extractor::default(), config))
    }
}

impl<C, Q> QueryOrchestrator<C, Q>
where
    C: CompletionService,
    Q: QueryClassifier,
{
    pub fn new(completion: C, classifier: Q, extractor: Extractor, config: EngineConfig) -> Self {
        Self {
            completion,
            classifier,
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answers `request.query` from `request.documents` only.
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
        let span = info_span!("answer", request_id = %Uuid::new_v4());
        self.answer_grounded(request).instrument(span).await
    }

    async fn answer_grounded(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if request.documents.is_empty() {
            return Err(QueryError::NoDocuments);
        }

        let classification = self.classifier.classify(query);
        let response = match classification {
            QueryClass::GenericAck => {
                info!("generic acknowledgment, skipping completion");
                ACKNOWLEDGMENT_REPLY.to_string()
            }
            QueryClass::Unclear => {
                info!("unclear query, asking for clarification");
                clarification_message(request.language).to_string()
            }
            QueryClass::Meaningful => {
                let history = partition(&request.history, ConversationMode::Document);
                let plan = assemble(query, &request.documents, &history, request.language);
                let model = match plan.mode {
                    PromptMode::Text => &self.config.chat_model,
                    PromptMode::Vision => &self.config.vision_model,
                };
                debug!(
                    mode = ?plan.mode,
                    model = %model,
                    documents = request.documents.len(),
                    history_turns = history.len(),
                    "assembled grounded prompt"
                );
                let answer = self.complete(&plan, model).await?;
                info!(chars = answer.len(), "grounded answer generated");
                answer
            }
        };

        Ok(QueryResponse {
            response,
            language: request.language,
            classification,
            documents: request.documents.iter().map(Document::summary).collect(),
            generated_at: Utc::now(),
        })
    }

    /// Ungrounded chat: no documents and no query gate.
    pub async fn chat(&self, request: &PlainChatRequest) -> Result<PlainChatResponse, QueryError> {
        let span = info_span!("chat", request_id = %Uuid::new_v4());
        self.chat_plain(request).instrument(span).await
    }

    async fn chat_plain(&self, request: &PlainChatRequest) -> Result<PlainChatResponse, QueryError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let history = partition(&request.history, ConversationMode::Plain);
        let plan = assemble_plain(prompt, &history, request.language);
        let response = self.complete(&plan, &self.config.chat_model).await?;
        info!(chars = response.len(), "chat answer generated");

        Ok(PlainChatResponse {
            response,
            language: request.language,
        })
    }

    /// Extracts a batch of uploads and, when a question comes with it,
    /// answers it against the surviving documents.
    pub async fn ingest(
        &self,
        files: Vec<UploadedFile>,
        query: Option<&str>,
        history: Vec<ChatTurn>,
        language: Language,
    ) -> Result<BatchResponse, QueryError> {
        let span = info_span!("ingest", request_id = %Uuid::new_v4(), files = files.len());
        self.ingest_and_answer(files, query, history, language)
            .instrument(span)
            .await
    }

    async fn ingest_and_answer(
        &self,
        files: Vec<UploadedFile>,
        query: Option<&str>,
        history: Vec<ChatTurn>,
        language: Language,
    ) -> Result<BatchResponse, QueryError> {
        let limits = BatchLimits {
            max_concurrency: self.config.max_concurrent_extractions,
            timeout: self.config.extraction_timeout,
        };
        let report = ingest_batch(&self.extractor, files, limits).await?;
        let documents = report.documents.iter().map(Document::summary).collect();

        match query.map(str::trim).filter(|query| !query.is_empty()) {
            Some(query) => {
                let request = QueryRequest {
                    query: query.to_string(),
                    documents: report.documents,
                    history,
                    language,
                };
                let answer = self.answer_grounded(&request).await?;
                Ok(BatchResponse {
                    message: answer.response.clone(),
                    documents,
                    answer: Some(answer),
                    skipped: report.skipped,
                })
            }
            None => Ok(BatchResponse {
                message: format!("Processed {} document(s).", report.documents.len()),
                documents,
                answer: None,
                skipped: report.skipped,
            }),
        }
    }

    async fn complete(&self, plan: &PromptPlan, model: &str) -> Result<String, QueryError> {
        let timeout = self.config.completion_timeout;
        let outcome = tokio::time::timeout(timeout, self.completion.complete(plan, model))
            .await
            .unwrap_or(Err(CompletionError::Timeout(timeout)));
        outcome.map_err(QueryError::from)
    }
}
