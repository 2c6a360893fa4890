use crate::error::{ExtractError, QueryError};
use crate::extractor::Extractor;
use crate::models::{Document, IngestionReport, SkippedFile, UploadedFile};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    pub max_concurrency: usize,
    pub timeout: Duration,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Extracts a single upload, bounded by `timeout`.
pub async fn extract_file(
    extractor: &Extractor,
    file: UploadedFile,
    timeout: Duration,
) -> Result<Document, ExtractError> {
    extract_holding(extractor, file, timeout, ()).await
}

/// `permit` stays alive until the extraction work itself ends, which for a
/// blocking parser can be after `timeout` has already failed the file.
async fn extract_holding<G>(
    extractor: &Extractor,
    file: UploadedFile,
    timeout: Duration,
    permit: G,
) -> Result<Document, ExtractError>
where
    G: Send + 'static,
{
    let UploadedFile { filename, bytes } = file;
    let extraction = tokio::time::timeout(
        timeout,
        extractor.extract_holding(&filename, bytes, permit),
    )
    .await
    .map_err(|_| ExtractError::Timeout(timeout))??;

    Ok(Document::from_extraction(filename, extraction))
}

/// Extracts every upload concurrently and keeps the survivors in upload
/// order. A failing file is skipped, never fatal to its siblings.
pub async fn ingest_batch(
    extractor: &Extractor,
    files: Vec<UploadedFile>,
    limits: BatchLimits,
) -> Result<IngestionReport, QueryError> {
    if files.is_empty() {
        return Err(QueryError::NoDocuments);
    }

    let filenames = files
        .iter()
        .map(|file| file.filename.clone())
        .collect::<Vec<_>>();
    let permits = Arc::new(Semaphore::new(limits.max_concurrency.max(1)));
    let mut workers = JoinSet::new();

    for (index, file) in files.into_iter().enumerate() {
        let extractor = extractor.clone();
        let permits = Arc::clone(&permits);
        workers.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(permit) => extract_holding(&extractor, file, limits.timeout, permit).await,
                Err(error) => Err(ExtractError::Worker(error.to_string())),
            };
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<Result<Document, ExtractError>>> =
        filenames.iter().map(|_| None).collect();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(error) => warn!(error = %error, "extraction task aborted"),
        }
    }

    let mut documents = Vec::new();
    let mut skipped = Vec::new();
    for (filename, slot) in filenames.into_iter().zip(slots) {
        let reason = match slot {
            Some(Ok(document)) if document.is_image() || !document.content().trim().is_empty() => {
                documents.push(document);
                continue;
            }
            Some(Ok(_)) => "no text could be extracted".to_string(),
            Some(Err(error)) => QueryError::extraction(&filename, error).to_string(),
            None => "extraction task aborted".to_string(),
        };

        warn!(filename = %filename, reason = %reason, "skipped file");
        skipped.push(SkippedFile { filename, reason });
    }

    if documents.is_empty() {
        return Err(QueryError::NoDocumentsProcessed);
    }

    info!(
        processed = documents.len(),
        skipped = skipped.len(),
        "batch extraction finished"
    );

    Ok(IngestionReport { documents, skipped })
}
