use crate::config::IndexingOptions;
use crate::error::PipelineError;
use crate::extractor::ExtractorDispatch;
use crate::models::{DocumentMetadata, IndexedDocument, RunStats};
use crate::traits::{DocumentSource, SearchIndex};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// (1-based position, total, document name)
pub type ProgressHook = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

type WorkItem = (usize, DocumentMetadata);

#[derive(Debug)]
enum Outcome {
    Ready(Box<IndexedDocument>),
    Skipped,
    Failed,
}

pub struct IndexingPipeline<S, I> {
    source: Arc<S>,
    index: Arc<I>,
    extractor: Arc<ExtractorDispatch>,
    options: IndexingOptions,
}

impl<S, I> IndexingPipeline<S, I>
where
    S: DocumentSource + 'static,
    I: SearchIndex + 'static,
{
    pub fn new(
        source: Arc<S>,
        index: Arc<I>,
        extractor: Arc<ExtractorDispatch>,
        options: IndexingOptions,
    ) -> Self {
        Self {
            source,
            index,
            extractor,
            options,
        }
    }

    pub async fn run(
        &self,
        progress: Option<ProgressHook>,
        cancel: CancellationToken,
    ) -> Result<RunStats, PipelineError> {
        let documents = self.source.list_all_documents().await?;
        let mut stats = RunStats {
            total: documents.len(),
            ..RunStats::default()
        };
        info!(total = stats.total, "starting indexing run");

        if documents.is_empty() {
            return Ok(stats);
        }

        let capacity = self.options.queue_capacity.max(1);
        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<Outcome>(capacity);

        let producer = spawn_producer(documents, work_tx, cancel.clone());
        let workers = self.spawn_workers(work_rx, result_tx, stats.total, progress, &cancel);

        let batch_size = self.options.batch_size.max(1);
        let mut pending: Vec<IndexedDocument> = Vec::with_capacity(batch_size);

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = result_rx.recv() => outcome,
            };
            let Some(outcome) = outcome else {
                break;
            };

            match outcome {
                Outcome::Ready(document) => {
                    pending.push(*document);
                    if pending.len() >= batch_size {
                        let batch = std::mem::replace(&mut pending, Vec::with_capacity(batch_size));
                        self.submit(batch, &mut stats).await;
                    }
                }
                Outcome::Skipped => stats.skipped += 1,
                Outcome::Failed => stats.failed += 1,
            }
        }

        if !pending.is_empty() {
            self.submit(pending, &mut stats).await;
        }

        // Closing the result queue unblocks workers still trying to report.
        drop(result_rx);
        let mut join_error = None;
        for handle in std::iter::once(producer).chain(workers) {
            if let Err(error) = handle.await {
                error!(%error, "indexing task ended abnormally");
                join_error.get_or_insert(error);
            }
        }
        if let Some(error) = join_error {
            return Err(PipelineError::Worker(error.to_string()));
        }

        stats.cancelled = cancel.is_cancelled();
        info!(
            total = stats.total,
            indexed = stats.indexed,
            skipped = stats.skipped,
            failed = stats.failed,
            cancelled = stats.cancelled,
            "indexing run finished"
        );
        Ok(stats)
    }

    fn spawn_workers(
        &self,
        work_rx: mpsc::Receiver<WorkItem>,
        result_tx: mpsc::Sender<Outcome>,
        total: usize,
        progress: Option<ProgressHook>,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let work_rx = Arc::new(Mutex::new(work_rx));
        let count = self.options.workers.max(1);
        let mut handles = Vec::with_capacity(count);

        for _ in 0..count {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let source = Arc::clone(&self.source);
            let extractor = Arc::clone(&self.extractor);
            let progress = progress.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut rx = work_rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            item = rx.recv() => item,
                        }
                    };
                    let Some((position, document)) = item else {
                        break;
                    };

                    match &progress {
                        Some(hook) => hook(position, total, &document.name),
                        None => info!(position, total, document = %document.name, "processing document"),
                    }

                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        outcome = process(source.as_ref(), &extractor, document) => outcome,
                    };

                    if result_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            }));
        }

        handles
    }

    async fn submit(&self, batch: Vec<IndexedDocument>, stats: &mut RunStats) {
        let attempts = self.options.submit_attempts.max(1);

        for attempt in 1..=attempts {
            match self.index.add_documents(&batch).await {
                Ok(()) => {
                    stats.indexed += batch.len();
                    info!(size = batch.len(), indexed = stats.indexed, "batch indexed");
                    return;
                }
                Err(error) if attempt < attempts => {
                    warn!(attempt, size = batch.len(), %error, "batch submission failed, retrying");
                    sleep(self.options.submit_backoff * attempt as u32).await;
                }
                Err(error) => {
                    error!(attempts, size = batch.len(), %error, "batch submission failed, giving up");
                    stats.failed += batch.len();
                }
            }
        }
    }
}

fn spawn_producer(
    documents: Vec<DocumentMetadata>,
    work_tx: mpsc::Sender<WorkItem>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for (offset, document) in documents.into_iter().enumerate() {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = work_tx.send((offset + 1, document)) => sent,
            };
            if sent.is_err() {
                break;
            }
        }
    })
}

async fn process<S: DocumentSource + ?Sized>(
    source: &S,
    extractor: &Arc<ExtractorDispatch>,
    document: DocumentMetadata,
) -> Outcome {
    let bytes = match source.fetch_content(&document.composite_id).await {
        Ok(Some(bytes)) if bytes.is_empty() => {
            warn!(id = %document.composite_id, "downloaded content is empty");
            return Outcome::Failed;
        }
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(id = %document.composite_id, "document has no content");
            return Outcome::Failed;
        }
        Err(error) => {
            warn!(id = %document.composite_id, %error, "download failed");
            return Outcome::Failed;
        }
    };

    let extractor = Arc::clone(extractor);
    let name = document.name.clone();
    let extraction = match tokio::task::spawn_blocking(move || extractor.extract(&bytes, &name)).await {
        Ok(extraction) => extraction,
        Err(error) => {
            warn!(id = %document.composite_id, %error, "extraction task aborted");
            return Outcome::Skipped;
        }
    };

    let Some(content) = extraction.text.filter(|text| !text.trim().is_empty()) else {
        debug!(id = %document.composite_id, name = %document.name, "no text extracted, skipping");
        return Outcome::Skipped;
    };

    Outcome::Ready(Box::new(IndexedDocument {
        document,
        content,
        page_info: extraction.pages,
    }))
}
