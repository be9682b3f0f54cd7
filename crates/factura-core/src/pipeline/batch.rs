//! Bounded batch execution over a validated request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::result::FileOutcome;
use crate::request::IngestRequest;

use super::{DocumentProcessor, ProcessOptions};

/// Runs the files of a request through a shared processor, at most
/// `workers` at a time, each under the per-file deadline.
pub struct BatchRunner {
    processor: Arc<DocumentProcessor>,
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(processor: Arc<DocumentProcessor>) -> Self {
        Self {
            processor,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops scheduling when set. Files not yet started
    /// report a cancellation error; files already running finish.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Validate the request and process every file.
    ///
    /// The returned vector is index-aligned with `request.files`; a
    /// failing file becomes an inline error outcome and never affects
    /// its siblings.
    pub async fn run(&self, request: IngestRequest) -> Result<Vec<FileOutcome>> {
        request.validate(&self.processor.config().limits)?;

        let workers = self.processor.config().worker_count();
        let deadline = Duration::from_secs(self.processor.config().batch.timeout_secs);
        let semaphore = Arc::new(Semaphore::new(workers));

        info!(
            "batch of {} files for vendor '{}': {} workers, {}s per-file deadline",
            request.files.len(),
            request.vendor,
            workers,
            deadline.as_secs()
        );

        let options = ProcessOptions {
            vendor: Some(request.vendor.clone()),
            force_ocr: request.force_ocr,
            language: request.language,
        };

        let jobs = request.files.into_iter().map(|file| {
            let processor = Arc::clone(&self.processor);
            let semaphore = Arc::clone(&semaphore);
            let cancel = Arc::clone(&self.cancel);
            let options = options.clone();

            async move {
                if cancel.load(Ordering::SeqCst) {
                    return FileOutcome::failed(&file.filename, "batch cancelled before start");
                }
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return FileOutcome::failed(&file.filename, "worker pool closed"),
                };

                let filename = file.filename.clone();
                // The deadline bounds how long we wait, not the blocking
                // thread itself; a timed-out job finishes in the
                // background without a slot in the results.
                let worker = tokio::task::spawn_blocking(move || {
                    processor.process(&file.filename, &file.bytes, &options)
                });
                match tokio::time::timeout(deadline, worker).await {
                    Err(_) => {
                        warn!("file '{}' exceeded the {}s deadline", filename, deadline.as_secs());
                        FileOutcome::failed(
                            &filename,
                            format!("processing exceeded {}s deadline", deadline.as_secs()),
                        )
                    }
                    Ok(Err(join_err)) => {
                        warn!("file '{}' worker failed: {}", filename, join_err);
                        FileOutcome::failed(&filename, format!("worker failed: {join_err}"))
                    }
                    Ok(Ok(Ok(result))) => FileOutcome::Ok(Box::new(result)),
                    Ok(Ok(Err(err))) => {
                        warn!("file '{}' failed: {}", filename, err);
                        FileOutcome::failed(&filename, err)
                    }
                }
            }
        });

        // buffered keeps outcomes in submission order.
        let outcomes: Vec<FileOutcome> = stream::iter(jobs).buffered(workers).collect().await;

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            "batch finished: {} ok, {} failed",
            outcomes.len() - failed,
            failed
        );
        Ok(outcomes)
    }
}
