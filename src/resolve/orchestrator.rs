//! Bounded, fail-soft fan-out of volume detail fetches.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogError, SubjectFetcher};
use crate::config::FetchConfig;
use crate::models::{
    FetchFailure, FetchFailureKind, FetchReport, FetchResult, FetchTask, FetchedVolume,
    VolumeEntry,
};
use crate::utils::{with_retry, RetryConfig, RetryResult};

/// Knobs for one fan-out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOptions {
    /// Maximum fetches in flight
    pub concurrency: usize,
    pub retry: RetryConfig,
    /// Budget for one volume, retries included
    pub task_timeout: Duration,
    /// Budget for the whole batch
    pub batch_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl FetchOptions {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            concurrency: config.max_concurrent,
            retry: config.retry(),
            task_timeout: config.task_timeout(),
            batch_timeout: config.batch_timeout(),
        }
    }
}

/// Fetches the detail of every volume with a fixed pool of workers
///
/// Workers pull tasks from a shared queue and report over a channel; the
/// report is re-sorted into discovery order before it is returned. A failing
/// volume never fails the batch.
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    fetcher: SubjectFetcher,
    options: FetchOptions,
}

impl FetchOrchestrator {
    pub fn new(fetcher: SubjectFetcher, options: FetchOptions) -> Self {
        Self { fetcher, options }
    }

    /// Fetch every volume, returning successes and failures in discovery order
    pub async fn fetch_all(&self, volumes: &[VolumeEntry]) -> FetchReport {
        let total = volumes.len();
        if total == 0 {
            return FetchReport::default();
        }

        let queue: Arc<Mutex<VecDeque<FetchTask>>> = Arc::new(Mutex::new(
            volumes
                .iter()
                .cloned()
                .enumerate()
                .map(|(position, volume)| FetchTask { position, volume })
                .collect(),
        ));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, FetchResult)>();

        let workers = self.options.concurrency.clamp(1, total);
        tracing::info!("Fetching {} volumes with {} workers", total, workers);

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let fetcher = self.fetcher.clone();
            let options = self.options;

            pool.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(task) = queue.lock().await.pop_front() else {
                        break;
                    };
                    tracing::debug!(
                        "Worker {} fetching volume {} ({})",
                        worker,
                        task.volume.subject_id,
                        task.volume.title
                    );
                    let result = run_task(&fetcher, &task, options, &cancel).await;
                    if tx.send((task.position, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut results: Vec<Option<FetchResult>> = vec![None; total];
        let deadline = tokio::time::sleep(self.options.batch_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some((position, result)) => results[position] = Some(result),
                    None => break,
                },
                _ = &mut deadline, if !cancel.is_cancelled() => {
                    let outstanding = results.iter().filter(|r| r.is_none()).count();
                    tracing::warn!(
                        "Batch timeout after {:?}, cancelling {} outstanding volumes",
                        self.options.batch_timeout,
                        outstanding
                    );
                    cancel.cancel();
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Fetch worker ended abnormally: {}", e);
            }
        }

        let mut report = FetchReport::default();
        for (volume, result) in volumes.iter().zip(results) {
            match result {
                Some(Ok(fetched)) => report.fetched.push(fetched),
                Some(Err(failure)) => report.failed.push(failure),
                None => report.failed.push(FetchFailure {
                    volume: volume.clone(),
                    kind: FetchFailureKind::Cancelled,
                    attempts: 0,
                }),
            }
        }

        if report.is_complete() {
            tracing::info!("Fetched all {} volumes", total);
        } else {
            tracing::warn!(
                "Fetched {} of {} volumes; failed: {:?}",
                report.fetched.len(),
                total,
                report.failed_ids()
            );
        }
        report
    }
}

/// Fetch one volume under the task timeout, retrying transport errors
async fn run_task(
    fetcher: &SubjectFetcher,
    task: &FetchTask,
    options: FetchOptions,
    cancel: &CancellationToken,
) -> FetchResult {
    let subject_id = task.volume.subject_id;
    let started = AtomicU32::new(0);

    let outcome = tokio::time::timeout(
        options.task_timeout,
        with_retry(options.retry, cancel, || {
            started.fetch_add(1, Ordering::Relaxed);
            fetcher.fetch(subject_id)
        }),
    )
    .await;

    let failure = |kind: FetchFailureKind, attempts: u32| FetchFailure {
        volume: task.volume.clone(),
        kind,
        attempts,
    };

    match outcome {
        Ok(RetryResult::Success { value, attempts }) => Ok(FetchedVolume {
            volume: task.volume.clone(),
            detail: value,
            attempts,
        }),
        Ok(RetryResult::TransientFailure { error, attempts })
        | Ok(RetryResult::PermanentFailure { error, attempts }) => {
            tracing::debug!("Volume {} failed after {} attempts: {}", subject_id, attempts, error);
            Err(failure(failure_kind(error), attempts))
        }
        Ok(RetryResult::Cancelled { attempts }) => {
            Err(failure(FetchFailureKind::Cancelled, attempts))
        }
        Err(_) => {
            tracing::warn!(
                "Volume {} timed out after {:?}",
                subject_id,
                options.task_timeout
            );
            Err(failure(
                FetchFailureKind::TimedOut,
                started.load(Ordering::Relaxed),
            ))
        }
    }
}

fn failure_kind(error: CatalogError) -> FetchFailureKind {
    match error {
        CatalogError::Transport(message) => FetchFailureKind::Transport(message),
        CatalogError::NotFound(_) | CatalogError::EmptyResult(_) => FetchFailureKind::NotFound,
        CatalogError::Parse(message) | CatalogError::InvalidQuery(message) => {
            FetchFailureKind::Parse(message)
        }
    }
}
