// ABOUTME: Generic fixed-interval status poller for long-running remote jobs
// ABOUTME: Drives observer callbacks until a terminal state and exposes a cancellation handle

//! The poller issues status fetches for one job strictly one after another,
//! sleeping a fixed interval between them. Every snapshot is handed to
//! [`PollObserver::on_update`]; a completed snapshot is then handed to
//! [`PollObserver::on_complete`], while a failed snapshot or a fetch error
//! goes to [`PollObserver::on_error`]. Exactly one of those two terminal
//! callbacks fires per loop, unless the loop is cancelled first.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::models::{GenerationStatus, JobId, JobState};
use crate::error::ClientError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Anything that can report the current status of a job.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    type Status: Send + 'static;

    async fn fetch_status(&self, job_id: &JobId) -> Result<Self::Status, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Completed,
    Failed,
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed,
    Errored,
    Cancelled,
}

pub trait PollObserver<T>: Send + 'static {
    fn on_update(&mut self, status: &T);
    fn on_complete(&mut self, status: T);
    fn on_error(&mut self, error: ClientError);
}

/// Observer built from three closures.
pub struct Callbacks<U, C, E> {
    pub on_update: U,
    pub on_complete: C,
    pub on_error: E,
}

impl<T, U, C, E> PollObserver<T> for Callbacks<U, C, E>
where
    U: FnMut(&T) + Send + 'static,
    C: FnMut(T) + Send + 'static,
    E: FnMut(ClientError) + Send + 'static,
{
    fn on_update(&mut self, status: &T) {
        (self.on_update)(status)
    }

    fn on_complete(&mut self, status: T) {
        (self.on_complete)(status)
    }

    fn on_error(&mut self, error: ClientError) {
        (self.on_error)(error)
    }
}

/// Classifier for generation job snapshots.
///
/// Unknown status strings stay non-terminal; they are logged so that a
/// contract change on the server shows up instead of looping silently.
pub fn generation_terminal(status: &GenerationStatus) -> Option<Terminal> {
    match &status.status {
        JobState::Completed => Some(Terminal::Completed),
        JobState::Failed => Some(Terminal::Failed),
        JobState::Unknown(raw) => {
            tracing::warn!(
                job_id = %status.id,
                status = %raw,
                "Unrecognized job status, treating as still running"
            );
            None
        }
        JobState::Pending | JobState::Generating | JobState::Reviewing => None,
    }
}

/// Builds the error reported for a snapshot classified as failed.
pub type FailureDetail<S> = fn(&S) -> Option<String>;

pub struct PollingClient<S: StatusSource> {
    source: Arc<S>,
    interval: Duration,
    classify: fn(&S::Status) -> Option<Terminal>,
    failure_detail: FailureDetail<S::Status>,
}

impl<S: StatusSource> Clone for PollingClient<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            interval: self.interval,
            classify: self.classify,
            failure_detail: self.failure_detail,
        }
    }
}

impl<S> PollingClient<S>
where
    S: StatusSource<Status = GenerationStatus>,
{
    /// Poller for backend-generation jobs.
    pub fn for_generation(source: Arc<S>, interval: Duration) -> Self {
        Self::new(source, interval, generation_terminal)
            .with_failure_detail(|status| status.error.clone())
    }
}

impl<S: StatusSource> PollingClient<S> {
    pub fn new(
        source: Arc<S>,
        interval: Duration,
        classify: fn(&S::Status) -> Option<Terminal>,
    ) -> Self {
        Self {
            source,
            interval,
            classify,
            failure_detail: |_| None,
        }
    }

    pub fn with_failure_detail(mut self, failure_detail: FailureDetail<S::Status>) -> Self {
        self.failure_detail = failure_detail;
        self
    }

    /// Spawns the poll loop and returns a handle that can stop it.
    ///
    /// Dropping the handle leaves the loop running; call
    /// [`PollHandle::cancel`] on teardown.
    pub fn poll<O>(&self, job_id: JobId, observer: O) -> PollHandle
    where
        O: PollObserver<S::Status>,
    {
        let cancel = CancellationToken::new();
        let poller = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { poller.run(&job_id, observer, &token).await });

        PollHandle { cancel, task }
    }

    /// Runs the poll loop on the current task until a terminal state, an
    /// error, or cancellation.
    pub async fn run<O>(
        &self,
        job_id: &JobId,
        mut observer: O,
        cancel: &CancellationToken,
    ) -> PollOutcome
    where
        O: PollObserver<S::Status>,
    {
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(job_id = %job_id, attempt, "Polling cancelled");
                return PollOutcome::Cancelled;
            }

            attempt += 1;
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(job_id = %job_id, attempt, "Polling cancelled during fetch");
                    return PollOutcome::Cancelled;
                }
                result = self.source.fetch_status(job_id) => result,
            };

            // The fetch may have resolved after a cancel landed.
            if cancel.is_cancelled() {
                tracing::debug!(job_id = %job_id, attempt, "Polling cancelled after fetch");
                return PollOutcome::Cancelled;
            }

            let status = match fetched {
                Ok(status) => status,
                Err(err) => {
                    tracing::warn!(job_id = %job_id, attempt, error = %err, "Status fetch failed");
                    observer.on_error(err);
                    return PollOutcome::Errored;
                }
            };

            observer.on_update(&status);

            match (self.classify)(&status) {
                Some(Terminal::Completed) => {
                    tracing::info!(job_id = %job_id, attempt, "Job completed");
                    observer.on_complete(status);
                    return PollOutcome::Completed;
                }
                Some(Terminal::Failed) => {
                    let detail = (self.failure_detail)(&status);
                    tracing::warn!(job_id = %job_id, attempt, detail = ?detail, "Job failed");
                    observer.on_error(ClientError::GenerationFailed { detail });
                    return PollOutcome::Failed;
                }
                None => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(job_id = %job_id, attempt, "Polling cancelled while waiting");
                    return PollOutcome::Cancelled;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Polls inline, calling `callback` on every snapshot, and returns the
    /// completed snapshot or the error that ended the loop.
    pub async fn poll_until_complete(
        &self,
        job_id: &JobId,
        callback: impl FnMut(&S::Status) + Send + 'static,
    ) -> Result<S::Status, ClientError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));
        let tx_err = Arc::clone(&tx);

        let observer = Callbacks {
            on_update: callback,
            on_complete: move |status: S::Status| send_once(&tx, Ok(status)),
            on_error: move |err: ClientError| send_once(&tx_err, Err(err)),
        };

        let cancel = CancellationToken::new();
        self.run(job_id, observer, &cancel).await;

        rx.await
            .unwrap_or_else(|_| Err(ClientError::Transport("poll loop ended early".to_string())))
    }
}

type ResultSender<T> = Arc<std::sync::Mutex<Option<tokio::sync::oneshot::Sender<T>>>>;

fn send_once<T>(slot: &ResultSender<T>, value: T) {
    if let Some(tx) = slot.lock().ok().and_then(|mut guard| guard.take()) {
        let _ = tx.send(value);
    }
}

/// Handle to a spawned poll loop.
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Stops the loop before its next fetch or callback.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this loop, for wiring into a parent shutdown signal.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the loop to end.
    pub async fn join(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => PollOutcome::Cancelled,
            Err(err) => {
                tracing::error!(error = %err, "Poll task panicked");
                PollOutcome::Errored
            }
        }
    }
}
