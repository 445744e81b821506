//! Propagator-facing wrapper around one drop publish.

use crate::operations::{PublishDropOperation, PublishDropOperationRequest};
use crate::{DropError, JobEvent, JobParallelism, JobStatus, Result, SagaState};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use ulid::Ulid;

pub struct DropPublishJob {
    operation: PublishDropOperation,
    path: String,
    events: mpsc::UnboundedSender<JobEvent>,
    state_tx: Arc<watch::Sender<SagaState>>,
    state_rx: watch::Receiver<SagaState>,
    handle: Option<JoinHandle<JobStatus>>,
}

impl DropPublishJob {
    /// Creates the job together with the receiver of its notifications.
    pub fn new(
        operation: PublishDropOperation,
        path: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SagaState::NotStarted);

        let job = Self {
            operation,
            path: path.into(),
            events,
            state_tx: Arc::new(state_tx),
            state_rx,
            handle: None,
        };
        (job, receiver)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> SagaState {
        *self.state_rx.borrow()
    }

    pub fn parallelism(&self) -> JobParallelism {
        JobParallelism::WaitForFinished
    }

    /// Spawns the saga. Only valid once, from `NotStarted`.
    ///
    /// Must be called from within a tokio runtime: the saga runs on a task
    /// spawned with [`tokio::spawn`], which panics without one. The same holds
    /// for [`DropPublishJob::schedule_self_or_child`] on a job not yet started.
    pub fn start(&mut self) -> Result<()> {
        let state = self.state();
        if state != SagaState::NotStarted {
            return Err(DropError::InvalidTransition(format!(
                "cannot start drop publish job for path={} in state {:?}",
                self.path, state
            )));
        }

        self.state_tx.send_replace(SagaState::Running);

        let operation = self.operation.clone();
        let events = self.events.clone();
        let state_tx = self.state_tx.clone();
        let span = tracing::info_span!("publish_drop", path = %self.path, run_id = %Ulid::new());
        let request = PublishDropOperationRequest::new(self.path.clone())
            .with_events(events.clone())
            .with_span(span);

        self.handle = Some(tokio::spawn(async move {
            let status = match AssertUnwindSafe(operation.run(request)).catch_unwind().await {
                Ok(result) => result.status,
                Err(_) => {
                    tracing::error!("drop publish task panicked");
                    JobStatus::NormalError
                }
            };

            state_tx.send_replace(SagaState::Finished);
            let _ = events.send(JobEvent::Finished(status));
            status
        }));

        Ok(())
    }

    /// Returns whether work remains; starts the job on first call, so the
    /// first call needs a tokio runtime like [`DropPublishJob::start`].
    pub fn schedule_self_or_child(&mut self) -> bool {
        match self.state() {
            SagaState::Finished => false,
            SagaState::Running => true,
            SagaState::NotStarted => {
                if let Err(error) = self.start() {
                    tracing::warn!("failed to start drop publish job: {}", error);
                }
                true
            }
        }
    }

    /// Waits for the terminal outcome of a started job.
    pub async fn wait(&mut self) -> Result<JobStatus> {
        let handle = self.handle.take().ok_or_else(|| {
            DropError::InvalidTransition(format!(
                "drop publish job for path={} is not running",
                self.path
            ))
        })?;

        match handle.await {
            Ok(status) => Ok(status),
            Err(error) => {
                tracing::error!("drop publish task failed: {}", error);
                self.state_tx.send_replace(SagaState::Finished);
                Ok(JobStatus::NormalError)
            }
        }
    }
}
