//! Background execution of asynchronous actions
//!
//! Actions marked `runAsynchronously` are handed to the [`ChannelJobQueue`]
//! as a serialized copy of the execution context. The engine's worker task
//! drains the channel and runs each action on its own deserialized copy, so
//! nothing a background action does is visible to the invocation that queued
//! it. [`PendingJobs`] counts jobs from enqueue until their run ends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ae_core::ErrorData;
use ae_providers::{BackgroundActionJob, JobQueue};
use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tracing::trace;

/// Receiving half drained by the engine's worker
pub type JobReceiver = mpsc::UnboundedReceiver<BackgroundActionJob>;

/// Number of jobs queued or running
#[derive(Debug, Default)]
pub struct PendingJobs {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingJobs {
    fn added(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark one job as run or discarded
    pub fn finished(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until no job is queued or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent `finished` is not missed
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Job queue feeding an in-process channel
#[derive(Debug, Clone)]
pub struct ChannelJobQueue {
    sender: mpsc::UnboundedSender<BackgroundActionJob>,
    pending: Arc<PendingJobs>,
}

impl ChannelJobQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            sender,
            pending: Arc::new(PendingJobs::default()),
        };
        (queue, receiver)
    }

    /// Counter shared with the worker that runs the jobs
    pub fn pending(&self) -> Arc<PendingJobs> {
        Arc::clone(&self.pending)
    }
}

#[async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, job: BackgroundActionJob) -> Result<(), ErrorData> {
        trace!(
            automation_alias = %job.automation_alias,
            action = %job.action,
            "Enqueueing background action"
        );
        self.pending.added();
        self.sender.send(job).map_err(|_| {
            self.pending.finished();
            ErrorData::engine_error("The background worker has stopped.")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::codes;
    use ae_data::ActionLocation;

    fn job() -> BackgroundActionJob {
        BackgroundActionJob {
            automation_alias: "quotes".into(),
            action: ActionLocation::root("notify"),
            snapshot: "{}".into(),
        }
    }

    #[tokio::test]
    async fn test_jobs_arrive_in_order() {
        let (queue, mut receiver) = ChannelJobQueue::new();
        queue.enqueue(job()).await.unwrap();
        let mut second = job();
        second.automation_alias = "policies".into();
        queue.enqueue(second).await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().automation_alias, "quotes");
        assert_eq!(receiver.recv().await.unwrap().automation_alias, "policies");
        assert_eq!(queue.pending().len(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stopped() {
        let (queue, receiver) = ChannelJobQueue::new();
        drop(receiver);
        let err = queue.enqueue(job()).await.unwrap_err();
        assert_eq!(err.code, codes::ENGINE_ERROR);
        assert!(queue.pending().is_empty());
    }

    #[tokio::test]
    async fn test_wait_idle_returns_when_last_job_finishes() {
        let (queue, _receiver) = ChannelJobQueue::new();
        let pending = queue.pending();
        pending.wait_idle().await;

        queue.enqueue(job()).await.unwrap();
        queue.enqueue(job()).await.unwrap();
        let waiter = tokio::spawn({
            let pending = Arc::clone(&pending);
            async move { pending.wait_idle().await }
        });

        pending.finished();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        pending.finished();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
