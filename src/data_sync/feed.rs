use crate::data_sync::config::SubscriptionRequest;
use crate::utils::MonitorError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Source of raw block records
///
/// A subscription is opened once and consumed front to back. When the
/// sending side closes, the stream has ended; it is never re-opened.
#[async_trait]
pub trait BlockFeed: Send + Sync {
    async fn subscribe(&self, request: &SubscriptionRequest) -> Result<Subscription, MonitorError>;
}

/// An established subscription
pub struct Subscription {
    blocks: mpsc::Receiver<Value>,
    // Reader task, aborted when the subscription is dropped
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(blocks: mpsc::Receiver<Value>) -> Self {
        Self { blocks, task: None }
    }

    pub fn with_task(blocks: mpsc::Receiver<Value>, task: JoinHandle<()>) -> Self {
        Self { blocks, task: Some(task) }
    }

    /// Next raw record, or `None` once the upstream has ended
    pub async fn next_block(&mut self) -> Option<Value> {
        self.blocks.recv().await
    }

    /// Close after the upstream has ended, letting the reader task finish
    ///
    /// Dropping the subscription instead aborts the reader task.
    pub async fn close(mut self) {
        self.blocks.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Feed reader task failed: {}", e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Feed backed by an in-process channel
///
/// The receiver is handed out on the first subscription; a second
/// subscription fails, matching the one-shot upstream contract.
pub struct ChannelFeed {
    blocks: std::sync::Mutex<Option<mpsc::Receiver<Value>>>,
}

impl ChannelFeed {
    pub fn new(blocks: mpsc::Receiver<Value>) -> Self {
        Self { blocks: std::sync::Mutex::new(Some(blocks)) }
    }

    /// A feed plus the sender that drives it
    pub fn channel(buffer: usize) -> (mpsc::Sender<Value>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl BlockFeed for ChannelFeed {
    async fn subscribe(&self, _request: &SubscriptionRequest) -> Result<Subscription, MonitorError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| MonitorError::FeedUnavailable("channel feed lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| MonitorError::FeedUnavailable("channel feed already subscribed".to_string()))?;
        Ok(Subscription::new(blocks))
    }
}
