//! Fan-in queue between the fetch workers and the single writer.
//!
//! Unbounded, so `push` never waits on the consumer. Closing drops the only sender;
//! the consumer then drains whatever is left and sees the end of the stream.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::types::Batch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("push on a closed fan-in queue")]
pub struct QueueClosed;

/// Create a queue; the producer half is cloned into every worker.
pub fn fan_in() -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let producer = QueueProducer {
        sender: Arc::new(Mutex::new(Some(tx))),
    };
    (producer, QueueConsumer { receiver: rx })
}

#[derive(Debug, Clone)]
pub struct QueueProducer {
    sender: Arc<Mutex<Option<UnboundedSender<Batch>>>>,
}

impl QueueProducer {
    /// Enqueue a batch. Fails only if the queue was closed; if the consumer has
    /// already gone away the batch is dropped.
    pub fn push(&self, batch: Batch) -> Result<(), QueueClosed> {
        let guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(QueueClosed);
        };
        if let Err(mpsc::error::SendError(lost)) = tx.send(batch) {
            tracing::debug!(
                page = lost.page.index,
                items = lost.len(),
                "writer gone, dropping batch"
            );
        }
        Ok(())
    }

    /// Signal that no more batches will arrive. Idempotent.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

#[derive(Debug)]
pub struct QueueConsumer {
    receiver: UnboundedReceiver<Batch>,
}

impl QueueConsumer {
    pub async fn next(&mut self) -> Option<Batch> {
        self.receiver.recv().await
    }

    /// Blocking variant for a consumer running on a dedicated thread.
    /// Must not be called from within an async context.
    pub fn blocking_next(&mut self) -> Option<Batch> {
        self.receiver.blocking_recv()
    }
}
