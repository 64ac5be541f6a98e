use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::types::UnifiedMessage;

/// Bounded buffer decoupling platform listeners from pipeline workers.
///
/// Producers hold a cheap [`QueueHandle`]; the single pipeline consumer
/// owns the `MessageQueue` and drains it with [`MessageQueue::pop`].
pub struct MessageQueue {
    tx: mpsc::Sender<UnifiedMessage>,
    rx: mpsc::Receiver<UnifiedMessage>,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    /// Producer-side handle for platform listeners.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Block until a message is available or the pipeline is cancelled.
    ///
    /// Returns `None` on cancellation (or if every producer handle is gone
    /// and the buffer has drained).
    pub async fn pop(&mut self, cancel: &CancellationToken) -> Option<UnifiedMessage> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            msg = self.rx.recv() => msg,
        }
    }
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<UnifiedMessage>,
}

impl QueueHandle {
    /// Non-blocking push. A full queue drops the message rather than
    /// stalling the upstream listener; returns whether it was accepted.
    pub fn push(&self, msg: UnifiedMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    platform = %dropped.platform,
                    session = %dropped.session_id,
                    "ingress queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("ingress queue closed, dropping message");
                false
            }
        }
    }
}
