//! Strictly serialized task queue in front of the store.
//!
//! A single worker task drains a FIFO channel and awaits each store call
//! before taking the next task, so at most one store call is in flight.
//! A failed task is logged and the queue moves on.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::store::Store;
use crate::types::ObjectRecord;

/// A queued operation against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Create the record, or update its native payload if that changed.
    CreateOrUpdateObject { id: String, record: ObjectRecord },
    /// Write a state value as acknowledged.
    WriteState { id: String, value: Value },
}

impl Task {
    /// Full store id the task addresses.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::CreateOrUpdateObject { id, .. } | Self::WriteState { id, .. } => id,
        }
    }

    /// Short task kind for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateOrUpdateObject { .. } => "object",
            Self::WriteState { .. } => "state",
        }
    }
}

/// What a completed task did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Written,
}

enum Message {
    Run(Task),
    Flush(oneshot::Sender<()>),
}

/// FIFO queue with a single draining worker.
pub struct ReconciliationQueue {
    tx: mpsc::UnboundedSender<Message>,
    worker: JoinHandle<()>,
    enqueued: u64,
}

impl ReconciliationQueue {
    /// Spawns the worker on the current runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn Store>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(store, rx));
        Self {
            tx,
            worker,
            enqueued: 0,
        }
    }

    /// Appends a task. Never blocks.
    pub fn enqueue(&mut self, task: Task) {
        tracing::trace!(id = task.id(), kind = task.kind(), "enqueue");
        self.enqueued += 1;
        if self.tx.send(Message::Run(task)).is_err() {
            tracing::error!("reconciliation worker is gone, task dropped");
        }
    }

    /// Number of tasks enqueued so far.
    #[must_use]
    pub const fn enqueued(&self) -> u64 {
        self.enqueued
    }

    /// Resolves once every task enqueued before this call has completed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Drains the remaining tasks and stops the worker.
    pub async fn close(self) {
        let Self { tx, worker, .. } = self;
        drop(tx);
        if let Err(e) = worker.await {
            tracing::error!("reconciliation worker failed: {}", e);
        }
    }
}

async fn run_worker(store: Arc<dyn Store>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Run(task) => {
                let id = task.id().to_string();
                let kind = task.kind();
                match execute(store.as_ref(), task).await {
                    Ok(outcome) => tracing::trace!(%id, kind, ?outcome, "task done"),
                    Err(e) => tracing::warn!(%id, kind, error = %e, "store task failed"),
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("reconciliation worker stopped");
}

/// Runs one task against the store.
pub async fn execute<S: Store + ?Sized>(store: &S, task: Task) -> Result<Outcome> {
    match task {
        Task::CreateOrUpdateObject { id, record } => match store.get_object(&id).await? {
            None => {
                store.set_object(&id, record).await?;
                tracing::info!("object {id} created");
                Ok(Outcome::Created)
            }
            Some(mut existing) if existing.native() != record.native() => {
                existing.set_native(record.native().clone());
                store.set_object(&id, existing).await?;
                tracing::info!("object {id} updated");
                Ok(Outcome::Updated)
            }
            Some(_) => Ok(Outcome::Unchanged),
        },
        Task::WriteState { id, value } => {
            store.set_state(&id, value, true).await?;
            Ok(Outcome::Written)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, StoreOp};
    use crate::types::{DeviceCommon, DeviceRecord};

    fn device(id: &str, native: Value) -> ObjectRecord {
        DeviceRecord {
            id: id.into(),
            common: DeviceCommon {
                name: "stored name".into(),
            },
            native,
        }
        .into()
    }

    fn write(id: &str, value: Value) -> Task {
        Task::WriteState {
            id: id.into(),
            value,
        }
    }

    #[tokio::test]
    async fn test_create_update_unchanged() {
        let store = MemoryStore::new();
        let id = "cul.0.FS20.123401";

        let create = Task::CreateOrUpdateObject {
            id: id.into(),
            record: device(id, json!({"rssi": -70})),
        };
        assert_eq!(execute(&store, create.clone()).await.unwrap(), Outcome::Created);
        assert_eq!(execute(&store, create).await.unwrap(), Outcome::Unchanged);

        let mut changed = device(id, json!({"rssi": -60}));
        if let ObjectRecord::Device(device) = &mut changed {
            device.common.name = "new name".into();
        }
        let update = Task::CreateOrUpdateObject {
            id: id.into(),
            record: changed,
        };
        assert_eq!(execute(&store, update).await.unwrap(), Outcome::Updated);

        // Only the native payload is overwritten.
        let stored = store.object(id).await.unwrap();
        assert_eq!(stored.native(), &json!({"rssi": -60}));
        let ObjectRecord::Device(stored) = stored else {
            panic!("expected device");
        };
        assert_eq!(stored.common.name, "stored name");
    }

    #[tokio::test]
    async fn test_fifo_with_one_in_flight() {
        let store = Arc::new(MemoryStore::new());
        let mut queue = ReconciliationQueue::spawn(store.clone());

        for i in 0..20 {
            queue.enqueue(write(&format!("cul.0.test.{i}"), json!(i)));
        }
        queue.flush().await;

        let ops = store.operations().await;
        let expected: Vec<_> = (0..20)
            .map(|i| StoreOp::SetState(format!("cul.0.test.{i}"), json!(i)))
            .collect();
        assert_eq!(ops, expected);
        assert_eq!(store.max_in_flight(), 1);
        assert_eq!(queue.enqueued(), 20);
    }

    #[tokio::test]
    async fn test_failure_does_not_stall_queue() {
        let store = Arc::new(MemoryStore::new());
        store.fail_on("cul.0.bad").await;
        let mut queue = ReconciliationQueue::spawn(store.clone());

        queue.enqueue(write("cul.0.bad", json!(1)));
        queue.enqueue(write("cul.0.good", json!(2)));
        queue.flush().await;

        assert!(store.state("cul.0.bad").await.is_none());
        assert_eq!(store.state("cul.0.good").await.unwrap().value, json!(2));
    }

    #[tokio::test]
    async fn test_close_drains_pending_tasks() {
        let store = Arc::new(MemoryStore::new());
        let mut queue = ReconciliationQueue::spawn(store.clone());
        queue.enqueue(write("cul.0.last", json!(true)));
        queue.close().await;

        assert!(store.state("cul.0.last").await.is_some());
    }
}
