//! Evaluation log sink
//!
//! Fire-and-forget recording of decisions. Handlers push onto an unbounded
//! queue and return immediately; a writer task batches the rows into the
//! store. A failed insert is logged and dropped — evaluation logging never
//! blocks and never fails a decision.

use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use banner_persistence::service::evaluation::{self, EvaluationRecord};

const MAX_BATCH: usize = 100;

#[derive(Clone)]
pub struct EvaluationSink {
    tx: mpsc::UnboundedSender<EvaluationRecord>,
}

impl EvaluationSink {
    /// Start the writer task and return the sink plus its handle.
    pub fn start(db: DatabaseConnection) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(writer_loop(db, rx));
        (Self { tx }, handle)
    }

    /// Queue one decision for recording. Dropped silently if the writer
    /// has shut down.
    pub fn record(&self, record: EvaluationRecord) {
        let _ = self.tx.send(record);
    }
}

async fn writer_loop(db: DatabaseConnection, mut rx: mpsc::UnboundedReceiver<EvaluationRecord>) {
    while let Some(first) = rx.recv().await {
        let mut batch = Vec::with_capacity(MAX_BATCH);
        batch.push(first);
        while batch.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }

        let count = batch.len();
        if let Err(err) = evaluation::insert_batch(&db, batch).await {
            warn!(error = %err, count, "failed to write evaluation log batch");
        } else {
            debug!(count, "evaluation log batch written");
        }
    }
    debug!("evaluation sink writer stopped");
}
