//! Worker pool consuming the bounded job queue.
//!
//! Webhook ingestion never blocks on the pipeline: handlers `try_send` into
//! the queue and answer immediately; a fixed set of workers drains it. On
//! shutdown the queue sender is dropped, so workers finish what is buffered
//! (each leftover run observes the cancelled token and records itself as
//! cancelled) and then exit on the closed channel.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use review_engine::{Job, ReviewEngine};

/// Spawns `count` workers over one shared receiver.
pub fn spawn_workers(
    engine: Arc<ReviewEngine>,
    rx: mpsc::Receiver<Job>,
    count: usize,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));

    (0..count)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    // Hold the lock only while waiting for one job so the
                    // pipeline runs outside it.
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => engine.run(job).await,
                        None => break,
                    }
                }
                debug!(worker, "queue closed; worker exiting");
            })
        })
        .collect()
}
