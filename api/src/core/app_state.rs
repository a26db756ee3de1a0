//! Shared state for handlers.

use std::sync::Arc;

use tokio::sync::mpsc;

use llm_gateway::ReviewLlm;
use review_engine::{Job, ReviewEngine};
use review_store::Store;

/// Everything a route handler needs, constructed once at startup.
pub struct AppState {
    /// Shared pipeline; synchronous endpoints call it inline.
    pub engine: Arc<ReviewEngine>,
    /// Read API and ingress-side failure logging.
    pub store: Arc<Store>,
    /// Held for the health probe; the engine has its own handle.
    pub llm: Arc<ReviewLlm>,
    /// Bounded queue feeding the worker pool. `try_send` failure is the
    /// back-pressure signal (503, nothing enqueued).
    pub jobs: mpsc::Sender<Job>,
    /// When set, webhook deliveries must carry a valid signature.
    pub webhook_secret: Option<String>,
}
