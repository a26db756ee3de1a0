//! Ingress wiring: configuration, clients, engine, worker pool, router.
//!
//! Construction order is explicit: one config snapshot → one set of clients
//! → one engine → one router. No module-level state; everything the
//! handlers touch hangs off [`core::app_state::AppState`].

pub mod core;
pub mod dispatch;
pub mod error_handler;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use llm_gateway::ReviewLlm;
use notifier::Notifier;
use review_engine::ReviewEngine;
use review_store::Store;
use scm_client::ScmClient;

use crate::core::app_state::AppState;
use crate::core::config::AppConfig;
use crate::error_handler::{AppError, AppResult};
use crate::routes::review_diff_route::UPLOAD_BODY_LIMIT;

/// Loads config, builds the object graph, and serves until shutdown.
pub async fn start() -> AppResult<()> {
    init_tracing();

    let config = AppConfig::from_env()?;

    // Embedded store lives under a data directory by default.
    if let Some(parent) = std::path::Path::new(&config.store_url).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Internal(format!("cannot create store directory: {e}")))?;
    }

    let store = Arc::new(Store::open(&config.store_url).map_err(AppError::Store)?);
    let scm = Arc::new(
        ScmClient::new(&config.scm)
            .map_err(|e| AppError::Internal(format!("scm client: {e}")))?,
    );
    let llm = Arc::new(
        ReviewLlm::from_config(config.llm.clone())
            .map_err(|e| AppError::Internal(format!("llm gateway: {e}")))?,
    );
    let mailer = Arc::new(
        Notifier::new(config.notifier.clone())
            .map_err(|e| AppError::Internal(format!("notifier: {e}")))?,
    );

    let cancel = CancellationToken::new();
    let engine = Arc::new(ReviewEngine::new(
        scm,
        llm.clone(),
        mailer,
        store.clone(),
        cancel.clone(),
    ));

    let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity);
    let workers = dispatch::spawn_workers(engine.clone(), jobs_rx, config.worker_count);

    let state = Arc::new(AppState {
        engine,
        store,
        llm,
        jobs: jobs_tx,
        webhook_secret: config.webhook_secret.clone(),
    });

    let app = router(state.clone());

    let addr = format!("{}:{}", config.server_host, config.server_bind_port);
    let listener = TcpListener::bind(&addr).await.map_err(AppError::Bind)?;
    info!(
        %addr,
        provider = state.llm.provider_name(),
        model = state.llm.model(),
        workers = config.worker_count,
        queue = config.queue_capacity,
        "review relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(AppError::Server)?;

    // Drop the last queue sender so workers can drain what is buffered
    // (each leftover run records itself as cancelled) and exit.
    cancel.cancel();
    drop(state);

    let grace = Duration::from_secs(config.shutdown_grace_secs);
    for handle in workers {
        if tokio::time::timeout(grace, handle).await.is_err() {
            warn!("worker did not finish within the shutdown grace window");
        }
    }

    info!("shutdown complete");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Ingress
        .route("/webhook/code-review", post(routes::webhook_route::handle))
        .route("/manual-review", post(routes::manual_review_route::handle))
        .route(
            "/review-diff",
            post(routes::review_diff_route::handle)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // Review records
        .route("/reviews", get(routes::reviews_routes::list))
        .route("/reviews/latest", get(routes::reviews_routes::latest))
        .route("/reviews/{id}", get(routes::reviews_routes::get_one))
        .route("/reviews/project/{project_key}", get(routes::reviews_routes::by_project))
        .route("/reviews/author/{email}", get(routes::reviews_routes::by_author))
        .route("/reviews/commit/{commit_id}", get(routes::reviews_routes::by_commit))
        .route("/reviews/pr/{mr_id}", get(routes::reviews_routes::by_mr))
        // Failure logs
        .route("/failures", get(routes::failures_routes::list))
        .route("/failures/{id}", get(routes::failures_routes::get_one))
        .route("/failures/{id}/resolve", post(routes::failures_routes::resolve))
        // Health
        .route("/health", get(routes::health_route::handle))
        .with_state(state)
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "api=info,review_engine=info,review_store=info,scm_client=info,llm_gateway=info,notifier=info"
            .into()
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves when the process receives SIGINT or SIGTERM, then cancels the
/// token so in-flight pipelines stop at their next stage boundary.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received; draining");
    cancel.cancel();
}
