use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::Json;
use axum::routing::get;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use kaze_connector::ConnectorRegistry;
use kaze_sync::batch::BatchOptions;
use kaze_sync::trigger;
use kaze_sync::{BatchResponse, BatchSummary, Environment, LogProgress, SyncError};

use crate::CliError;

use super::{Context, runtime};

/// Pending trigger calls beyond the one being run.
const JOB_QUEUE_DEPTH: usize = 4;

/// One trigger call waiting for the batch worker.
struct BatchJob {
    limit: u32,
    reply: oneshot::Sender<Result<BatchSummary, SyncError>>,
}

#[derive(Clone)]
struct AppState {
    jobs: mpsc::Sender<BatchJob>,
    environment: Environment,
    secret: Option<Arc<str>>,
    default_limit: u32,
}

#[derive(Debug, Deserialize)]
struct TriggerParams {
    limit: Option<u32>,
}

/// Serve the batch trigger until Ctrl-C.
pub(crate) fn run_serve(ctx: &Context, bind: Option<String>) -> Result<(), CliError> {
    let bind = bind.unwrap_or_else(|| ctx.settings.server.bind.clone());
    let environment = ctx.settings.server.environment;
    if environment == Environment::Production && ctx.settings.cron_secret.is_none() {
        log::warn!("No cron secret set; every trigger call will be rejected");
    }

    let conn = ctx.open_db()?;
    let registry = ctx.registry()?;
    let cancel = Arc::new(AtomicBool::new(false));
    let options = BatchOptions {
        cancel: Some(cancel.clone()),
        ..ctx.settings.batch_options()
    };

    let (jobs, receiver) = mpsc::channel(JOB_QUEUE_DEPTH);
    let worker = thread::Builder::new()
        .name("kaze-batch".to_string())
        .spawn(move || batch_worker(conn, registry, options, receiver))
        .map_err(|e| CliError::runtime(format!("Failed to start batch worker: {}", e)))?;

    let state = AppState {
        jobs,
        environment,
        secret: ctx.settings.cron_secret.as_deref().map(Arc::from),
        default_limit: ctx.settings.sync.batch_limit,
    };
    let app = Router::new()
        .route("/api/cron/sync", get(trigger_sync).post(trigger_sync))
        .with_state(state);

    let rt = runtime();
    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| CliError::runtime(format!("Failed to bind {}: {}", bind, e)))?;
        log::info!("Listening on {} ({})", bind, environment);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                log::info!("Shutting down");
                cancel.store(true, Ordering::Relaxed);
            })
            .await
            .map_err(|e| CliError::runtime(format!("Server error: {}", e)))
    })?;

    // The router (and with it the last job sender) is gone, so the worker
    // drains and exits.
    if worker.join().is_err() {
        return Err(CliError::runtime("batch worker panicked"));
    }
    Ok(())
}

/// Owns the database connection and runs queued batches one at a time.
fn batch_worker(
    conn: rusqlite::Connection,
    registry: ConnectorRegistry,
    options: BatchOptions,
    mut receiver: mpsc::Receiver<BatchJob>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create batch worker runtime: {}", e);
            return;
        }
    };

    while let Some(job) = receiver.blocking_recv() {
        let options = BatchOptions {
            limit: job.limit,
            ..options.clone()
        };
        let result = rt.block_on(kaze_sync::run_batch(&conn, &registry, &options, &LogProgress));
        // The caller may have hung up; the batch result is logged either way.
        let _ = job.reply.send(result);
    }
    log::debug!("Batch worker stopped");
}

/// The `limit` query parameter, if present and a positive number.
///
/// A malformed query is not rejected; the caller falls back to the
/// configured batch limit.
fn requested_limit(uri: &Uri) -> Option<u32> {
    match Query::<TriggerParams>::try_from_uri(uri) {
        Ok(Query(params)) => params.limit.filter(|&n| n > 0),
        Err(e) => {
            log::warn!("Ignoring malformed trigger query '{}': {}", uri, e);
            None
        }
    }
}

async fn trigger_sync(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, Json<BatchResponse>) {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !trigger::authorize(state.environment, state.secret.as_deref(), authorization) {
        log::warn!("Rejected unauthorized batch trigger");
        return (StatusCode::UNAUTHORIZED, Json(BatchResponse::unauthorized()));
    }

    let limit = requested_limit(&uri).unwrap_or(state.default_limit);
    let (reply, response) = oneshot::channel();
    if state.jobs.send(BatchJob { limit, reply }).await.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(BatchResponse::failure(&"batch worker is not running")),
        );
    }

    match response.await {
        Ok(Ok(summary)) => (StatusCode::OK, Json(BatchResponse::from_summary(&summary))),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, Json(BatchResponse::failure(&e))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(BatchResponse::failure(&"batch worker stopped before replying")),
        ),
    }
}
