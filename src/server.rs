use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::construct::RecordStore;
use crate::engine::{Engine, QueryResult};
use crate::error::{CabinetError, Result};

pub type SharedStore = Arc<RwLock<Box<dyn RecordStore + Send + Sync>>>;

#[derive(Deserialize)]
pub struct QueryRequest {
    pub statement: String,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub status: String,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs one statement, holding the read lock for selects and the write lock
/// for everything else.
pub fn execute_shared(store: &SharedStore, engine: &Engine, text: &str) -> Result<QueryResult> {
    let statement = engine.compile(text)?;
    if statement.is_read_only() {
        let guard = store.read().map_err(|e| CabinetError::Lock(e.to_string()))?;
        engine.run_read(&**guard, &statement)
    } else {
        let mut guard = store.write().map_err(|e| CabinetError::Lock(e.to_string()))?;
        engine.run(&mut **guard, statement)
    }
}

fn status_of(e: &CabinetError) -> StatusCode {
    match e {
        CabinetError::Syntax { .. }
        | CabinetError::UnknownField(_)
        | CabinetError::Conversion { .. }
        | CabinetError::Arity { .. } => StatusCode::BAD_REQUEST,
        CabinetError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CabinetError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(store: SharedStore, engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/query", post(move |Json(req): Json<QueryRequest>| {
            let store = Arc::clone(&store);
            let engine = Arc::clone(&engine);
            async move {
                // The store is synchronous, so statements run on a blocking thread.
                let started = std::time::Instant::now();
                let outcome = tokio::task::spawn_blocking(move || {
                    execute_shared(&store, &engine, &req.statement)
                })
                .await
                .unwrap_or_else(|e| Err(CabinetError::Invariant(format!("join error: {e}"))));
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                match outcome {
                    Ok(result) => {
                        info!(ms = elapsed_ms, rows = result.rows.len(), affected = result.affected, "statement complete");
                        let body = QueryResponse { status: "ok".into(), elapsed_ms, result: Some(result), error: None };
                        (StatusCode::OK, Json(body))
                    }
                    Err(e) => {
                        let status = status_of(&e);
                        let msg = e.to_string();
                        warn!(%msg, code = %status.as_u16(), "statement error");
                        let body = QueryResponse { status: "error".into(), elapsed_ms, result: None, error: Some(msg) };
                        (status, Json(body))
                    }
                }
            }
        }))
        .layer(cors)
}

/// Serves the router until the process is stopped.
pub async fn serve(bind: &str, store: SharedStore, engine: Arc<Engine>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "listening");
    axum::serve(listener, router(store, engine)).await?;
    Ok(())
}
