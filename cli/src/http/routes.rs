//! HTTP route handlers.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use procrelay_core::event::EngineEvent;
use procrelay_core::relay::{self, ChannelSink};
use procrelay_core::skills;
use procrelay_core::sync::{self, SyncReply};
use procrelay_core::{QueryRequest, RelayError};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::http::models::*;
use crate::http::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/skills", get(skills_handler))
        .route("/api/query", post(query_handler))
        .route("/api/query/sync", post(query_sync_handler))
        .with_state(state)
}

/// GET /health - liveness probe plus an engine reachability hint.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    {
        let mut stats = state.stats.write().unwrap();
        stats.increment_request("/health");
    }

    // A broken engine reports as -1; the endpoint itself stays 200 so
    // orchestrators keep the relay alive while the engine is being fixed.
    let skills_installed = skills::skills_count(&state.config.engine).await;

    Json(HealthResponse {
        status: "ok".into(),
        service: SERVICE_NAME.into(),
        skills_installed,
    })
}

/// GET /api/skills - installed capability names from the engine.
async fn skills_handler(State(state): State<AppState>) -> Result<Json<SkillsResponse>, ApiError> {
    {
        let mut stats = state.stats.write().unwrap();
        stats.increment_request("/api/skills");
    }

    match skills::list_skills(&state.config.engine).await {
        Ok(skills) => Ok(Json(SkillsResponse {
            status: true,
            skills,
        })),
        Err(e) => {
            state.stats.write().unwrap().increment_error();
            Err(ApiError::Engine(e.to_string()))
        }
    }
}

/// POST /api/query - live NDJSON stream, one engine event per line.
///
/// The response starts as soon as the child is spawned; events are written
/// as they arrive. A relay timeout surfaces as a final in-band `error`
/// event, since the 200 status line has already been sent by then.
async fn query_handler(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    {
        let mut stats = state.stats.write().unwrap();
        stats.increment_request("/api/query");
    }

    if let Err(msg) = req.validate() {
        state.stats.write().unwrap().increment_error();
        return Err(ApiError::InvalidRequest(msg.to_string()));
    }

    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, user_id = %req.user_id, "query stream started");

    let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
    let terminal_tx = tx.clone();
    let config = state.config.clone();

    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        match relay::relay_query(&config.engine, &req, &mut sink).await {
            Ok(outcome) => {
                tracing::info!(
                    %request_id,
                    exit_code = outcome.exit_code,
                    "query stream finished"
                );
            }
            Err(RelayError::Disconnected) => {
                // The client went away; there is nobody left to tell.
                tracing::debug!(%request_id, "client disconnected, engine killed");
            }
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "query stream failed");
                let mut ev = EngineEvent::error(e.to_string());
                ev.ensure_user_id(&req.user_id);
                let _ = terminal_tx.send(ev);
            }
        }
    });

    let body = Body::from_stream(async_stream::stream! {
        while let Some(ev) = rx.recv().await {
            let mut line = ev.to_line();
            line.push('\n');
            yield Ok::<Bytes, Infallible>(Bytes::from(line));
        }
    });

    let headers = [
        (header::CONTENT_TYPE, "application/x-ndjson"),
        (header::CACHE_CONTROL, "no-cache"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    Ok((headers, body).into_response())
}

/// POST /api/query/sync - buffered variant, one JSON document at the end.
async fn query_sync_handler(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    {
        let mut stats = state.stats.write().unwrap();
        stats.increment_request("/api/query/sync");
    }

    if let Err(msg) = req.validate() {
        state.stats.write().unwrap().increment_error();
        return Err(ApiError::InvalidRequest(msg.to_string()));
    }

    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, user_id = %req.user_id, "sync query started");

    let report = match sync::run_sync_query(&state.config.engine, &req).await {
        Ok(report) => report,
        Err(e) => {
            state.stats.write().unwrap().increment_error();
            tracing::warn!(%request_id, error = %e, "sync query failed");
            return Err(ApiError::Engine(e.to_string()));
        }
    };

    tracing::info!(%request_id, elapsed_ms = report.elapsed_ms, "sync query finished");

    let resp = match report.reply {
        SyncReply::Success { text } => (
            StatusCode::OK,
            Json(SyncSuccessResponse {
                status: true,
                text,
                user_id: report.user_id,
                elapsed_ms: report.elapsed_ms,
            }),
        )
            .into_response(),
        SyncReply::Failure {
            error,
            returncode,
            stdout,
        } => {
            state.stats.write().unwrap().increment_error();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncFailureResponse {
                    status: false,
                    error,
                    user_id: report.user_id,
                    elapsed_ms: report.elapsed_ms,
                    returncode,
                    stdout,
                }),
            )
                .into_response()
        }
        SyncReply::Timeout { secs } => {
            state.stats.write().unwrap().increment_error();
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(SyncFailureResponse {
                    status: false,
                    error: format!("Query timed out after {secs}s"),
                    user_id: report.user_id,
                    elapsed_ms: report.elapsed_ms,
                    returncode: None,
                    stdout: None,
                }),
            )
                .into_response()
        }
    };

    Ok(resp)
}
