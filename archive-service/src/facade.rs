use crate::archiver::Archiver;
use crate::logs::{log_dump, log_sse, LogState};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
struct FacadeState {
    archiver: Arc<Archiver>,
}

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
}

/// Inbound RPC facade (spec §6): start/stop the Archiver and tail its logs.
/// `reinitialize` is accepted but does nothing — archivesvc has no
/// reloadable runtime configuration once started.
pub fn router(archiver: Arc<Archiver>, log_state: LogState) -> Router {
    let facade_state = FacadeState { archiver };

    let control = Router::new()
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/reinitialize", post(reinitialize))
        .with_state(facade_state);

    let logs = Router::new()
        .route("/logs/sse", get(log_sse))
        .route("/logs/dump", get(log_dump))
        .with_state(log_state);

    control.merge(logs)
}

async fn status(State(state): State<FacadeState>) -> impl IntoResponse {
    Json(StatusResponse { running: state.archiver.is_running() })
}

async fn start(State(state): State<FacadeState>) -> impl IntoResponse {
    state.archiver.start().await;
    Json(StatusResponse { running: state.archiver.is_running() })
}

async fn stop(State(state): State<FacadeState>) -> impl IntoResponse {
    state.archiver.stop().await;
    Json(StatusResponse { running: state.archiver.is_running() })
}

async fn reinitialize() -> impl IntoResponse {
    Json(StatusResponse { running: true })
}
