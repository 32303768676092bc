//! Request handlers.
//!
//! Store access is synchronous, so each handler moves its work onto the
//! blocking pool and never holds the executor while a transaction runs.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde_json::{Value, json};
use siren_core::{DispatchOrchestrator, DispatchRecord};
use tracing::info;

use crate::{
    AppState, DispatchBackend,
    error::ApiError,
    wire::{
        DispatchBody, DispatchResponse, FleetSummary, HistoryQuery, NetworkView, ZoneSummary,
        zone_summaries,
    },
};

/// Records returned by `GET /dispatches` when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Upper bound on `GET /dispatches?limit=`.
pub const MAX_HISTORY_LIMIT: usize = 100;

async fn blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn DispatchBackend) -> Result<T, ApiError> + Send + 'static,
{
    let backend = Arc::clone(&state.backend);
    tokio::task::spawn_blocking(move || work(backend.as_ref())).await?
}

/// `POST /dispatch`
pub(crate) async fn dispatch(
    State(state): State<AppState>,
    payload: Result<Json<DispatchBody>, JsonRejection>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let Json(body) = payload?;
    let request = body.into_request()?;
    info!(
        vehicle = %request.vehicle_type,
        zone = request.target_code(),
        "dispatch requested"
    );
    let config = state.config;
    let outcome = blocking(&state, move |backend| {
        DispatchOrchestrator::new(backend, backend)
            .with_config(config)
            .dispatch(&request)
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(DispatchResponse::from(outcome)))
}

/// `GET /zones`
pub(crate) async fn zones(State(state): State<AppState>) -> Result<Json<Vec<ZoneSummary>>, ApiError> {
    let graph = blocking(&state, |backend| Ok(backend.load_graph()?)).await?;
    Ok(Json(zone_summaries(&graph)))
}

/// `GET /fleet`
pub(crate) async fn fleet(State(state): State<AppState>) -> Result<Json<FleetSummary>, ApiError> {
    let graph = blocking(&state, |backend| Ok(backend.load_graph()?)).await?;
    Ok(Json(FleetSummary::from(&graph)))
}

/// `GET /network`
pub(crate) async fn network(State(state): State<AppState>) -> Result<Json<NetworkView>, ApiError> {
    let graph = blocking(&state, |backend| Ok(backend.load_graph()?)).await?;
    Ok(Json(NetworkView::from(&graph)))
}

/// `GET /dispatches`
pub(crate) async fn dispatches(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<DispatchRecord>>, ApiError> {
    let Query(params) = query?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let records = blocking(&state, move |backend| Ok(backend.recent_dispatches(limit)?)).await?;
    Ok(Json(records))
}

/// `GET /health`
pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "siren-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
