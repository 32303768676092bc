//! HTTP surface for the Siren dispatch engine.
//!
//! Routes:
//! - `POST /dispatch`: depot-anchored or nearest-available dispatch.
//! - `GET /zones`: zones ordered by code with inventory and depot flags.
//! - `GET /fleet`: available units per vehicle type.
//! - `GET /dispatches?limit=N`: most recent dispatch records.
//! - `GET /network`: zone codes, edges and the spanning forest.
//! - `GET /health`: liveness.
//!
//! Every failure answers 400 with `{ "success": false, "error": ... }`.
//! Cross-origin requests are allowed from any origin.

#![forbid(unsafe_code)]

mod error;
mod handlers;
mod wire;

use std::{fmt, sync::Arc};

use axum::{
    Router,
    http::{
        HeaderName, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use siren_core::{AllocationStore, GraphStore, OrchestratorConfig};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub use error::ApiError;
pub use handlers::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
pub use wire::{
    DispatchBody, DispatchResponse, ErrorBody, FleetSummary, HistoryQuery, NetworkView,
    RequestError, ZoneSummary, zone_summaries,
};

/// Store requirements of the HTTP layer.
pub trait DispatchBackend: GraphStore + AllocationStore + Send + Sync {}

impl<T> DispatchBackend for T where T: GraphStore + AllocationStore + Send + Sync {}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn DispatchBackend>,
    config: OrchestratorConfig,
}

impl AppState {
    /// State serving requests from `backend` with the default configuration.
    pub fn new(backend: Arc<dyn DispatchBackend>) -> Self {
        Self {
            backend,
            config: OrchestratorConfig::default(),
        }
    }

    /// Replace the orchestrator configuration.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Orchestrator configuration applied to every dispatch.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dispatch", post(handlers::dispatch))
        .route("/zones", get(handlers::zones))
        .route("/fleet", get(handlers::fleet))
        .route("/dispatches", get(handlers::dispatches))
        .route("/network", get(handlers::network))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Serve the router on `listener` until Ctrl-C.
///
/// In-flight requests finish before the future resolves.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let address = listener.local_addr()?;
    info!(%address, "dispatch API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("dispatch API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
}
