//! HTTP API server for SorykPass seat reservation and checkout.
//!
//! Exposes seat holds, checkout creation and the payment gateway's return
//! endpoint, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    GatewayError, InMemoryPaymentGateway, LogTicketNotifier, PaymentGateway, PaymentOrchestrator,
    SeatReservationManager, WebpayGateway,
};
use common::{Clock, SystemClock};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{
    CheckoutStore, InMemoryCheckoutStore, InMemorySeatLockStore, PostgresCheckoutStore,
    PostgresSeatLockStore, SeatLockStore, StoreError,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::{Config, GatewayMode};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: PaymentOrchestrator,
    /// Base URL buyers are redirected to after paying.
    pub frontend_url: String,
    /// `"postgres"` or `"memory"`.
    pub storage: &'static str,
    pub gateway: GatewayMode,
}

/// Errors that prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/checkout/create", post(routes::checkout::create))
        .route(
            "/payment/return",
            get(routes::payment::return_get).post(routes::payment::return_post),
        )
        .route("/reservations", post(routes::reservations::reserve))
        .route(
            "/reservations/{session_id}",
            get(routes::reservations::get).delete(routes::reservations::release),
        )
        .route("/seats/availability", post(routes::reservations::availability))
        .route("/orders/{id}", get(routes::orders::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires stores, gateway and services according to `config`.
///
/// Uses PostgreSQL (running pending migrations) when `DATABASE_URL` is set,
/// in-memory stores otherwise.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>, StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let locks: Arc<dyn SeatLockStore>;
    let checkout_store: Arc<dyn CheckoutStore>;
    let storage = match &config.database_url {
        Some(url) => {
            let pool = store::connect(url, config.database_max_connections).await?;
            store::run_migrations(&pool).await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            locks = Arc::new(PostgresSeatLockStore::new(pool.clone()));
            checkout_store = Arc::new(PostgresCheckoutStore::new(pool));
            "postgres"
        }
        None => {
            tracing::warn!("DATABASE_URL not set, state is kept in memory");
            locks = Arc::new(InMemorySeatLockStore::new());
            checkout_store = Arc::new(InMemoryCheckoutStore::new());
            "memory"
        }
    };

    let gateway: Arc<dyn PaymentGateway> = match config.gateway {
        GatewayMode::Mock => {
            tracing::warn!("using the mock payment gateway, every payment is approved");
            Arc::new(InMemoryPaymentGateway::new())
        }
        GatewayMode::Webpay(environment) => Arc::new(WebpayGateway::new(
            environment,
            &config.webpay_credentials(),
        )?),
    };

    let reservations = SeatReservationManager::new(locks, checkout_store.clone(), clock.clone())
        .with_ttl(config.seat_lock_ttl());
    let orchestrator = PaymentOrchestrator::new(
        checkout_store,
        reservations,
        gateway,
        Arc::new(LogTicketNotifier),
        clock,
        config.checkout_settings(),
    );

    Ok(Arc::new(AppState {
        orchestrator,
        frontend_url: config.frontend_url.clone(),
        storage,
        gateway: config.gateway,
    }))
}
