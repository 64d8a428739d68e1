use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;

use dormdeli_payments::api::{self, AppState};
use dormdeli_payments::config::Config;
use dormdeli_payments::engine::ReconciliationEngine;
use dormdeli_payments::payments::ledger::SePayLedger;
use dormdeli_payments::payments::{SePayRail, VnPayRail};
use dormdeli_payments::store::{self, PgPaymentStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Log startup info
    tracing::info!("Starting DormDeli payment service");
    tracing::info!("Environment: {}", config.server.environment);

    // Wire the store, engine and rails
    let pool = store::init_pool(&config.database.url, config.database.max_connections).await?;
    let payment_store = Arc::new(PgPaymentStore::new(pool));
    let engine = Arc::new(ReconciliationEngine::new(payment_store));
    let ledger = Arc::new(SePayLedger::new(&config.sepay));
    let vnpay = Arc::new(VnPayRail::new(config.vnpay.clone(), engine.clone()));
    let sepay = Arc::new(SePayRail::new(config.sepay.clone(), engine.clone(), ledger));

    let state = AppState {
        config: config.clone(),
        engine,
        vnpay,
        sepay,
    };

    // Build router
    let app = api::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
