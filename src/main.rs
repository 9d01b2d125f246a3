use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use cryptopay_backend::api;
use cryptopay_backend::chains::evm::{EvmChainConfig, EvmRpcClient};
use cryptopay_backend::chains::ChainClientPool;
use cryptopay_backend::config::AppConfig;
use cryptopay_backend::database::button_repository::ButtonRepository;
use cryptopay_backend::database::merchant_repository::MerchantRepository;
use cryptopay_backend::database::payment_intent_repository::PaymentIntentRepository;
use cryptopay_backend::database::transaction_repository::TransactionRepository;
use cryptopay_backend::database::init_pool_from_config;
use cryptopay_backend::health::{HealthChecker, HealthState, HealthStatus};
use cryptopay_backend::logging::init_tracing;
use cryptopay_backend::middleware::{request_logging_middleware, UuidRequestId};
use cryptopay_backend::services::webhook_dispatcher::WebhookDispatcher;
use cryptopay_backend::workers::transaction_monitor::TransactionMonitor;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting CryptoPay backend service"
    );

    // Database pool
    info!("📊 Initializing database connection pool...");
    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!("database initialization failed: {e}")
    })?;
    info!(
        max_connections = config.database.max_connections,
        "✅ Database connection pool initialized"
    );

    // Chain clients, one per enabled EVM network
    info!("⛓️  Initializing EVM chain clients...");
    let mut chain_pool = ChainClientPool::new();
    for chain in &config.evm.enabled_chains {
        let chain_config = EvmChainConfig::for_chain(*chain)
            .with_request_timeout(Duration::from_secs(config.evm.request_timeout));
        let client = EvmRpcClient::new(chain_config)
            .map_err(|e| anyhow::anyhow!("chain client initialization failed: {e}"))?;
        chain_pool.register(Arc::new(client));
    }
    let chain_pool = Arc::new(chain_pool);
    info!(
        chains = chain_pool.len(),
        chain_ids = ?chain_pool.supported_chain_ids(),
        "✅ Chain clients initialized"
    );

    // Repositories
    let intents = Arc::new(PaymentIntentRepository::new(db_pool.clone()));
    let transactions = Arc::new(TransactionRepository::new(db_pool.clone()));

    // Webhook dispatcher and transaction monitor
    let dispatcher = Arc::new(WebhookDispatcher::new(
        &config.webhook,
        ButtonRepository::new(db_pool.clone()),
        MerchantRepository::new(db_pool.clone()),
    ));
    let monitor = Arc::new(TransactionMonitor::new(
        Arc::clone(&chain_pool),
        Arc::clone(&intents),
        dispatcher,
        config.monitor.clone(),
    ));
    info!(
        poll_interval_secs = config.monitor.poll_interval.as_secs(),
        initial_probe_delay_ms = config.monitor.initial_probe_delay.as_millis() as u64,
        "✅ Transaction monitor initialized"
    );

    let health_checker = HealthChecker::new(db_pool.clone(), Arc::clone(&chain_pool));

    // Routes
    info!("🛣️  Setting up application routes...");

    let monitor_state = Arc::new(api::monitor::MonitorState {
        monitor: Arc::clone(&monitor),
    });
    let monitor_routes = Router::new()
        .route("/api/monitor", post(api::monitor::start_monitoring))
        .route(
            "/api/monitor/{payment_intent_id}",
            delete(api::monitor::stop_monitoring),
        )
        .with_state(monitor_state);

    let payments_state = Arc::new(api::payments::PaymentsState {
        intents: Arc::clone(&intents),
        buttons: ButtonRepository::new(db_pool.clone()),
        monitor: Arc::clone(&monitor),
    });
    let payments_routes = Router::new()
        .route("/api/payments/init", post(api::payments::init_payment))
        .route(
            "/api/payments/{id}/status",
            get(api::payments::payment_status),
        )
        .route(
            "/api/payments/{id}",
            patch(api::payments::attach_transaction_hash),
        )
        .with_state(payments_state);

    let transactions_state = Arc::new(api::transactions::TransactionsState { transactions });
    let transactions_routes = Router::new()
        .route(
            "/api/transactions",
            post(api::transactions::create_transaction).get(api::transactions::list_transactions),
        )
        .route(
            "/api/transactions/{id}",
            get(api::transactions::get_transaction).patch(api::transactions::settle_transaction),
        )
        .with_state(transactions_state);

    let receiver_state = Arc::new(api::webhooks::WebhookReceiverState {
        secret: config.webhook.default_secret.clone(),
    });
    let webhook_routes = Router::new()
        .route("/api/webhooks/example", post(api::webhooks::example_receiver))
        .with_state(receiver_state);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(health_checker)
        .merge(monitor_routes)
        .merge(payments_routes)
        .merge(transactions_routes)
        .merge(webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);
    info!("✅ Server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // No polling task may write to the store after this point
    let cancelled = monitor.stop_all();
    info!(cancelled_tasks = cancelled, "👋 Server shutdown complete");

    Ok(())
}

// Handlers
async fn root() -> &'static str {
    "Welcome to CryptoPay Backend API"
}

async fn health(
    axum::extract::State(checker): axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = checker.check_health().await;

    // Return 503 if a load-bearing component is down
    if matches!(health_status.status, HealthState::Unhealthy) {
        error!("❌ Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks if the service is alive (basic check)
async fn liveness() -> &'static str {
    "OK"
}
