use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use gold_workflow::{
    app_state::AppState,
    config::AppConfig,
    db::{self, PgStore},
    routes,
    services::{
        dispatch::{DispatchSettings, JdfDispatcher},
        jdf::HotFolder,
        jmf::JmfGateway,
        job_storage::JobStorage,
    },
    telemetry,
};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing gold-workflow server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    telemetry::describe_metrics();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let jmf = JmfGateway::new(&config.jmf_gateway_url).expect("Failed to initialize JMF client");

    let dispatcher = JdfDispatcher::new(
        Arc::new(PgStore::new(db_pool)),
        HotFolder::new(&config.jdf_root),
        JobStorage::new(&config.jobstorage_dir),
        jmf,
        DispatchSettings {
            fs_server_host: config.fs_server_host.clone(),
            webserver_host: config.webserver_host.clone(),
            jmf_return_url: config.jmf_return_url.clone(),
        },
    );
    let state = AppState::new(dispatcher);

    let app = routes::create_router()
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
