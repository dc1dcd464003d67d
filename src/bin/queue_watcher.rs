use gold_workflow::{
    config::AppConfig,
    db::{self, PgStore},
    services::{
        dispatch::{DispatchSettings, JdfDispatcher},
        jdf::HotFolder,
        jmf::JmfGateway,
        job_storage::JobStorage,
        mailer::{HttpMailRelay, LogMailer, Mailer},
        queue_watcher::{AlertSettings, QueueWatcher},
    },
    telemetry,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let kind = config.watcher_queue;

    tracing::info!(queue = %kind, "Starting queue watcher");

    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let mailer: Arc<dyn Mailer> = match &config.mail_relay_url {
        Some(url) => Arc::new(HttpMailRelay::new(url).expect("Failed to initialize mail relay")),
        None => Arc::new(LogMailer),
    };

    let dispatcher = JdfDispatcher::new(
        Arc::new(PgStore::new(db_pool)),
        HotFolder::new(&config.jdf_root),
        JobStorage::new(&config.jobstorage_dir),
        JmfGateway::new(&config.jmf_gateway_url).expect("Failed to initialize JMF client"),
        DispatchSettings {
            fs_server_host: config.fs_server_host.clone(),
            webserver_host: config.webserver_host.clone(),
            jmf_return_url: config.jmf_return_url.clone(),
        },
    );

    let watcher = QueueWatcher::new(
        Arc::new(dispatcher),
        mailer,
        AlertSettings {
            threshold: config.duplicate_alert_threshold,
            admins: config.admin_emails(),
            notify_group: config.notify_group.clone(),
            mail_from: config.mail_from.clone(),
        },
    );

    // Without a poll interval this is a single run for an external scheduler.
    let Some(interval) = config.watcher_poll_interval() else {
        return match watcher.run_once(kind).await {
            Ok(report) => {
                tracing::info!(
                    examined = report.examined,
                    duplicates = report.duplicates,
                    alerts = report.alerts_sent,
                    processed = ?report.processed,
                    "Queue watcher run complete"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Queue watcher run failed");
                ExitCode::FAILURE
            }
        };
    };

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            on_signal.cancel();
        }
    });

    watcher.poll(kind, interval, shutdown).await;
    ExitCode::SUCCESS
}
