use gold_workflow::{
    config::FsDaemonConfig,
    services::{fs_daemon::FsDaemon, job_storage::JobStorage},
    telemetry,
};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    let config = FsDaemonConfig::from_env().expect("Failed to load configuration");
    let daemon = FsDaemon::bind(&config.bind_addr, JobStorage::new(&config.jobstorage_dir))
        .await
        .expect("Failed to bind UDP socket");

    let token = daemon.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            token.cancel();
        }
    });

    daemon.run().await;
}
