//! `gold-fs-ctl lock_job_folder 51234`

use gold_workflow::{
    config::FsDaemonConfig,
    services::{fs_client::FsClient, fs_daemon::FsCommand},
    telemetry,
};
use std::net::SocketAddr;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let config = FsDaemonConfig::from_env().expect("Failed to load configuration");
    let line = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    let command = match FsCommand::parse(line.as_bytes()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("usage: gold-fs-ctl <lock_job_folder|unlock_job_folder> <job_num> | shutdown");
            return ExitCode::from(2);
        }
    };

    let target: SocketAddr = match config.server_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Invalid GOLD_FS_SERVER_ADDR {}: {e}", config.server_addr);
            return ExitCode::from(2);
        }
    };

    match FsClient::new(target).send(&command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Failed to send command");
            ExitCode::FAILURE
        }
    }
}
