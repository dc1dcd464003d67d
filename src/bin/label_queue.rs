use gold_workflow::{
    config::AppConfig,
    db::{self, PgStore},
    services::labels::{process_label_queue, LabelPrinter},
    telemetry,
};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let store = PgStore::new(db_pool);
    let printer = LabelPrinter::new(&config.label_printer_path);

    match process_label_queue(&store, &printer, config.international_label_copies).await {
        Ok(summary) => {
            tracing::info!(
                printed = summary.printed,
                copies = summary.copies,
                failed = summary.failed,
                "Label queue complete"
            );
            if summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not read label queue");
            ExitCode::FAILURE
        }
    }
}
