use tracing_subscriber::EnvFilter;

/// JSON logs filtered by `RUST_LOG` (default `info`). Every binary calls this first.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();
}

/// Register descriptions for the application's counters.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "jdf_tickets_written_total",
        "JDF tickets written to the hotfolder"
    );
    metrics::describe_counter!(
        "jdf_duplicate_drops_total",
        "JDF tickets not written because the same file was still waiting"
    );
    metrics::describe_counter!(
        "queue_entries_enqueued_total",
        "Items added to a background queue"
    );
    metrics::describe_counter!(
        "queue_entries_processed_total",
        "Queue entries dispatched by the queue watcher"
    );
    metrics::describe_counter!(
        "queue_duplicate_attempts_total",
        "Queue entries skipped because an earlier ticket was unconsumed"
    );
    metrics::describe_counter!(
        "queue_alerts_sent_total",
        "Duplicate attempt alert emails sent"
    );
    metrics::describe_counter!("labels_printed_total", "Shipping labels sent to the printer");
    metrics::describe_counter!(
        "fs_commands_total",
        "File server daemon commands by command and outcome"
    );
}
