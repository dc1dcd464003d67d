use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::models::{
    job::{Item, Job, JobLogEntry},
    queue::{QueueEntry, QueueKind},
    shipment::Shipment,
};

pub mod memory;
pub mod queries;

pub use memory::MemoryStore;
pub use queries::PgStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Persistence used by the dispatch endpoints, the queue watcher and the
/// label queue.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: i64) -> Result<Option<Job>, StoreError>;

    /// Look up an item by its 1-based position in the job.
    async fn get_item(&self, job_id: i64, item_num: i32) -> Result<Option<Item>, StoreError>;

    async fn get_item_by_id(&self, item_id: i64) -> Result<Option<Item>, StoreError>;

    /// Items stepped with the given master item.
    async fn step_children(&self, item_id: i64) -> Result<Vec<Item>, StoreError>;

    async fn enqueue(&self, kind: QueueKind, item_id: i64) -> Result<QueueEntry, StoreError>;

    async fn get_entry(&self, kind: QueueKind, id: i64) -> Result<Option<QueueEntry>, StoreError>;

    /// Entries with no processed date, newest first.
    async fn pending_entries(&self, kind: QueueKind) -> Result<Vec<QueueEntry>, StoreError>;

    /// Increment the attempt counter and return the new value.
    async fn record_attempt(&self, kind: QueueKind, id: i64) -> Result<i32, StoreError>;

    /// Stamp the processed date unconditionally. Calling it again refreshes
    /// the timestamp; the entry stays processed either way.
    async fn mark_processed(&self, kind: QueueKind, id: i64) -> Result<DateTime<Utc>, StoreError>;

    /// Atomically move a pending entry to processed. Returns `None` when the
    /// entry was already processed, so concurrent watchers cannot both win.
    async fn claim(&self, kind: QueueKind, id: i64) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn append_job_log(&self, entry: &JobLogEntry) -> Result<(), StoreError>;

    /// Shipments whose label has not been printed yet.
    async fn pending_label_shipments(&self) -> Result<Vec<Shipment>, StoreError>;

    async fn mark_label_printed(&self, shipment_id: i64) -> Result<DateTime<Utc>, StoreError>;

    /// Emails of active users in a notification group.
    async fn group_member_emails(&self, group: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}
