//! In-memory workflow store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{StoreError, WorkflowStore};
use crate::models::{
    job::{Item, Job, JobLogEntry},
    queue::{QueueEntry, QueueKind},
    shipment::Shipment,
};

#[derive(Default)]
struct Tables {
    jobs: HashMap<i64, Job>,
    items: HashMap<i64, Item>,
    entries: HashMap<(QueueKind, i64), QueueEntry>,
    job_log: Vec<JobLogEntry>,
    shipments: HashMap<i64, Shipment>,
    group_members: Vec<(String, String, bool)>,
    next_entry_id: i64,
}

/// Workflow store kept entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_job(&self, job: Job) {
        self.tables.write().await.jobs.insert(job.id, job);
    }

    pub async fn insert_item(&self, item: Item) {
        self.tables.write().await.items.insert(item.id, item);
    }

    pub async fn insert_shipment(&self, shipment: Shipment) {
        self.tables.write().await.shipments.insert(shipment.id, shipment);
    }

    pub async fn add_group_member(&self, group: &str, email: &str, is_active: bool) {
        self.tables
            .write()
            .await
            .group_members
            .push((group.to_string(), email.to_string(), is_active));
    }

    pub async fn job_log(&self) -> Vec<JobLogEntry> {
        self.tables.read().await.job_log.clone()
    }

    pub async fn shipment(&self, id: i64) -> Option<Shipment> {
        self.tables.read().await.shipments.get(&id).cloned()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        Ok(self.tables.read().await.jobs.get(&job_id).cloned())
    }

    async fn get_item(&self, job_id: i64, item_num: i32) -> Result<Option<Item>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .items
            .values()
            .find(|i| i.job_id == job_id && i.num_in_job == item_num)
            .cloned())
    }

    async fn get_item_by_id(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        Ok(self.tables.read().await.items.get(&item_id).cloned())
    }

    async fn step_children(&self, item_id: i64) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.read().await;
        let mut children: Vec<Item> = tables
            .items
            .values()
            .filter(|i| i.steps_with == Some(item_id))
            .cloned()
            .collect();
        children.sort_by_key(|i| (i.job_id, i.num_in_job));
        Ok(children)
    }

    async fn enqueue(&self, kind: QueueKind, item_id: i64) -> Result<QueueEntry, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.items.contains_key(&item_id) {
            return Err(StoreError::NotFound {
                entity: "item",
                id: item_id,
            });
        }

        tables.next_entry_id += 1;
        let entry = QueueEntry {
            id: tables.next_entry_id,
            kind,
            item_id,
            date_queued: Utc::now(),
            date_processed: None,
            number_of_attempts: 0,
        };
        tables.entries.insert((kind, entry.id), entry.clone());
        Ok(entry)
    }

    async fn get_entry(&self, kind: QueueKind, id: i64) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.tables.read().await.entries.get(&(kind, id)).cloned())
    }

    async fn pending_entries(&self, kind: QueueKind) -> Result<Vec<QueueEntry>, StoreError> {
        let tables = self.tables.read().await;
        let mut pending: Vec<QueueEntry> = tables
            .entries
            .values()
            .filter(|e| e.kind == kind && e.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| (b.date_queued, b.id).cmp(&(a.date_queued, a.id)));
        Ok(pending)
    }

    async fn record_attempt(&self, kind: QueueKind, id: i64) -> Result<i32, StoreError> {
        if !kind.tracks_attempts() {
            return Ok(0);
        }

        let mut tables = self.tables.write().await;
        let entry = tables
            .entries
            .get_mut(&(kind, id))
            .ok_or(StoreError::NotFound {
                entity: "queue entry",
                id,
            })?;
        entry.number_of_attempts += 1;
        Ok(entry.number_of_attempts)
    }

    async fn mark_processed(&self, kind: QueueKind, id: i64) -> Result<DateTime<Utc>, StoreError> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .entries
            .get_mut(&(kind, id))
            .ok_or(StoreError::NotFound {
                entity: "queue entry",
                id,
            })?;
        let stamp = Utc::now().max(entry.date_queued);
        entry.date_processed = Some(stamp);
        Ok(stamp)
    }

    async fn claim(&self, kind: QueueKind, id: i64) -> Result<Option<DateTime<Utc>>, StoreError> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .entries
            .get_mut(&(kind, id))
            .ok_or(StoreError::NotFound {
                entity: "queue entry",
                id,
            })?;
        if !entry.is_pending() {
            return Ok(None);
        }
        let stamp = Utc::now().max(entry.date_queued);
        entry.date_processed = Some(stamp);
        Ok(Some(stamp))
    }

    async fn append_job_log(&self, entry: &JobLogEntry) -> Result<(), StoreError> {
        self.tables.write().await.job_log.push(entry.clone());
        Ok(())
    }

    async fn pending_label_shipments(&self) -> Result<Vec<Shipment>, StoreError> {
        let tables = self.tables.read().await;
        let mut pending: Vec<Shipment> = tables
            .shipments
            .values()
            .filter(|s| s.needs_label())
            .cloned()
            .collect();
        pending.sort_by_key(|s| (s.date_shipped, s.id));
        Ok(pending)
    }

    async fn mark_label_printed(&self, shipment_id: i64) -> Result<DateTime<Utc>, StoreError> {
        let mut tables = self.tables.write().await;
        let shipment = tables
            .shipments
            .get_mut(&shipment_id)
            .ok_or(StoreError::NotFound {
                entity: "shipment",
                id: shipment_id,
            })?;
        let stamp = Utc::now();
        shipment.date_label_printed = Some(stamp);
        Ok(stamp)
    }

    async fn group_member_emails(&self, group: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .group_members
            .iter()
            .filter(|(g, _, active)| g == group && *active)
            .map(|(_, email, _)| email.clone())
            .collect())
    }
}
