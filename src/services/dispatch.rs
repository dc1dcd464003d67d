use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

use crate::db::{StoreError, WorkflowStore};
use crate::models::job::{Item, JobLogEntry, JobLogType};
use crate::services::{
    jdf::{HotFolder, ItemJdf, JdfError, SendOutcome},
    jmf::{JmfError, JmfGateway, JmfMessage},
    job_storage::{JobStorage, JobStorageError},
    tickets::{JdfAction, JdfTicket, TicketInputs},
};

const JOB_STORAGE_MARKER: &str = "/JobStorage";

/// Hostnames used when building URLs handed to production software.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// File server host used in `file://` URLs.
    pub fs_server_host: String,
    /// Base URL production software uses to reach this service.
    pub webserver_host: String,
    /// Where the gateway should post JMF replies.
    pub jmf_return_url: String,
}

/// Generates JDF tickets for items and hands them to production.
pub struct JdfDispatcher {
    store: Arc<dyn WorkflowStore>,
    hotfolder: HotFolder,
    storage: JobStorage,
    jmf: JmfGateway,
    settings: DispatchSettings,
}

impl JdfDispatcher {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        hotfolder: HotFolder,
        storage: JobStorage,
        jmf: JmfGateway,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            hotfolder,
            storage,
            jmf,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn hotfolder(&self) -> &HotFolder {
        &self.hotfolder
    }

    /// Resolve the job, then the item at its 1-based position.
    pub async fn find_item(&self, job_id: i64, item_num: i32) -> Result<Item, DispatchError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound(job_id))?;

        self.store
            .get_item(job_id, item_num)
            .await?
            .ok_or(DispatchError::ItemNotFound { job_id, item_num })
    }

    /// Build the ticket document for an item.
    pub async fn generate(&self, ticket: JdfTicket, item: &Item) -> Result<ItemJdf, DispatchError> {
        let mut inputs = TicketInputs {
            job_storage_url: item.job_storage_url(&self.settings.fs_server_host),
            ..Default::default()
        };

        if ticket.needs_step_children() {
            inputs.step_children = self
                .store
                .step_children(item.id)
                .await?
                .into_iter()
                .map(|child| child.path_to_file)
                .collect();
        }

        if ticket.needs_tiffs() {
            let storage = self.storage.clone();
            let (job_id, item_num) = (item.job_id, item.num_in_job);
            let tiffs =
                tokio::task::spawn_blocking(move || storage.list_item_tiffs(job_id, item_num))
                    .await??;
            inputs.tiff_urls = tiffs
                .iter()
                .map(|p| self.tiff_url(p))
                .collect();
        }

        if ticket == JdfTicket::BevWorkflow {
            // Backstage needs the tiff folder to exist before the ticket runs.
            let storage = self.storage.clone();
            let (job_id, item_num) = (item.job_id, item.num_in_job);
            let name = item.bev_nomenclature().to_string();
            tokio::task::spawn_blocking(move || {
                storage.create_tiff_folder(job_id, item_num, &name)
            })
            .await??;
        }

        Ok(ticket.build(item, &inputs))
    }

    /// Generate the action's ticket and drop it in the hotfolder.
    pub async fn run(&self, action: JdfAction, item: &Item) -> Result<SendOutcome, DispatchError> {
        let jdf = self.generate(action.ticket(), item).await?;
        let outcome = self.hotfolder.send(&jdf, Utc::now()).await?;

        if action == JdfAction::FsbColorkeys && matches!(outcome, SendOutcome::Written(_)) {
            self.store
                .append_job_log(&JobLogEntry {
                    job_id: item.job_id,
                    item_id: Some(item.id),
                    log_type: JobLogType::Note,
                    text: format!(
                        "Color Keys sent to Shelbyville for Item #{} in job.",
                        item.num_in_job
                    ),
                    event_time: Utc::now(),
                })
                .await?;
        }

        Ok(outcome)
    }

    /// Ask the JMF gateway to pull the ticket from this service and run it.
    pub async fn submit_jmf(&self, ticket: JdfTicket, item: &Item) -> Result<String, DispatchError> {
        let url = format!(
            "{}/xml/jdf/gen/{}/{}/{}",
            self.settings.webserver_host.trim_end_matches('/'),
            item.job_id,
            item.num_in_job,
            ticket
        );
        let message = JmfMessage::submit_queue_entry(url, self.settings.jmf_return_url.clone());
        Ok(self.jmf.execute(&message).await?)
    }

    fn tiff_url(&self, path: &Path) -> String {
        let path = path.to_string_lossy();
        let suffix = match path.find(JOB_STORAGE_MARKER) {
            Some(idx) => &path[idx..],
            None => &path[..],
        };
        format!("file://{}{}", self.settings.fs_server_host, suffix)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Job {0} not found")]
    JobNotFound(i64),

    #[error("Item {item_num} of job {job_id} not found")]
    ItemNotFound { job_id: i64, item_num: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Jdf(#[from] JdfError),

    #[error(transparent)]
    Storage(#[from] JobStorageError),

    #[error(transparent)]
    Jmf(#[from] JmfError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DispatchError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::JobNotFound(_) | DispatchError::ItemNotFound { .. }
        )
    }
}
