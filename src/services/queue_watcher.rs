//! Drains the background queues one entry at a time.
//!
//! A run walks the pending entries newest first. An entry whose previous
//! ticket is still sitting in the hotfolder is skipped (and, once it has been
//! retried often enough, reported to the admins by mail). The first entry
//! without a waiting ticket is claimed and dispatched, and the run ends.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db::StoreError;
use crate::models::job::Item;
use crate::models::queue::{QueueEntry, QueueKind};
use crate::services::{
    dispatch::{DispatchError, JdfDispatcher},
    jdf::{HotFolder, JdfError},
    mailer::{MailError, MailMessage, Mailer},
    tickets::JdfAction,
};

/// Who hears about entries stuck behind an unconsumed ticket, and when.
#[derive(Debug, Clone)]
pub struct AlertSettings {
    /// Attempt count at which the alert is sent. It fires exactly once.
    pub threshold: i32,
    pub admins: Vec<String>,
    pub notify_group: String,
    pub mail_from: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct WatchReport {
    pub examined: usize,
    pub duplicates: usize,
    pub alerts_sent: usize,
    /// Queue entry dispatched during this run, if any.
    pub processed: Option<i64>,
}

pub struct QueueWatcher {
    dispatcher: Arc<JdfDispatcher>,
    mailer: Arc<dyn Mailer>,
    alerts: AlertSettings,
}

impl QueueWatcher {
    pub fn new(dispatcher: Arc<JdfDispatcher>, mailer: Arc<dyn Mailer>, alerts: AlertSettings) -> Self {
        Self {
            dispatcher,
            mailer,
            alerts,
        }
    }

    /// Process at most one pending entry of `kind`.
    pub async fn run_once(&self, kind: QueueKind) -> Result<WatchReport, WatcherError> {
        let store = self.dispatcher.store();
        let hotfolder = self.dispatcher.hotfolder();
        let pending = store.pending_entries(kind).await?;
        let mut report = WatchReport::default();

        tracing::debug!(queue = %kind, pending = pending.len(), "Queue watcher run");

        for entry in pending {
            report.examined += 1;

            let Some(item) = store.get_item_by_id(entry.item_id).await? else {
                tracing::warn!(entry_id = entry.id, item_id = entry.item_id, "Queued item no longer exists");
                continue;
            };

            let file_name = HotFolder::file_name(item.job_id, item.num_in_job, Utc::now());
            let attempts = store.record_attempt(kind, entry.id).await?;
            let pattern = HotFolder::duplicate_pattern(&file_name);

            if !hotfolder.pending_matches(&pattern).await?.is_empty() {
                report.duplicates += 1;
                metrics::counter!("queue_duplicate_attempts_total").increment(1);
                tracing::info!(
                    entry_id = entry.id,
                    job_id = item.job_id,
                    item_num = item.num_in_job,
                    attempts,
                    "Previous ticket still waiting in hotfolder"
                );

                if kind.tracks_attempts() && attempts == self.alerts.threshold {
                    self.send_duplicate_alert(&item, &entry, attempts).await?;
                    report.alerts_sent += 1;
                }
                continue;
            }

            if store.claim(kind, entry.id).await?.is_none() {
                tracing::info!(entry_id = entry.id, "Entry claimed by another watcher");
                continue;
            }

            self.dispatcher.run(action_for(kind), &item).await?;
            metrics::counter!("queue_entries_processed_total").increment(1);
            tracing::info!(
                entry_id = entry.id,
                job_id = item.job_id,
                item_num = item.num_in_job,
                queue = %kind,
                "Queue entry processed"
            );
            report.processed = Some(entry.id);
            break;
        }

        Ok(report)
    }

    /// Run once per `interval` until `shutdown` is cancelled.
    ///
    /// The pause follows every run, including one that dispatched an entry, so
    /// the press sees at most one new ticket per interval.
    pub async fn poll(&self, kind: QueueKind, interval: Duration, shutdown: CancellationToken) {
        tracing::info!(queue = %kind, interval_secs = interval.as_secs(), "Polling queue");
        loop {
            match self.run_once(kind).await {
                Ok(report) => tracing::debug!(
                    examined = report.examined,
                    duplicates = report.duplicates,
                    processed = ?report.processed,
                    "Queue watcher run complete"
                ),
                Err(e) => tracing::error!(error = %e, "Queue watcher run failed, will retry"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!(queue = %kind, "Queue watcher stopped");
    }

    async fn send_duplicate_alert(
        &self,
        item: &Item,
        entry: &QueueEntry,
        attempts: i32,
    ) -> Result<(), WatcherError> {
        let mut to = self.alerts.admins.clone();
        for email in self
            .dispatcher
            .store()
            .group_member_emails(&self.alerts.notify_group)
            .await?
        {
            if !to.contains(&email) {
                to.push(email);
            }
        }

        let message = MailMessage {
            from: self.alerts.mail_from.clone(),
            to,
            subject: format!("Duplicate ColorKey JDF attempt for Item: {}", item),
            body: format!(
                "Item {} (queue entry {}) has been attempted {} times while an earlier JDF \
                 for it is still waiting in {}. Check that Automation Engine is picking up tickets.",
                item,
                entry.id,
                attempts,
                self.dispatcher.hotfolder().root().display()
            ),
        };
        self.mailer.send(&message).await?;
        metrics::counter!("queue_alerts_sent_total").increment(1);
        tracing::warn!(entry_id = entry.id, item = %item, attempts, "Duplicate JDF alert sent");
        Ok(())
    }
}

fn action_for(kind: QueueKind) -> JdfAction {
    match kind {
        QueueKind::ColorKeys => JdfAction::FsbColorkeys,
        QueueKind::TiffToPdf => JdfAction::TiffToPdf,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    HotFolder(#[from] JdfError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Alert mail failed: {0}")]
    Mail(#[from] MailError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, WorkflowStore};
    use crate::models::job::Job;
    use crate::services::dispatch::DispatchSettings;
    use crate::services::jmf::JmfGateway;
    use crate::services::job_storage::JobStorage;
    use async_trait::async_trait;
    use std::path::Path;
    use tokio::sync::Mutex;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<MailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    struct RefusingMailer;

    #[async_trait]
    impl Mailer for RefusingMailer {
        async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
            Err(MailError::Rejected(503))
        }
    }

    fn item(id: i64, num: i32) -> Item {
        Item {
            id,
            job_id: 61002,
            num_in_job: num,
            path_to_file: format!("/Jobs/61002/Final_Files/61002-{}.pdf", num),
            bev_item_name: None,
            product_substrate: None,
            press_name: None,
            plate_type: None,
            jdf_no_step: false,
            steps_with: None,
        }
    }

    async fn setup(dir: &Path) -> (MemoryStore, Arc<JdfDispatcher>, Arc<RecordingMailer>) {
        let store = MemoryStore::new();
        store
            .insert_job(Job {
                id: 61002,
                name: "Lids".to_string(),
            })
            .await;
        store.insert_item(item(1, 1)).await;
        store.insert_item(item(2, 2)).await;
        store.add_group_member("EmailGCHubColorManagement", "color@example.com", true).await;
        store.add_group_member("EmailGCHubColorManagement", "former@example.com", false).await;

        let hotfolder = dir.join("jdf");
        std::fs::create_dir_all(&hotfolder).unwrap();
        let dispatcher = Arc::new(JdfDispatcher::new(
            Arc::new(store.clone()),
            HotFolder::new(hotfolder),
            JobStorage::new(dir.join("JobStorage")),
            JmfGateway::new("http://127.0.0.1:9/").unwrap(),
            DispatchSettings {
                fs_server_host: "gcmaster".to_string(),
                webserver_host: "http://gold".to_string(),
                jmf_return_url: "http://gold/xml/echo".to_string(),
            },
        ));
        (store, dispatcher, Arc::new(RecordingMailer::default()))
    }

    fn watcher(dispatcher: &Arc<JdfDispatcher>, mailer: &Arc<RecordingMailer>) -> QueueWatcher {
        QueueWatcher::new(
            dispatcher.clone(),
            mailer.clone(),
            AlertSettings {
                threshold: 5,
                admins: vec!["admin@example.com".to_string()],
                notify_group: "EmailGCHubColorManagement".to_string(),
                mail_from: "gold@example.com".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_processes_one_entry_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, mailer) = setup(dir.path()).await;
        let watcher = watcher(&dispatcher, &mailer);
        store.enqueue(QueueKind::ColorKeys, 1).await.unwrap();
        store.enqueue(QueueKind::ColorKeys, 2).await.unwrap();

        let first = watcher.run_once(QueueKind::ColorKeys).await.unwrap();
        assert!(first.processed.is_some());
        assert_eq!(store.pending_entries(QueueKind::ColorKeys).await.unwrap().len(), 1);

        let second = watcher.run_once(QueueKind::ColorKeys).await.unwrap();
        assert!(second.processed.is_some());
        assert_ne!(first.processed, second.processed);

        let third = watcher.run_once(QueueKind::ColorKeys).await.unwrap();
        assert_eq!(third, WatchReport::default());

        assert_eq!(std::fs::read_dir(dispatcher.hotfolder().root()).unwrap().count(), 2);
        assert_eq!(store.job_log().await.len(), 2);
    }

    #[tokio::test]
    async fn test_waiting_ticket_blocks_entry_and_alerts_once_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, mailer) = setup(dir.path()).await;
        let watcher = watcher(&dispatcher, &mailer);
        let entry = store.enqueue(QueueKind::ColorKeys, 1).await.unwrap();
        std::fs::write(
            dispatcher.hotfolder().root().join("61002-1-01_02-03_04_05.jdf"),
            b"<JDF/>",
        )
        .unwrap();

        let mut previous = 0;
        for run in 1..=6 {
            let report = watcher.run_once(QueueKind::ColorKeys).await.unwrap();
            assert_eq!(report.duplicates, 1);
            assert_eq!(report.processed, None);
            assert_eq!(report.alerts_sent, usize::from(run == 5));

            let stored = store.get_entry(QueueKind::ColorKeys, entry.id).await.unwrap().unwrap();
            assert!(stored.number_of_attempts > previous);
            assert!(stored.is_pending());
            previous = stored.number_of_attempts;
        }

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Duplicate ColorKey JDF attempt for Item: 61002-1");
        assert_eq!(sent[0].to, vec!["admin@example.com", "color@example.com"]);
    }

    #[tokio::test]
    async fn test_waiting_ticket_for_item_ten_blocks_item_one() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, mailer) = setup(dir.path()).await;
        store.insert_item(item(10, 10)).await;
        let watcher = watcher(&dispatcher, &mailer);
        store.enqueue(QueueKind::ColorKeys, 1).await.unwrap();
        std::fs::write(
            dispatcher.hotfolder().root().join("61002-10-01_02-03_04_05.jdf"),
            b"<JDF/>",
        )
        .unwrap();

        let report = watcher.run_once(QueueKind::ColorKeys).await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.processed, None);
    }

    #[tokio::test]
    async fn test_waiting_ticket_for_item_one_does_not_block_item_two() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, mailer) = setup(dir.path()).await;
        let watcher = watcher(&dispatcher, &mailer);
        let entry = store.enqueue(QueueKind::ColorKeys, 2).await.unwrap();
        std::fs::write(
            dispatcher.hotfolder().root().join("61002-1-01_02-03_04_05.jdf"),
            b"<JDF/>",
        )
        .unwrap();

        let report = watcher.run_once(QueueKind::ColorKeys).await.unwrap();
        assert_eq!(report.processed, Some(entry.id));
    }

    #[tokio::test]
    async fn test_polling_writes_one_ticket_per_interval() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, mailer) = setup(dir.path()).await;
        store.insert_item(item(3, 3)).await;
        let watcher = watcher(&dispatcher, &mailer);
        for item_id in [1, 2, 3] {
            store.enqueue(QueueKind::ColorKeys, item_id).await.unwrap();
        }

        // Far shorter than the interval, far longer than one run.
        let stopped = tokio::time::timeout(
            Duration::from_millis(500),
            watcher.poll(QueueKind::ColorKeys, Duration::from_secs(60), CancellationToken::new()),
        )
        .await;
        assert!(stopped.is_err());

        assert_eq!(std::fs::read_dir(dispatcher.hotfolder().root()).unwrap().count(), 1);
        assert_eq!(store.pending_entries(QueueKind::ColorKeys).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_polling_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, dispatcher, mailer) = setup(dir.path()).await;
        let watcher = watcher(&dispatcher, &mailer);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            watcher.poll(QueueKind::ColorKeys, Duration::from_secs(60), shutdown),
        )
        .await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_failed_alert_mail_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, _mailer) = setup(dir.path()).await;
        let watcher = QueueWatcher::new(
            dispatcher.clone(),
            Arc::new(RefusingMailer),
            AlertSettings {
                threshold: 5,
                admins: vec!["admin@example.com".to_string()],
                notify_group: "EmailGCHubColorManagement".to_string(),
                mail_from: "gold@example.com".to_string(),
            },
        );
        store.enqueue(QueueKind::ColorKeys, 1).await.unwrap();
        std::fs::write(
            dispatcher.hotfolder().root().join("61002-1-01_02-03_04_05.jdf"),
            b"<JDF/>",
        )
        .unwrap();

        for _ in 1..5 {
            assert_ok!(watcher.run_once(QueueKind::ColorKeys).await);
        }
        let err = watcher.run_once(QueueKind::ColorKeys).await.unwrap_err();
        assert!(matches!(err, WatcherError::Mail(MailError::Rejected(503))));

        // Past the threshold nothing is mailed, so runs succeed again.
        assert_ok!(watcher.run_once(QueueKind::ColorKeys).await);
    }

    #[tokio::test]
    async fn test_concurrent_watchers_process_entry_once() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, mailer) = setup(dir.path()).await;
        let a = watcher(&dispatcher, &mailer);
        let b = watcher(&dispatcher, &mailer);
        store.enqueue(QueueKind::ColorKeys, 1).await.unwrap();

        let (ra, rb) = futures::join!(
            a.run_once(QueueKind::ColorKeys),
            b.run_once(QueueKind::ColorKeys)
        );
        let processed = [ra.unwrap().processed, rb.unwrap().processed]
            .iter()
            .filter(|p| p.is_some())
            .count();
        assert_eq!(processed, 1);
        assert_eq!(store.job_log().await.len(), 1);
    }

    #[tokio::test]
    async fn test_tiff_queue_does_not_count_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let (store, dispatcher, mailer) = setup(dir.path()).await;
        let watcher = watcher(&dispatcher, &mailer);
        let entry = store.enqueue(QueueKind::TiffToPdf, 1).await.unwrap();

        let report = watcher.run_once(QueueKind::TiffToPdf).await.unwrap();
        assert_eq!(report.processed, Some(entry.id));
        let stored = store.get_entry(QueueKind::TiffToPdf, entry.id).await.unwrap().unwrap();
        assert_eq!(stored.number_of_attempts, 0);
        assert!(store.job_log().await.is_empty());
    }
}
