pub mod countries;
pub mod dispatch;
pub mod fs_client;
pub mod fs_daemon;
pub mod jdf;
pub mod jmf;
pub mod job_storage;
pub mod labels;
pub mod mailer;
pub mod queue_watcher;
pub mod tickets;
