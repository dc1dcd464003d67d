use serde::Deserialize;
use std::time::Duration;

use crate::models::queue::QueueKind;

/// Settings shared by the HTTP service, the queue watcher and the label queue.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the batch binaries.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Hotfolder polled by Automation Engine for JDF tickets
    #[serde(default = "default_jdf_root")]
    pub jdf_root: String,

    /// Mount point of the JobStorage share
    #[serde(default = "default_jobstorage_dir")]
    pub jobstorage_dir: String,

    /// Host name used in `file://` URLs handed to production software
    #[serde(default = "default_fs_server_host")]
    pub fs_server_host: String,

    /// Base URL production software uses to call back into this service
    #[serde(default = "default_webserver_host")]
    pub webserver_host: String,

    #[serde(default = "default_jmf_gateway_url")]
    pub jmf_gateway_url: String,

    #[serde(default = "default_jmf_return_url")]
    pub jmf_return_url: String,

    #[serde(default = "default_label_printer_path")]
    pub label_printer_path: String,

    /// HTTP mail relay; alerts are only logged when unset
    pub mail_relay_url: Option<String>,

    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    /// Comma separated admin addresses
    #[serde(default)]
    pub admins: Vec<String>,

    /// Group whose active members also receive queue alerts
    #[serde(default = "default_notify_group")]
    pub notify_group: String,

    #[serde(default = "default_duplicate_alert_threshold")]
    pub duplicate_alert_threshold: i32,

    #[serde(default = "default_watcher_queue")]
    pub watcher_queue: QueueKind,

    /// When set, the queue watcher keeps running and sleeps this long between runs
    pub watcher_poll_interval_secs: Option<u64>,

    #[serde(default = "default_international_label_copies")]
    pub international_label_copies: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_jdf_root() -> String {
    "/mnt/Production/JDF".to_string()
}

fn default_jobstorage_dir() -> String {
    "/mnt/JobStorage".to_string()
}

fn default_fs_server_host() -> String {
    "gcmaster".to_string()
}

fn default_webserver_host() -> String {
    "http://localhost:3000".to_string()
}

fn default_jmf_gateway_url() -> String {
    "http://localhost:4411/JDFP/JMF/".to_string()
}

fn default_jmf_return_url() -> String {
    "http://localhost:3000/xml/echo".to_string()
}

fn default_label_printer_path() -> String {
    "/dev/usb/lp0".to_string()
}

fn default_mail_from() -> String {
    "gold@localhost".to_string()
}

fn default_notify_group() -> String {
    "EmailGCHubColorManagement".to_string()
}

fn default_duplicate_alert_threshold() -> i32 {
    5
}

fn default_watcher_queue() -> QueueKind {
    QueueKind::ColorKeys
}

fn default_international_label_copies() -> usize {
    3
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Admin addresses with blanks dropped.
    pub fn admin_emails(&self) -> Vec<String> {
        self.admins
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn watcher_poll_interval(&self) -> Option<Duration> {
        self.watcher_poll_interval_secs.map(Duration::from_secs)
    }
}

/// Settings for the UDP file server daemon and its client, read from
/// `GOLD_FS_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct FsDaemonConfig {
    #[serde(default = "default_fs_bind_addr")]
    pub bind_addr: String,

    /// Where `gold-fs-ctl` sends commands
    #[serde(default = "default_fs_server_addr")]
    pub server_addr: String,

    #[serde(default = "default_jobstorage_dir")]
    pub jobstorage_dir: String,
}

fn default_fs_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_fs_server_addr() -> String {
    "127.0.0.1:8000".to_string()
}

impl FsDaemonConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("GOLD_FS_").from_env()
    }
}
