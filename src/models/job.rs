use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A production job. Items are addressed by their 1-based position in the job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: i64,
    pub name: String,
}

/// One item (a single piece of artwork) inside a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: i64,
    pub job_id: i64,
    pub num_in_job: i32,
    pub path_to_file: String,
    pub bev_item_name: Option<String>,
    pub product_substrate: Option<String>,
    pub press_name: Option<String>,
    pub plate_type: Option<String>,
    /// Skip step & repeat and only RIP the file (beverage workflow).
    pub jdf_no_step: bool,
    /// Master item this one is stepped with, if any.
    pub steps_with: Option<i64>,
}

const FINAL_FILES_MARKER: &str = "/Final_Files";

/// Ticket name used when ripping color keys for the Shelbyville platemaking department.
pub const COLOR_KEYS_TICKET: &str = "Color Keys to Shelbyville";

impl Item {
    /// `<substrate>_<press>_<platetype>`; missing parts render as `None`.
    pub fn fsb_proof_ticket(&self) -> String {
        format!(
            "{}_{}_{}",
            display_or_none(&self.product_substrate),
            display_or_none(&self.press_name),
            display_or_none(&self.plate_type),
        )
    }

    /// Resolve the item's final file through JobStorage rather than
    /// `path_to_file`, which goes stale once a job is archived.
    pub fn job_storage_url(&self, fs_server_host: &str) -> String {
        let suffix = self
            .path_to_file
            .find(FINAL_FILES_MARKER)
            .map(|idx| &self.path_to_file[idx..])
            .unwrap_or("");
        format!(
            "file://{}/JobStorage/{}{}",
            fs_server_host, self.job_id, suffix
        )
    }

    pub fn bev_nomenclature(&self) -> &str {
        self.bev_item_name.as_deref().unwrap_or("")
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.job_id, self.num_in_job)
    }
}

fn display_or_none(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => "None",
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobLogType {
    Note,
}

/// An event recorded against a job (and optionally one of its items).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub job_id: i64,
    pub item_id: Option<i64>,
    pub log_type: JobLogType,
    pub text: String,
    pub event_time: DateTime<Utc>,
}
