use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The background queues fed by items entering a production stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueKind {
    /// Color-key JDF generation.
    ColorKeys,
    /// Tiff to PDF conversion.
    TiffToPdf,
}

impl QueueKind {
    pub fn table(self) -> &'static str {
        match self {
            QueueKind::ColorKeys => "color_key_queue",
            QueueKind::TiffToPdf => "tiff_to_pdf_queue",
        }
    }

    /// Only the color-key queue keeps an attempt counter.
    pub fn tracks_attempts(self) -> bool {
        matches!(self, QueueKind::ColorKeys)
    }
}

/// A pending (or historical) background task tied to one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub id: i64,
    pub kind: QueueKind,
    pub item_id: i64,
    pub date_queued: DateTime<Utc>,
    pub date_processed: Option<DateTime<Utc>>,
    pub number_of_attempts: i32,
}

impl QueueEntry {
    pub fn is_pending(&self) -> bool {
        self.date_processed.is_none()
    }
}

/// Request to queue an item for background processing.
#[derive(Debug, Deserialize, Validate)]
pub struct EnqueueRequest {
    #[garde(range(min = 1))]
    pub job_id: i64,

    #[garde(range(min = 1, max = 999))]
    pub item_num: i32,
}
