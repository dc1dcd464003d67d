use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::db::{StoreError, WorkflowStore};
use crate::models::shipment::Shipment;

/// Thermal label printer exposed as a character device (or any writable file).
#[derive(Debug, Clone)]
pub struct LabelPrinter {
    device: PathBuf,
}

impl LabelPrinter {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Decode the shipment's label and append it to the device.
    pub async fn print(&self, shipment: &Shipment) -> Result<(), LabelError> {
        let encoded = shipment
            .label_data
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or(LabelError::MissingLabel(shipment.id))?;
        let bytes = STANDARD.decode(encoded.trim())?;

        let device = self.device.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut out = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&device)?;
            out.write_all(&bytes)?;
            out.flush()
        })
        .await??;

        tracing::debug!(shipment_id = shipment.id, device = %self.device.display(), "Label sent to printer");
        Ok(())
    }
}

/// Print one copy and stamp the shipment so it leaves the queue.
pub async fn print_label(
    store: &dyn WorkflowStore,
    printer: &LabelPrinter,
    shipment: &Shipment,
) -> Result<DateTime<Utc>, LabelError> {
    printer.print(shipment).await?;
    metrics::counter!("labels_printed_total").increment(1);
    Ok(store.mark_label_printed(shipment.id).await?)
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LabelRunSummary {
    /// Shipments stamped as printed.
    pub printed: usize,
    /// Physical labels written, including extra international copies.
    pub copies: usize,
    pub failed: usize,
}

/// Print every shipment whose label has not been printed yet. International
/// shipments get `international_copies` labels for customs paperwork. One
/// bad shipment does not stop the rest of the batch.
///
/// A shipment is stamped as soon as its first copy is written, so a later
/// failure on an extra copy never causes the whole set to be reprinted.
pub async fn process_label_queue(
    store: &dyn WorkflowStore,
    printer: &LabelPrinter,
    international_copies: usize,
) -> Result<LabelRunSummary, LabelError> {
    let shipments = store.pending_label_shipments().await?;
    let mut summary = LabelRunSummary::default();

    for shipment in &shipments {
        let copies = if shipment.is_international() {
            international_copies.max(1)
        } else {
            1
        };

        if let Err(e) = print_label(store, printer, shipment).await {
            summary.failed += 1;
            tracing::error!(shipment_id = shipment.id, error = %e, "Label print failed");
            continue;
        }
        summary.printed += 1;

        let written = print_extra_copies(printer, shipment, copies).await;
        summary.copies += written;
        tracing::info!(
            shipment_id = shipment.id,
            reference = %shipment.ref_string(),
            copies = written,
            "Label printed"
        );
    }

    Ok(summary)
}

/// Write copies two through `copies` after the stamped first one. Returns the
/// total number of copies on paper.
async fn print_extra_copies(printer: &LabelPrinter, shipment: &Shipment, copies: usize) -> usize {
    let mut written = 1;
    while written < copies {
        if let Err(e) = printer.print(shipment).await {
            tracing::error!(
                shipment_id = shipment.id,
                written,
                wanted = copies,
                error = %e,
                "Extra label copy failed; shipment stays stamped"
            );
            break;
        }
        metrics::counter!("labels_printed_total").increment(1);
        written += 1;
    }
    written
}

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Shipment {0} has no label data")]
    MissingLabel(i64),

    #[error("Label data is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Printer write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
