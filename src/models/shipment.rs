use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::services::countries;

/// The two address models a shipment may point at. Both expose the same
/// name/company/country shape so they can be treated alike.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AddressKind {
    JobAddress,
    Contact,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipmentAddress {
    pub kind: AddressKind,
    pub id: i64,
    pub name: Option<String>,
    pub company: Option<String>,
    pub country: String,
}

/// A FedEx shipment, either sent to a person or created automatically when a
/// job is proofed out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: i64,
    pub job_id: Option<i64>,
    pub job_name: Option<String>,
    pub address: ShipmentAddress,
    /// Populated by the carrier after a successful request.
    pub tracking_num: String,
    pub date_shipped: DateTime<Utc>,
    /// While `None`, the label queue will print this shipment's label.
    pub date_label_printed: Option<DateTime<Utc>>,
    pub ship_carrier_code: String,
    pub ship_packaging: String,
    pub ship_weight: f64,
    pub ship_service: String,
    /// Base64 label payload returned by the carrier.
    pub label_data: Option<String>,
    pub net_shipping_cost: Option<f64>,
}

impl Shipment {
    pub fn is_international(&self) -> bool {
        countries::full_to_abbrev(&self.address.country) != Some("US")
    }

    pub fn needs_label(&self) -> bool {
        self.date_label_printed.is_none()
    }

    /// Person first, then company.
    pub fn recipient(&self) -> &str {
        match (&self.address.name, &self.address.company) {
            (Some(name), _) if !name.is_empty() => name,
            (_, Some(company)) => company,
            _ => "",
        }
    }

    /// e.g. `50883 SMRE_12 SD`, or the recipient for shipments not tied to a job.
    pub fn ref_string(&self) -> String {
        match self.job_id {
            Some(id) => format!("{} {}", id, self.job_name.as_deref().unwrap_or_default()),
            None => self.recipient().to_string(),
        }
    }
}
