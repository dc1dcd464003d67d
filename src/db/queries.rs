use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;

use super::{StoreError, WorkflowStore};
use crate::models::{
    job::{Item, Job, JobLogEntry},
    queue::{QueueEntry, QueueKind},
    shipment::{AddressKind, Shipment, ShipmentAddress},
};

const ITEM_COLUMNS: &str = "id, job_id, num_in_job, path_to_file, bev_item_name, \
     product_substrate, press_name, plate_type, jdf_no_step, steps_with";

/// PostgreSQL-backed workflow store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn entry_columns(kind: QueueKind) -> &'static str {
    match kind {
        QueueKind::ColorKeys => "id, item_id, date_queued, date_processed, number_of_attempts",
        QueueKind::TiffToPdf => {
            "id, item_id, date_queued, date_processed, 0::INTEGER AS number_of_attempts"
        }
    }
}

fn item_from_row(r: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        id: r.try_get("id")?,
        job_id: r.try_get("job_id")?,
        num_in_job: r.try_get("num_in_job")?,
        path_to_file: r.try_get("path_to_file")?,
        bev_item_name: r.try_get("bev_item_name")?,
        product_substrate: r.try_get("product_substrate")?,
        press_name: r.try_get("press_name")?,
        plate_type: r.try_get("plate_type")?,
        jdf_no_step: r.try_get("jdf_no_step")?,
        steps_with: r.try_get("steps_with")?,
    })
}

fn entry_from_row(kind: QueueKind, r: &PgRow) -> Result<QueueEntry, sqlx::Error> {
    Ok(QueueEntry {
        id: r.try_get("id")?,
        kind,
        item_id: r.try_get("item_id")?,
        date_queued: r.try_get("date_queued")?,
        date_processed: r.try_get("date_processed")?,
        number_of_attempts: r.try_get("number_of_attempts")?,
    })
}

fn shipment_from_row(r: &PgRow) -> Result<Shipment, StoreError> {
    let kind_str: String = r.try_get("address_kind")?;
    let kind = AddressKind::from_str(&kind_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown address kind '{}'", kind_str)))?;

    Ok(Shipment {
        id: r.try_get("id")?,
        job_id: r.try_get("job_id")?,
        job_name: r.try_get("job_name")?,
        address: ShipmentAddress {
            kind,
            id: r.try_get("address_id")?,
            name: r.try_get("address_name")?,
            company: r.try_get("address_company")?,
            country: r.try_get::<Option<String>, _>("address_country")?.unwrap_or_default(),
        },
        tracking_num: r.try_get("tracking_num")?,
        date_shipped: r.try_get("date_shipped")?,
        date_label_printed: r.try_get("date_label_printed")?,
        ship_carrier_code: r.try_get("ship_carrier_code")?,
        ship_packaging: r.try_get("ship_packaging")?,
        ship_weight: r.try_get("ship_weight")?,
        ship_service: r.try_get("ship_service")?,
        label_data: r.try_get("label_data")?,
        net_shipping_cost: r.try_get("net_shipping_cost")?,
    })
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(r) => Some(Job {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
            }),
            None => None,
        })
    }

    async fn get_item(&self, job_id: i64, item_num: i32) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "SELECT {} FROM items WHERE job_id = $1 AND num_in_job = $2",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(job_id)
            .bind(item_num)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(item_from_row).transpose()?)
    }

    async fn get_item_by_id(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(item_from_row).transpose()?)
    }

    async fn step_children(&self, item_id: i64) -> Result<Vec<Item>, StoreError> {
        let sql = format!(
            "SELECT {} FROM items WHERE steps_with = $1 ORDER BY job_id, num_in_job",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| item_from_row(r).map_err(StoreError::from))
            .collect()
    }

    async fn enqueue(&self, kind: QueueKind, item_id: i64) -> Result<QueueEntry, StoreError> {
        let sql = format!(
            "INSERT INTO {} (item_id) VALUES ($1) RETURNING {}",
            kind.table(),
            entry_columns(kind)
        );
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(entry_from_row(kind, &row)?)
    }

    async fn get_entry(&self, kind: QueueKind, id: i64) -> Result<Option<QueueEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            entry_columns(kind),
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(|r| entry_from_row(kind, r)).transpose()?)
    }

    async fn pending_entries(&self, kind: QueueKind) -> Result<Vec<QueueEntry>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM {}
            WHERE date_processed IS NULL
            ORDER BY date_queued DESC, id DESC
            "#,
            entry_columns(kind),
            kind.table()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|r| entry_from_row(kind, r).map_err(StoreError::from))
            .collect()
    }

    async fn record_attempt(&self, kind: QueueKind, id: i64) -> Result<i32, StoreError> {
        if !kind.tracks_attempts() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            UPDATE {}
            SET number_of_attempts = number_of_attempts + 1
            WHERE id = $1
            RETURNING number_of_attempts
            "#,
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "queue entry", id })?;

        Ok(row.try_get("number_of_attempts")?)
    }

    async fn mark_processed(&self, kind: QueueKind, id: i64) -> Result<DateTime<Utc>, StoreError> {
        let sql = format!(
            r#"
            UPDATE {}
            SET date_processed = GREATEST(NOW(), date_queued)
            WHERE id = $1
            RETURNING date_processed
            "#,
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "queue entry", id })?;

        Ok(row.try_get("date_processed")?)
    }

    async fn claim(&self, kind: QueueKind, id: i64) -> Result<Option<DateTime<Utc>>, StoreError> {
        let sql = format!(
            r#"
            UPDATE {}
            SET date_processed = GREATEST(NOW(), date_queued)
            WHERE id = $1 AND date_processed IS NULL
            RETURNING date_processed
            "#,
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(r) => Some(r.try_get("date_processed")?),
            None => None,
        })
    }

    async fn append_job_log(&self, entry: &JobLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO job_log (job_id, item_id, log_type, text, event_time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.job_id)
        .bind(entry.item_id)
        .bind(entry.log_type.to_string())
        .bind(&entry.text)
        .bind(entry.event_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_label_shipments(&self) -> Result<Vec<Shipment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.job_id, j.name AS job_name, s.address_kind, s.address_id,
                   s.tracking_num, s.date_shipped, s.date_label_printed,
                   s.ship_carrier_code, s.ship_packaging, s.ship_weight, s.ship_service,
                   s.label_data, s.net_shipping_cost,
                   COALESCE(ja.name, c.name) AS address_name,
                   COALESCE(ja.company, c.company) AS address_company,
                   COALESCE(ja.country, c.country) AS address_country
            FROM shipments s
            LEFT JOIN jobs j ON j.id = s.job_id
            LEFT JOIN job_addresses ja ON s.address_kind = 'job_address' AND ja.id = s.address_id
            LEFT JOIN contacts c ON s.address_kind = 'contact' AND c.id = s.address_id
            WHERE s.date_label_printed IS NULL
            ORDER BY s.date_shipped ASC, s.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(shipment_from_row).collect()
    }

    async fn mark_label_printed(&self, shipment_id: i64) -> Result<DateTime<Utc>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE shipments
            SET date_label_printed = NOW()
            WHERE id = $1
            RETURNING date_label_printed
            "#,
        )
        .bind(shipment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "shipment",
            id: shipment_id,
        })?;

        Ok(row.try_get("date_label_printed")?)
    }

    async fn group_member_emails(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT u.email
            FROM users u
            JOIN user_groups g ON g.user_id = u.id
            WHERE g.group_name = $1 AND u.is_active
            ORDER BY u.id
            "#,
        )
        .bind(group)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| r.try_get("email").map_err(StoreError::from))
            .collect()
    }
}
