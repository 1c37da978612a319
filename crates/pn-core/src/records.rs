//! Delivery records and the record processor
//!
//! The daily report is delimited text with a header row. Only four columns
//! are read, matched by exact header name; everything else is ignored.

use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{Notifier, Result, RunReport, SendStatus};

pub const CONTACT_PERSON_COLUMN: &str = "delivery_contact_person";
pub const CONTACT_NUMBER_COLUMN: &str = "delivery_contact_number";
pub const DELIVERY_TIME_COLUMN: &str = "delivery_time";
pub const REFERENCE_NUMBER_COLUMN: &str = "reference_number";

const DEFAULT_CONTACT_NAME: &str = "Customer";
const DEFAULT_DELIVERY_TIME: &str = "today";
const DEFAULT_REFERENCE_NUMBER: &str = "NA";

/// One row of the daily report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub contact_name: String,
    /// Destination number with all whitespace removed; empty when absent
    pub contact_number: String,
    pub delivery_time: String,
    pub reference_number: String,
}

impl Default for DeliveryRecord {
    fn default() -> Self {
        Self {
            contact_name: DEFAULT_CONTACT_NAME.to_string(),
            contact_number: String::new(),
            delivery_time: DEFAULT_DELIVERY_TIME.to_string(),
            reference_number: DEFAULT_REFERENCE_NUMBER.to_string(),
        }
    }
}

impl DeliveryRecord {
    pub fn has_contact_number(&self) -> bool {
        !self.contact_number.is_empty()
    }
}

/// Position of each known column in the header row
#[derive(Debug, Default)]
struct ColumnIndex {
    contact_name: Option<usize>,
    contact_number: Option<usize>,
    delivery_time: Option<usize>,
    reference_number: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut index = Self::default();

        for (position, name) in headers.iter().enumerate() {
            // Excel exports often start with a byte order mark
            let slot = match name.trim_start_matches('\u{feff}') {
                CONTACT_PERSON_COLUMN => &mut index.contact_name,
                CONTACT_NUMBER_COLUMN => &mut index.contact_number,
                DELIVERY_TIME_COLUMN => &mut index.delivery_time,
                REFERENCE_NUMBER_COLUMN => &mut index.reference_number,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(position);
            }
        }

        index
    }

    fn missing_columns(&self) -> Vec<&'static str> {
        [
            (self.contact_name, CONTACT_PERSON_COLUMN),
            (self.contact_number, CONTACT_NUMBER_COLUMN),
            (self.delivery_time, DELIVERY_TIME_COLUMN),
            (self.reference_number, REFERENCE_NUMBER_COLUMN),
        ]
        .into_iter()
        .filter(|(position, _)| position.is_none())
        .map(|(_, name)| name)
        .collect()
    }

    fn record(&self, row: &StringRecord) -> DeliveryRecord {
        let field = |column: Option<usize>| {
            column
                .and_then(|position| row.get(position))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        DeliveryRecord {
            contact_name: field(self.contact_name)
                .unwrap_or(DEFAULT_CONTACT_NAME)
                .to_string(),
            contact_number: field(self.contact_number)
                .map(strip_whitespace)
                .unwrap_or_default(),
            delivery_time: field(self.delivery_time)
                .unwrap_or(DEFAULT_DELIVERY_TIME)
                .to_string(),
            reference_number: field(self.reference_number)
                .unwrap_or(DEFAULT_REFERENCE_NUMBER)
                .to_string(),
        }
    }
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parse report data into one entry per data row.
///
/// Only an unreadable header is an error; a data row the reader cannot
/// decode comes back as `Err` in its slot so the caller can count it.
pub fn parse_records(
    data: &[u8],
) -> Result<Vec<std::result::Result<DeliveryRecord, csv::Error>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let columns = ColumnIndex::from_headers(reader.headers()?);
    let missing = columns.missing_columns();
    if !missing.is_empty() {
        debug!("Report has no {:?} column(s); defaults apply", missing);
    }

    Ok(reader
        .records()
        .map(|row| row.map(|row| columns.record(&row)))
        .collect())
}

/// Process the downloaded report, notifying one recipient per row.
///
/// Rows are handled strictly in file order, one send at a time. No row
/// aborts the run: rows without a contact number, undecodable rows and
/// rejected sends are all counted as failed.
pub async fn process<N>(path: &Path, notifier: &N) -> Result<RunReport>
where
    N: Notifier + ?Sized,
{
    let data = tokio::fs::read(path).await?;
    let rows = parse_records(&data)?;

    info!(
        "Processing {} delivery records from {}",
        rows.len(),
        path.display()
    );

    let mut report = RunReport::new();

    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index + 1;

        let record = match row {
            Ok(record) => record,
            Err(e) => {
                warn!("Row {}: unreadable, counted as failed: {}", row_number, e);
                report.record_failure();
                continue;
            }
        };

        if !record.has_contact_number() {
            warn!(
                "Row {}: no contact number for order {}, counted as failed",
                row_number, record.reference_number
            );
            report.record_failure();
            continue;
        }

        info!(
            "Notifying {} {} {} {}",
            record.contact_name, record.contact_number, record.delivery_time, record.reference_number
        );

        let status = notifier
            .send_notification(
                &record.contact_number,
                &record.contact_name,
                &record.delivery_time,
                &record.reference_number,
            )
            .await;

        match status {
            SendStatus::Accepted { .. } => report.record_success(),
            SendStatus::Failed { reason } => {
                warn!(
                    "Row {}: notification for order {} failed: {}",
                    row_number, record.reference_number, reason
                );
                report.record_failure();
            }
        }
    }

    info!("Processed report: {}", report);
    Ok(report)
}
