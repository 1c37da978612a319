//! pn-core: parcel-notify core library
//!
//! Configuration, the delivery-record model, the `Notifier` seam and the
//! record processor that turns the daily CSV report into notifications.

pub mod config;
pub mod error;
pub mod notifier;
pub mod records;
pub mod report;

pub use config::{Config, GraphConfig, JobConfig, WhatsAppConfig};
pub use error::{Error, Result};
pub use notifier::{Notifier, SendStatus};
pub use records::{DeliveryRecord, parse_records, process};
pub use report::RunReport;
