//! Notifier trait definition
//!
//! The seam between the record processor and a messaging provider. Sending
//! never fails with an error: a provider that cannot deliver reports
//! [`SendStatus::Failed`] and the caller keeps going.

use async_trait::async_trait;

use crate::RunReport;

/// Outcome of one templated send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    /// Provider accepted the message
    Accepted { message_id: Option<String> },
    /// Anything else: error body, empty message list, transport failure
    Failed { reason: String },
}

impl SendStatus {
    pub fn accepted(message_id: Option<String>) -> Self {
        Self::Accepted { message_id }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Messaging provider used to notify recipients and the administrator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the delivery reminder for one record.
    ///
    /// Implementations may reroute `to` (test mode); the caller passes the
    /// number from the record.
    async fn send_notification(
        &self,
        to: &str,
        name: &str,
        delivery_time: &str,
        order_num: &str,
    ) -> SendStatus;

    /// Send the end-of-run summary. Never rerouted.
    async fn send_report(&self, to: &str, report: &RunReport) -> SendStatus;
}
