//! WhatsApp Cloud API client

use async_trait::async_trait;
use pn_core::{Notifier, RunReport, SendStatus, WhatsAppConfig};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{Result, WhatsAppError};
use crate::types::{SendResponse, TemplateMessage};

/// WhatsApp Cloud API client
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: Client,
    base_url: String,
    phone_number_id: String,
    token: String,
    admin_phone: String,
    test_mode: bool,
    notification_template: String,
    report_template: String,
    report_title: String,
    language: String,
}

impl WhatsAppClient {
    /// Create a new WhatsApp client
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        if config.test_mode {
            info!(
                "WhatsApp test mode on: notifications go to {}",
                config.admin_phone
            );
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            phone_number_id: config.phone_number_id.clone(),
            token: config.token.clone(),
            admin_phone: config.admin_phone.clone(),
            test_mode: config.test_mode,
            notification_template: config.notification_template.clone(),
            report_template: config.report_template.clone(),
            report_title: config.report_title.clone(),
            language: config.language.clone(),
        })
    }

    /// Send a body-only template and classify the provider's answer
    pub async fn send_template(&self, to: &str, template: &str, params: &[&str]) -> SendStatus {
        let message = TemplateMessage::new(to, template, &self.language, params);

        match self.post_message(&message).await {
            Ok((status, response)) => {
                if let Some(sent) = response.accepted() {
                    info!("WhatsApp {} to {}: {} accepted", template, to, status);
                    return SendStatus::accepted(sent.id.clone());
                }

                let reason = match response.error {
                    Some(error) => format!("{} - {}", status, error.message),
                    None => format!("{} - message not accepted", status),
                };
                warn!("WhatsApp {} to {} failed: {}", template, to, reason);
                SendStatus::failed(reason)
            }
            Err(e) => {
                warn!("WhatsApp {} to {} failed: {}", template, to, e);
                SendStatus::failed(e.to_string())
            }
        }
    }

    /// POST one message; any HTTP status is returned with its parsed body
    async fn post_message(
        &self,
        message: &TemplateMessage,
    ) -> Result<(reqwest::StatusCode, SendResponse)> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str(&body)
            .map_err(|e| WhatsAppError::InvalidResponse(format!("{} - {}: {}", status, e, body)))?;

        Ok((status, parsed))
    }
}

#[async_trait]
impl Notifier for WhatsAppClient {
    async fn send_notification(
        &self,
        to: &str,
        name: &str,
        delivery_time: &str,
        order_num: &str,
    ) -> SendStatus {
        let to = if self.test_mode {
            self.admin_phone.as_str()
        } else {
            to
        };

        self.send_template(
            to,
            &self.notification_template,
            &[name, order_num, delivery_time],
        )
        .await
    }

    async fn send_report(&self, to: &str, report: &RunReport) -> SendStatus {
        let total = report.total.to_string();
        let success = report.success.to_string();
        let failed = report.failed.to_string();

        self.send_template(
            to,
            &self.report_template,
            &[
                self.report_title.as_str(),
                total.as_str(),
                success.as_str(),
                failed.as_str(),
            ],
        )
        .await
    }
}
