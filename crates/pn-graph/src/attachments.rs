//! Attachment download and read-state update

use std::path::{Path, PathBuf};
use tracing::info;

use crate::client::GraphClient;
use crate::error::{GraphError, Result};
use crate::models::Attachment;

impl GraphClient {
    pub async fn list_attachments(&self, message_id: &str) -> Result<Vec<Attachment>> {
        let url = self.user_url(&format!("messages/{}/attachments", message_id));
        self.get_collection(&url, &[]).await
    }

    /// Raw attachment content
    pub async fn download_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>> {
        let url = self.user_url(&format!(
            "messages/{}/attachments/{}/$value",
            message_id, attachment_id
        ));
        self.get_bytes(&url).await
    }

    /// Download the message's first `.csv` attachment into `download_dir`
    /// and return the written path.
    pub async fn fetch_attachment(&self, message_id: &str, download_dir: &Path) -> Result<PathBuf> {
        let attachment = self
            .list_attachments(message_id)
            .await?
            .into_iter()
            .find(|a| a.name.ends_with(".csv"))
            .ok_or_else(|| {
                GraphError::NotFound(format!("CSV attachment on message {}", message_id))
            })?;

        let file_name = local_file_name(&attachment.name).ok_or_else(|| {
            GraphError::NotFound(format!("usable file name in '{}'", attachment.name))
        })?;

        let content = self.download_attachment(message_id, &attachment.id).await?;

        tokio::fs::create_dir_all(download_dir).await?;
        let file_path = download_dir.join(file_name);
        tokio::fs::write(&file_path, &content).await?;

        info!(
            "Downloaded attachment {} ({} bytes) to {}",
            attachment.name,
            content.len(),
            file_path.display()
        );
        Ok(file_path)
    }

    pub async fn mark_read(&self, message_id: &str) -> Result<()> {
        let url = self.user_url(&format!("messages/{}", message_id));
        self.patch_json(&url, &serde_json::json!({ "isRead": true }))
            .await?;
        info!("Marked message {} as read", message_id);
        Ok(())
    }
}

/// Final path component of an attachment name, `None` if nothing usable remains
fn local_file_name(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.trim().is_empty() && *n != "." && *n != "..")
}
