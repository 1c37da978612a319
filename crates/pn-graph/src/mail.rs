//! Mail folder resolution and report message selection

use chrono::NaiveDate;
use chrono_tz::Tz;
use pn_core::JobConfig;
use tracing::{debug, info};

use crate::client::GraphClient;
use crate::error::{GraphError, Result};
use crate::models::{MailFolder, Message};

/// How many unread messages are inspected, newest first
pub const MESSAGE_SEARCH_LIMIT: u32 = 10;

/// Page size requested when listing folders
const FOLDER_PAGE_SIZE: &str = "100";

/// Criteria for the day's report message
#[derive(Debug, Clone)]
pub struct MessageFilter {
    pub subject_keyword: String,
    /// Exact subject that matches regardless of keyword and date
    pub test_subject: String,
    pub timezone: Tz,
    /// Local date a keyword match must have been received on
    pub today: NaiveDate,
}

impl MessageFilter {
    pub fn from_job(job: &JobConfig, today: NaiveDate) -> Self {
        Self {
            subject_keyword: job.subject_keyword.clone(),
            test_subject: job.test_subject.clone(),
            timezone: job.timezone,
            today,
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        let subject = message.subject();
        if subject == self.test_subject {
            return true;
        }

        let received_on = message
            .received_date_time
            .with_timezone(&self.timezone)
            .date_naive();
        subject.contains(&self.subject_keyword) && received_on == self.today
    }
}

/// First message, in the given order, accepted by `filter`
pub fn select_target_message(messages: Vec<Message>, filter: &MessageFilter) -> Option<Message> {
    messages.into_iter().find(|message| filter.matches(message))
}

impl GraphClient {
    /// List top-level folders (`parent = None`) or the children of `parent`,
    /// across every result page
    pub async fn list_child_folders(&self, parent: Option<&str>) -> Result<Vec<MailFolder>> {
        let url = match parent {
            None => self.user_url("mailFolders"),
            Some(id) => self.user_url(&format!("mailFolders/{}/childFolders", id)),
        };
        self.get_all_pages(&url, &[("$top", FOLDER_PAGE_SIZE)]).await
    }

    /// Walk `path` from the mailbox root and return the last folder's id.
    ///
    /// Each segment must match a folder's display name exactly.
    pub async fn resolve_folder(&self, path: &[String]) -> Result<String> {
        if path.is_empty() {
            return Err(GraphError::NotFound("empty folder path".to_string()));
        }

        let mut parent: Option<String> = None;
        for segment in path {
            let folders = self.list_child_folders(parent.as_deref()).await?;
            let folder = folders
                .into_iter()
                .find(|f| f.display_name == *segment)
                .ok_or_else(|| GraphError::NotFound(format!("mail folder '{}'", segment)))?;

            debug!("Resolved folder '{}' -> {}", segment, folder.id);
            parent = Some(folder.id);
        }

        let folder_id = parent.unwrap_or_default();
        info!("Using mail folder {} ({})", path.join("/"), folder_id);
        Ok(folder_id)
    }

    /// Unread messages in a folder, newest first
    pub async fn list_unread_messages(&self, folder_id: &str, limit: u32) -> Result<Vec<Message>> {
        let url = self.user_url(&format!("mailFolders/{}/messages", folder_id));
        let top = limit.to_string();
        self.get_collection(
            &url,
            &[
                ("$filter", "isRead eq false"),
                ("$orderby", "receivedDateTime desc"),
                ("$top", top.as_str()),
            ],
        )
        .await
    }

    /// Look for the day's report among the newest unread messages
    pub async fn find_target_message(
        &self,
        folder_id: &str,
        filter: &MessageFilter,
    ) -> Result<Option<Message>> {
        let messages = self
            .list_unread_messages(folder_id, MESSAGE_SEARCH_LIMIT)
            .await?;
        debug!("{} unread message(s) in folder", messages.len());

        let target = select_target_message(messages, filter);
        match &target {
            Some(message) => info!("Found report message {}: {}", message.id, message.subject()),
            None => info!(
                "No unread message matching '{}' received on {}",
                filter.subject_keyword, filter.today
            ),
        }
        Ok(target)
    }
}
