//! pn-graph: Microsoft Graph mailbox access for parcel-notify
//!
//! This crate covers the mailbox half of the job:
//!
//! - `token`: client-credentials access token with a pluggable cache
//! - `mail`: folder path resolution and selection of the day's report message
//! - `attachments`: CSV attachment download and marking the message read
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pn_graph::{FileTokenStore, GraphClient, MessageFilter, TokenCache};
//!
//! let cache = TokenCache::new(&config.graph, FileTokenStore::new(&config.graph.token_file))?;
//! let client = GraphClient::new(&config.graph, cache.get_token().await?)?;
//!
//! let folder_id = client.resolve_folder(&config.job.folder_path).await?;
//! let filter = MessageFilter::from_job(&config.job, config.job.today());
//! if let Some(message) = client.find_target_message(&folder_id, &filter).await? {
//!     let path = client.fetch_attachment(&message.id, &config.job.download_dir).await?;
//!     client.mark_read(&message.id).await?;
//! }
//! ```

pub mod attachments;
pub mod client;
pub mod error;
pub mod mail;
pub mod models;
pub mod token;

pub use client::GraphClient;
pub use error::{GraphError, Result};
pub use mail::{MessageFilter, select_target_message};
pub use models::{Attachment, MailFolder, Message};
pub use token::{CachedCredential, FileTokenStore, MemoryTokenStore, TokenCache, TokenStore};
