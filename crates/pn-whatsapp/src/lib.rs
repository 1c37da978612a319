//! pn-whatsapp: WhatsApp Cloud API notifier for parcel-notify
//!
//! Sends pre-approved template messages through the Meta Graph
//! `/{phone_number_id}/messages` endpoint and implements
//! [`pn_core::Notifier`] on top of it.

pub mod client;
pub mod error;
pub mod types;

pub use client::WhatsAppClient;
pub use error::{Result, WhatsAppError};
