//! parcel-notify: daily parcel delivery reminders
//!
//! Picks up the day's CSV report from a Microsoft 365 mailbox, sends one
//! WhatsApp reminder per delivery and reports the totals to an administrator.
//! The binary wires [`pipeline::run`] to the real token file and messaging
//! provider; tests drive it with in-memory stand-ins.

pub mod error;
pub mod pipeline;

pub use error::{JobError, Result};
pub use pipeline::run;
