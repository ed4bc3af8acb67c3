//! # TaskDeck Channels
//!
//! Outbound notification transports. Email is the only channel the
//! reminder workflow uses; [`LogNotifier`] stands in when SMTP is not
//! configured.

pub mod email;

pub use email::{LogNotifier, Mailer};
