//! `logicbase` core: ordered error/warning collections shared by operations.

pub mod error;
pub mod messages;

pub use error::StrictValidationFailed;
pub use messages::{full_message, humanize, AddOptions, Message, Messages, Reason, BASE};
