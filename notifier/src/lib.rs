//! Review notifications: markdown rendered to an HTML email and POSTed to
//! the external mail endpoint.
//!
//! Delivery is best-effort by contract: the pipeline treats a failed send
//! as `email_sent = false`, never as a pipeline failure.

pub mod errors;
pub mod mailer;
pub mod render;

pub use errors::{NotifierError, NotifierResult};
pub use mailer::{DeliveryOutcome, Notifier, NotifierConfig, ReviewEmail};
