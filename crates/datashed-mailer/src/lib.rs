//! # DataShed Mailer
//!
//! Outbound mail transport: an async SMTP dispatcher (lettre) for
//! production and a capturing mock for tests.

pub mod mock;
pub mod smtp;

pub use mock::MockMailer;
pub use smtp::SmtpDispatcher;
