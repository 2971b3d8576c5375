//! # DataShed Core
//!
//! Shared foundation for the DataShed notification service:
//! error types, the catalog data model, the external-collaborator
//! traits (activity store, preference store, mail dispatcher), and
//! TOML configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DatashedConfig;
pub use error::{DatashedError, Result};
pub use traits::{ActivityStore, MailDispatcher, PreferenceStore};
pub use types::{Activity, ActivityKind, OutboundEmail, User};
