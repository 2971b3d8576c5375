//! # DataShed Notifier
//!
//! Batched activity-digest emails for catalog users. Once per
//! scheduler invocation, every opted-in user with unseen activity
//! gets exactly one summary email, and their notified-checkpoint
//! advances past everything the email covered.
//!
//! ## Architecture
//! ```text
//! Scheduler (cron / tokio interval)
//!   └── BatchNotifier.run_once()
//!         ├── PreferenceStore: site switch + candidate users
//!         ├── per user: cutoff = max(notified, enabled-at[, seen])
//!         ├── ActivityStore: activities strictly after cutoff
//!         ├── Composer: one digest per user (never one per activity)
//!         ├── MailDispatcher: send (failures isolated per user)
//!         └── CheckpointTracker: advance notified watermark
//! ```
//!
//! A dispatch failure leaves that user's checkpoint unadvanced, so
//! the same activities are retried on the next run (at-least-once).

pub mod checkpoint;
pub mod composer;
pub mod engine;
pub mod memory;
pub mod persistence;

pub use checkpoint::CheckpointTracker;
pub use composer::Composer;
pub use engine::{spawn_notifier, BatchNotifier, RunReport, SkipReason, UserOutcome};
pub use memory::MemoryStore;
pub use persistence::SqliteStore;
