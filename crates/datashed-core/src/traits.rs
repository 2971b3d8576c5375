//! Contracts consumed by the batch notifier.
//!
//! The notifier is a pure orchestration boundary between three
//! external systems: the activity log, the preference store, and the
//! mail transport. Each gets an object-safe async trait so tests can
//! swap in in-memory or mock implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Activity, OutboundEmail, User};

/// Append-only per-user activity stream.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Activities on `user_id`'s stream with timestamp strictly
    /// greater than `since`, ascending by time. `None` means the
    /// whole stream.
    async fn activities_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>>;

    /// Append an activity to its user's stream.
    async fn record(&self, activity: Activity) -> Result<()>;

    /// Current server time. Checkpoints are stamped against this
    /// clock, not the caller's.
    fn server_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-user notification preferences plus the site-wide kill switch.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// All known users.
    async fn users(&self) -> Result<Vec<User>>;

    /// Look up one user by id.
    async fn user(&self, user_id: &str) -> Result<Option<User>>;

    /// Register a new user.
    async fn insert_user(&self, user: User) -> Result<()>;

    /// Flip the per-user opt-in. Implementations stamp
    /// `notifications_enabled_at` on every false→true transition.
    async fn set_user_preference(&self, user_id: &str, enabled: bool) -> Result<()>;

    /// Site-wide kill switch (true unless an admin disabled it).
    async fn site_enabled(&self) -> Result<bool>;

    /// Most recent enablement of the site-wide switch.
    async fn site_enabled_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// Admin mutator for the site-wide switch. Stamps the enablement
    /// time on every false→true transition.
    async fn set_site_wide(&self, enabled: bool) -> Result<()>;

    /// Raw write of the seen watermark. Callers go through
    /// `CheckpointTracker::mark_seen`.
    async fn set_last_seen(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Raw write of the notified watermark. Callers go through
    /// `CheckpointTracker::advance_notified`, which enforces
    /// monotonicity.
    async fn set_last_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Outbound mail transport. Treated as a reliable sink: retry and
/// delivery guarantees live on the other side of this boundary.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(&self, mail: &OutboundEmail) -> Result<()>;
}
