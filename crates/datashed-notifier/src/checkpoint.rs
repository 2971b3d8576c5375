//! Per-user watermark handling — two independent checkpoints.
//!
//! `last_seen` moves when the user views their dashboard.
//! `last_notified` moves only when a digest email goes out, and only
//! forward. The two never write each other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use datashed_core::error::{DatashedError, Result};
use datashed_core::traits::{ActivityStore, PreferenceStore};
use datashed_core::types::User;

/// Tracks and advances the seen/notified watermarks for all users.
#[derive(Clone)]
pub struct CheckpointTracker {
    prefs: Arc<dyn PreferenceStore>,
    activities: Arc<dyn ActivityStore>,
}

impl CheckpointTracker {
    pub fn new(prefs: Arc<dyn PreferenceStore>, activities: Arc<dyn ActivityStore>) -> Self {
        Self { prefs, activities }
    }

    /// Dashboard-view path: stamp `last_seen` with the store's clock.
    /// Never touches `last_notified`.
    pub async fn mark_seen(&self, user_id: &str) -> Result<()> {
        let now = self.activities.server_time();
        self.prefs.set_last_seen(user_id, now).await?;
        tracing::debug!("👀 {user_id} marked activities seen at {now}");
        Ok(())
    }

    /// Advance `last_notified` to `at`. Monotonic: moving backwards
    /// fails with `InvalidCheckpoint` and leaves the stored value
    /// untouched. Re-stamping the same instant is a no-op, not an
    /// error.
    pub async fn advance_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let user = self
            .prefs
            .user(user_id)
            .await?
            .ok_or_else(|| DatashedError::UnknownUser(user_id.to_string()))?;

        if let Some(current) = user.last_notified {
            if at < current {
                return Err(DatashedError::InvalidCheckpoint {
                    current,
                    attempted: at,
                });
            }
        }
        self.prefs.set_last_notified(user_id, at).await
    }

    /// When the user's notifications last became active: the later of
    /// the user flag's most recent false→true transition and the
    /// site-wide switch's most recent enablement. Activity from
    /// before this moment is never emailed.
    pub async fn enablement_time(&self, user: &User) -> Result<Option<DateTime<Utc>>> {
        let site_at = self.prefs.site_enabled_at().await?;
        Ok(max_option(user.notifications_enabled_at, site_at))
    }

    /// Dashboard badge: how many activities the user has not yet
    /// looked at. Independent of the notified watermark.
    pub async fn new_activity_count(&self, user_id: &str) -> Result<usize> {
        let user = self
            .prefs
            .user(user_id)
            .await?
            .ok_or_else(|| DatashedError::UnknownUser(user_id.to_string()))?;
        let unseen = self
            .activities
            .activities_since(&user.id, user.last_seen)
            .await?;
        Ok(unseen.len())
    }
}

/// Later of two optional instants; `None` loses to anything.
pub(crate) fn max_option(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Duration;

    async fn tracker_with_user(name: &str) -> (CheckpointTracker, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let user = User::new(name, &format!("{name}@example.com"), name);
        let id = user.id.clone();
        store.insert_user(user).await.unwrap();
        let tracker = CheckpointTracker::new(store.clone(), store.clone());
        (tracker, store, id)
    }

    #[tokio::test]
    async fn test_advance_notified_is_monotonic() {
        let (tracker, _store, id) = tracker_with_user("sara").await;
        let t1 = Utc::now();
        let t2 = t1 - Duration::seconds(30);

        tracker.advance_notified(&id, t1).await.unwrap();
        let err = tracker.advance_notified(&id, t2).await.unwrap_err();
        assert!(matches!(err, DatashedError::InvalidCheckpoint { .. }));
    }

    #[tokio::test]
    async fn test_advance_notified_same_instant_is_ok() {
        let (tracker, _store, id) = tracker_with_user("sara").await;
        let t1 = Utc::now();
        tracker.advance_notified(&id, t1).await.unwrap();
        tracker.advance_notified(&id, t1).await.unwrap();
    }

    #[tokio::test]
    async fn test_rewind_leaves_checkpoint_untouched() {
        let (tracker, store, id) = tracker_with_user("sara").await;
        let t1 = Utc::now();
        tracker.advance_notified(&id, t1).await.unwrap();
        let _ = tracker.advance_notified(&id, t1 - Duration::hours(1)).await;

        let user = store.user(&id).await.unwrap().unwrap();
        assert_eq!(user.last_notified, Some(t1));
    }

    #[tokio::test]
    async fn test_mark_seen_does_not_touch_notified() {
        let (tracker, store, id) = tracker_with_user("sara").await;
        tracker.mark_seen(&id).await.unwrap();

        let user = store.user(&id).await.unwrap().unwrap();
        assert!(user.last_seen.is_some());
        assert!(user.last_notified.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_is_an_error() {
        let (tracker, _store, _id) = tracker_with_user("sara").await;
        let err = tracker.advance_notified("nobody", Utc::now()).await.unwrap_err();
        assert!(matches!(err, DatashedError::UnknownUser(_)));
    }

    #[test]
    fn test_max_option() {
        let a = Utc::now();
        let b = a + Duration::seconds(5);
        assert_eq!(max_option(Some(a), Some(b)), Some(b));
        assert_eq!(max_option(Some(a), None), Some(a));
        assert_eq!(max_option(None, None), None);
    }
}
