//! In-memory store — the activity log and preference store behind
//! one `RwLock`. Backs tests and demos; the binary wires the SQLite
//! store instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use datashed_core::error::{DatashedError, Result};
use datashed_core::traits::{ActivityStore, PreferenceStore};
use datashed_core::types::{Activity, User};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    activities: Vec<Activity>,
    site_disabled: bool,
    site_enabled_at: Option<DateTime<Utc>>,
}

/// Combined in-memory activity + preference store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a user by account name.
    pub async fn user_by_name(&self, name: &str) -> Option<User> {
        let inner = self.inner.read().await;
        inner.users.iter().find(|u| u.name == name).cloned()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn activities_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Activity> = inner
            .activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| match since {
                Some(cutoff) => a.at > cutoff,
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| a.at);
        Ok(found)
    }

    async fn record(&self, activity: Activity) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.activities.push(activity);
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn users(&self) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.clone())
    }

    async fn user(&self, user_id: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.users.push(user);
        Ok(())
    }

    async fn set_user_preference(&self, user_id: &str, enabled: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| DatashedError::UnknownUser(user_id.to_string()))?;
        if enabled && !user.email_notifications {
            user.notifications_enabled_at = Some(Utc::now());
        }
        user.email_notifications = enabled;
        Ok(())
    }

    async fn site_enabled(&self) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(!inner.site_disabled)
    }

    async fn site_enabled_at(&self) -> Result<Option<DateTime<Utc>>> {
        let inner = self.inner.read().await;
        Ok(inner.site_enabled_at)
    }

    async fn set_site_wide(&self, enabled: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        if enabled && inner.site_disabled {
            inner.site_enabled_at = Some(Utc::now());
        }
        inner.site_disabled = !enabled;
        Ok(())
    }

    async fn set_last_seen(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| DatashedError::UnknownUser(user_id.to_string()))?;
        user.last_seen = Some(at);
        Ok(())
    }

    async fn set_last_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| DatashedError::UnknownUser(user_id.to_string()))?;
        user.last_notified = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datashed_core::types::ActivityKind;

    #[tokio::test]
    async fn test_activities_since_is_strict() {
        let store = MemoryStore::new();
        let mut a = Activity::new("u1", ActivityKind::DatasetUpdated, "ds", "one");
        let t = a.at;
        store.record(a.clone()).await.unwrap();
        a.id = "second".into();
        a.at = t + chrono::Duration::seconds(5);
        store.record(a).await.unwrap();

        // Strictly greater: the activity at exactly `t` is excluded.
        let found = store.activities_since("u1", Some(t)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "second");

        let all = store.activities_since("u1", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_activities_come_back_ordered() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for offset in [30i64, 10, 20] {
            let mut a = Activity::new("u1", ActivityKind::DatasetUpdated, "ds", "");
            a.at = base + chrono::Duration::seconds(offset);
            store.record(a).await.unwrap();
        }
        let found = store.activities_since("u1", None).await.unwrap();
        let times: Vec<_> = found.iter().map(|a| a.at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_enablement_stamped_on_opt_in_only() {
        let store = MemoryStore::new();
        let user = User::new("sara", "sara@sararollins.com", "Sara Rollins");
        let id = user.id.clone();
        store.insert_user(user).await.unwrap();

        store.set_user_preference(&id, true).await.unwrap();
        let first = store.user(&id).await.unwrap().unwrap().notifications_enabled_at;
        assert!(first.is_some());

        // Re-enabling while already on does not move the stamp.
        store.set_user_preference(&id, true).await.unwrap();
        let second = store.user(&id).await.unwrap().unwrap().notifications_enabled_at;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_site_switch_round_trip() {
        let store = MemoryStore::new();
        assert!(store.site_enabled().await.unwrap());
        assert!(store.site_enabled_at().await.unwrap().is_none());

        store.set_site_wide(false).await.unwrap();
        assert!(!store.site_enabled().await.unwrap());

        store.set_site_wide(true).await.unwrap();
        assert!(store.site_enabled().await.unwrap());
        assert!(store.site_enabled_at().await.unwrap().is_some());
    }
}
