//! SQLite-backed store — users, preferences, checkpoints, and the
//! activity stream in one file. Survives restarts, shared by the CLI
//! and the catalog web app.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use datashed_core::error::{DatashedError, Result};
use datashed_core::traits::{ActivityStore, PreferenceStore};
use datashed_core::types::{Activity, ActivityKind, User};

/// SQLite store implementing both external-store contracts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| store_err("DB open", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Throwaway database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| store_err("DB open", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                display_name TEXT NOT NULL,
                email_notifications INTEGER NOT NULL DEFAULT 0,
                last_seen TEXT,
                last_notified TEXT,
                notifications_enabled_at TEXT,
                created_at TEXT NOT NULL
            );

            -- Append-only per-user activity stream
            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,              -- 'dataset_updated', ...
                object TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activities_user_at
                ON activities(user_id, at);

            -- Site-wide switches
            CREATE TABLE IF NOT EXISTS site_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| store_err("Migration", e))?;
        Ok(())
    }

    fn setting(&self, conn: &Connection, key: &str) -> Result<Option<String>> {
        let mut stmt = conn
            .prepare("SELECT value FROM site_settings WHERE key = ?1")
            .map_err(|e| store_err("Prepare", e))?;
        let mut rows = stmt
            .query_map([key], |row| row.get::<_, String>(0))
            .map_err(|e| store_err("Query", e))?;
        match rows.next() {
            Some(value) => Ok(Some(value.map_err(|e| store_err("Row", e))?)),
            None => Ok(None),
        }
    }

    fn put_setting(&self, conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO site_settings (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )
        .map_err(|e| store_err("Write setting", e))?;
        Ok(())
    }
}

fn store_err(what: &str, e: impl std::fmt::Display) -> DatashedError {
    DatashedError::Store(format!("{what}: {e}"))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| store_err("Bad timestamp", e))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        Some(s) => Ok(Some(parse_ts(&s)?)),
        None => Ok(None),
    }
}

fn kind_to_str(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::DatasetCreated => "dataset_created",
        ActivityKind::DatasetUpdated => "dataset_updated",
        ActivityKind::DatasetDeleted => "dataset_deleted",
        ActivityKind::ResourceAdded => "resource_added",
    }
}

fn kind_from_str(raw: &str) -> Result<ActivityKind> {
    match raw {
        "dataset_created" => Ok(ActivityKind::DatasetCreated),
        "dataset_updated" => Ok(ActivityKind::DatasetUpdated),
        "dataset_deleted" => Ok(ActivityKind::DatasetDeleted),
        "resource_added" => Ok(ActivityKind::ResourceAdded),
        other => Err(store_err("Unknown activity kind", other)),
    }
}

type UserRow = (
    String,
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn row_to_user(row: UserRow) -> Result<User> {
    let (id, name, email, display_name, email_notifications, seen, notified, enabled_at, created) =
        row;
    Ok(User {
        id,
        name,
        email,
        display_name,
        email_notifications,
        last_seen: parse_opt_ts(seen)?,
        last_notified: parse_opt_ts(notified)?,
        notifications_enabled_at: parse_opt_ts(enabled_at)?,
        created_at: parse_ts(&created)?,
    })
}

const USER_COLUMNS: &str = "id, name, email, display_name, email_notifications, \
                            last_seen, last_notified, notifications_enabled_at, created_at";

#[async_trait]
impl ActivityStore for SqliteStore {
    async fn activities_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, kind, object, summary, at
                 FROM activities WHERE user_id = ?1 ORDER BY at",
            )
            .map_err(|e| store_err("Prepare", e))?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| store_err("Query", e))?;

        // Timestamps are compared after parsing, not as strings:
        // rfc3339 fractional-second widths vary.
        let mut activities = Vec::new();
        for row in rows {
            let (id, user_id, kind, object, summary, at) = row.map_err(|e| store_err("Row", e))?;
            let at = parse_ts(&at)?;
            if let Some(cutoff) = since {
                if at <= cutoff {
                    continue;
                }
            }
            activities.push(Activity {
                id,
                user_id,
                kind: kind_from_str(&kind)?,
                object,
                summary,
                at,
            });
        }
        Ok(activities)
    }

    async fn record(&self, activity: Activity) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO activities (id, user_id, kind, object, summary, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                activity.id,
                activity.user_id,
                kind_to_str(activity.kind),
                activity.object,
                activity.summary,
                activity.at.to_rfc3339(),
            ],
        )
        .map_err(|e| store_err("Insert activity", e))?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for SqliteStore {
    async fn users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at"))
            .map_err(|e| store_err("Prepare", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })
            .map_err(|e| store_err("Query", e))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row_to_user(row.map_err(|e| store_err("Row", e))?)?);
        }
        Ok(users)
    }

    async fn user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .map_err(|e| store_err("Prepare", e))?;
        let mut rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })
            .map_err(|e| store_err("Query", e))?;
        match rows.next() {
            Some(row) => Ok(Some(row_to_user(row.map_err(|e| store_err("Row", e))?)?)),
            None => Ok(None),
        }
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO users
             (id, name, email, display_name, email_notifications,
              last_seen, last_notified, notifications_enabled_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                user.id,
                user.name,
                user.email,
                user.display_name,
                user.email_notifications,
                user.last_seen.map(|t| t.to_rfc3339()),
                user.last_notified.map(|t| t.to_rfc3339()),
                user.notifications_enabled_at.map(|t| t.to_rfc3339()),
                user.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| store_err("Insert user", e))?;
        Ok(())
    }

    async fn set_user_preference(&self, user_id: &str, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let current: bool = conn
            .query_row(
                "SELECT email_notifications FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|_| DatashedError::UnknownUser(user_id.to_string()))?;

        if enabled && !current {
            conn.execute(
                "UPDATE users SET email_notifications = 1,
                 notifications_enabled_at = ?2 WHERE id = ?1",
                rusqlite::params![user_id, Utc::now().to_rfc3339()],
            )
            .map_err(|e| store_err("Update preference", e))?;
        } else {
            conn.execute(
                "UPDATE users SET email_notifications = ?2 WHERE id = ?1",
                rusqlite::params![user_id, enabled],
            )
            .map_err(|e| store_err("Update preference", e))?;
        }
        Ok(())
    }

    async fn site_enabled(&self) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        // Missing row means the switch was never touched: enabled.
        Ok(self.setting(&conn, "site_enabled")?.as_deref() != Some("0"))
    }

    async fn site_enabled_at(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        parse_opt_ts(self.setting(&conn, "site_enabled_at")?)
    }

    async fn set_site_wide(&self, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let was_enabled = self.setting(&conn, "site_enabled")?.as_deref() != Some("0");
        if enabled && !was_enabled {
            self.put_setting(&conn, "site_enabled_at", &Utc::now().to_rfc3339())?;
        }
        self.put_setting(&conn, "site_enabled", if enabled { "1" } else { "0" })?;
        Ok(())
    }

    async fn set_last_seen(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE users SET last_seen = ?2 WHERE id = ?1",
                rusqlite::params![user_id, at.to_rfc3339()],
            )
            .map_err(|e| store_err("Update last_seen", e))?;
        if changed == 0 {
            return Err(DatashedError::UnknownUser(user_id.to_string()));
        }
        Ok(())
    }

    async fn set_last_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE users SET last_notified = ?2 WHERE id = ?1",
                rusqlite::params![user_id, at.to_rfc3339()],
            )
            .map_err(|e| store_err("Update last_notified", e))?;
        if changed == 0 {
            return Err(DatashedError::UnknownUser(user_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut user = User::new("sara", "sara@sararollins.com", "Sara Rollins");
        user.last_notified = Some(Utc::now());
        let id = user.id.clone();
        store.insert_user(user.clone()).await.unwrap();

        let loaded = store.user(&id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "sara");
        assert_eq!(loaded.email, "sara@sararollins.com");
        assert_eq!(loaded.last_notified, user.last_notified);
        assert!(!loaded.email_notifications);
    }

    #[tokio::test]
    async fn test_activity_stream_cutoff() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base = Utc::now();
        for (i, offset) in [0i64, 10, 20].iter().enumerate() {
            let mut a = Activity::new("u1", ActivityKind::DatasetUpdated, "warandpeace", "");
            a.id = format!("a{i}");
            a.at = base + chrono::Duration::seconds(*offset);
            store.record(a).await.unwrap();
        }

        let all = store.activities_since("u1", None).await.unwrap();
        assert_eq!(all.len(), 3);

        let after = store
            .activities_since("u1", Some(base + chrono::Duration::seconds(10)))
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, "a2");
    }

    #[tokio::test]
    async fn test_preference_stamps_enablement() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = User::new("sara", "sara@sararollins.com", "Sara Rollins");
        let id = user.id.clone();
        store.insert_user(user).await.unwrap();

        store.set_user_preference(&id, true).await.unwrap();
        let loaded = store.user(&id).await.unwrap().unwrap();
        assert!(loaded.email_notifications);
        assert!(loaded.notifications_enabled_at.is_some());

        // Disable then re-enable: stamp moves forward.
        let first = loaded.notifications_enabled_at;
        store.set_user_preference(&id, false).await.unwrap();
        store.set_user_preference(&id, true).await.unwrap();
        let again = store.user(&id).await.unwrap().unwrap();
        assert!(again.notifications_enabled_at >= first);
    }

    #[tokio::test]
    async fn test_site_switch_defaults_enabled() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.site_enabled().await.unwrap());
        assert!(store.site_enabled_at().await.unwrap().is_none());

        store.set_site_wide(false).await.unwrap();
        assert!(!store.site_enabled().await.unwrap());
        store.set_site_wide(true).await.unwrap();
        assert!(store.site_enabled().await.unwrap());
        assert!(store.site_enabled_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_checkpoint_writes_require_known_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.set_last_seen("ghost", Utc::now()).await.unwrap_err();
        assert!(matches!(err, DatashedError::UnknownUser(_)));
    }
}
