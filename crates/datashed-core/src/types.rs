//! Catalog data model — users, activity streams, outbound mail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Account name (login).
    pub name: String,
    /// Registered email address.
    pub email: String,
    /// Full display name, used in email greetings.
    pub display_name: String,
    /// Per-user opt-in for email notifications. Off for new accounts.
    pub email_notifications: bool,
    /// Last time the user viewed their activity dashboard.
    pub last_seen: Option<DateTime<Utc>>,
    /// Newest activity timestamp already covered by a sent email.
    /// Monotonic, never rewound.
    pub last_notified: Option<DateTime<Utc>>,
    /// Most recent false→true transition of `email_notifications`.
    pub notifications_enabled_at: Option<DateTime<Utc>>,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new account. Email notifications start disabled;
    /// the user (or an admin) must opt in.
    pub fn new(name: &str, email: &str, display_name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            email_notifications: false,
            last_seen: None,
            last_notified: None,
            notifications_enabled_at: None,
            created_at: Utc::now(),
        }
    }
}

/// What happened to produce an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    DatasetCreated,
    DatasetUpdated,
    DatasetDeleted,
    ResourceAdded,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::DatasetCreated => write!(f, "created dataset"),
            ActivityKind::DatasetUpdated => write!(f, "updated dataset"),
            ActivityKind::DatasetDeleted => write!(f, "deleted dataset"),
            ActivityKind::ResourceAdded => write!(f, "added a resource to"),
        }
    }
}

/// One entry in a user's activity stream. Immutable once recorded,
/// ordered by `at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Unique activity ID.
    pub id: String,
    /// Whose stream this entry belongs to.
    pub user_id: String,
    /// What happened.
    pub kind: ActivityKind,
    /// The object acted on (dataset name).
    pub object: String,
    /// Free-text detail (e.g. the change notes).
    pub summary: String,
    /// When it happened.
    pub at: DateTime<Utc>,
}

impl Activity {
    pub fn new(user_id: &str, kind: ActivityKind, object: &str, summary: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            object: object.to_string(),
            summary: summary.to_string(),
            at: Utc::now(),
        }
    }

    /// One human-readable line for digest bodies.
    pub fn describe(&self) -> String {
        if self.summary.is_empty() {
            format!("{} {}", self.kind, self.object)
        } else {
            format!("{} {} ({})", self.kind, self.object, self.summary)
        }
    }
}

/// A composed email ready for the mail dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEmail {
    /// Recipient address.
    pub to_address: String,
    /// Recipient display name.
    pub to_name: String,
    /// Sender address (site operator).
    pub from_address: String,
    /// Sender display name (site title).
    pub from_name: String,
    pub subject: String,
    /// Plain-text body, UTF-8.
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_users_have_notifications_off() {
        let user = User::new("sara", "sara@sararollins.com", "Sara Rollins");
        assert!(!user.email_notifications);
        assert!(user.last_seen.is_none());
        assert!(user.last_notified.is_none());
    }

    #[test]
    fn test_activity_describe() {
        let a = Activity::new("u1", ActivityKind::DatasetUpdated, "warandpeace", "updated 1 times");
        assert_eq!(a.describe(), "updated dataset warandpeace (updated 1 times)");

        let b = Activity::new("u1", ActivityKind::DatasetCreated, "annakarenina", "");
        assert_eq!(b.describe(), "created dataset annakarenina");
    }
}
