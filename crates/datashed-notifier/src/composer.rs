//! Digest composition — many activities in, one email out.
//!
//! Pure: same user, activities, and site metadata always produce the
//! same message. No clock reads, no store access.

use datashed_core::config::DatashedConfig;
use datashed_core::types::{Activity, OutboundEmail, User};

/// Plain-text bodies wrap at this column for transport courtesy.
const WRAP_COLUMN: usize = 78;

/// Renders one digest email per user from their unseen activities.
#[derive(Debug, Clone)]
pub struct Composer {
    subject: String,
    site_title: String,
    site_url: String,
    from_address: String,
}

impl Composer {
    pub fn new(subject: &str, site_title: &str, site_url: &str, from_address: &str) -> Self {
        Self {
            subject: subject.to_string(),
            site_title: site_title.to_string(),
            site_url: site_url.to_string(),
            from_address: from_address.to_string(),
        }
    }

    pub fn from_config(config: &DatashedConfig) -> Self {
        Self::new(
            &config.notifier.subject,
            &config.site.title,
            &config.site.url,
            &config.site.from_address,
        )
    }

    /// Build the digest covering all of `activities`. Callers pass a
    /// non-empty, time-ordered slice; each entry becomes one summary
    /// line in a single message.
    pub fn compose(&self, user: &User, activities: &[Activity]) -> OutboundEmail {
        let count = activities.len();
        let headline = if count == 1 {
            format!(
                "You have 1 new activity on your {} dashboard:",
                self.site_title
            )
        } else {
            format!(
                "You have {} new activities on your {} dashboard:",
                count, self.site_title
            )
        };

        let mut lines = Vec::with_capacity(count);
        for activity in activities {
            lines.push(format!(" * {}", activity.describe()));
        }

        let body = format!(
            "Dear {},\n\n{}\n\n{}\n\n--\nMessage sent by {} ({})",
            user.display_name,
            headline,
            lines.join("\n"),
            self.site_title,
            self.site_url,
        );

        OutboundEmail {
            to_address: user.email.clone(),
            to_name: user.display_name.clone(),
            from_address: self.from_address.clone(),
            from_name: self.site_title.clone(),
            subject: self.subject.clone(),
            body: wrap(&body, WRAP_COLUMN),
        }
    }
}

/// Word-wrap each line of `text` at `width` columns. Indentation of
/// continuation lines is not preserved; words longer than the width
/// are left intact.
fn wrap(text: &str, width: usize) -> String {
    let mut out = Vec::new();
    for line in text.split('\n') {
        if line.chars().count() <= width {
            out.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split(' ') {
            if current.is_empty() {
                current = word.to_string();
            } else if current.chars().count() + 1 + word.chars().count() <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                out.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out.join("\n")
}
