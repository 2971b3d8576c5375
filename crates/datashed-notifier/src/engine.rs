//! Batch Notifier — the once-per-invocation notification pass.
//!
//! All store reads happen before the first email goes out, so a dead
//! store aborts the run with nothing sent. After that point each
//! user's compose→dispatch→advance is its own tokio task: one slow or
//! failing recipient never stalls the rest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use datashed_core::error::Result;
use datashed_core::traits::{ActivityStore, MailDispatcher, PreferenceStore};
use datashed_core::types::{Activity, User};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::checkpoint::{max_option, CheckpointTracker};
use crate::composer::Composer;

/// Why a user got no email this run. Each is a deliberate no-op,
/// not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The user's own opt-in flag is off.
    UserDisabled,
    /// The site-wide kill switch is off.
    SiteDisabled,
    /// Nothing new past the cutoff.
    NoNewActivity,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UserDisabled => write!(f, "notifications disabled"),
            SkipReason::SiteDisabled => write!(f, "disabled site-wide"),
            SkipReason::NoNewActivity => write!(f, "no new activity"),
        }
    }
}

/// What happened to one user during a run.
#[derive(Debug, Clone, Serialize)]
pub enum UserOutcome {
    /// One digest sent, checkpoint advanced.
    Sent {
        activity_count: usize,
        notified_up_to: DateTime<Utc>,
    },
    Skipped(SkipReason),
    /// Dispatch or checkpoint failure. Checkpoint not advanced, so
    /// the same activities are retried next run.
    Failed(String),
}

/// Transient record of one `run_once` pass. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    /// (account name, outcome) per processed user.
    pub outcomes: Vec<(String, UserOutcome)>,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            outcomes: Vec::new(),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, UserOutcome::Sent { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, UserOutcome::Skipped(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, UserOutcome::Failed(_)))
            .count()
    }
}

/// The batch notifier. Cheap to clone; clones share the run lock.
#[derive(Clone)]
pub struct BatchNotifier {
    prefs: Arc<dyn PreferenceStore>,
    activities: Arc<dyn ActivityStore>,
    mailer: Arc<dyn MailDispatcher>,
    composer: Composer,
    tracker: CheckpointTracker,
    /// Dashboard-view suppression policy: when on, activity the user
    /// has already seen on their dashboard is not emailed.
    suppress_seen: bool,
    /// Single-writer run coordinator. Overlapping `run_once` calls
    /// serialize here, so no user is ever processed by two runs at
    /// the same time.
    run_lock: Arc<Mutex<()>>,
}

impl BatchNotifier {
    pub fn new(
        prefs: Arc<dyn PreferenceStore>,
        activities: Arc<dyn ActivityStore>,
        mailer: Arc<dyn MailDispatcher>,
        composer: Composer,
        suppress_seen: bool,
    ) -> Self {
        let tracker = CheckpointTracker::new(prefs.clone(), activities.clone());
        Self {
            prefs,
            activities,
            mailer,
            composer,
            tracker,
            suppress_seen,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn tracker(&self) -> &CheckpointTracker {
        &self.tracker
    }

    /// One notification pass over all users. At most one email per
    /// qualifying user; a second call with no new activity in between
    /// sends nothing.
    ///
    /// Store errors abort the whole run before any email is sent and
    /// surface to the scheduler for retry. Dispatch errors are
    /// per-user and recorded in the report.
    pub async fn run_once(&self) -> Result<RunReport> {
        let _guard = self.run_lock.lock().await;

        let started_at = self.activities.server_time();
        let mut report = RunReport::new(started_at);

        let site_enabled = self.prefs.site_enabled().await?;
        let users = self.prefs.users().await?;

        if !site_enabled {
            tracing::info!("🔕 Email notifications disabled site-wide, nothing to do");
            for user in users {
                report
                    .outcomes
                    .push((user.name, UserOutcome::Skipped(SkipReason::SiteDisabled)));
            }
            return Ok(report);
        }

        // Qualification + fetch. All store reads land here, before
        // the first dispatch, so a store failure aborts cleanly.
        let mut pending: Vec<(User, Vec<Activity>)> = Vec::new();
        for user in users {
            if !user.email_notifications {
                report
                    .outcomes
                    .push((user.name, UserOutcome::Skipped(SkipReason::UserDisabled)));
                continue;
            }

            let cutoff = self.digest_cutoff(&user).await?;
            let unseen = self.activities.activities_since(&user.id, cutoff).await?;
            if unseen.is_empty() {
                tracing::debug!("😴 {}: no new activity", user.name);
                report
                    .outcomes
                    .push((user.name, UserOutcome::Skipped(SkipReason::NoNewActivity)));
                continue;
            }
            pending.push((user, unseen));
        }

        tracing::info!(
            "📨 Notification run: {} user(s) with new activity",
            pending.len()
        );

        // Compose, dispatch, advance: one task per user, gathered at
        // the end. Each user appears in exactly one task and runs are
        // serialized by the run lock, so per-user work never races.
        let mut names = Vec::with_capacity(pending.len());
        let mut tasks = Vec::with_capacity(pending.len());
        for (user, unseen) in pending {
            names.push(user.name.clone());
            let notifier = self.clone();
            tasks.push(tokio::spawn(
                async move { notifier.notify_user(&user, unseen).await },
            ));
        }

        let joined = futures::future::join_all(tasks).await;
        for (name, result) in names.into_iter().zip(joined) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => UserOutcome::Failed(format!("task panicked: {e}")),
            };
            report.outcomes.push((name, outcome));
        }

        tracing::info!(
            "✅ Run complete: {} sent, {} skipped, {} failed",
            report.sent_count(),
            report.skipped_count(),
            report.failed_count()
        );
        Ok(report)
    }

    /// The digest window opens strictly after this instant: the
    /// notified watermark, the enablement time, and (policy
    /// permitting) the seen watermark, whichever is latest.
    async fn digest_cutoff(&self, user: &User) -> Result<Option<DateTime<Utc>>> {
        let enabled_at = self.tracker.enablement_time(user).await?;
        let mut cutoff = max_option(user.last_notified, enabled_at);
        if self.suppress_seen {
            cutoff = max_option(cutoff, user.last_seen);
        }
        Ok(cutoff)
    }

    /// Compose one digest, dispatch it, advance the checkpoint to the
    /// newest activity covered. Any failure leaves the checkpoint
    /// where it was.
    async fn notify_user(&self, user: &User, unseen: Vec<Activity>) -> UserOutcome {
        let newest = match unseen.iter().map(|a| a.at).max() {
            Some(at) => at,
            None => return UserOutcome::Skipped(SkipReason::NoNewActivity),
        };

        let mail = self.composer.compose(user, &unseen);
        if let Err(e) = self.mailer.send(&mail).await {
            tracing::warn!("⚠️ Dispatch failed for {}: {e}", user.name);
            return UserOutcome::Failed(e.to_string());
        }

        if let Err(e) = self.tracker.advance_notified(&user.id, newest).await {
            tracing::warn!("⚠️ Checkpoint advance failed for {}: {e}", user.name);
            return UserOutcome::Failed(e.to_string());
        }

        tracing::info!(
            "📧 Digest sent to {} ({} activities)",
            user.email,
            unseen.len()
        );
        UserOutcome::Sent {
            activity_count: unseen.len(),
            notified_up_to: newest,
        }
    }
}

/// Run the notifier on a fixed interval as a background tokio task.
/// The external cron surface for deployments without a system
/// scheduler.
pub async fn spawn_notifier(notifier: Arc<BatchNotifier>, check_interval_secs: u64) {
    tracing::info!(
        "⏰ Notifier started (run every {}s)",
        check_interval_secs
    );

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

    loop {
        interval.tick().await;
        match notifier.run_once().await {
            Ok(report) => {
                if report.sent_count() > 0 {
                    tracing::info!("📣 {} digest(s) sent", report.sent_count());
                }
            }
            // Store outage: skip this tick, the next one retries.
            Err(e) => tracing::error!("❌ Notification run aborted: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counters() {
        let mut report = RunReport::new(Utc::now());
        report.outcomes.push((
            "a".into(),
            UserOutcome::Sent {
                activity_count: 2,
                notified_up_to: Utc::now(),
            },
        ));
        report
            .outcomes
            .push(("b".into(), UserOutcome::Skipped(SkipReason::NoNewActivity)));
        report
            .outcomes
            .push(("c".into(), UserOutcome::Failed("smtp down".into())));

        assert_eq!(report.sent_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::SiteDisabled.to_string(), "disabled site-wide");
        assert_eq!(SkipReason::NoNewActivity.to_string(), "no new activity");
    }
}
