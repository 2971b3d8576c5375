//! Capturing mail dispatcher for tests — every "sent" message is
//! held in memory for assertions, and delivery can be forced to fail
//! to exercise partial-failure paths.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use datashed_core::error::{DatashedError, Result};
use datashed_core::traits::MailDispatcher;
use datashed_core::types::OutboundEmail;

/// In-memory stand-in for an SMTP server.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: AtomicBool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in send order.
    pub async fn messages(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Drop captured messages between test phases.
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    /// Make every subsequent send fail with a dispatch error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MailDispatcher for MockMailer {
    async fn send(&self, mail: &OutboundEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DatashedError::Dispatch("mock transport down".into()));
        }
        self.sent.lock().await.push(mail.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutboundEmail {
        OutboundEmail {
            to_address: "sara@sararollins.com".into(),
            to_name: "Sara Rollins".into(),
            from_address: "info@datashed.local".into(),
            from_name: "DataShed".into(),
            subject: "You have new activity".into(),
            body: "hi".into(),
        }
    }

    #[tokio::test]
    async fn test_captures_in_order() {
        let mailer = MockMailer::new();
        mailer.send(&mail()).await.unwrap();
        mailer.send(&mail()).await.unwrap();
        assert_eq!(mailer.message_count().await, 2);
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let mailer = MockMailer::new();
        mailer.set_failing(true);
        assert!(mailer.send(&mail()).await.is_err());
        assert_eq!(mailer.message_count().await, 0);

        mailer.set_failing(false);
        mailer.send(&mail()).await.unwrap();
        assert_eq!(mailer.message_count().await, 1);
    }
}
