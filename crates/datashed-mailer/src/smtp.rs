//! SMTP sending via async lettre. STARTTLS relay, plain-text bodies,
//! UTF-8 headers (lettre encodes non-ASCII subjects and names).

use async_trait::async_trait;
use datashed_core::config::SmtpConfig;
use datashed_core::error::{DatashedError, Result};
use datashed_core::traits::MailDispatcher;
use datashed_core::types::OutboundEmail;
use lettre::{
    message::header::ContentType, message::Mailbox, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Sends digests through a configured SMTP relay.
pub struct SmtpDispatcher {
    config: SmtpConfig,
}

impl SmtpDispatcher {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(mail: &OutboundEmail) -> Result<Message> {
        let from: Mailbox = format!("{} <{}>", mail.from_name, mail.from_address)
            .parse()
            .map_err(|e| DatashedError::Dispatch(format!("Invalid from: {e}")))?;
        let to: Mailbox = format!("{} <{}>", mail.to_name, mail.to_address)
            .parse()
            .map_err(|e| DatashedError::Dispatch(format!("Invalid to: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| DatashedError::Dispatch(format!("Build email: {e}")))
    }
}

#[async_trait]
impl MailDispatcher for SmtpDispatcher {
    async fn send(&self, mail: &OutboundEmail) -> Result<()> {
        let message = Self::build_message(mail)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| DatashedError::Dispatch(format!("SMTP relay: {e}")))?
            .port(self.config.port);

        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| DatashedError::Dispatch(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {}", mail.to_address);
        Ok(())
    }
}
