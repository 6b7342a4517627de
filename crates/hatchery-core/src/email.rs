// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Email sink contract and implementations.
//!
//! The dispatcher talks to mail only through [`EmailSink`]. Production uses
//! the SMTP implementation (behind the `smtp` feature); tests use
//! [`RecordingEmailSink`], which records calls in order and can be scripted
//! to fail.

use async_trait::async_trait;

use crate::error::CoreError;

/// Narrow outbound email contract.
#[async_trait]
pub trait EmailSink: Send + Sync {
    /// Send one message. A `Ok(())` means the transport accepted it.
    async fn send(&self, to: &str, subject: &str, html: &str, text: &str)
    -> Result<(), CoreError>;
}

/// SMTP-backed sink using lettre.
#[cfg(feature = "smtp")]
pub use self::smtp::SmtpEmailSink;

#[cfg(feature = "smtp")]
mod smtp {
    use async_trait::async_trait;
    use lettre::message::MultiPart;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    use super::EmailSink;
    use crate::error::CoreError;

    /// Sends mail over SMTP with STARTTLS.
    #[derive(Clone)]
    pub struct SmtpEmailSink {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: String,
    }

    impl SmtpEmailSink {
        /// Create a sink for the given relay and sender address.
        pub fn new(
            server: &str,
            port: u16,
            username: String,
            password: String,
            from: String,
        ) -> Result<Self, CoreError> {
            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
                .map_err(|e| CoreError::Email(format!("SMTP relay error: {e}")))?
                .port(port)
                .credentials(Credentials::new(username, password))
                .build();

            Ok(Self { transport, from })
        }
    }

    #[async_trait]
    impl EmailSink for SmtpEmailSink {
        async fn send(
            &self,
            to: &str,
            subject: &str,
            html: &str,
            text: &str,
        ) -> Result<(), CoreError> {
            let message = Message::builder()
                .from(
                    self.from
                        .parse()
                        .map_err(|e| CoreError::Email(format!("invalid from address: {e}")))?,
                )
                .to(to
                    .parse()
                    .map_err(|e| CoreError::Email(format!("invalid recipient: {e}")))?)
                .subject(subject)
                .multipart(MultiPart::alternative_plain_html(
                    text.to_string(),
                    html.to_string(),
                ))
                .map_err(|e| CoreError::Email(format!("message build error: {e}")))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| CoreError::Email(format!("SMTP send error: {e}")))?;

            Ok(())
        }
    }
}

/// Sink that logs messages instead of sending them.
///
/// Used when no SMTP relay is configured, so the dispatcher and its
/// cooldown bookkeeping keep working in environments without mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyEmailSink;

#[async_trait]
impl EmailSink for LogOnlyEmailSink {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _html: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        tracing::info!(to, subject, body = text, "email (log only)");
        Ok(())
    }
}

/// One recorded send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEmail {
    /// Recipient address.
    pub to: String,
    /// Message subject.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

/// Test sink that records calls in order.
///
/// Addresses pushed with [`fail_next_to`](Self::fail_next_to) make the next
/// send to that address fail, which exercises the dispatcher's failed-send
/// logging.
#[derive(Default)]
pub struct RecordingEmailSink {
    sent: std::sync::Mutex<Vec<RecordedEmail>>,
    fail_to: std::sync::Mutex<Vec<String>>,
}

impl RecordingEmailSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in send order.
    pub fn sent(&self) -> Vec<RecordedEmail> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Make the next send to `to` fail.
    pub fn fail_next_to(&self, to: &str) {
        if let Ok(mut fail) = self.fail_to.lock() {
            fail.push(to.to_string());
        }
    }
}

#[async_trait]
impl EmailSink for RecordingEmailSink {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        if let Ok(mut fail) = self.fail_to.lock()
            && let Some(pos) = fail.iter().position(|f| f == to)
        {
            fail.remove(pos);
            return Err(CoreError::Email(format!("scripted failure for {to}")));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(RecordedEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
                text: text.to_string(),
            });
        }
        Ok(())
    }
}
