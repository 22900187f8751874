//! SMTP delivery of the report

use super::{ArtifactMailer, REPORT_CONTENT_TYPE};
use crate::config::{SmtpConfig, TlsMode};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;

/// Subject line and body text of the report mail
pub const MAIL_SUBJECT: &str = "GCP Inventory";

/// Sends the report as an attachment to every configured recipient
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self.config.host.as_str();
        let builder = match self.config.tls {
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .with_context(|| format!("Invalid SMTP relay {}", host))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .with_context(|| format!("Invalid SMTP relay {}", host))?,
        };

        let mut builder = builder.port(self.config.port);
        if let Some(credentials) = &self.config.credentials {
            builder = builder.credentials(Credentials::new(
                credentials.user.clone(),
                credentials.password.clone(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl ArtifactMailer for SmtpMailer {
    fn recipients(&self) -> &[String] {
        &self.config.to
    }

    async fn send(&self, path: &Path, name: &str) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let message = build_message(&self.config.from, &self.config.to, name, bytes)?;
        let response = self
            .transport()?
            .send(message)
            .await
            .with_context(|| {
                format!(
                    "SMTP delivery via {}:{} failed",
                    self.config.host, self.config.port
                )
            })?;

        tracing::debug!("SMTP server answered {:?}", response.code());
        Ok(())
    }
}

/// Compose the report mail with the CSV attached under `name`
pub fn build_message(from: &str, to: &[String], name: &str, csv: Vec<u8>) -> Result<Message> {
    let from: Mailbox = from
        .parse()
        .with_context(|| format!("Invalid sender address '{}'", from))?;

    let mut builder = Message::builder().from(from).subject(MAIL_SUBJECT);
    for recipient in to {
        let mailbox: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address '{}'", recipient))?;
        builder = builder.to(mailbox);
    }

    let content_type = ContentType::parse(REPORT_CONTENT_TYPE)
        .map_err(|_| anyhow::anyhow!("Invalid content type {}", REPORT_CONTENT_TYPE))?;

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(MAIL_SUBJECT.to_string()))
                .singlepart(Attachment::new(name.to_string()).body(csv, content_type)),
        )
        .context("Failed to build report e-mail")
}
